use bytemuck::cast;

/// ORB 描述符长度（字节），即 256 bit
pub const DESCRIPTOR_BYTES: usize = 32;

/// 单个 256 bit 二值描述符
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

#[inline(always)]
pub fn hamming_256(va: &Descriptor, vb: &Descriptor) -> u32 {
    // NOTE: 这里按值转换，避免 cast_slice 对 u64 对齐的要求
    let va: [u64; 4] = cast(*va);
    let vb: [u64; 4] = cast(*vb);
    (va[0] ^ vb[0]).count_ones()
        + (va[1] ^ vb[1]).count_ones()
        + (va[2] ^ vb[2]).count_ones()
        + (va[3] ^ vb[3]).count_ones()
}

#[inline(always)]
pub fn hamming_naive(va: &[u8], vb: &[u8]) -> u32 {
    va.iter().zip(vb).map(|(a, b)| (a ^ b).count_ones()).sum()
}

/// 在 vb 中寻找与 va 距离最小的描述符，返回 (索引, 距离)
///
/// 距离相同时保留最先出现的那个，vb 为空时返回 None
pub fn nearest(va: &Descriptor, vb: &[Descriptor]) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32)> = None;
    for (i, d) in vb.iter().map(|b| hamming_256(va, b)).enumerate() {
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
        if d == 0 {
            break;
        }
    }
    best
}

/// 交叉验证的暴力匹配，返回互为最近邻的描述符对数量
///
/// 对 query 中的每个描述符 q 找到 train 中的最近邻 t，
/// 只有当 t 在 query 中的最近邻恰好也是 q 时才计为一个匹配。
/// 结果对参数顺序对称，且不超过 min(query.len(), train.len())
pub fn cross_check_count(query: &[Descriptor], train: &[Descriptor]) -> u32 {
    if query.is_empty() || train.is_empty() {
        return 0;
    }
    // 先算出 train -> query 方向的最近邻，避免重复计算
    let backward: Vec<usize> = train
        .iter()
        .map(|t| nearest(t, query).map(|(i, _)| i).unwrap_or(usize::MAX))
        .collect();

    let mut count = 0;
    for (qi, q) in query.iter().enumerate() {
        if let Some((ti, _)) = nearest(q, train) {
            if backward[ti] == qi {
                count += 1;
            }
        }
    }
    count
}
