use crate::cache::{CacheEntry, FeatureCache};
use crate::config::MatchThreshold;
use crate::hamming::cross_check_count;
use crate::orb::Descriptors;
use crate::utils::file_size;

/// 参与比较的目标图片，按特征缓存中的顺序排列
pub struct TargetIndex<'a> {
    targets: Vec<Target<'a>>,
    garbage: usize,
}

struct Target<'a> {
    entry: &'a CacheEntry,
    /// 原图大小为 0，不参与比较
    garbage: bool,
}

impl<'a> TargetIndex<'a> {
    /// 从特征缓存构建索引，同时标记大小为 0 的原图
    pub fn new(cache: &'a FeatureCache) -> Self {
        let dir = cache.dir();
        Self::from_entries(
            cache.entries().iter().map(|e| (e, file_size(dir.source(&e.name)) == Some(0))),
        )
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (&'a CacheEntry, bool)>) -> Self {
        let targets = entries
            .into_iter()
            .map(|(entry, garbage)| Target { entry, garbage })
            .collect::<Vec<_>>();
        let garbage = targets.iter().filter(|t| t.garbage).count();
        Self { targets, garbage }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// 被忽略的空文件数量
    pub fn garbage(&self) -> usize {
        self.garbage
    }
}

/// 一张搜索图片的比较结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub is_duplicate: bool,
    /// 重复时为匹配到的目标，否则为分数最高的目标
    pub best_match: Option<String>,
    pub score: u32,
}

/// 按索引顺序与每个目标比较，第一个匹配数严格大于阈值的目标即判定为重复
///
/// 注意这里不是取全局最优：多个目标都超过阈值时，报告索引中靠前的那个。
/// 没有重复时返回分数最高的目标，分数相同取先出现的
pub fn score(search: &Descriptors, index: &TargetIndex<'_>, threshold: MatchThreshold) -> Score {
    let mut best: Option<(&str, u32)> = None;

    for target in index.targets.iter().filter(|t| !t.garbage) {
        let count = cross_check_count(search.as_slice(), target.entry.descriptors.as_slice());
        if count > threshold.get() {
            return Score {
                is_duplicate: true,
                best_match: Some(target.entry.name.clone()),
                score: count,
            };
        }
        if best.is_none_or(|(_, high)| count > high) {
            best = Some((target.entry.name.as_str(), count));
        }
    }

    Score {
        is_duplicate: false,
        best_match: best.map(|(name, _)| name.to_string()),
        score: best.map(|(_, s)| s).unwrap_or(0),
    }
}
