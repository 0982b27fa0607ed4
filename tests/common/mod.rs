#![allow(dead_code)]

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 随机彩色方块拼成的图片，能检测到大量特征点
pub fn textured(path: impl AsRef<Path>, seed: u64, width: u32, height: u32) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let cell = 8;
    let cols = width / cell + 1;
    let rows = height / cell + 1;
    let colors = (0..cols * rows)
        .map(|_| Rgb([rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>()]))
        .collect::<Vec<_>>();
    let image = RgbImage::from_fn(width, height, |x, y| colors[((y / cell) * cols + x / cell) as usize]);
    image.save(path)?;
    Ok(())
}

/// 灰色背景上的几个矩形，只有很少的特征点
pub fn sparse(path: impl AsRef<Path>, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut image = RgbImage::from_pixel(500, 500, Rgb([128, 128, 128]));
    for _ in 0..3 {
        let x0 = rng.random_range(60..300);
        let y0 = rng.random_range(60..300);
        let w = rng.random_range(40..140);
        let h = rng.random_range(40..140);
        let v = if rng.random::<bool>() { 230 } else { 20 };
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
    }
    image.save(path)?;
    Ok(())
}

/// 与原图视觉相同但字节不同的副本
#[derive(Debug, Clone, Copy)]
pub enum VisualCopy {
    /// 逐字节复制
    Bytes,
    /// 缩放到指定边长后保存为 JPEG
    Resized(u32),
    /// 以指定质量重新编码为 JPEG
    Reencoded(u8),
}

pub fn visual_copy(src: impl AsRef<Path>, dst: impl AsRef<Path>, kind: VisualCopy) -> Result<()> {
    match kind {
        VisualCopy::Bytes => {
            std::fs::copy(src, dst)?;
        }
        VisualCopy::Resized(size) => {
            image::open(src)?.resize_exact(size, size, FilterType::Lanczos3).to_rgb8().save(dst)?;
        }
        VisualCopy::Reencoded(quality) => {
            let image = image::open(src)?.to_rgb8();
            let mut writer = BufWriter::new(File::create(dst)?);
            JpegEncoder::new_with_quality(&mut writer, quality).encode_image(&image)?;
        }
    }
    Ok(())
}
