use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use opencv::core::{self, KeyPoint, Mat, Ptr, Size, Vector};
use opencv::features2d::{ORB, ORB_ScoreType};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};
use serde::{Deserialize, Serialize};

use crate::config::OrbOptions;
use crate::hamming::{DESCRIPTOR_BYTES, Descriptor};

/// 所有图片在提取特征前都会被缩放到这个尺寸
pub const CANONICAL_SIZE: i32 = 500;

// 以下参数与 OpenCV 的默认值一致
const EDGE_THRESHOLD: i32 = 31;
const FIRST_LEVEL: i32 = 0;
const WTA_K: i32 = 2;
const PATCH_SIZE: i32 = 31;

/// 一张图片的全部 ORB 描述符，顺序无意义
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptors(Vec<Descriptor>);

impl Descriptors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Descriptor] {
        &self.0
    }

    /// 从 OpenCV 输出的 N x 32 的 CV_8U 矩阵转换
    fn from_mat(des: &Mat) -> Result<Self> {
        if des.empty() {
            return Ok(Self::default());
        }
        ensure!(
            des.cols() == DESCRIPTOR_BYTES as i32 && des.typ() == core::CV_8UC1,
            "描述符格式错误: {}x{}, type {}",
            des.rows(),
            des.cols(),
            des.typ()
        );
        let data = des.data_typed::<u8>()?;
        let (rows, _) = data.as_chunks::<DESCRIPTOR_BYTES>();
        Ok(Self(rows.to_vec()))
    }
}

impl From<Vec<Descriptor>> for Descriptors {
    fn from(value: Vec<Descriptor>) -> Self {
        Self(value)
    }
}

/// 已缩放到标准尺寸的 8 位单通道灰度图
///
/// 只能通过 [`CanonicalImage::new`] 或 [`CanonicalImage::from_mat`] 构造，
/// 因此持有者可以假定宽高均为 [`CANONICAL_SIZE`]
pub struct CanonicalImage(Mat);

impl CanonicalImage {
    pub fn new(image: Mat) -> Result<Self> {
        ensure!(
            image.cols() == CANONICAL_SIZE
                && image.rows() == CANONICAL_SIZE
                && image.typ() == core::CV_8UC1,
            "图片 {}x{} (type {}) 不是 {}x{} 的灰度图",
            image.cols(),
            image.rows(),
            image.typ(),
            CANONICAL_SIZE,
            CANONICAL_SIZE
        );
        Ok(Self(image))
    }

    /// 从任意尺寸的 BGR 或灰度图构造，必要时缩放
    pub fn from_mat(image: Mat) -> Result<Self> {
        let (image, _) = normalize(image)?;
        Self::new(to_gray(image)?)
    }

    pub fn as_mat(&self) -> &Mat {
        &self.0
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().with_context(|| format!("路径不是合法的 UTF-8: {}", path.display()))
}

/// 以 BGR 格式读取图片，无法解码时返回错误
pub fn imread(path: impl AsRef<Path>) -> Result<Mat> {
    let path = path.as_ref();
    let image = imgcodecs::imread(path_str(path)?, imgcodecs::IMREAD_COLOR)
        .with_context(|| format!("无法打开图片 {}", path.display()))?;
    if image.empty() {
        bail!("无法解码图片 {}", path.display());
    }
    Ok(image)
}

/// 按扩展名选择格式保存图片
pub fn imwrite(path: impl AsRef<Path>, image: &Mat) -> Result<()> {
    let path = path.as_ref();
    let flags = Vector::<i32>::new();
    if !imgcodecs::imwrite(path_str(path)?, image, &flags)? {
        bail!("无法写入图片 {}", path.display());
    }
    Ok(())
}

/// 如果图片不是标准尺寸，则缩放到标准尺寸，返回是否进行了缩放
pub fn normalize(image: Mat) -> Result<(Mat, bool)> {
    if image.cols() == CANONICAL_SIZE && image.rows() == CANONICAL_SIZE {
        return Ok((image, false));
    }
    let mut output = Mat::default();
    imgproc::resize(
        &image,
        &mut output,
        Size::new(CANONICAL_SIZE, CANONICAL_SIZE),
        0.,
        0.,
        imgproc::InterpolationFlags::INTER_AREA as i32,
    )?;
    Ok((output, true))
}

fn to_gray(image: Mat) -> Result<Mat> {
    if image.channels() == 1 {
        return Ok(image);
    }
    let mut gray = Mat::default();
    imgproc::cvt_color_def(&image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

pub struct ORBDetector {
    orb: Ptr<ORB>,
}

impl ORBDetector {
    pub fn create(options: OrbOptions) -> Result<Self> {
        let orb = ORB::create(
            options.orb_nfeatures as i32,
            options.orb_scale_factor,
            options.orb_nlevels as i32,
            EDGE_THRESHOLD,
            FIRST_LEVEL,
            WTA_K,
            ORB_ScoreType::HARRIS_SCORE,
            PATCH_SIZE,
            options.orb_fast_threshold as i32,
        )
        .with_context(|| format!("无法创建 ORB 特征提取器: {:?}", options))?;
        Ok(Self { orb })
    }

    /// 读取图片文件，缩放到标准尺寸并计算描述符
    pub fn detect_file(&mut self, path: impl AsRef<Path>) -> Result<Descriptors> {
        let path = path.as_ref();
        let image = CanonicalImage::from_mat(imread(path)?)?;
        let descriptors = self.detect_image(&image)?;
        if descriptors.is_empty() {
            bail!("未检测到特征点: {}", path.display());
        }
        Ok(descriptors)
    }

    /// 在标准尺寸图片上检测关键点并计算描述符
    pub fn detect_image(&mut self, image: &CanonicalImage) -> Result<Descriptors> {
        let mask = Mat::default();
        let mut keypoints = Vector::<KeyPoint>::new();
        let mut descriptors = Mat::default();
        self.orb.detect_and_compute(image.as_mat(), &mask, &mut keypoints, &mut descriptors, false)?;
        Descriptors::from_mat(&descriptors)
    }
}

#[cfg(test)]
mod tests {
    use opencv::core::Scalar;

    use super::*;
    use crate::hamming::cross_check_count;

    fn gray(size: i32, value: f64) -> Mat {
        Mat::new_rows_cols_with_default(size, size, core::CV_8UC1, Scalar::all(value)).unwrap()
    }

    /// 随机灰度方块组成的图片，角点很多
    fn blocks(size: i32, seed: u64) -> Mat {
        let mut image = gray(size, 0.);
        let stride = (size / 8 + 1) as usize;
        let mut state = seed;
        let mut cells = vec![];
        for _ in 0..stride * stride {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            cells.push((state >> 56) as u8);
        }
        let data = image.data_bytes_mut().unwrap();
        for (i, pixel) in data.iter_mut().enumerate() {
            let (x, y) = (i % size as usize, i / size as usize);
            *pixel = cells[(y / 8) * stride + x / 8];
        }
        image
    }

    #[test]
    fn test_canonical_image_rejects_wrong_size() {
        assert!(CanonicalImage::new(gray(100, 0.)).is_err());
        assert!(CanonicalImage::new(gray(500, 0.)).is_ok());
    }

    #[test]
    fn test_from_mat_resizes_and_converts() -> Result<()> {
        let mut bgr = Mat::default();
        imgproc::cvt_color_def(&blocks(640, 3), &mut bgr, imgproc::COLOR_GRAY2BGR)?;
        assert_eq!(bgr.channels(), 3);

        let image = CanonicalImage::from_mat(bgr)?;
        assert_eq!((image.as_mat().cols(), image.as_mat().rows()), (CANONICAL_SIZE, CANONICAL_SIZE));
        assert_eq!(image.as_mat().channels(), 1);
        Ok(())
    }

    #[test]
    fn test_normalize() -> Result<()> {
        let (image, resized) = normalize(gray(320, 0.))?;
        assert!(resized);
        assert_eq!((image.cols(), image.rows()), (CANONICAL_SIZE, CANONICAL_SIZE));

        let (_, resized) = normalize(gray(500, 0.))?;
        assert!(!resized);
        Ok(())
    }

    #[test]
    fn test_flat_image_has_no_features() -> Result<()> {
        let mut orb = ORBDetector::create(OrbOptions::default())?;
        let des = orb.detect_image(&CanonicalImage::new(gray(500, 128.))?)?;
        assert!(des.is_empty());
        Ok(())
    }

    #[test]
    fn test_detect_is_deterministic() -> Result<()> {
        let mut orb = ORBDetector::create(OrbOptions::default())?;
        let image = CanonicalImage::new(blocks(500, 1))?;
        let des1 = orb.detect_image(&image)?;
        let des2 = orb.detect_image(&image)?;
        assert_eq!(des1, des2);
        assert!(des1.len() <= 500);
        assert!(des1.len() > 320, "only {} features", des1.len());
        Ok(())
    }

    #[test]
    fn test_same_image_scores_high() -> Result<()> {
        let mut orb = ORBDetector::create(OrbOptions::default())?;
        let des = orb.detect_image(&CanonicalImage::new(blocks(500, 7))?)?;
        let count = cross_check_count(des.as_slice(), des.as_slice());
        assert!(count > 320, "count = {}", count);
        Ok(())
    }

    #[test]
    fn test_imread_missing_or_broken() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(imread(dir.path().join("missing.jpg")).is_err());
        std::fs::write(dir.path().join("broken.jpg"), b"\xff\xd8 truncated")?;
        assert!(imread(dir.path().join("broken.jpg")).is_err());
        Ok(())
    }

    #[test]
    fn test_imwrite_then_imread() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.png");
        imwrite(&path, &blocks(64, 5))?;
        let image = imread(&path)?;
        assert_eq!((image.cols(), image.rows(), image.channels()), (64, 64, 3));
        Ok(())
    }
}
