use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use serde::Serialize;

use crate::cache::{FeatureCache, SearchCache};
use crate::config::{CacheDir, FindOptions, MatchThreshold, OrbOptions};
use crate::matcher::{self, TargetIndex};
use crate::orb::ORBDetector;
use crate::utils::{ImageFilter, file_size, list_images};

/// 一对重复图片，生成后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duplicate {
    /// 搜索目录中的文件名
    pub search: String,
    /// 目标目录中的文件名
    pub target: String,
    /// 匹配数
    pub score: u32,
    /// 搜索图片大小，单位字节
    pub size: u64,
}

/// 没有找到重复时，分数最高的目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Miss {
    pub search: String,
    pub best_match: Option<String>,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// 特征缓存中的目标图片数量
    pub image_processed: usize,
    /// 特征缓存文件大小，单位字节
    pub image_cache_size: u64,
    /// 本次实际比较的搜索图片数量
    pub search_processed: usize,
    pub duplicates: usize,
    /// 被忽略的空文件数量
    pub garbage: usize,
}

impl RunStats {
    /// 特征缓存大小，单位 MB
    pub fn image_cache_size_mb(&self) -> f64 {
        self.image_cache_size as f64 / 1000f64.powi(2)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub duplicates: Vec<Duplicate>,
    pub misses: Vec<Miss>,
    pub stats: RunStats,
}

pub struct ImgDupsBuilder {
    search: PathBuf,
    target: PathBuf,
    threshold: MatchThreshold,
    orb: OrbOptions,
    find: FindOptions,
}

impl ImgDupsBuilder {
    pub fn new(search: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            search: search.into(),
            target: target.into(),
            threshold: MatchThreshold::default(),
            orb: OrbOptions::default(),
            find: FindOptions::default(),
        }
    }

    /// 判定为重复的匹配数阈值
    pub fn threshold(mut self, threshold: MatchThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn orb(mut self, orb: OrbOptions) -> Self {
        self.orb = orb;
        self
    }

    pub fn options(mut self, find: FindOptions) -> Self {
        self.find = find;
        self
    }

    /// 检查目录是否存在，目标目录不存在时返回错误
    pub fn open(self) -> Result<ImgDups> {
        let target = canonical_dir(&self.target, "目标目录")?;
        let search = canonical_dir(&self.search, "搜索目录")?;
        let filter = ImageFilter::new(&self.find.suffix, &self.find.exclude)?;
        Ok(ImgDups {
            search: CacheDir::new(search),
            target: CacheDir::new(target),
            threshold: self.threshold,
            orb: ORBDetector::create(self.orb)?,
            filter,
            keep_normalized: self.find.keep_normalized,
            rescan: self.find.rescan,
        })
    }
}

fn canonical_dir(path: &Path, what: &str) -> Result<PathBuf> {
    if !path.is_dir() {
        bail!("{}不存在: {}", what, path.display());
    }
    fs::canonicalize(path).with_context(|| format!("无法解析{} {}", what, path.display()))
}

pub struct ImgDups {
    search: CacheDir,
    target: CacheDir,
    threshold: MatchThreshold,
    orb: ORBDetector,
    filter: ImageFilter,
    keep_normalized: bool,
    rescan: bool,
}

impl ImgDups {
    /// 更新目标目录的特征缓存，然后把搜索目录中每张新的或有变化的图片与全部目标比较
    ///
    /// 单张图片的错误只会被记录并跳过，只有写入缓存失败才会返回错误
    pub fn find_duplicates(&mut self, pb: &ProgressBar) -> Result<Report> {
        info!("搜索目录: {}", self.search.root().display());
        info!("目标目录: {}", self.target.root().display());

        let mut features = FeatureCache::load(self.target.clone());
        let added = features.refresh(&mut self.orb, &self.filter, self.keep_normalized, pb)?;
        debug!("新增 {} 张目标图片，共 {} 张", added, features.len());

        let index = TargetIndex::new(&features);
        if index.is_empty() {
            warn!("目标目录中没有可比较的图片");
        }
        debug!("参与比较的目标图片: {}", index.len());
        if index.garbage() > 0 {
            warn!("忽略目标目录中的 {} 个空文件", index.garbage());
        }

        let mut checked = if self.rescan {
            SearchCache::empty(self.search.clone())
        } else {
            SearchCache::load(self.search.clone())
        };

        info!("开始比较图片，阈值 {}", self.threshold);
        let files = list_images(self.search.root(), &self.filter)?;
        pb.set_length(files.len() as u64);
        pb.set_position(0);

        let mut report = Report::default();
        for name in files {
            pb.set_message(name.clone());
            pb.inc(1);

            match checked.is_unchanged(&name) {
                Ok(true) => {
                    debug!("跳过已检查的图片 {}", name);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("跳过图片 {}: {:#}", name, e);
                    continue;
                }
            }

            let path = self.search.source(&name);
            let descriptors = match self.orb.detect_file(&path) {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    warn!("跳过图片 {}: {:#}", name, e);
                    continue;
                }
            };
            report.stats.search_processed += 1;

            let result = matcher::score(&descriptors, &index, self.threshold);
            let best = result.best_match.clone().unwrap_or_default();
            if result.is_duplicate {
                info!("{} == {} (score: {})", name, best, result.score);
                report.duplicates.push(Duplicate {
                    search: name,
                    target: best,
                    score: result.score,
                    size: file_size(&path).unwrap_or(0),
                });
            } else {
                info!("{} != {} (score: {})", name, best, result.score);
                report.misses.push(Miss {
                    search: name,
                    best_match: result.best_match,
                    score: result.score,
                });
            }
        }

        checked.save()?;

        report.stats.image_processed = features.len();
        report.stats.image_cache_size = features.file_size();
        report.stats.duplicates = report.duplicates.len();
        report.stats.garbage = index.garbage();

        info!(
            "目标图片 {} 张，缓存 {:.3} MB，本次比较 {} 张",
            report.stats.image_processed,
            report.stats.image_cache_size_mb(),
            report.stats.search_processed
        );
        info!("完成，共找到 {} 组重复图片", report.stats.duplicates);

        Ok(report)
    }
}
