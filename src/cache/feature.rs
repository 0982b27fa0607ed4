use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use opencv::core::Mat;

use super::model::{CacheEntry, FeatureCacheFile};
use super::{load_cache, store_cache};
use crate::config::CacheDir;
use crate::orb::{CanonicalImage, ORBDetector, imread, imwrite, normalize};
use crate::utils::{ImageFilter, list_images};

/// 目标目录的特征缓存
///
/// 条目按加入顺序保存，同一文件名最多只有一条。
/// 同一目录同时只能被一个进程使用，这里不做任何加锁
pub struct FeatureCache {
    dir: CacheDir,
    processed: HashSet<String>,
    entries: Vec<CacheEntry>,
}

impl FeatureCache {
    /// 读取已有缓存，缓存不存在或损坏时得到空缓存
    pub fn load(dir: CacheDir) -> Self {
        let (processed, entries): FeatureCacheFile = load_cache(&dir.image_cache());
        debug!("特征缓存中已处理的文件: {}", processed.len());
        Self { dir, processed: processed.into_iter().collect(), entries }
    }

    pub fn dir(&self) -> &CacheDir {
        &self.dir
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    /// 缓存文件大小，单位字节，文件不存在时为 0
    pub fn file_size(&self) -> u64 {
        fs::metadata(self.dir.image_cache()).map(|m| m.len()).unwrap_or(0)
    }

    /// 清理失效条目，再为目录中新出现的图片计算特征
    ///
    /// 只有新增了条目才会写回缓存文件，返回新增的条目数量
    pub fn refresh(
        &mut self,
        orb: &mut ORBDetector,
        filter: &ImageFilter,
        keep_normalized: bool,
        pb: &ProgressBar,
    ) -> Result<usize> {
        let pruned = self.rebuild(filter);
        if pruned > 0 {
            debug!("清理了 {} 条失效的特征缓存", pruned);
        }

        let files = list_images(self.dir.root(), filter)?;
        let new_files = files.into_iter().filter(|name| !self.contains(name)).collect::<Vec<_>>();

        pb.set_length(new_files.len() as u64);
        pb.set_position(0);

        let mut added = 0;
        for name in new_files {
            pb.set_message(name.clone());
            match self.extract(orb, &name, keep_normalized) {
                Ok(entry) => {
                    debug!("添加特征缓存: {}", name);
                    self.processed.insert(name);
                    self.entries.push(entry);
                    added += 1;
                }
                Err(e) => warn!("跳过图片 {}: {:#}", name, e),
            }
            pb.inc(1);
        }

        if added > 0 {
            info!("写入新的特征缓存（{} 张图片）", self.entries.len());
            self.save()?;
        }
        Ok(added)
    }

    /// 将全部条目写入缓存文件
    pub fn save(&self) -> Result<()> {
        let processed = self.entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
        let file: (&Vec<String>, &Vec<CacheEntry>) = (&processed, &self.entries);
        store_cache(&self.dir.image_cache(), &file)
    }

    /// 删除原图已不存在、位于缓存目录内或不再被筛选规则接受的条目，
    /// 同时保证每个文件名只保留第一条。
    ///
    /// 提取特征时读取的文件（例如缩放副本）被删除后，条目同样失效，会被重新计算。
    /// 返回删除的数量
    fn rebuild(&mut self, filter: &ImageFilter) -> usize {
        let before = self.entries.len();
        let mut seen = HashSet::new();
        let mut stale = vec![];

        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .filter(|entry| {
                let source_exists = self.dir.source(&entry.name).is_file();
                let keep = filter.accepts(&entry.name)
                    && source_exists
                    && entry.path.is_file()
                    && seen.insert(entry.name.clone());
                if !keep && !source_exists {
                    stale.push(entry.name.clone());
                }
                keep
            })
            .collect();
        self.processed = seen;

        for name in stale {
            let normalized = self.dir.normalized(&name);
            if normalized.is_file() {
                match fs::remove_file(&normalized) {
                    Ok(()) => debug!("删除缩放副本: {}", normalized.display()),
                    Err(e) => warn!("无法删除缩放副本 {}: {}", normalized.display(), e),
                }
            }
        }

        before - self.entries.len()
    }

    /// 为单张图片计算特征
    ///
    /// 非标准尺寸的图片会先缩放，`keep_normalized` 时缩放结果保存到缓存目录，
    /// 之后重新计算时直接使用该副本
    fn extract(
        &self,
        orb: &mut ORBDetector,
        name: &str,
        keep_normalized: bool,
    ) -> Result<CacheEntry> {
        let source = self.dir.source(name);
        let normalized = self.dir.normalized(name);

        let (image, path) = if keep_normalized && is_fresh_copy(&normalized, &source) {
            debug!("使用已缩放的副本: {}", normalized.display());
            (imread(&normalized)?, normalized)
        } else {
            let (image, resized) = normalize(imread(&source)?)?;
            if resized && keep_normalized {
                match save_normalized(&image, &self.dir, name) {
                    Ok(()) => (image, normalized),
                    Err(e) => {
                        warn!("无法保存缩放副本 {}: {:#}", normalized.display(), e);
                        (image, source)
                    }
                }
            } else {
                (image, source)
            }
        };

        let canonical = CanonicalImage::from_mat(image)?;
        let descriptors = orb.detect_image(&canonical)?;
        if descriptors.is_empty() {
            bail!("未检测到特征点");
        }
        Ok(CacheEntry { name: name.to_string(), path, descriptors })
    }
}

/// 缩放副本存在且不比原图旧
fn is_fresh_copy(copy: &std::path::Path, source: &std::path::Path) -> bool {
    let modified = |p: &std::path::Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(copy), modified(source)) {
        (Some(c), Some(s)) => c >= s,
        _ => false,
    }
}

fn save_normalized(image: &Mat, dir: &CacheDir, name: &str) -> Result<()> {
    fs::create_dir_all(dir.folder())
        .with_context(|| format!("无法创建缓存目录 {}", dir.folder().display()))?;
    imwrite(dir.normalized(name), image)
}
