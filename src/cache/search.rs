use std::fs;

use anyhow::{Context, Result};
use log::debug;

use super::model::{SearchCacheFile, SizeRecord};
use super::{load_cache, store_cache};
use crate::config::CacheDir;

/// 搜索目录中已经与目标目录比较过的图片
///
/// 记录以 (路径, 文件大小) 为键，文件大小变化后记录失效，图片会被重新比较
pub struct SearchCache {
    dir: CacheDir,
    processed: Vec<String>,
    records: Vec<SizeRecord>,
}

impl SearchCache {
    /// 读取已有记录，并丢弃文件已经不存在的记录
    pub fn load(dir: CacheDir) -> Self {
        let (processed, records): SearchCacheFile = load_cache(&dir.search_cache());
        let mut cache = Self { dir, processed, records };
        cache.prune_missing();
        cache
    }

    /// 不读取旧记录，运行结束时会覆盖旧的缓存文件
    pub fn empty(dir: CacheDir) -> Self {
        Self { dir, processed: vec![], records: vec![] }
    }

    pub fn processed(&self) -> &[String] {
        &self.processed
    }

    pub fn records(&self) -> &[SizeRecord] {
        &self.records
    }

    /// 判断图片自上次比较后是否没有变化
    ///
    /// 返回 false 时会把图片登记为本次已处理，调用方需要接着进行比较
    pub fn is_unchanged(&mut self, name: &str) -> Result<bool> {
        let path = self.dir.source(name);
        let size = fs::metadata(&path)
            .with_context(|| format!("无法读取文件信息 {}", path.display()))?
            .len();

        // 同路径但大小不同的记录说明文件被修改过
        let before = self.records.len();
        self.records = std::mem::take(&mut self.records)
            .into_iter()
            .filter(|r| r.path != path || r.size == size)
            .collect();
        if self.records.len() != before {
            debug!("{} 的大小发生了变化，需要重新比较", name);
        }

        let known = self.records.iter().any(|r| r.path == path);
        let processed = self.processed.iter().any(|n| n == name);
        if known && processed {
            return Ok(true);
        }

        if !processed {
            self.processed.push(name.to_string());
        }
        if !known {
            self.records.push(SizeRecord { path, size });
        }
        Ok(false)
    }

    /// 用当前记录整体替换缓存文件
    pub fn save(&self) -> Result<()> {
        let file: (&Vec<String>, &Vec<SizeRecord>) = (&self.processed, &self.records);
        store_cache(&self.dir.search_cache(), &file)
    }

    fn prune_missing(&mut self) {
        let dir = &self.dir;
        self.processed = std::mem::take(&mut self.processed)
            .into_iter()
            .filter(|name| dir.source(name).is_file())
            .collect();
        self.records =
            std::mem::take(&mut self.records).into_iter().filter(|r| r.path.is_file()).collect();
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_unchanged_after_save() -> Result<()> {
        let tmp = tempdir()?;
        let dir = CacheDir::new(tmp.path());
        fs::write(dir.source("a.jpg"), b"abc")?;

        let mut cache = SearchCache::load(dir.clone());
        assert!(!cache.is_unchanged("a.jpg")?);
        // 同一次运行中再次查询视为已处理
        assert!(cache.is_unchanged("a.jpg")?);
        cache.save()?;

        let mut cache = SearchCache::load(dir.clone());
        assert!(cache.is_unchanged("a.jpg")?);
        assert_eq!(cache.records().len(), 1);
        Ok(())
    }

    #[test]
    fn test_size_change_forces_rescan() -> Result<()> {
        let tmp = tempdir()?;
        let dir = CacheDir::new(tmp.path());
        fs::write(dir.source("a.jpg"), b"abc")?;

        let mut cache = SearchCache::load(dir.clone());
        assert!(!cache.is_unchanged("a.jpg")?);
        cache.save()?;

        fs::write(dir.source("a.jpg"), b"abcdef")?;
        let mut cache = SearchCache::load(dir.clone());
        assert!(!cache.is_unchanged("a.jpg")?);
        assert_eq!(cache.records(), &[SizeRecord { path: dir.source("a.jpg"), size: 6 }]);
        assert_eq!(cache.processed(), &["a.jpg".to_string()]);
        Ok(())
    }

    #[test]
    fn test_missing_files_are_pruned_on_load() -> Result<()> {
        let tmp = tempdir()?;
        let dir = CacheDir::new(tmp.path());
        fs::write(dir.source("a.jpg"), b"abc")?;
        fs::write(dir.source("b.jpg"), b"abc")?;

        let mut cache = SearchCache::load(dir.clone());
        cache.is_unchanged("a.jpg")?;
        cache.is_unchanged("b.jpg")?;
        cache.save()?;

        fs::remove_file(dir.source("b.jpg"))?;
        let cache = SearchCache::load(dir.clone());
        assert_eq!(cache.processed(), &["a.jpg".to_string()]);
        assert_eq!(cache.records().len(), 1);
        Ok(())
    }

    #[test]
    fn test_empty_ignores_previous_run() -> Result<()> {
        let tmp = tempdir()?;
        let dir = CacheDir::new(tmp.path());
        fs::write(dir.source("a.jpg"), b"abc")?;

        let mut cache = SearchCache::load(dir.clone());
        cache.is_unchanged("a.jpg")?;
        cache.save()?;

        let mut cache = SearchCache::empty(dir);
        assert!(!cache.is_unchanged("a.jpg")?);
        Ok(())
    }
}
