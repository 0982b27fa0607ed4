use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressStyle;
use regex::Regex;
use walkdir::WalkDir;

use crate::config::{CACHE_FOLDER, DEFAULT_EXCLUDE, DEFAULT_SUFFIX};

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress template")
        .progress_chars("#>-")
}

/// 根据后缀名和排除规则筛选图片文件名
#[derive(Debug, Clone)]
pub struct ImageFilter {
    suffix: Regex,
    exclude: Vec<String>,
}

impl ImageFilter {
    /// `suffix` 为逗号分隔的后缀名列表，不区分大小写，`exclude` 中的空字符串会被忽略
    pub fn new(suffix: &str, exclude: &[String]) -> Result<Self> {
        let alternatives = suffix
            .split(',')
            .map(|s| regex::escape(s.trim().trim_start_matches('.')))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        let suffix = Regex::new(&format!("(?i)^({})$", alternatives))
            .with_context(|| format!("无效的后缀名列表: {}", suffix))?;
        let exclude = exclude.iter().filter(|p| !p.is_empty()).cloned().collect();
        Ok(Self { suffix, exclude })
    }

    pub fn accepts(&self, name: &str) -> bool {
        if name.contains(CACHE_FOLDER) || self.exclude.iter().any(|p| name.contains(p.as_str())) {
            return false;
        }
        Path::new(name)
            .extension()
            .map(|ext| self.suffix.is_match(&ext.to_string_lossy()))
            .unwrap_or(false)
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX, &[DEFAULT_EXCLUDE.to_string()]).expect("default suffix is valid")
    }
}

/// 列出目录下（不递归）所有符合条件的普通文件名，按文件名排序
pub fn list_images(dir: impl AsRef<Path>, filter: &ImageFilter) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let mut names = vec![];
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("无法读取目录 {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if filter.accepts(&name) {
            names.push(name.into_owned());
        }
    }
    Ok(names)
}

/// 返回文件大小，文件不存在或无法访问时返回 None
pub fn file_size(path: impl AsRef<Path>) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}
