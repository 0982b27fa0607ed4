use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::orb::Descriptors;

/// 目标图片的特征缓存记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 原图文件名，作为缓存的键
    pub name: String,
    /// 提取特征时实际读取的文件，可能是缓存目录中缩放后的副本
    pub path: PathBuf,
    /// ORB 描述符
    pub descriptors: Descriptors,
}

/// 已检查过的搜索图片及其大小
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRecord {
    /// 图片路径
    pub path: PathBuf,
    /// 检查时的文件大小，单位字节
    pub size: u64,
}

/// 目标目录特征缓存文件的内容：(已处理文件名, 特征记录)
pub type FeatureCacheFile = (Vec<String>, Vec<CacheEntry>);

/// 搜索目录缓存文件的内容：(已处理文件名, 大小记录)
pub type SearchCacheFile = (Vec<String>, Vec<SizeRecord>);
