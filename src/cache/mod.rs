use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod feature;
pub mod model;
pub mod search;

pub use feature::*;
pub use model::*;
pub use search::*;

/// 读取 bincode 格式的缓存文件
///
/// 文件不存在时返回默认值；文件为空、被截断或无法解析时删除该文件并返回默认值
pub fn load_cache<T: DeserializeOwned + Default>(path: &Path) -> T {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("无法读取缓存文件 {}: {}", path.display(), e);
            return T::default();
        }
    };

    match bincode::deserialize(&data) {
        Ok(value) => {
            debug!("读取缓存文件 {} ({} 字节)", path.display(), data.len());
            value
        }
        Err(e) => {
            warn!("缓存文件 {} 已损坏 ({}), 重置", path.display(), e);
            if let Err(e) = fs::remove_file(path) {
                warn!("无法删除损坏的缓存文件 {}: {}", path.display(), e);
            }
            T::default()
        }
    }
}

/// 写入缓存文件，先写到临时文件再重命名
pub fn store_cache<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("无法创建缓存目录 {}", parent.display()))?;
    }
    let data = bincode::serialize(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, &data).with_context(|| format!("无法写入缓存文件 {:?}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("无法替换缓存文件 {}", path.display()))?;
    debug!("写入缓存文件 {} ({} 字节)", path.display(), data.len());
    Ok(())
}
