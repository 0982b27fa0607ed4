use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{CacheDir, Opts};

#[derive(Parser, Debug, Clone)]
pub struct CleanCommand {
    /// 需要清理缓存的图片目录
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}

impl SubCommandExtend for CleanCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        for path in &self.paths {
            let folder = CacheDir::new(path).folder();
            if !folder.is_dir() {
                info!("没有缓存: {}", path.display());
                continue;
            }
            fs::remove_dir_all(&folder)
                .with_context(|| format!("无法删除缓存目录 {}", folder.display()))?;
            info!("已删除 {}", folder.display());
        }
        Ok(())
    }
}
