use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::*;

/// 缓存专用目录名，位于搜索目录和目标目录之下
pub const CACHE_FOLDER: &str = "imgdups";

/// 默认接受的图片后缀
pub const DEFAULT_SUFFIX: &str = "jpg,jpeg,png,bmp";

/// 默认跳过的文件名，缩略图
pub const DEFAULT_EXCLUDE: &str = "thumb";

#[derive(Parser, Debug, Clone)]
pub struct OrbOptions {
    /// ORB 特征点最大保留数量
    #[arg(long, value_name = "N", default_value_t = 500)]
    pub orb_nfeatures: u32,
    /// ORB 特征金字塔缩放因子
    #[arg(long, value_name = "SCALE", default_value_t = 1.2)]
    pub orb_scale_factor: f32,
    /// ORB 特征金字塔层数
    #[arg(long, value_name = "N", default_value_t = 8)]
    pub orb_nlevels: u32,
    /// ORB FAST 角点检测器阈值
    #[arg(long, value_name = "THRESHOLD", default_value_t = 20)]
    pub orb_fast_threshold: u8,
}

impl Default for OrbOptions {
    fn default() -> Self {
        Self { orb_nfeatures: 500, orb_scale_factor: 1.2, orb_nlevels: 8, orb_fast_threshold: 20 }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct FindOptions {
    /// 扫描的文件后缀名，多个后缀用逗号分隔，不区分大小写
    #[arg(long, default_value = DEFAULT_SUFFIX)]
    pub suffix: String,
    /// 文件名包含该字符串时跳过，可以多次指定。默认跳过缩略图，传入 `-e ""` 则不跳过任何文件
    #[arg(short, long, value_name = "PATTERN", default_value = DEFAULT_EXCLUDE)]
    pub exclude: Vec<String>,
    /// 将缩放后的目标图片保存到缓存目录，避免重复缩放
    #[arg(long)]
    pub keep_normalized: bool,
    /// 忽略搜索缓存，重新比较所有图片
    #[arg(long)]
    pub rescan: bool,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            exclude: vec![DEFAULT_EXCLUDE.to_string()],
            keep_normalized: false,
            rescan: false,
            output_format: OutputFormat::Table,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imgdups", version, about = "在两个目录之间查找视觉上重复的图片")]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 在目标目录中查找搜索目录里图片的重复项
    Find(FindCommand),
    /// 计算两张图片的匹配分数
    Match(MatchCommand),
    /// 删除目录下的缓存文件夹
    Clean(CleanCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

/// 判定为重复所需的最小匹配数（不含），取值范围 0..=500
///
/// 解析时不会失败，任何非法输入都会回退到默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchThreshold(u32);

impl MatchThreshold {
    pub const DEFAULT: u32 = 320;
    pub const MAX: u32 = 500;

    /// 超出范围的值会被替换为默认值
    pub fn new(value: u32) -> Self {
        if value <= Self::MAX { Self(value) } else { Self::default() }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MatchThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl FromStr for MatchThreshold {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.trim().parse::<u32>().map(Self::new).unwrap_or_default())
    }
}

impl fmt::Display for MatchThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 某个图片目录下的缓存布局
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 被缓存的图片目录
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// 返回缓存文件夹路径
    pub fn folder(&self) -> PathBuf {
        self.root.join(CACHE_FOLDER)
    }

    /// 返回目标目录特征缓存的路径
    pub fn image_cache(&self) -> PathBuf {
        self.folder().join("image_cache.bin")
    }

    /// 返回搜索目录已检查记录的路径
    pub fn search_cache(&self) -> PathBuf {
        self.folder().join("dup_cache.bin")
    }

    /// 返回缩放后图片的保存路径，与原图同名
    pub fn normalized(&self, name: &str) -> PathBuf {
        self.folder().join(name)
    }

    /// 返回原图路径
    pub fn source(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}
