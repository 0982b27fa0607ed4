use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::debug;

use crate::cli::SubCommandExtend;
use crate::config::{MatchThreshold, Opts, OrbOptions};
use crate::hamming::cross_check_count;
use crate::orb::ORBDetector;

#[derive(Parser, Debug, Clone)]
pub struct MatchCommand {
    #[command(flatten)]
    pub orb: OrbOptions,
    /// 图片1
    pub image1: PathBuf,
    /// 图片2
    pub image2: PathBuf,
    /// 判定为重复所需的最小匹配数（不含）
    #[arg(short = 'm', long = "match", value_name = "INT", allow_hyphen_values = true, default_value_t = MatchThreshold::default())]
    pub threshold: MatchThreshold,
}

impl SubCommandExtend for MatchCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let mut orb = ORBDetector::create(self.orb.clone())?;
        let des1 = orb.detect_file(&self.image1)?;
        let des2 = orb.detect_file(&self.image2)?;
        debug!("特征点数量: {} / {}", des1.len(), des2.len());

        let score = cross_check_count(des1.as_slice(), des2.as_slice());
        let op = if score > self.threshold.get() { "==" } else { "!=" };
        println!("{} {} {} (score: {})", self.image1.display(), op, self.image2.display(), score);
        Ok(())
    }
}
