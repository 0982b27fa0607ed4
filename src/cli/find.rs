use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;

use crate::ImgDupsBuilder;
use crate::cli::SubCommandExtend;
use crate::config::{FindOptions, MatchThreshold, Opts, OrbOptions, OutputFormat};
use crate::imgdups::Duplicate;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct FindCommand {
    #[command(flatten)]
    pub orb: OrbOptions,
    #[command(flatten)]
    pub find: FindOptions,
    /// 待检查的图片目录
    #[arg(short, long, value_name = "PATH")]
    pub search: PathBuf,
    /// 作为参照的图片目录
    #[arg(short, long, value_name = "PATH")]
    pub target: PathBuf,
    /// 判定为重复所需的最小匹配数（不含），范围 0 到 500，非法值使用默认值
    #[arg(short = 'm', long = "match", value_name = "INT", allow_hyphen_values = true, default_value_t = MatchThreshold::default())]
    pub threshold: MatchThreshold,
}

impl SubCommandExtend for FindCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let mut dups = ImgDupsBuilder::new(&self.search, &self.target)
            .threshold(self.threshold)
            .orb(self.orb.clone())
            .options(self.find.clone())
            .open()?;

        let pb = ProgressBar::no_length().with_style(pb_style());
        let report = dups.find_duplicates(&pb)?;
        pb.finish_and_clear();

        print_result(&report.duplicates, self.find.output_format)
    }
}

fn print_result(result: &[Duplicate], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for dup in result {
                println!("{}\t{}\t{}\t{}", dup.score, dup.search, dup.target, dup.size);
            }
        }
    }
    Ok(())
}
