pub mod cache;
pub mod cli;
pub mod config;
pub mod hamming;
pub mod imgdups;
pub mod matcher;
pub mod orb;
pub mod utils;

pub use config::Opts;
pub use imgdups::{ImgDups, ImgDupsBuilder};
