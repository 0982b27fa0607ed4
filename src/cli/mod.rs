mod clean;
mod find;
mod r#match;

pub use clean::*;
pub use find::*;
pub use r#match::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}
