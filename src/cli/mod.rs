mod embedding;
mod histogram;
mod scrape;

pub use embedding::*;
pub use histogram::*;
pub use scrape::*;

use anyhow::Result;

use crate::config::{Opts, OutputFormat};
use crate::similarity::Match;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> Result<()>;
}

pub(crate) fn print_result(result: &[Match], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for m in result {
                println!("{:.4}\t{}", m.similarity, m.path.display());
            }
        }
    }
    Ok(())
}
