use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{MattingOptions, Opts, ScrapeOptions};
use crate::scrape;
use crate::scrape::{BackgroundRemover, HttpCatalog, MattingSink};

#[derive(Parser, Debug, Clone)]
pub struct ScrapeCommand {
    #[command(flatten)]
    pub scrape: ScrapeOptions,
    #[command(flatten)]
    pub matting: MattingOptions,
}

impl SubCommandExtend for ScrapeCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let remover = BackgroundRemover::load(&self.matting)?;
        let mut sink = MattingSink::new(remover);
        let mut catalog = HttpCatalog::new(&self.scrape)?;

        let stats = scrape::run(
            &mut catalog,
            &mut sink,
            &self.scrape.output_dir,
            self.scrape.max_pages as usize,
        )?;
        info!(
            "抓取完成: 访问 {} 页，保存 {}，跳过 {}，会话重置 {} 次",
            stats.pages, stats.saved, stats.skipped, stats.resets
        );
        Ok(())
    }
}
