use std::fs;

use anyhow::{Result, bail};
use clap::Parser;
use log::{info, warn};

use crate::cli::histogram::gallery_features;
use crate::cli::{SubCommandExtend, print_result};
use crate::config::{DirOptions, EmbeddingOptions, Opts, RankOptions};
use crate::features::{EmbeddingExtractor, FeatureExtractor};
use crate::render;
use crate::similarity::{Match, cosine, rank_matches};
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct EmbeddingCommand {
    #[command(flatten)]
    pub dirs: DirOptions,
    #[command(flatten)]
    pub embed: EmbeddingOptions,
    #[command(flatten)]
    pub rank: RankOptions,
}

impl SubCommandExtend for EmbeddingCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        for dir in [&self.dirs.database_dir, &self.dirs.target_dir, &self.embed.results_dir] {
            fs::create_dir_all(dir)?;
        }

        let targets = utils::list_images(&self.dirs.target_dir, &self.dirs.suffix)?;
        if targets.is_empty() {
            info!("目标目录为空，本次无事可做: {}", self.dirs.target_dir.display());
            return Ok(());
        }

        // 直方图管线对空图库只是告警，这里没有图库属于硬错误
        let gallery_paths = utils::list_images(&self.dirs.database_dir, &self.dirs.suffix)?;
        if gallery_paths.is_empty() {
            bail!("数据库目录中没有图片: {}", self.dirs.database_dir.display());
        }

        let mut extractor = EmbeddingExtractor::load(&self.embed)?;
        let gallery = gallery_features(&mut extractor, &self.dirs)?;
        if gallery.is_empty() {
            bail!("数据库目录中没有能提取特征的图片: {}", self.dirs.database_dir.display());
        }

        let run_folder = utils::run_folder(&self.embed.results_dir)?;
        for target in &targets {
            let query = match utils::imread(target).and_then(|img| extractor.extract(&img)) {
                Ok(feature) => feature,
                Err(e) => {
                    warn!("跳过无法处理的目标 {}: {e}", target.display());
                    continue;
                }
            };
            let name = target.file_name().unwrap_or_default().to_string_lossy();

            let matches = gallery
                .iter()
                .map(|(path, feature)| Match::new(path.clone(), cosine(&query, feature), None))
                .collect();
            let top = rank_matches(matches, self.rank.top_k as usize);

            info!("{name} 的前 {} 个匹配:", top.len());
            print_result(&top, self.rank.output_format)?;
            let rendered = render::render_matches(&name, &top, &run_folder)?;
            info!("结果已保存: {}", rendered.display());
        }
        Ok(())
    }
}
