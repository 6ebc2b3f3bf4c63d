use std::fs;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::{info, warn};

use crate::cli::{SubCommandExtend, print_result};
use crate::config::{DirOptions, HistogramOptions, Opts, RankOptions};
use crate::features::{FeatureExtractor, HistogramExtractor};
use crate::render;
use crate::similarity::{Match, correlation, rank_matches};
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct HistogramCommand {
    #[command(flatten)]
    pub dirs: DirOptions,
    #[command(flatten)]
    pub hist: HistogramOptions,
    #[command(flatten)]
    pub rank: RankOptions,
}

impl SubCommandExtend for HistogramCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        for dir in [&self.dirs.database_dir, &self.dirs.target_dir, &self.hist.results_dir] {
            fs::create_dir_all(dir)?;
        }

        let targets = utils::list_images(&self.dirs.target_dir, &self.dirs.suffix)?;
        if targets.is_empty() {
            info!("目标目录为空，本次无事可做: {}", self.dirs.target_dir.display());
            return Ok(());
        }

        let mut extractor = HistogramExtractor::new(self.hist.bins);
        let gallery = gallery_features(&mut extractor, &self.dirs)?;
        if gallery.is_empty() {
            warn!("数据库目录中没有可用图片: {}", self.dirs.database_dir.display());
        }

        let run_folder = utils::run_folder(&self.hist.results_dir)?;
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
                .map(|(path, feature)| {
                    let similarity = correlation(&query, feature);
                    Match::new(
                        path.clone(),
                        similarity,
                        Some(similarity >= self.hist.match_threshold),
                    )
                })
                .collect();
            let top = rank_matches(matches, self.rank.top_k as usize);
            if top.is_empty() {
                warn!("{name} 没有可比较的图片");
                continue;
            }

            info!("{name} 的前 {} 个匹配:", top.len());
            print_result(&top, self.rank.output_format)?;
            let rendered = render::render_matches(&name, &top, &run_folder)?;
            info!("结果已保存: {}", rendered.display());
        }
        Ok(())
    }
}

/// 图库特征：解码失败的图片直接跳过，不参与排序
pub(crate) fn gallery_features(
    extractor: &mut dyn FeatureExtractor,
    dirs: &DirOptions,
) -> Result<Vec<(std::path::PathBuf, ndarray::Array1<f32>)>> {
    let paths = utils::list_images(&dirs.database_dir, &dirs.suffix)?;
    let pb = ProgressBar::new(paths.len() as u64).with_style(utils::pb_style());

    let mut features = Vec::with_capacity(paths.len());
    for path in paths {
        pb.inc(1);
        match utils::imread(&path).and_then(|img| extractor.extract(&img)) {
            Ok(feature) => features.push((path, feature)),
            Err(e) => warn!("跳过无法处理的图片 {}: {e}", path.display()),
        }
    }
    pb.finish_and_clear();

    debug_assert!(
        features.iter().all(|(_, f)| f.len() == extractor.dim()),
        "特征维度不一致"
    );
    Ok(features)
}
