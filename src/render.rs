use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use log::warn;
use opencv::core::{self, Mat, Point, Scalar, Size, Vector};
use opencv::{imgcodecs, imgproc};

use crate::similarity::Match;
use crate::utils;

/// 候选图片统一缩放的边长
const TILE: i32 = 224;
/// 面板顶部的标题区高度
const HEADER: i32 = 48;
/// 面板间的留白
const MARGIN: i32 = 4;
/// 标题中文件名的最大字符数
const NAME_CHARS: usize = 15;

const JPEG_QUALITY: i32 = 90;

/// 把一个目标的 top-K 匹配渲染成一行面板，
/// 每个面板带 "{名次}. Similarity: {分数}" 和截断后的文件名，
/// 输出 `similar_images_{目标文件名}.jpg`
pub fn render_matches(target_name: &str, matches: &[Match], run_folder: &Path) -> Result<PathBuf> {
    let mut panels = Vector::<Mat>::new();
    for (i, m) in matches.iter().enumerate() {
        // 渲染阶段单张图片解码失败只跳过该面板
        let image = match utils::imread(&m.path) {
            Ok(image) => image,
            Err(e) => {
                warn!("渲染时跳过 {}: {e}", m.path.display());
                continue;
            }
        };

        let mut tile = Mat::default();
        imgproc::resize(&image, &mut tile, Size::new(TILE, TILE), 0.0, 0.0, imgproc::INTER_AREA)?;

        let mut panel = Mat::default();
        core::copy_make_border(
            &tile,
            &mut panel,
            HEADER,
            MARGIN,
            MARGIN,
            MARGIN,
            core::BORDER_CONSTANT,
            Scalar::all(255.0),
        )?;

        let title = format!("{}. Similarity: {:.4}", i + 1, m.similarity);
        let name = utils::truncate_name(&m.name, NAME_CHARS);
        for (line, text) in [(0, title.as_str()), (1, name.as_str())] {
            imgproc::put_text(
                &mut panel,
                text,
                Point::new(MARGIN + 2, 18 + line * 20),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.45,
                Scalar::all(0.0),
                1,
                imgproc::LINE_AA,
                false,
            )?;
        }
        panels.push(panel);
    }
    ensure!(!panels.is_empty(), "没有可渲染的匹配结果: {}", target_name);

    let mut grid = Mat::default();
    core::hconcat(&panels, &mut grid)?;

    let path = run_folder.join(format!("similar_images_{target_name}.jpg"));
    let flags = Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, JPEG_QUALITY]);
    let ok = imgcodecs::imwrite(path.to_string_lossy().as_ref(), &grid, &flags)?;
    ensure!(ok, "写入对比图失败: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use opencv::core::{CV_8UC3, MatTraitConst};

    use super::*;

    fn write_solid(path: &Path, b: f64, g: f64, r: f64) -> Result<()> {
        let img =
            Mat::new_rows_cols_with_default(32, 32, CV_8UC3, Scalar::new(b, g, r, 0.0))?;
        utils::imwrite(path, &img)
    }

    #[test]
    fn renders_one_row_of_panels() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let red = dir.path().join("red.png");
        let blue = dir.path().join("blue.png");
        write_solid(&red, 0.0, 0.0, 255.0)?;
        write_solid(&blue, 255.0, 0.0, 0.0)?;

        let matches = vec![
            Match::new(red, 0.9876, Some(true)),
            Match::new(blue, 0.1234, Some(false)),
        ];
        let out = render_matches("query.png", &matches, dir.path())?;
        assert_eq!(out.file_name().unwrap(), "similar_images_query.png.jpg");

        let grid = utils::imread(&out)?;
        assert_eq!(grid.rows(), TILE + HEADER + MARGIN);
        assert_eq!(grid.cols(), 2 * (TILE + 2 * MARGIN));
        Ok(())
    }

    #[test]
    fn missing_candidate_is_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let red = dir.path().join("red.png");
        write_solid(&red, 0.0, 0.0, 255.0)?;

        let matches = vec![
            Match::new(dir.path().join("gone.png"), 0.5, None),
            Match::new(red, 0.4, None),
        ];
        let out = render_matches("q.jpg", &matches, dir.path())?;
        let grid = utils::imread(&out)?;
        assert_eq!(grid.cols(), TILE + 2 * MARGIN);
        Ok(())
    }

    #[test]
    fn all_candidates_missing_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let matches = vec![Match::new(dir.path().join("gone.png"), 0.5, None)];
        assert!(render_matches("q.jpg", &matches, dir.path()).is_err());
        Ok(())
    }
}
