use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use chrono::Local;
use indicatif::ProgressStyle;
use ndarray::Array4;
use opencv::core::{self, Mat, MatTraitConst, Size, Vec3b, Vector};
use opencv::{imgcodecs, imgproc};
use regex::Regex;
use walkdir::WalkDir;

/// 读取彩色图片，无法解码时返回错误
pub fn imread(path: &Path) -> Result<Mat> {
    let img = imgcodecs::imread(path.to_string_lossy().as_ref(), imgcodecs::IMREAD_COLOR)
        .with_context(|| format!("读取图片失败: {}", path.display()))?;
    ensure!(!img.empty(), "无法解码图片: {}", path.display());
    Ok(img)
}

/// 从内存中的图片数据解码
pub fn imdecode(bytes: &[u8]) -> Result<Mat> {
    let buf = Mat::from_slice(bytes)?;
    let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)?;
    ensure!(!img.empty(), "无法解码图片数据");
    Ok(img)
}

pub fn imwrite(path: &Path, img: &Mat) -> Result<()> {
    let flags = Vector::<i32>::new();
    let ok = imgcodecs::imwrite(path.to_string_lossy().as_ref(), img, &flags)?;
    ensure!(ok, "写入图片失败: {}", path.display());
    Ok(())
}

/// 扫描目录下符合后缀的图片，不递归，按文件名排序保证枚举顺序稳定
pub fn list_images(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let re = Regex::new(&format!("(?i)^({})$", suffix.replace(',', "|")))
        .with_context(|| format!("无效的后缀列表: {}", suffix))?;
    let mut paths = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension().map(|s| re.is_match(&s.to_string_lossy())) == Some(true)
        })
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

/// 以运行时间戳命名的结果子目录，在第一次产出前才创建
pub fn run_folder(results_dir: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let folder = results_dir.join(stamp);
    fs::create_dir_all(&folder)
        .with_context(|| format!("创建结果目录失败: {}", folder.display()))?;
    Ok(folder)
}

/// 按字符截断文件名，用于面板标题
pub fn truncate_name(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{wide_bar} {pos}/{len} {msg}")
        .expect("failed to build progress style")
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 缩放到 size x size 并做 ImageNet 归一化，输出 NCHW 的 RGB 张量
pub fn imagenet_tensor(image: &Mat, size: i32) -> Result<Array4<f32>> {
    ensure!(image.typ() == core::CV_8UC3, "只支持 8 位三通道图片");
    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        Size::new(size, size),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;

    let size = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let px = resized.at_2d::<Vec3b>(y as i32, x as i32)?;
            for c in 0..3 {
                // OpenCV 为 BGR 存储，张量按 RGB 排列
                let v = px[2 - c] as f32 / 255.0;
                tensor[[0, c, y, x]] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
    }
    Ok(tensor)
}
