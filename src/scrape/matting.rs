use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use opencv::core::{self, Mat, MatTrait, MatTraitConst, Point, Scalar, Size, Vector};
use opencv::imgproc;
use ort::session::Session;
use ort::value::TensorRef;

use crate::config::MattingOptions;
use crate::utils;

/// 图片数据的落盘出口，抓取驱动只关心字节进、文件出
pub trait ImageSink {
    fn save(&mut self, bytes: &[u8], dest: &Path) -> Result<()>;
}

/// 预训练分割模型 + alpha matting 后处理的背景去除
pub struct BackgroundRemover {
    session: Session,
    input_name: String,
    opts: MattingOptions,
}

impl BackgroundRemover {
    pub fn load(opts: &MattingOptions) -> Result<Self> {
        let session = Session::builder()?
            .commit_from_file(&opts.model)
            .with_context(|| format!("加载分割模型失败: {}", opts.model.display()))?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("模型没有输入张量"))?;
        Ok(Self { session, input_name, opts: opts.clone() })
    }

    /// 输入 BGR 图片，输出带 alpha 通道的 BGRA 图片
    pub fn remove(&mut self, image: &Mat) -> Result<Mat> {
        let size = self.opts.mask_size;
        let input = utils::imagenet_tensor(image, size)?;
        let tensor = TensorRef::from_array_view(&input)?;
        let outputs = self.session.run(ort::inputs![self.input_name.as_str() => tensor])?;

        let (_, value) = outputs.iter().next().ok_or_else(|| anyhow!("模型没有输出张量"))?;
        let (shape, data) = value.try_extract_tensor::<f32>()?;
        let expected = (size * size) as usize;
        ensure!(data.len() == expected, "分割输出尺寸不符: {:?}", shape);

        // 模型输出 logits，过 sigmoid 得到前景概率
        let mask: Vec<u8> = data.iter().map(|&v| (sigmoid(v) * 255.0).round() as u8).collect();
        let mask = Mat::new_rows_cols_with_data(size, size, &mask)?.try_clone()?;

        let mut resized = Mat::default();
        imgproc::resize(&mask, &mut resized, image.size()?, 0.0, 0.0, imgproc::INTER_LINEAR)?;
        let alpha = alpha_matte(&resized, &self.opts)?;

        let mut channels = Vector::<Mat>::new();
        core::split(image, &mut channels)?;
        channels.push(alpha);
        let mut output = Mat::default();
        core::merge(&channels, &mut output)?;
        Ok(output)
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// alpha matting：高于前景阈值并腐蚀后的区域完全不透明，
/// 低于背景阈值的区域完全透明，中间地带保留柔和的掩码值
fn alpha_matte(mask: &Mat, opts: &MattingOptions) -> Result<Mat> {
    let mut foreground = Mat::default();
    imgproc::threshold(
        mask,
        &mut foreground,
        opts.foreground_threshold as f64 - 1.0,
        255.0,
        imgproc::THRESH_BINARY,
    )?;

    let mut certain = Mat::default();
    if opts.erode_size > 0 {
        let k = opts.erode_size * 2 + 1;
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(k, k),
            Point::new(-1, -1),
        )?;
        imgproc::erode(
            &foreground,
            &mut certain,
            &kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
    } else {
        certain = foreground;
    }

    let mut keep = Mat::default();
    imgproc::threshold(
        mask,
        &mut keep,
        opts.background_threshold as f64,
        255.0,
        imgproc::THRESH_BINARY,
    )?;

    let mut alpha = Mat::default();
    core::bitwise_and(mask, &keep, &mut alpha, &core::no_array())?;
    alpha.set_to(&Scalar::all(255.0), &certain)?;
    Ok(alpha)
}

/// 把下载的图片字节解码、去背景、按 PNG 写出
pub struct MattingSink {
    remover: BackgroundRemover,
}

impl MattingSink {
    pub fn new(remover: BackgroundRemover) -> Self {
        Self { remover }
    }
}

impl ImageSink for MattingSink {
    fn save(&mut self, bytes: &[u8], dest: &Path) -> Result<()> {
        let image = utils::imdecode(bytes)?;
        let output = self.remover.remove(&image)?;
        utils::imwrite(dest, &output)
    }
}
