use anyhow::{Context, Result, anyhow, ensure};
use ndarray::Array1;
use opencv::core::Mat;
use ort::session::Session;
use ort::value::TensorRef;

use crate::config::EmbeddingOptions;
use crate::features::FeatureExtractor;
use crate::utils;

/// 预训练分类网络的池化特征：缩放到 input_size、ImageNet 归一化后
/// 前向一次，展平全局平均池化的输出作为特征向量
pub struct EmbeddingExtractor {
    session: Session,
    input_name: String,
    input_size: i32,
    dim: usize,
}

impl EmbeddingExtractor {
    pub fn load(opts: &EmbeddingOptions) -> Result<Self> {
        let session = Session::builder()?
            .commit_from_file(&opts.model)
            .with_context(|| format!("加载特征模型失败: {}", opts.model.display()))?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("模型没有输入张量"))?;
        Ok(Self { session, input_name, input_size: opts.input_size, dim: opts.feature_dim })
    }
}

impl FeatureExtractor for EmbeddingExtractor {
    fn dim(&self) -> usize {
        self.dim
    }

    fn extract(&mut self, image: &Mat) -> Result<Array1<f32>> {
        let input = utils::imagenet_tensor(image, self.input_size)?;
        let tensor = TensorRef::from_array_view(&input)?;
        let outputs = self.session.run(ort::inputs![self.input_name.as_str() => tensor])?;

        let (_, value) = outputs.iter().next().ok_or_else(|| anyhow!("模型没有输出张量"))?;
        let (shape, data) = value.try_extract_tensor::<f32>()?;
        // 池化输出可能是 [1, D] 或 [1, D, 1, 1]，展平后长度一致
        ensure!(
            data.len() == self.dim,
            "特征维度不符: 期望 {}，实际 {} (输出形状 {:?})",
            self.dim,
            data.len(),
            shape
        );
        Ok(Array1::from_vec(data.to_vec()))
    }
}
