mod embedding;
mod histogram;

pub use embedding::EmbeddingExtractor;
pub use histogram::HistogramExtractor;

use anyhow::Result;
use ndarray::Array1;
use opencv::core::Mat;

/// 特征提取器：把解码后的图片变成固定长度的特征向量。
/// 同一轮比较中的所有向量必须来自同一个提取器实例，不能混用方法或参数。
pub trait FeatureExtractor {
    fn dim(&self) -> usize;
    fn extract(&mut self, image: &Mat) -> Result<Array1<f32>>;
}
