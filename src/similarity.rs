use std::cmp::Ordering;
use std::path::PathBuf;

use ndarray::Array1;
use serde::Serialize;

/// 单张图库图片的匹配结果
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub path: PathBuf,
    pub name: String,
    pub similarity: f32,
    /// 直方图管线独有：相似度是否达到匹配阈值，只作为报告字段
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_match: Option<bool>,
}

impl Match {
    pub fn new(path: PathBuf, similarity: f32, is_match: Option<bool>) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { path, name, similarity, is_match }
    }
}

/// 两个直方图向量的皮尔逊相关系数，范围约为 [-1, 1]
pub fn correlation(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    assert_eq!(a.len(), b.len(), "特征向量维度不一致");
    let n = a.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_a = a.iter().map(|&x| x as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&x| x as f64).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den_a = 0.0;
    let mut den_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        num += dx * dy;
        den_a += dx * dx;
        den_b += dy * dy;
    }
    let den = (den_a * den_b).sqrt();
    if den == 0.0 { 0.0 } else { (num / den) as f32 }
}

/// 余弦相似度：两个向量 L2 归一化后的点积，范围 [-1, 1]
pub fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    assert_eq!(a.len(), b.len(), "特征向量维度不一致");
    let dot = a.iter().zip(b.iter()).map(|(&x, &y)| x as f64 * y as f64).sum::<f64>();
    let norm_a = a.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { (dot / (norm_a * norm_b)) as f32 }
}

/// 按相似度降序排序并截取前 k 个。
/// 稳定排序：相似度相同的条目保持原有枚举顺序。
pub fn rank_matches(mut matches: Vec<Match>, top_k: usize) -> Vec<Match> {
    matches.sort_by(|a, b| {
        b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal)
    });
    matches.truncate(top_k);
    matches
}
