use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::*;

#[derive(Parser, Debug, Clone)]
#[command(name = "imfind", version, about = "商品图片抓取与相似图片匹配工具")]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 抓取商品目录图片并去除背景
    Scrape(ScrapeCommand),
    /// 使用 HSV 直方图匹配相似图片
    Histogram(HistogramCommand),
    /// 使用预训练网络的特征向量匹配相似图片
    Embedding(EmbeddingCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct DirOptions {
    /// 数据库（图库）图片目录
    #[arg(short, long, value_name = "DIR", default_value = "database_images")]
    pub database_dir: PathBuf,
    /// 目标（查询）图片目录
    #[arg(short, long, value_name = "DIR", default_value = "target_images")]
    pub target_dir: PathBuf,
    /// 扫描的图片后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png")]
    pub suffix: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RankOptions {
    /// 每个目标展示的相似图片数量
    #[arg(short = 'k', long, value_name = "K", default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=32))]
    pub top_k: u32,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct HistogramOptions {
    /// 每个 HSV 通道的直方图 bin 数量
    #[arg(short, long, value_name = "N", default_value_t = 16, value_parser = clap::value_parser!(i32).range(2..=256))]
    pub bins: i32,
    /// 判定为匹配的相似度阈值，只用于标注，不影响排序和筛选
    #[arg(long, value_name = "T", default_value_t = 0.7)]
    pub match_threshold: f32,
    /// 结果输出根目录
    #[arg(short, long, value_name = "DIR", default_value = "histogram_results")]
    pub results_dir: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct EmbeddingOptions {
    /// ONNX 格式的特征提取模型，ImageNet 预训练 + 全局平均池化输出
    #[arg(short, long, value_name = "FILE", default_value = "models/resnet50.onnx")]
    pub model: PathBuf,
    /// 模型输入边长
    #[arg(long, value_name = "N", default_value_t = 224, value_parser = clap::value_parser!(i32).range(32..=2048))]
    pub input_size: i32,
    /// 特征向量维度
    #[arg(long, value_name = "N", default_value_t = 2048)]
    pub feature_dim: usize,
    /// 结果输出根目录
    #[arg(short, long, value_name = "DIR", default_value = "embedding_results")]
    pub results_dir: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct ScrapeOptions {
    /// 商品目录站点根地址
    #[arg(long, value_name = "URL", default_value = "https://www.safetykorea.kr")]
    pub base_url: String,
    /// 目录列表页路径
    #[arg(long, value_name = "PATH", default_value = "/release/itemSearch")]
    pub list_path: String,
    /// 品类编号
    #[arg(long, value_name = "ID", default_value = "8010100")]
    pub category: String,
    /// 最大翻页数量
    #[arg(long, value_name = "N", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub max_pages: u32,
    /// 去除背景后图片的输出目录
    #[arg(short, long, value_name = "DIR", default_value = "no_bg_images")]
    pub output_dir: PathBuf,
    /// 列表行 CSS 选择器
    #[arg(long, value_name = "SELECTOR", default_value = "div.tb_wrap table tbody tr")]
    pub row_selector: String,
    /// 行内详情链接 CSS 选择器
    #[arg(long, value_name = "SELECTOR", default_value = "td a")]
    pub link_selector: String,
    /// 详情页商品图片 CSS 选择器
    #[arg(long, value_name = "SELECTOR", default_value = "div.contents_area table img")]
    pub img_selector: String,
}

#[derive(Parser, Debug, Clone)]
pub struct MattingOptions {
    /// ONNX 格式的背景分割模型（BiRefNet 一类）
    #[arg(short, long, value_name = "FILE", default_value = "models/birefnet-general.onnx")]
    pub model: PathBuf,
    /// 分割模型输入边长
    #[arg(long, value_name = "N", default_value_t = 1024, value_parser = clap::value_parser!(i32).range(32..=4096))]
    pub mask_size: i32,
    /// alpha matting 前景阈值
    #[arg(long, value_name = "N", default_value_t = 240)]
    pub foreground_threshold: u8,
    /// alpha matting 背景阈值
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub background_threshold: u8,
    /// 确定前景区域的腐蚀像素数
    #[arg(long, value_name = "N", default_value_t = 10, value_parser = clap::value_parser!(i32).range(0..=128))]
    pub erode_size: i32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
