use std::path::Path;

use anyhow::{Context, Result};
use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};
use log::info;
use opencv::core::Mat;

use super::ImageEncoder;
use crate::utils;

/// CLIP ViT-B/32 图像向量维数
pub const CLIP_DIMENSION: usize = 512;

/// 基于 fastembed 的 CLIP ViT-B/32 图像编码器
pub struct ClipEncoder {
    model: ImageEmbedding,
}

impl ClipEncoder {
    pub fn new(cache_dir: &Path, show_download_progress: bool) -> Result<Self> {
        info!("加载 CLIP 模型: clip-vit-base-patch32, 缓存目录: {}", cache_dir.display());
        let options = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(show_download_progress);
        let model = ImageEmbedding::try_new(options).context("加载 CLIP 模型失败")?;
        info!("CLIP 模型加载完成");
        Ok(Self { model })
    }
}

impl ImageEncoder for ClipEncoder {
    fn dimension(&self) -> usize {
        CLIP_DIMENSION
    }

    fn encode(&mut self, image: &Mat) -> Result<Vec<f32>> {
        // 缩放与标准化由 fastembed 完成
        let png = utils::imencode_png(image)?;
        let mut vectors = self.model.embed_bytes(&[png.as_slice()], None)?;
        vectors.pop().context("CLIP 模型没有返回向量")
    }
}
