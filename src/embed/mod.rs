//! 图片向量提取
//!
//! 流程：读取图片 → （可选）背景移除 → 解码为 3 通道图像 → 模型编码 → L2 归一化。
//! 背景移除失败时退回原图，不算作失败。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use opencv::core::Mat;
use tokio::task::block_in_place;

use crate::config::{ConfDir, ModelOptions};
use crate::utils;

mod clip;
mod download;
mod u2net;

pub use clip::{CLIP_DIMENSION, ClipEncoder};
pub use download::{U2NET_URL, ensure_u2net};
pub use u2net::U2Net;

/// 图像编码模型
pub trait ImageEncoder {
    /// 输出向量的维数
    fn dimension(&self) -> usize;

    /// 将 3 通道 BGR 图像编码为向量，不要求归一化
    fn encode(&mut self, image: &Mat) -> Result<Vec<f32>>;
}

/// 背景移除模型
pub trait BackgroundRemover {
    /// 返回移除背景后的 3 通道图像，背景部分为黑色
    fn remove(&mut self, image: &Mat) -> Result<Mat>;
}

/// 背景移除的结果
pub enum Background {
    Removed(Mat),
    Kept { reason: String },
}

/// 单张图片的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Ok { vector: Vec<f32>, dimension: usize },
    Failed { error: String },
}

impl Embedding {
    pub fn is_ok(&self) -> bool {
        matches!(self, Embedding::Ok { .. })
    }
}

pub struct Extractor {
    encoder: Box<dyn ImageEncoder + Send>,
    remover: Option<Box<dyn BackgroundRemover + Send>>,
}

impl Extractor {
    pub fn new(
        encoder: Box<dyn ImageEncoder + Send>,
        remover: Option<Box<dyn BackgroundRemover + Send>>,
    ) -> Self {
        Self { encoder, remover }
    }

    /// 加载 CLIP 模型，需要时同时加载 U²-Net
    ///
    /// U²-Net 模型文件不存在时先下载，下载失败只打印警告，之后的背景移除都会退回原图
    pub async fn load(conf_dir: &ConfDir, opts: &ModelOptions, remove_background: bool) -> Result<Self> {
        let u2net = if remove_background {
            ensure_u2net(&opts.u2net_path(conf_dir), &opts.u2net_url, !opts.quiet_download).await
        } else {
            None
        };
        block_in_place(|| Self::load_models(conf_dir, opts, u2net.as_deref()))
    }

    fn load_models(conf_dir: &ConfDir, opts: &ModelOptions, u2net: Option<&Path>) -> Result<Self> {
        let encoder = ClipEncoder::new(&conf_dir.model_cache(), !opts.quiet_download)?;
        let remover: Option<Box<dyn BackgroundRemover + Send>> = match u2net {
            Some(path) => Some(Box::new(U2Net::open(path)?)),
            None => None,
        };
        Ok(Self::new(Box::new(encoder), remover))
    }

    pub fn dimension(&self) -> usize {
        self.encoder.dimension()
    }

    pub fn remove_background(&mut self, image: &Mat) -> Background {
        let Some(remover) = self.remover.as_mut() else {
            return Background::Kept { reason: "背景移除模型未加载".to_string() };
        };
        match remover.remove(image) {
            Ok(output) => Background::Removed(output),
            Err(e) => Background::Kept { reason: format!("{:#}", e) },
        }
    }

    pub fn encode_image(&mut self, image: &Mat) -> Result<Vec<f32>> {
        let vector = self.encoder.encode(image)?;
        if vector.len() != self.encoder.dimension() {
            bail!("向量维数错误: 期望 {}，实际 {}", self.encoder.dimension(), vector.len());
        }
        utils::l2_normalize(vector)
    }

    /// 处理单张图片，任何错误都会以 [`Embedding::Failed`] 返回
    pub fn process_image(&mut self, path: impl AsRef<Path>, remove_background: bool) -> Embedding {
        match self.try_process_image(path.as_ref(), remove_background) {
            Ok(vector) => Embedding::Ok { dimension: vector.len(), vector },
            Err(e) => Embedding::Failed { error: format!("{:#}", e) },
        }
    }

    fn try_process_image(&mut self, path: &Path, remove_background: bool) -> Result<Vec<f32>> {
        let bytes =
            std::fs::read(path).with_context(|| format!("读取图片失败: {}", path.display()))?;
        let mut image = utils::imdecode_color(&bytes)?;

        if remove_background {
            match self.remove_background(&image) {
                Background::Removed(output) => image = output,
                Background::Kept { reason } => {
                    warn!("背景移除失败，使用原图 {}: {}", path.display(), reason)
                }
            }
        }

        self.encode_image(&image)
    }

    /// 依次处理多张图片
    pub fn process_batch(
        &mut self,
        paths: &[PathBuf],
        remove_background: bool,
    ) -> Vec<(PathBuf, Embedding)> {
        paths
            .iter()
            .map(|path| {
                let result = self.process_image(path, remove_background);
                match &result {
                    Embedding::Ok { .. } => info!("处理完成: {}", path.display()),
                    Embedding::Failed { error } => warn!("处理失败: {} - {}", path.display(), error),
                }
                (path.clone(), result)
            })
            .collect()
    }
}
