use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;
use ndarray::Array4;
use opencv::core::{self, Mat};
use opencv::imgproc;
use opencv::prelude::*;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;

use super::BackgroundRemover;
use crate::utils;

/// U²-Net 输入尺寸
const INPUT_SIZE: i32 = 320;
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 基于 U²-Net 显著性分割的背景移除
pub struct U2Net {
    session: Session,
}

impl U2Net {
    pub fn open(path: &Path) -> Result<Self> {
        info!("加载背景移除模型: {}", path.display());
        let session = SessionBuilder::new()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)
            .with_context(|| format!("无法加载模型: {}", path.display()))?;
        Ok(Self { session })
    }

    /// 计算前景蒙版，尺寸为 INPUT_SIZE x INPUT_SIZE，取值 0~255
    fn predict_mask(&mut self, image: &Mat) -> Result<Vec<u8>> {
        let input = preprocess(image)?;
        let name = self.session.inputs.first().context("模型没有输入")?.name.clone();
        let inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> =
            vec![(Cow::Owned(name), Tensor::from_array(input)?.into())];
        let outputs = self.session.run(inputs)?;

        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let pixels = (INPUT_SIZE * INPUT_SIZE) as usize;
        if data.len() < pixels {
            bail!("模型输出尺寸错误: {}", data.len());
        }
        normalize_mask(&data[..pixels])
    }
}

impl BackgroundRemover for U2Net {
    fn remove(&mut self, image: &Mat) -> Result<Mat> {
        let mask = self.predict_mask(image)?;
        let mask = Mat::new_rows_cols_with_data(INPUT_SIZE, INPUT_SIZE, &mask)?;
        let mask = utils::resize_exact(&mask.try_clone()?, image.cols(), image.rows())?;
        apply_mask(image, &mask)
    }
}

/// BGR 图像 → NCHW 的 RGB 张量，先按最大值缩放，再按 ImageNet 均值方差标准化
fn preprocess(image: &Mat) -> Result<Array4<f32>> {
    let resized = utils::resize_exact(image, INPUT_SIZE, INPUT_SIZE)?;
    let bytes = resized.data_bytes()?;
    let max = bytes.iter().copied().max().unwrap_or(0).max(1) as f32;

    let size = INPUT_SIZE as usize;
    let mut input = Array4::<f32>::zeros((1, 3, size, size));
    for (i, px) in bytes.chunks_exact(3).enumerate() {
        let (y, x) = (i / size, i % size);
        for c in 0..3 {
            let v = px[2 - c] as f32 / max;
            input[[0, c, y, x]] = (v - MEAN[c]) / STD[c];
        }
    }
    Ok(input)
}

/// 将预测值线性拉伸到 0~255
fn normalize_mask(pred: &[f32]) -> Result<Vec<u8>> {
    let (mi, ma) = pred
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(mi, ma), &v| (mi.min(v), ma.max(v)));
    if !(ma - mi).is_finite() || ma - mi <= f32::EPSILON {
        bail!("蒙版无效，最小值 {} 最大值 {}", mi, ma);
    }
    Ok(pred.iter().map(|&v| ((v - mi) / (ma - mi) * 255.).round() as u8).collect())
}

/// 按蒙版保留前景，背景变为黑色
fn apply_mask(image: &Mat, mask: &Mat) -> Result<Mat> {
    let mut mask3 = Mat::default();
    imgproc::cvt_color_def(mask, &mut mask3, imgproc::COLOR_GRAY2BGR)?;
    let mut output = Mat::default();
    core::multiply(image, &mask3, &mut output, 1. / 255., -1)?;
    Ok(output)
}
