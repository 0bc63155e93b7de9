use std::io::BufRead;

use anyhow::{Result, bail};
use indicatif::ProgressStyle;
use opencv::core::{self, Mat, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;

/// 将图片字节解码为 3 通道 BGR 图像，alpha 通道会被丢弃
pub fn imdecode_color(bytes: &[u8]) -> Result<Mat> {
    let mat = Mat::from_slice(bytes)?;
    let img = imgcodecs::imdecode(&mat, imgcodecs::IMREAD_COLOR)?;
    if img.empty() {
        bail!("无法解码图片");
    }
    Ok(img)
}

/// 将图像编码为 PNG
pub fn imencode_png(img: &Mat) -> Result<Vec<u8>> {
    let mut buf = Vector::<u8>::new();
    let flags = Vector::<i32>::new();
    if !imgcodecs::imencode(".png", img, &mut buf, &flags)? {
        bail!("PNG 编码失败");
    }
    Ok(buf.to_vec())
}

/// 将图像缩放到指定尺寸
pub fn resize_exact(img: &Mat, width: i32, height: i32) -> Result<Mat> {
    let mut output = Mat::default();
    imgproc::resize(
        img,
        &mut output,
        core::Size::new(width, height),
        0.,
        0.,
        imgproc::InterpolationFlags::INTER_LANCZOS4 as i32,
    )?;
    Ok(output)
}

/// L2 归一化，结果位于单位超球面上
pub fn l2_normalize(mut vector: Vec<f32>) -> Result<Vec<f32>> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        bail!("无法归一化向量，范数为 {}", norm);
    }
    vector.iter_mut().for_each(|v| *v /= norm);
    Ok(vector)
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}

/// 读取一行输入并去掉首尾空白，输入结束时返回空字符串
pub fn read_line(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_owned())
}
