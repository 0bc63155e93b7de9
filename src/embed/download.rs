use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use tokio::io::AsyncWriteExt;

/// rembg 发布的 U²-Net 模型
pub const U2NET_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx";

/// 确保 U²-Net 模型文件存在，不存在时从 `url` 下载
///
/// 下载失败时返回 None，不留下不完整的文件
pub async fn ensure_u2net(path: &Path, url: &str, show_progress: bool) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    info!("未找到背景移除模型，开始下载: {}", url);
    let part = path.with_extension("onnx.part");
    match download(url, &part, path, show_progress).await {
        Ok(()) => {
            info!("背景移除模型已保存到 {}", path.display());
            Some(path.to_path_buf())
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            warn!("下载背景移除模型失败，将直接使用原图: {:#}", e);
            None
        }
    }
}

async fn download(url: &str, part: &Path, path: &Path, show_progress: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut resp = reqwest::get(url).await?.error_for_status()?;
    let pb = if show_progress {
        ProgressBar::new(resp.content_length().unwrap_or(0)).with_style(download_style())
    } else {
        ProgressBar::hidden()
    };

    let mut file = tokio::fs::File::create(part)
        .await
        .with_context(|| format!("无法创建文件: {}", part.display()))?;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);
    pb.finish_and_clear();

    tokio::fs::rename(part, path).await?;
    Ok(())
}

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}
