use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts};
use crate::embed::{Embedding, Extractor};

#[derive(Parser, Debug, Clone)]
pub struct EmbedCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 图片路径
    pub image: PathBuf,
    /// 不移除背景
    #[arg(long)]
    pub no_remove_background: bool,
}

impl SubCommandExtend for EmbedCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let remove_background = !self.no_remove_background;
        let mut extractor = Extractor::load(&opts.conf_dir, &self.model, remove_background).await?;
        let result = block_in_place(|| extractor.process_image(&self.image, remove_background));

        match result {
            Embedding::Ok { vector, dimension } => {
                println!("向量维度: {} (模型: {})", dimension, extractor.dimension());
                println!("前 5 个值: {:?}", &vector[..vector.len().min(5)]);
                Ok(())
            }
            Embedding::Failed { error } => Err(anyhow!("处理失败 {}: {}", self.image.display(), error)),
        }
    }
}
