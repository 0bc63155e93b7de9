use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts, StoreOptions};
use crate::embed::Extractor;
use crate::indexer::Indexer;
use crate::scan::{DEFAULT_SUFFIXES, scan_images, suffix_regex};
use crate::store::WeaviateStore;
use crate::utils::{pb_style, read_line};

#[derive(Parser, Debug, Clone)]
pub struct IndexCommand {
    #[command(flatten)]
    pub store: StoreOptions,
    #[command(flatten)]
    pub model: ModelOptions,
    /// 图片所在目录，不会扫描子目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔，不区分大小写
    #[arg(short, long, default_value = DEFAULT_SUFFIXES)]
    pub suffix: String,
    /// 每积累多少张图片写入一次
    #[arg(short, long, value_name = "SIZE", default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: u32,
    /// 不移除背景，直接使用原图
    #[arg(long)]
    pub no_remove_background: bool,
    /// 跳过确认，直接删除并重建集合
    #[arg(short, long)]
    pub yes: bool,
}

impl SubCommandExtend for IndexCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let line = "=".repeat(60);
        println!("{}\n图片批量索引\n{}", line, line);

        println!("\n[1/5] 扫描图片目录: {}", self.path.display());
        let re_suf = suffix_regex(&self.suffix)?;
        let images = scan_images(&self.path, &re_suf);
        if images.is_empty() {
            println!("未找到图片文件");
            return Ok(());
        }
        println!("共 {} 张图片", images.len());

        let remove_background = !self.no_remove_background;
        println!("\n[2/5] 加载模型...");
        let mut extractor = Extractor::load(&opts.conf_dir, &self.model, remove_background).await?;
        println!("向量维度: {}", extractor.dimension());

        println!("\n[3/5] 连接 Weaviate...");
        let store = WeaviateStore::connect(&self.store).await?;

        // 无论成功与否都要关闭连接
        let result = self.index(&mut extractor, &store, &images, remove_background).await;
        store.close();
        result
    }
}

impl IndexCommand {
    async fn index(
        &self,
        extractor: &mut Extractor,
        store: &WeaviateStore,
        images: &[PathBuf],
        remove_background: bool,
    ) -> Result<()> {
        println!("\n[4/5] 重建集合 {}（已有数据将被删除）", store.collection());
        if !block_in_place(|| confirm_reset(&mut std::io::stdin().lock(), self.yes))? {
            println!("已取消");
            return Ok(());
        }
        store.create_schema().await?;

        println!("\n[5/5] 处理并写入 {} 张图片", images.len());
        println!("背景移除: {}", remove_background);

        let pb = ProgressBar::new(images.len() as u64).with_style(pb_style());
        let stats = Indexer::new(extractor, store, self.batch_size as usize, remove_background, pb)
            .run(images)
            .await;

        let line = "=".repeat(60);
        println!("\n{}\n索引完成\n{}", line, line);
        println!("图片总数: {}", stats.total);
        println!("成功: {}", stats.success);
        println!("失败: {}", stats.failed);

        println!("\n{}", "-".repeat(60));
        println!("集合 {} 中共有 {} 个对象", store.collection(), store.count_objects().await);

        Ok(())
    }
}

/// 重建集合前确认，只有输入 yes（不区分大小写）才继续
pub fn confirm_reset(input: &mut impl BufRead, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("是否继续？(yes/no): ");
    std::io::stdout().flush()?;
    Ok(read_line(input)?.eq_ignore_ascii_case("yes"))
}
