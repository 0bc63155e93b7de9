use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::embed::U2NET_URL;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = ProjectDirs::from("", "du", "clipsearch")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".clipsearch"));
    ConfDir { path }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap_or(".clipsearch")
}

/// Weaviate 默认集合名
pub const DEFAULT_COLLECTION: &str = "ProductImage";

#[derive(Parser, Debug, Clone)]
pub struct StoreOptions {
    /// Weaviate 主机名
    #[arg(long, default_value = "localhost")]
    pub host: String,
    /// Weaviate HTTP 端口
    #[arg(long, default_value_t = 8099)]
    pub port: u16,
    /// 存放图片向量的集合名
    #[arg(long, value_name = "NAME", default_value = DEFAULT_COLLECTION)]
    pub collection: String,
}

impl StoreOptions {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { host: "localhost".to_string(), port: 8099, collection: DEFAULT_COLLECTION.to_string() }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// U²-Net 背景移除模型路径，默认为配置目录下的 u2net.onnx，不存在时自动下载
    #[arg(long, value_name = "FILE")]
    pub u2net: Option<PathBuf>,
    /// U²-Net 模型的下载地址
    #[arg(long, value_name = "URL", default_value = U2NET_URL)]
    pub u2net_url: String,
    /// 不显示模型下载进度
    #[arg(long)]
    pub quiet_download: bool,
}

impl ModelOptions {
    /// 返回实际使用的 U²-Net 模型路径
    pub fn u2net_path(&self, conf_dir: &ConfDir) -> PathBuf {
        self.u2net.clone().unwrap_or_else(|| conf_dir.u2net())
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self { u2net: None, u2net_url: U2NET_URL.to_string(), quiet_download: false }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "clipsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 配置目录，用于缓存模型文件
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 重建集合，并将目录下的所有图片向量化后写入 Weaviate
    Index(IndexCommand),
    /// 根据商品 ID 搜索相似图片，以 JSON 格式输出
    Search(SearchCommand),
    /// 显示集合中的对象数量
    Count(CountCommand),
    /// 计算单张图片的向量，用于检查模型是否正常
    Embed(EmbedCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回 CLIP 模型缓存目录
    pub fn model_cache(&self) -> PathBuf {
        self.path.join("models")
    }

    /// 返回 U²-Net 模型文件路径
    pub fn u2net(&self) -> PathBuf {
        self.path.join("u2net.onnx")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_defaults_match_caller_contract() {
        let opts = Opts::parse_from(["clipsearch", "search", "--id", "20798351_1.jpg"]);
        let SubCommand::Search(cmd) = opts.subcmd else { panic!("expected search subcommand") };
        assert_eq!(cmd.id, "20798351_1.jpg");
        assert_eq!(cmd.top, 10);
        assert!(!cmd.pretty);
        assert_eq!(cmd.store.base_url(), "http://localhost:8099");
        assert_eq!(cmd.store.collection, "ProductImage");
    }

    #[test]
    fn index_defaults() {
        let opts = Opts::parse_from(["clipsearch", "-c", "/tmp/conf", "index", "images"]);
        assert_eq!(opts.conf_dir.u2net(), PathBuf::from("/tmp/conf/u2net.onnx"));
        let SubCommand::Index(cmd) = opts.subcmd else { panic!("expected index subcommand") };
        assert_eq!(cmd.batch_size, 16);
        assert!(!cmd.no_remove_background);
        assert!(!cmd.yes);
        assert_eq!(cmd.suffix, "jpg,jpeg,png,bmp,webp");
    }

    #[test]
    fn u2net_path_resolution() {
        let conf_dir = ConfDir::from_str("/tmp/conf").unwrap();
        let opts = Opts::parse_from(["clipsearch", "embed", "a.jpg"]);
        let SubCommand::Embed(cmd) = opts.subcmd else { panic!("expected embed subcommand") };
        assert_eq!(cmd.model.u2net_path(&conf_dir), PathBuf::from("/tmp/conf/u2net.onnx"));
        assert_eq!(cmd.model.u2net_url, U2NET_URL);

        let opts = Opts::parse_from(["clipsearch", "embed", "a.jpg", "--u2net", "/models/u2netp.onnx"]);
        let SubCommand::Embed(cmd) = opts.subcmd else { panic!("expected embed subcommand") };
        assert_eq!(cmd.model.u2net_path(&conf_dir), PathBuf::from("/models/u2netp.onnx"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(Opts::try_parse_from(["clipsearch", "index", "images", "-b", "0"]).is_err());
    }
}
