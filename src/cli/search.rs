use std::io::Write;

use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, StoreOptions};
use crate::query::{SearchOutcome, search_by_id};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub store: StoreOptions,
    /// 被搜索的商品 ID，即包含扩展名的图片文件名
    #[arg(long)]
    pub id: String,
    /// 返回的相似图片数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub top: usize,
    /// 格式化输出 JSON
    #[arg(long)]
    pub pretty: bool,
}

impl SubCommandExtend for SearchCommand {
    /// 结果以单个 JSON 对象输出到 stdout，失败时以状态码 1 退出
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let outcome = search_by_id(&self.store, &self.id, self.top).await;
        print_outcome(&outcome, self.pretty)?;
        if !outcome.is_success() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_outcome(outcome: &SearchOutcome, pretty: bool) -> Result<()> {
    let json = if pretty { serde_json::to_string_pretty(outcome)? } else { serde_json::to_string(outcome)? };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}
