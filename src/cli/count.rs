use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, StoreOptions};
use crate::store::WeaviateStore;

#[derive(Parser, Debug, Clone)]
pub struct CountCommand {
    #[command(flatten)]
    pub store: StoreOptions,
}

impl SubCommandExtend for CountCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let store = WeaviateStore::connect(&self.store).await?;
        let count = store.count_objects().await;
        println!("{}\t{}", store.collection(), count);
        store.close();
        Ok(())
    }
}
