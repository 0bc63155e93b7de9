mod count;
mod embed;
mod index;
mod search;

pub use count::*;
pub use embed::*;
pub use index::*;
pub use search::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
