use std::path::PathBuf;

use indicatif::ProgressBar;
use tokio::task::block_in_place;

use crate::embed::{Embedding, Extractor};
use crate::store::{ImageRecord, WeaviateStore};

/// 待写入的记录，达到容量后由调用方显式 flush
#[derive(Debug)]
pub struct PendingBatch {
    records: Vec<ImageRecord>,
    capacity: usize,
}

impl PendingBatch {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { records: Vec::with_capacity(capacity), capacity }
    }

    /// 加入一条记录，返回是否已满
    pub fn push(&mut self, record: ImageRecord) -> bool {
        self.records.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 取出所有记录并清空
    pub fn take(&mut self) -> Vec<ImageRecord> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.capacity))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

pub struct Indexer<'a> {
    extractor: &'a mut Extractor,
    store: &'a WeaviateStore,
    pending: PendingBatch,
    remove_background: bool,
    pb: ProgressBar,
    stats: IndexStats,
}

impl<'a> Indexer<'a> {
    pub fn new(
        extractor: &'a mut Extractor,
        store: &'a WeaviateStore,
        batch_size: usize,
        remove_background: bool,
        pb: ProgressBar,
    ) -> Self {
        Self {
            extractor,
            store,
            pending: PendingBatch::new(batch_size),
            remove_background,
            pb,
            stats: IndexStats::default(),
        }
    }

    /// 依次处理所有图片并写入向量库
    ///
    /// 单张图片失败只计数，不影响后续图片。
    /// 成功数为实际写入的对象数，失败数包括向量化失败和写入失败。
    pub async fn run(mut self, images: &[PathBuf]) -> IndexStats {
        self.stats.total = images.len();
        self.pb.set_length(images.len() as u64);

        for path in images {
            let name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
            self.pb.set_message(name.clone());

            let remove_background = self.remove_background;
            let extractor = &mut *self.extractor;
            let result = block_in_place(|| extractor.process_image(path, remove_background));

            match result {
                Embedding::Ok { vector, .. } => {
                    let record = ImageRecord::from_path(path, vector);
                    self.pb.println(format!("[OK] {} (product_id: {})", name, record.product_id));
                    if self.pending.push(record) {
                        self.flush().await;
                    }
                }
                Embedding::Failed { error } => {
                    self.pb.println(format!("[ERR] {}: {}", name, error));
                    self.stats.failed += 1;
                }
            }
            self.pb.inc(1);
        }

        if !self.pending.is_empty() {
            self.flush().await;
        }
        self.pb.finish_with_message("索引完成");

        self.stats
    }

    async fn flush(&mut self) {
        let records = self.pending.take();
        self.pb.println(format!("写入 {} 张图片...", records.len()));
        let (success, fail) = self.store.batch_insert(&records).await;
        self.stats.success += success;
        self.stats.failed += fail;
    }
}
