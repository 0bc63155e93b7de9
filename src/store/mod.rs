//! Weaviate 向量库客户端，只操作一个集合

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::StoreOptions;

mod types;

pub use types::*;

/// 每次批量请求最多包含的对象数
pub const DEFAULT_MAX_BATCH: usize = 100;

pub struct WeaviateStore {
    client: Client,
    base_url: String,
    collection: String,
    max_batch: usize,
}

impl WeaviateStore {
    /// 连接 Weaviate，并确认服务已就绪
    pub async fn connect(opts: &StoreOptions) -> Result<Self> {
        let base_url = opts.base_url();
        info!("连接 Weaviate: {}", base_url);

        let store = Self {
            client: Client::new(),
            base_url,
            collection: opts.collection.clone(),
            max_batch: DEFAULT_MAX_BATCH,
        };
        store
            .client
            .get(store.url("/v1/.well-known/ready"))
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("无法连接到 Weaviate: {}", store.base_url))?;

        info!("已连接 Weaviate");
        Ok(store)
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 获取集合结构，集合不存在时返回 None
    pub async fn get_schema(&self) -> Result<Option<ClassSchema>> {
        let resp = self.client.get(self.url(&format!("/v1/schema/{}", self.collection))).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    /// 删除已有集合并重新创建，会清空所有数据
    pub async fn create_schema(&self) -> Result<()> {
        if self.get_schema().await?.is_some() {
            self.client
                .delete(self.url(&format!("/v1/schema/{}", self.collection)))
                .send()
                .await?
                .error_for_status()
                .with_context(|| format!("删除集合失败: {}", self.collection))?;
            info!("已删除集合: {}", self.collection);
        }

        self.client
            .post(self.url("/v1/schema"))
            .json(&ClassSchema::product_image(&self.collection))
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("创建集合失败: {}", self.collection))?;
        info!("已创建集合: {}", self.collection);
        Ok(())
    }

    /// 写入单张图片
    pub async fn insert_image(&self, product_id: &str, image_path: &str, vector: &[f32]) -> bool {
        let image_name = std::path::Path::new(image_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let record = ImageRecord {
            product_id: product_id.to_string(),
            image_path: image_path.to_string(),
            image_name,
            vector: vector.to_vec(),
        };

        let result = self
            .client
            .post(self.url("/v1/objects"))
            .json(&record.to_object(&self.collection))
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        match result {
            Ok(_) => {
                info!("已写入: {} (ID: {})", record.image_name, product_id);
                true
            }
            Err(e) => {
                error!("写入失败 {}: {}", image_path, e);
                false
            }
        }
    }

    /// 批量写入，返回 (成功数, 失败数)
    ///
    /// 记录按 `max_batch` 分组发送；单个对象或整组请求失败都只计数，不中断
    pub async fn batch_insert(&self, records: &[ImageRecord]) -> (usize, usize) {
        let mut success = 0;
        let mut fail = 0;

        for chunk in records.chunks(self.max_batch) {
            match self.send_batch(chunk).await {
                Ok(errors) => {
                    for (record, err) in chunk.iter().zip(errors) {
                        match err {
                            None => success += 1,
                            Some(msg) => {
                                error!("批量写入失败 {}: {}", record.image_name, msg);
                                fail += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("批量请求失败，{} 个对象未写入: {:#}", chunk.len(), e);
                    fail += chunk.len();
                }
            }
        }

        info!("批量写入完成: {} 成功, {} 失败", success, fail);
        (success, fail)
    }

    async fn send_batch(&self, chunk: &[ImageRecord]) -> Result<Vec<Option<String>>> {
        let body = BatchRequest {
            objects: chunk.iter().map(|record| record.to_object(&self.collection)).collect(),
        };
        let results: Vec<BatchResult> = self
            .client
            .post(self.url("/v1/batch/objects"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if results.len() != chunk.len() {
            bail!("返回结果数量 {} 与请求数量 {} 不一致", results.len(), chunk.len());
        }
        Ok(results.into_iter().map(BatchResult::error_message).collect())
    }

    async fn graphql<T: DeserializeOwned>(&self, query: String) -> Result<T> {
        debug!("graphql: {}", query);
        let resp: GraphQlResponse<T> = self
            .client
            .post(self.url("/v1/graphql"))
            .json(&json!({ "query": query }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(errors) = resp.errors.filter(|errors| !errors.is_empty()) {
            let messages = errors.into_iter().map(|e| e.message).collect::<Vec<_>>();
            bail!("GraphQL 查询失败: {}", messages.join("; "));
        }
        resp.data.context("GraphQL 响应中没有 data")
    }

    async fn get_objects<T: DeserializeOwned>(&self, query: String) -> Result<Vec<T>> {
        let mut data: GetData<T> = self.graphql(query).await?;
        Ok(data.get.remove(&self.collection).flatten().unwrap_or_default())
    }

    /// 最近邻搜索，失败时返回空列表
    pub async fn search_similar(&self, vector: &[f32], limit: usize) -> Vec<SimilarityResult> {
        match self.try_search_similar(vector, limit).await {
            Ok(results) => results,
            Err(e) => {
                error!("相似度搜索失败: {:#}", e);
                vec![]
            }
        }
    }

    async fn try_search_similar(&self, vector: &[f32], limit: usize) -> Result<Vec<SimilarityResult>> {
        let query = format!(
            "{{ Get {{ {}(nearVector: {{vector: {}}}, limit: {}) {{ product_id image_path image_name _additional {{ distance certainty }} }} }} }}",
            self.collection,
            serde_json::to_string(vector)?,
            limit,
        );
        let hits: Vec<NearHit> = self.get_objects(query).await?;
        Ok(hits.into_iter().map(SimilarityResult::from).collect())
    }

    /// 根据商品 ID 取出存储的向量，未找到或出错时返回 None
    pub async fn get_vector_by_id(&self, product_id: &str) -> Option<Vec<f32>> {
        match self.try_get_vector_by_id(product_id).await {
            Ok(Some(vector)) => Some(vector),
            Ok(None) => {
                warn!("未找到商品 {} 的向量", product_id);
                None
            }
            Err(e) => {
                error!("获取向量失败: {:#}", e);
                None
            }
        }
    }

    async fn try_get_vector_by_id(&self, product_id: &str) -> Result<Option<Vec<f32>>> {
        let query = format!(
            "{{ Get {{ {}(where: {{path: [\"product_id\"], operator: Equal, valueText: {}}}, limit: 1) {{ product_id _additional {{ vector }} }} }} }}",
            self.collection,
            serde_json::to_string(product_id)?,
        );
        let hits: Vec<NearHit> = self.get_objects(query).await?;
        Ok(hits
            .into_iter()
            .next()
            .and_then(|hit| hit.additional)
            .and_then(|additional| additional.vector)
            .and_then(StoredVector::into_vector))
    }

    /// 集合中的对象总数，出错时返回 0
    pub async fn count_objects(&self) -> u64 {
        let query = format!("{{ Aggregate {{ {} {{ meta {{ count }} }} }} }}", self.collection);
        let result = self.graphql::<AggregateData>(query).await.map(|mut data| {
            data.aggregate
                .remove(&self.collection)
                .flatten()
                .and_then(|groups| groups.into_iter().next())
                .map_or(0, |group| group.meta.count)
        });
        match result {
            Ok(count) => {
                info!("集合 {} 中共有 {} 个对象", self.collection, count);
                count
            }
            Err(e) => {
                error!("统计对象数量失败: {:#}", e);
                0
            }
        }
    }

    /// 关闭连接
    pub fn close(self) {
        drop(self.client);
        info!("Weaviate 连接已关闭");
    }
}
