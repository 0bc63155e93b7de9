use log::info;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::config::StoreOptions;
use crate::store::{SimilarityResult, WeaviateStore};

/// 相似图片搜索结果，序列化后即为命令行输出的 JSON
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found { query_product_id: String, similar_images: Vec<SimilarityResult> },
    Failed { error: String },
}

impl SearchOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        SearchOutcome::Failed { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }
}

impl Serialize for SearchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SearchOutcome::Found { query_product_id, similar_images } => {
                let mut s = serializer.serialize_struct("SearchOutcome", 4)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("query_product_id", query_product_id)?;
                s.serialize_field("total_results", &similar_images.len())?;
                s.serialize_field("similar_images", similar_images)?;
                s.end()
            }
            SearchOutcome::Failed { error } => {
                let mut s = serializer.serialize_struct("SearchOutcome", 2)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("error", error)?;
                s.end()
            }
        }
    }
}

/// 去掉查询图片本身，最多保留 `top_n` 个结果
pub fn exclude_query(results: Vec<SimilarityResult>, product_id: &str, top_n: usize) -> Vec<SimilarityResult> {
    results.into_iter().filter(|r| r.product_id != product_id).take(top_n).collect()
}

/// 在已连接的向量库中搜索与 `product_id` 相似的图片
///
/// 多取一个结果，以便在查询图片本身出现在结果中时将其剔除
pub async fn search_similar_images(store: &WeaviateStore, product_id: &str, top_n: usize) -> SearchOutcome {
    let Some(vector) = store.get_vector_by_id(product_id).await else {
        return SearchOutcome::failed(format!("Product ID {} not found in database", product_id));
    };

    let results = store.search_similar(&vector, top_n.saturating_add(1)).await;
    let similar_images = exclude_query(results, product_id, top_n);
    info!("商品 {} 找到 {} 张相似图片", product_id, similar_images.len());

    SearchOutcome::Found { query_product_id: product_id.to_string(), similar_images }
}

/// 连接向量库、搜索，最后关闭连接
pub async fn search_by_id(opts: &StoreOptions, product_id: &str, top_n: usize) -> SearchOutcome {
    let store = match WeaviateStore::connect(opts).await {
        Ok(store) => store,
        Err(e) => return SearchOutcome::failed(format!("{:#}", e)),
    };
    let outcome = search_similar_images(&store, product_id, top_n).await;
    store.close();
    outcome
}
