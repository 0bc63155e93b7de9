use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// 一张图片在集合中的记录
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// 商品 ID，即包含扩展名的文件名
    pub product_id: String,
    pub image_path: String,
    pub image_name: String,
    pub vector: Vec<f32>,
}

impl ImageRecord {
    /// 由图片路径生成记录，商品 ID 与图片名均取文件名（包含扩展名）
    pub fn from_path(path: &Path, vector: Vec<f32>) -> Self {
        let image_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            product_id: image_name.clone(),
            image_path: path.to_string_lossy().into_owned(),
            image_name,
            vector,
        }
    }

    pub(crate) fn to_object<'a>(&'a self, class: &'a str) -> WeaviateObject<'a> {
        WeaviateObject {
            class,
            properties: Properties {
                product_id: &self.product_id,
                image_path: &self.image_path,
                image_name: &self.image_name,
            },
            vector: &self.vector,
        }
    }
}

/// 相似图片搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub product_id: String,
    pub image_path: String,
    pub image_name: String,
    /// 相似度，范围 [0, 1]，越大越相似
    pub similarity: f32,
    pub distance: f32,
}

/// 由 Weaviate 返回的 distance 与 certainty 计算 (相似度, 距离)
///
/// certainty 存在时直接使用；否则取 `1 - distance` 并截断到 [0, 1]。
/// 缺失 distance 时按 0.5 处理。
pub fn similarity(distance: Option<f32>, certainty: Option<f32>) -> (f32, f32) {
    let distance = distance.unwrap_or(0.5);
    let similarity = match certainty {
        Some(certainty) => certainty,
        None => (1. - distance).clamp(0., 1.),
    };
    (similarity, distance)
}

/// 集合结构定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSchema {
    pub class: String,
    #[serde(default)]
    pub vectorizer: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    pub name: String,
    pub data_type: Vec<String>,
}

impl ClassSchema {
    /// ProductImage 集合：三个文本属性，向量由外部提供
    pub fn product_image(class: &str) -> Self {
        let text = |name: &str| PropertySchema { name: name.to_string(), data_type: vec!["text".to_string()] };
        Self {
            class: class.to_string(),
            vectorizer: Some("none".to_string()),
            properties: vec![text("product_id"), text("image_path"), text("image_name")],
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Properties<'a> {
    pub product_id: &'a str,
    pub image_path: &'a str,
    pub image_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct WeaviateObject<'a> {
    pub class: &'a str,
    pub properties: Properties<'a>,
    pub vector: &'a [f32],
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequest<'a> {
    pub objects: Vec<WeaviateObject<'a>>,
}

/// 批量写入时每个对象的返回结果
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BatchResult {
    #[serde(default)]
    pub result: Option<BatchResultInner>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BatchResultInner {
    #[serde(default)]
    pub errors: Option<ErrorList>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorList {
    #[serde(default)]
    pub error: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessage {
    pub message: String,
}

impl BatchResult {
    /// 对象写入失败时返回错误信息
    pub fn error_message(self) -> Option<String> {
        let errors = self.result?.errors?.error;
        if errors.is_empty() {
            return None;
        }
        Some(errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; "))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<ErrorMessage>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetData<T> {
    #[serde(rename = "Get")]
    pub get: HashMap<String, Option<Vec<T>>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AggregateData {
    #[serde(rename = "Aggregate")]
    pub aggregate: HashMap<String, Option<Vec<AggregateGroup>>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AggregateGroup {
    pub meta: AggregateMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AggregateMeta {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NearHit {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(rename = "_additional", default)]
    pub additional: Option<Additional>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Additional {
    #[serde(default)]
    pub distance: Option<f32>,
    #[serde(default)]
    pub certainty: Option<f32>,
    #[serde(default)]
    pub vector: Option<StoredVector>,
}

impl From<NearHit> for SimilarityResult {
    fn from(hit: NearHit) -> Self {
        let additional = hit.additional.unwrap_or_default();
        let (similarity, distance) = similarity(additional.distance, additional.certainty);
        Self {
            product_id: hit.product_id.unwrap_or_default(),
            image_path: hit.image_path.unwrap_or_default(),
            image_name: hit.image_name.unwrap_or_default(),
            similarity,
            distance,
        }
    }
}

/// 存储的向量，可能是普通数组，也可能包在命名向量中，如 `{"default": [...]}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StoredVector {
    Plain(Vec<f32>),
    Named(HashMap<String, Vec<f32>>),
}

impl StoredVector {
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            StoredVector::Plain(vector) => Some(vector),
            StoredVector::Named(mut named) => match named.remove("default") {
                Some(vector) => Some(vector),
                None if named.len() == 1 => named.into_values().next(),
                None => None,
            },
        }
        .filter(|vector| !vector.is_empty())
    }
}
