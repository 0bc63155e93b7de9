#![allow(dead_code)]

//! 测试用的内存版 Weaviate，只实现客户端用到的接口

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clipsearch::config::StoreOptions;
use clipsearch::embed::ImageEncoder;
use clipsearch::utils;
use opencv::core::{CV_8UC3, Mat, Scalar};
use opencv::prelude::*;
use regex::Regex;
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub properties: Value,
    pub vector: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub class: Option<Value>,
    pub objects: Vec<FakeObject>,
    /// 是否在搜索结果中返回 certainty
    pub report_certainty: bool,
    /// 是否以 `{"default": [...]}` 的形式返回向量
    pub named_vectors: bool,
    /// 写入的向量维数不等于该值时返回对象级错误
    pub dimension: Option<usize>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeWeaviate {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl FakeWeaviate {
    pub async fn spawn(state: FakeState) -> Result<Self> {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new()
            .route("/v1/.well-known/ready", get(|| async { StatusCode::OK }))
            .route("/v1/schema", post(create_class))
            .route("/v1/schema/{class}", get(get_class).delete(delete_class))
            .route("/v1/objects", post(insert_object))
            .route("/v1/batch/objects", post(batch_objects))
            .route("/v1/graphql", post(graphql))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Ok(Self { addr, state })
    }

    pub fn options(&self) -> StoreOptions {
        StoreOptions { host: self.addr.ip().to_string(), port: self.addr.port(), ..Default::default() }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    /// 不经过客户端直接放入对象，并创建集合
    pub fn seed(&self, product_id: &str, vector: Vec<f32>) {
        let mut state = self.state.lock().unwrap();
        if state.class.is_none() {
            state.class = Some(json!({"class": "ProductImage", "vectorizer": "none", "properties": []}));
        }
        state.objects.push(FakeObject {
            properties: json!({
                "product_id": product_id,
                "image_path": format!("/images/{}", product_id),
                "image_name": product_id,
            }),
            vector,
        });
    }
}

fn class_matches(state: &FakeState, class: &str) -> bool {
    state.class.as_ref().is_some_and(|c| c["class"] == class)
}

async fn get_class(State(state): State<Shared>, UrlPath(class): UrlPath<String>) -> Response {
    let state = state.lock().unwrap();
    match &state.class {
        Some(c) if c["class"] == class.as_str() => Json(c.clone()).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_class(State(state): State<Shared>, UrlPath(class): UrlPath<String>) -> StatusCode {
    let mut state = state.lock().unwrap();
    if class_matches(&state, &class) {
        state.class = None;
        state.objects.clear();
    }
    StatusCode::OK
}

async fn create_class(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    let mut state = state.lock().unwrap();
    if state.class.is_some() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    state.class = Some(body);
    StatusCode::OK
}

/// 返回对象级错误信息
fn accept(state: &mut FakeState, object: &Value) -> Option<String> {
    let class = object["class"].as_str().unwrap_or_default();
    if !class_matches(state, class) {
        return Some(format!("class {} does not exist", class));
    }
    let vector: Vec<f32> = serde_json::from_value(object["vector"].clone()).unwrap_or_default();
    if vector.is_empty() || state.dimension.is_some_and(|d| d != vector.len()) {
        return Some(format!("invalid vector length {}", vector.len()));
    }
    state.objects.push(FakeObject { properties: object["properties"].clone(), vector });
    None
}

async fn insert_object(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    match accept(&mut state, &body) {
        None => Json(body).into_response(),
        Some(msg) => (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"error": [{"message": msg}]}))).into_response(),
    }
}

async fn batch_objects(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let objects = body["objects"].as_array().cloned().unwrap_or_default();
    let results = objects
        .iter()
        .map(|object| match accept(&mut state, object) {
            None => json!({"result": {}}),
            Some(msg) => json!({"result": {"errors": {"error": [{"message": msg}]}}}),
        })
        .collect::<Vec<_>>();
    Json(Value::Array(results))
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    1. - dot / (na * nb)
}

async fn graphql(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let state = state.lock().unwrap();
    let query = body["query"].as_str().unwrap_or_default();

    let class = Regex::new(r"(?:Get|Aggregate)\s*\{\s*(\w+)")
        .unwrap()
        .captures(query)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    if !class_matches(&state, &class) {
        return Json(json!({"errors": [{"message": format!("Cannot query field \"{}\"", class)}]}));
    }

    if query.contains("Aggregate") {
        return Json(json!({"data": {"Aggregate": {class: [{"meta": {"count": state.objects.len()}}]}}}));
    }

    let near = Regex::new(r"nearVector:\s*\{\s*vector:\s*(\[[^\]]*\])\s*\}\s*,\s*limit:\s*(\d+)").unwrap();
    if let Some(c) = near.captures(query) {
        let vector: Vec<f32> = serde_json::from_str(&c[1]).unwrap();
        let limit: usize = c[2].parse().unwrap();
        let mut hits = state
            .objects
            .iter()
            .map(|o| (cosine_distance(&vector, &o.vector), o))
            .collect::<Vec<_>>();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        let hits = hits
            .into_iter()
            .take(limit)
            .map(|(distance, o)| {
                let mut hit = o.properties.clone();
                let certainty = state.report_certainty.then(|| 1. - distance / 2.);
                hit["_additional"] = json!({"distance": distance, "certainty": certainty});
                hit
            })
            .collect::<Vec<_>>();
        return Json(json!({"data": {"Get": {class: hits}}}));
    }

    let filter = Regex::new(r#"valueText:\s*("(?:[^"\\]|\\.)*")"#).unwrap();
    if let Some(c) = filter.captures(query) {
        let product_id: String = serde_json::from_str(&c[1]).unwrap();
        let hits = state
            .objects
            .iter()
            .filter(|o| o.properties["product_id"] == product_id.as_str())
            .take(1)
            .map(|o| {
                let vector = if state.named_vectors { json!({"default": o.vector}) } else { json!(o.vector) };
                json!({"product_id": product_id, "_additional": {"vector": vector}})
            })
            .collect::<Vec<_>>();
        return Json(json!({"data": {"Get": {class: hits}}}));
    }

    Json(json!({"errors": [{"message": "unsupported query"}]}))
}

/// 以各通道均值作为向量的编码器，代替 CLIP
pub struct MeanColor;

impl ImageEncoder for MeanColor {
    fn dimension(&self) -> usize {
        3
    }

    fn encode(&mut self, image: &Mat) -> Result<Vec<f32>> {
        let data = image.data_bytes()?;
        let n = (data.len() / 3) as f32;
        let mut v = vec![0f32; 3];
        for px in data.chunks_exact(3) {
            for c in 0..3 {
                v[c] += (px[c] as f32 + 1.) / n;
            }
        }
        Ok(v)
    }
}

/// 写入一张纯色 PNG 图片
pub fn write_image(dir: &Path, name: &str, bgr: (f64, f64, f64)) -> PathBuf {
    let img = Mat::new_rows_cols_with_default(8, 8, CV_8UC3, Scalar::new(bgr.0, bgr.1, bgr.2, 0.)).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, utils::imencode_png(&img).unwrap()).unwrap();
    path
}
