//! Shopify Admin API（商品検索・画像アップロード）
//!
//! 商品は GraphQL でバーコード検索し、画像は REST の
//! `products/{id}/images.json` に base64 で送る。

use crate::error::{BatchError, Result};
use crate::http::{send_with_retry, HttpRequest, RequestBody, Transport};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lazy_static::lazy_static;
use photoroom_common::{CatalogRecord, ImageRef};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_VERSION: &str = "2025-01";

/// 検索で取得する件数。2件以上あれば重複登録を警告できる
pub const DEFAULT_MAX_MATCHES: u32 = 2;

lazy_static! {
    static ref PRODUCT_ID: Regex = Regex::new(r"Product/(\d+)").unwrap();
}

const PRODUCT_QUERY: &str = r#"
query ProductsByBarcode($query: String!, $first: Int!) {
  products(first: $first, query: $query) {
    edges {
      node {
        id
        title
        images(first: 10) {
          edges {
            node {
              id
              src
            }
          }
        }
      }
    }
  }
}
"#;

/// 商品カタログ
#[async_trait]
pub trait Catalog: Send + Sync {
    /// 照合キーで商品を検索（無ければ `None`）
    async fn find_by_key(&self, key: &str) -> Result<Option<CatalogRecord>>;

    /// 画像を商品に追加し、作成された画像IDを返す
    async fn upload_image(&self, record: &CatalogRecord, path: &Path) -> Result<String>;
}

pub struct ShopifyClient {
    transport: Arc<dyn Transport>,
    store: String,
    access_token: String,
    api_version: String,
    retry: RetryPolicy,
    lookup_timeout: Duration,
    upload_timeout: Duration,
    max_upload_bytes: u64,
    max_matches: u32,
}

impl ShopifyClient {
    /// `store` は `example.myshopify.com` 形式
    pub fn new(
        transport: Arc<dyn Transport>,
        store: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let store: String = store.into();
        let store = store
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();

        Self {
            transport,
            store,
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            retry: RetryPolicy::default(),
            lookup_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(60),
            max_upload_bytes: 20 * 1024 * 1024,
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, lookup: Duration, upload: Duration) -> Self {
        self.lookup_timeout = lookup;
        self.upload_timeout = upload;
        self
    }

    /// 警告を出すファイルサイズ（送信は止めない）
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// 検索で取得する件数（先頭の1件を使う）
    pub fn with_max_matches(mut self, n: u32) -> Self {
        self.max_matches = n.max(1);
        self
    }

    fn base_url(&self) -> String {
        format!("https://{}/admin/api/{}", self.store, self.api_version)
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        request
            .header("X-Shopify-Access-Token", &self.access_token)
            .header("Accept", "application/json")
    }
}

/// `gid://shopify/Product/123` から数値IDを取り出す
pub fn numeric_product_id(gid: &str) -> Option<&str> {
    if !gid.is_empty() && gid.chars().all(|c| c.is_ascii_digit()) {
        return Some(gid);
    }
    PRODUCT_ID
        .captures(gid)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ProductsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ProductsData {
    products: Connection<ProductNode>,
}

#[derive(Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

#[derive(Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Deserialize)]
struct ProductNode {
    id: String,
    title: String,
    images: Option<Connection<ImageNode>>,
}

#[derive(Deserialize)]
struct ImageNode {
    id: String,
    src: String,
}

impl From<ProductNode> for CatalogRecord {
    fn from(node: ProductNode) -> Self {
        let image_refs = node
            .images
            .map(|c| {
                c.edges
                    .into_iter()
                    .map(|e| ImageRef {
                        id: e.node.id,
                        src: e.node.src,
                    })
                    .collect()
            })
            .unwrap_or_default();

        CatalogRecord {
            id: node.id,
            title: node.title,
            image_refs,
        }
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    image: UploadedImage,
}

#[derive(Deserialize)]
struct UploadedImage {
    id: serde_json::Value,
}

#[async_trait]
impl Catalog for ShopifyClient {
    async fn find_by_key(&self, key: &str) -> Result<Option<CatalogRecord>> {
        let key = key.trim();
        let body = json!({
            "query": PRODUCT_QUERY,
            "variables": {
                "query": format!("barcode:\"{}\"", key.replace('"', "")),
                "first": self.max_matches,
            },
        });
        let request = self
            .authorized(HttpRequest::post(
                format!("{}/graphql.json", self.base_url()),
                RequestBody::Json(body),
            ))
            .timeout(self.lookup_timeout);

        debug!(key, "商品を検索");
        let response = send_with_retry(self.transport.as_ref(), &self.retry, &request).await?;
        if !response.is_success() {
            return Err(BatchError::CatalogQuery(format!(
                "{} - {}",
                response.status,
                response.text()
            )));
        }

        let parsed: GraphQlResponse = response.json()?;
        if !parsed.errors.is_empty() {
            let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(BatchError::CatalogQuery(messages.join("; ")));
        }

        let mut edges = parsed
            .data
            .map(|d| d.products.edges)
            .unwrap_or_default();
        if edges.len() > 1 {
            warn!(key, matches = edges.len(), "複数の商品が一致したため先頭を使用します");
        }
        if edges.is_empty() {
            info!(key, "一致する商品がありません");
            return Ok(None);
        }

        let record = CatalogRecord::from(edges.remove(0).node);
        info!(key, id = %record.id, title = %record.title, "商品が見つかりました");
        Ok(Some(record))
    }

    async fn upload_image(&self, record: &CatalogRecord, path: &Path) -> Result<String> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| BatchError::InvalidUploadFile(format!("存在しません: {}", path.display())))?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(BatchError::InvalidUploadFile(format!(
                "空またはファイルではありません: {}",
                path.display()
            )));
        }
        if metadata.len() > self.max_upload_bytes {
            warn!(
                file = %path.display(),
                size_mb = %format!("{:.2}", metadata.len() as f64 / (1024.0 * 1024.0)),
                "ファイルサイズが大きいためアップロードに失敗する可能性があります"
            );
        }

        let product_id = numeric_product_id(&record.id).ok_or_else(|| {
            BatchError::CatalogQuery(format!("商品IDを解釈できません: {}", record.id))
        })?;

        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let body = json!({
            "image": {
                "attachment": STANDARD.encode(&bytes),
                "filename": filename,
            }
        });

        let request = self
            .authorized(HttpRequest::post(
                format!("{}/products/{}/images.json", self.base_url(), product_id),
                RequestBody::Json(body),
            ))
            .timeout(self.upload_timeout);

        let response = send_with_retry(self.transport.as_ref(), &self.retry, &request).await?;
        match response.status {
            200 | 201 => {
                let uploaded: UploadResponse = response.json()?;
                let id = match uploaded.image.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                info!(product = %record.id, image_id = %id, "画像をアップロードしました");
                Ok(id)
            }
            status => Err(BatchError::UploadFailed {
                status,
                body: response.text(),
            }),
        }
    }
}
