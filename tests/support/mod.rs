//! 結合テスト用の偽実装

#![allow(dead_code)]

use async_trait::async_trait;
use photoroom_batch::error::{BatchError, Result};
use photoroom_batch::http::{HttpRequest, HttpResponse, Transport, TransportError, TransportErrorKind};
use photoroom_batch::output::write_atomic;
use photoroom_batch::photoroom::{EditOutput, ImageEditor};
use photoroom_batch::shopify::Catalog;
use photoroom_common::{CatalogRecord, EditRequestConfig, WorkItem};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub type SendResult = std::result::Result<HttpResponse, TransportError>;

/// 用意した結果を順に返す
pub struct ScriptedTransport {
    script: Mutex<VecDeque<SendResult>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<SendResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> SendResult {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new(TransportErrorKind::Other, "script exhausted")))
    }
}

/// リクエスト内容に応じて応答を決める
pub struct RoutingTransport<F> {
    route: F,
    calls: AtomicUsize,
}

impl<F> RoutingTransport<F>
where
    F: Fn(&HttpRequest) -> SendResult + Send + Sync,
{
    pub fn new(route: F) -> Self {
        Self {
            route,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> Transport for RoutingTransport<F>
where
    F: Fn(&HttpRequest) -> SendResult + Send + Sync,
{
    async fn send(&self, request: &HttpRequest) -> SendResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.route)(request)
    }
}

pub fn timeout() -> SendResult {
    Err(TransportError::timeout("read timed out"))
}

pub fn status(code: u16, body: &str) -> SendResult {
    Ok(HttpResponse::new(code, body.as_bytes().to_vec()))
}

/// 偽の編集結果
#[derive(Clone)]
pub enum EditBehavior {
    Succeed(Vec<u8>),
    Quota,
    Reject(u16),
}

/// 同時実行数を記録する編集サービス
pub struct FakeEditor {
    behaviors: HashMap<String, EditBehavior>,
    default: EditBehavior,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeEditor {
    pub fn succeeding() -> Self {
        Self {
            behaviors: HashMap::new(),
            default: EditBehavior::Succeed(b"edited".to_vec()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 表示名ごとの結果
    pub fn on(mut self, display_name: &str, behavior: EditBehavior) -> Self {
        self.behaviors.insert(display_name.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEditor for FakeEditor {
    async fn edit(
        &self,
        item: &WorkItem,
        _config: &EditRequestConfig,
        destination: &Path,
    ) -> Result<EditOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.behaviors.get(&item.display_name).unwrap_or(&self.default) {
            EditBehavior::Succeed(bytes) => {
                write_atomic(destination, bytes)?;
                Ok(EditOutput {
                    path: destination.to_path_buf(),
                    bytes_written: bytes.len(),
                    content_type: Some("image/png".into()),
                })
            }
            EditBehavior::Quota => Err(BatchError::QuotaExceeded("Quota exceeded".into())),
            EditBehavior::Reject(status) => Err(BatchError::ProviderRejected {
                status: *status,
                body: "rejected".into(),
            }),
        }
    }
}

/// メモリ上の商品カタログ
#[derive(Default)]
pub struct FakeCatalog {
    records: HashMap<String, CatalogRecord>,
    fail_uploads: bool,
    lookups: AtomicUsize,
    uploads: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, key: &str, id: &str, title: &str) -> Self {
        self.records.insert(
            key.to_string(),
            CatalogRecord {
                id: id.to_string(),
                title: title.to_string(),
                image_refs: Vec::new(),
            },
        );
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// (商品ID, アップロードしたファイル)
    pub fn uploads(&self) -> Vec<(String, PathBuf)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn find_by_key(&self, key: &str) -> Result<Option<CatalogRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.get(key).cloned())
    }

    async fn upload_image(&self, record: &CatalogRecord, path: &Path) -> Result<String> {
        if self.fail_uploads {
            return Err(BatchError::UploadFailed {
                status: 422,
                body: "Unprocessable".into(),
            });
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((record.id.clone(), path.to_path_buf()));
        Ok(format!("img-{}", uploads.len()))
    }
}

/// 入力フォルダに空でないダミー画像を作る
pub fn create_inputs(dir: &Path, names: &[&str]) -> Vec<WorkItem> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"raw image bytes").unwrap();
            WorkItem::from_path(&path, PathBuf::new())
        })
        .collect()
}
