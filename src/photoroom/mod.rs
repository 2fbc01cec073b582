//! Photoroom 画像編集API
//!
//! plus プランは v2/edit、basic プランは v1/segment に送る。
//! ローカルファイルは multipart で POST、URL指定の画像はクエリ文字列付きの GET で送る
//! （URL指定は plus プランのみ）。200 の本文は要求したフォーマットの完成画像なので、
//! そのまま書き出す。

use crate::error::{BatchError, Result};
use crate::http::{send_with_retry, FilePart, HttpRequest, HttpResponse, RequestBody, Transport};
use crate::output::write_atomic;
use crate::resize::{fit_and_pad, ResizeSpec};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use photoroom_common::{ApiTier, EditRequestConfig, ImageSource, WorkItem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// plus プラン
pub const DEFAULT_ENDPOINT: &str = "https://image-api.photoroom.com/v2/edit";
/// basic プラン
pub const BASIC_ENDPOINT: &str = "https://sdk.photoroom.com/v1/segment";

/// プランごとの送信先
pub fn endpoint_for(tier: ApiTier) -> &'static str {
    match tier {
        ApiTier::Basic => BASIC_ENDPOINT,
        ApiTier::Plus => DEFAULT_ENDPOINT,
    }
}

/// multipart のフィールド名（入力画像, 背景画像）
fn file_fields(tier: ApiTier) -> (&'static str, &'static str) {
    match tier {
        ApiTier::Basic => ("image_file", "bg_image"),
        ApiTier::Plus => ("imageFile", "background.imageFile"),
    }
}

/// これを超える入力は警告だけ出して送る
const LARGE_INPUT_BYTES: u64 = 20 * 1024 * 1024;

/// デバッグ時に記録するレスポンスヘッダー
const DIAGNOSTIC_HEADERS: &[&str] = &[
    "x-uncertainty-score",
    "x-foreground-top",
    "x-foreground-left",
    "x-foreground-width",
    "x-foreground-height",
];

/// 編集結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutput {
    pub path: PathBuf,
    pub bytes_written: usize,
    pub content_type: Option<String>,
}

/// 画像編集サービス
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// 1枚編集して `destination` に保存する
    async fn edit(
        &self,
        item: &WorkItem,
        config: &EditRequestConfig,
        destination: &Path,
    ) -> Result<EditOutput>;
}

pub struct PhotoroomClient {
    transport: Arc<dyn Transport>,
    api_key: String,
    tier: ApiTier,
    endpoint: String,
    retry: RetryPolicy,
    timeout: Duration,
    resize: Option<ResizeSpec>,
    background_image: Option<PathBuf>,
}

impl PhotoroomClient {
    pub fn new(transport: Arc<dyn Transport>, api_key: impl Into<String>, tier: ApiTier) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            tier,
            endpoint: endpoint_for(tier).to_string(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
            resize: None,
            background_image: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 読み取りタイムアウト
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 保存前にリサイズ・余白付けを行う
    pub fn with_resize(mut self, resize: Option<ResizeSpec>) -> Self {
        self.resize = resize;
        self
    }

    /// 背景画像を multipart の2つ目のファイルとして送る
    pub fn with_background_image(mut self, path: Option<PathBuf>) -> Self {
        self.background_image = path;
        self
    }

    pub fn tier(&self) -> ApiTier {
        self.tier
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn background_part(&self) -> Result<Option<FilePart>> {
        let Some(path) = &self.background_image else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| BatchError::FileNotFound(path.display().to_string()))?;
        Ok(Some(FilePart {
            field_name: file_fields(self.tier).1.to_string(),
            file_name: file_name_of(path),
            mime: guess_mime(path).to_string(),
            bytes,
        }))
    }

    async fn build_request(&self, item: &WorkItem, config: &EditRequestConfig) -> Result<HttpRequest> {
        let mut fields = config.fields_for(self.tier);
        let background = self.background_part().await?;

        let request = match item.source() {
            ImageSource::Local(path) => {
                let metadata = tokio::fs::metadata(path)
                    .await
                    .map_err(|_| BatchError::FileNotFound(path.display().to_string()))?;
                if !metadata.is_file() {
                    return Err(BatchError::FileNotFound(path.display().to_string()));
                }
                if metadata.len() > LARGE_INPUT_BYTES {
                    warn!(
                        file = %item.display_name,
                        size = metadata.len(),
                        "入力画像が大きいため処理に失敗する可能性があります"
                    );
                }

                let bytes = tokio::fs::read(path).await?;
                let mut files = vec![FilePart {
                    field_name: file_fields(self.tier).0.to_string(),
                    file_name: item.display_name.clone(),
                    mime: guess_mime(path).to_string(),
                    bytes,
                }];
                files.extend(background);
                HttpRequest::post(&self.endpoint, RequestBody::Multipart { fields, files })
            }
            ImageSource::Remote(_) if self.tier == ApiTier::Basic => {
                return Err(photoroom_common::Error::TierUnsupported {
                    option: "imageUrl".to_string(),
                    tier: self.tier,
                }
                .into());
            }
            ImageSource::Remote(url) => {
                fields.push(("imageUrl".to_string(), url.to_string()));
                match background {
                    // ファイルを添えるときは URL もフォームで送る
                    Some(file) => HttpRequest::post(
                        &self.endpoint,
                        RequestBody::Multipart {
                            fields,
                            files: vec![file],
                        },
                    ),
                    None => HttpRequest::get(&self.endpoint).query(fields),
                }
            }
        };

        Ok(request
            .header("x-api-key", &self.api_key)
            .header("Accept", "image/png, application/json")
            .timeout(self.timeout))
    }
}

#[async_trait]
impl ImageEditor for PhotoroomClient {
    async fn edit(
        &self,
        item: &WorkItem,
        config: &EditRequestConfig,
        destination: &Path,
    ) -> Result<EditOutput> {
        // プラン外のオプションは送信前に弾く
        config.validate_for(self.tier)?;

        let request = self.build_request(item, config).await?;
        debug!(file = %item.display_name, tier = %self.tier, "Photoroomに送信");

        let response = send_with_retry(self.transport.as_ref(), &self.retry, &request).await?;
        log_diagnostics(item, &response);

        match response.status {
            200 => {
                let content_type = response.header("content-type").map(str::to_string);
                let bytes = match &self.resize {
                    Some(spec) => fit_and_pad(&response.body, spec, config.output_format())?,
                    None => response.body,
                };
                write_atomic(destination, &bytes)?;
                info!(file = %item.display_name, output = %destination.display(), "編集画像を保存");
                Ok(EditOutput {
                    path: destination.to_path_buf(),
                    bytes_written: bytes.len(),
                    content_type,
                })
            }
            402 => Err(BatchError::QuotaExceeded(error_detail(&response))),
            status => Err(BatchError::ProviderRejected {
                status,
                body: response.text(),
            }),
        }
    }
}

/// 402 の本文は `{"detail": "..."}`
fn error_detail(response: &HttpResponse) -> String {
    response
        .json::<serde_json::Value>()
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| response.text())
}

fn log_diagnostics(item: &WorkItem, response: &HttpResponse) {
    for name in DIAGNOSTIC_HEADERS {
        if let Some(value) = response.header(name) {
            debug!(file = %item.display_name, header = *name, value, "レスポンスヘッダー");
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
