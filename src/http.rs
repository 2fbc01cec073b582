//! HTTP送信の抽象化
//!
//! 各APIクライアントは [`Transport`] 越しにリクエストを送る。
//! 本番は reqwest、テストではメモリ上の偽実装を使う。

use crate::error::{BatchError, Result};
use crate::retry::{retry, RetryError, RetryPolicy};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// multipartで送るファイル
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// 先頭が入力画像、続いて背景画像など
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

/// 送信するリクエスト（再試行のたびに同じ内容で組み立て直す）
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// 読み取りタイムアウト（接続タイムアウトはTransport側）
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn post(url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: Method::Post,
            body,
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// ヘッダー値を取得（名前は大文字小文字を区別しない）
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// 受信したレスポンス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// 本文をテキストとして取得（不正なUTF-8は置換）
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// 通信エラーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// 接続できなかった
    Connect,
    /// 接続・読み取りのタイムアウト
    Timeout,
    /// レスポンス受信中に切断された
    Interrupted,
    /// リクエスト自体が組み立てられない等
    Other,
}

/// レスポンスを受け取れなかった通信エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// 再試行で回復し得るか
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect | TransportErrorKind::Timeout | TransportErrorKind::Interrupted
        )
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            TransportErrorKind::Connect => "接続エラー",
            TransportErrorKind::Timeout => "タイムアウト",
            TransportErrorKind::Interrupted => "受信中断",
            TransportErrorKind::Other => "リクエストエラー",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl std::error::Error for TransportError {}

/// リクエストを1回送信する
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// 再試行付きで送信する
///
/// レスポンスを受け取れた時点でステータスに関係なく返す。
pub async fn send_with_retry(
    transport: &dyn Transport,
    policy: &RetryPolicy,
    request: &HttpRequest,
) -> Result<HttpResponse> {
    let result = retry(
        policy,
        |attempt| {
            debug!(attempt, url = %request.url, "HTTPリクエスト送信");
            transport.send(request)
        },
        TransportError::is_retryable,
    )
    .await;

    match result {
        Ok(response) => {
            debug!(status = response.status, url = %request.url, "HTTPレスポンス受信");
            Ok(response)
        }
        Err(RetryError::Exhausted { attempts, last }) => {
            Err(BatchError::RetriesExhausted { attempts, last })
        }
        Err(RetryError::Fatal(e)) => Err(BatchError::Transport(e)),
    }
}

/// reqwestによる実装
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 接続タイムアウトを指定して作成
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("photoroom-batch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BatchError::Config(format!("HTTPクライアント初期化エラー: {}", e)))?;
        Ok(Self { client })
    }

    fn build(&self, request: &HttpRequest) -> std::result::Result<reqwest::RequestBuilder, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart { fields, files } => {
                let mut form = reqwest::multipart::Form::new();
                for (key, value) in fields {
                    form = form.text(key.clone(), value.clone());
                }
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime)
                        .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
                    form = form.part(file.field_name.clone(), part);
                }
                builder.multipart(form)
            }
        };

        Ok(builder.timeout(request.timeout))
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() || err.is_request() {
        TransportErrorKind::Interrupted
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let response = self.build(request)?.send().await.map_err(|e| classify(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).to_string()))
            .collect();
        let body = response.bytes().await.map_err(|e| classify(&e))?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// 事前に用意した結果を順に返す
    struct ScriptedTransport {
        script: Mutex<Vec<std::result::Result<HttpResponse, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(mut script: Vec<std::result::Result<HttpResponse, TransportError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(TransportError::connect("script exhausted")))
        }
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(TransportError::connect("refused").is_retryable());
        assert!(TransportError::timeout("read").is_retryable());
        assert!(TransportError::new(TransportErrorKind::Interrupted, "reset").is_retryable());
        assert!(!TransportError::new(TransportErrorKind::Other, "bad url").is_retryable());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let response = HttpResponse::new(200, "ok").with_header("Content-Type", "image/png");
        assert_eq!(response.header("content-type"), Some("image/png"));
        assert_eq!(response.header("x-missing"), None);

        let request = HttpRequest::get("https://example.com").header("X-Api-Key", "k");
        assert_eq!(request.header_value("x-api-key"), Some("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_returned_without_retry() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(500, "boom"))]);
        let response = send_with_retry(
            &transport,
            &RetryPolicy::default(),
            &HttpRequest::get("https://example.com"),
        )
        .await
        .unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_maps_to_batch_error() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::timeout("1")),
            Err(TransportError::timeout("2")),
        ]);
        let err = send_with_retry(
            &transport,
            &RetryPolicy::new(2, Duration::from_millis(10), 2.0),
            &HttpRequest::get("https://example.com"),
        )
        .await
        .unwrap_err();

        match err {
            BatchError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(last.message, "2");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_transport_error() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::new(
            TransportErrorKind::Other,
            "invalid header",
        ))]);
        let err = send_with_retry(
            &transport,
            &RetryPolicy::default(),
            &HttpRequest::get("https://example.com"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BatchError::Transport(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
