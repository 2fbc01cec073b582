use crate::http::TransportError;
use photoroom_common::FailureKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("{0} が設定されていません。`photoroom-batch config` で設定するか環境変数で指定してください")]
    MissingCredential(String),

    #[error("入力が見つかりません: {0}")]
    InputNotFound(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("{attempts}回試行しましたが通信に失敗しました: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    #[error("通信エラー: {0}")]
    Transport(TransportError),

    #[error("Photoroom APIの利用上限に達しました (402): {0}")]
    QuotaExceeded(String),

    #[error("Photoroom APIエラー ({status}): {body}")]
    ProviderRejected { status: u16, body: String },

    #[error("商品検索エラー: {0}")]
    CatalogQuery(String),

    #[error("画像アップロードエラー ({status}): {body}")]
    UploadFailed { status: u16, body: String },

    #[error("アップロードできないファイル: {0}")]
    InvalidUploadFile(String),

    #[error("画像処理エラー: {0}")]
    ImageProcessing(String),

    #[error(transparent)]
    Common(#[from] photoroom_common::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// 結果レポート用の分類
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            BatchError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
            BatchError::Transport(_) => FailureKind::Transport,
            BatchError::QuotaExceeded(_) => FailureKind::QuotaExceeded,
            BatchError::ProviderRejected { .. } => FailureKind::ProviderRejected,
            BatchError::CatalogQuery(_)
            | BatchError::UploadFailed { .. }
            | BatchError::InvalidUploadFile(_) => FailureKind::UploadFailed,
            BatchError::Common(photoroom_common::Error::TierUnsupported { .. }) => {
                FailureKind::TierUnsupported
            }
            BatchError::Io(_) | BatchError::FileNotFound(_) => FailureKind::Io,
            _ => FailureKind::Other,
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BatchError::QuotaExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
