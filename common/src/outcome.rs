//! 処理結果と集計
//!
//! 1つの [`WorkItem`] につき1つの [`OperationOutcome`] を作り、
//! 実行の最後に [`BatchSummary`] へ集計する。

use crate::types::WorkItem;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// パイプラインが到達した最終段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    EditSucceeded,
    EditFailed,
    CatalogNotFound,
    UploadSucceeded,
    UploadFailed,
    Skipped,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::EditSucceeded,
        Stage::EditFailed,
        Stage::CatalogNotFound,
        Stage::UploadSucceeded,
        Stage::UploadFailed,
        Stage::Skipped,
    ];

    pub fn is_success(&self) -> bool {
        matches!(self, Stage::EditSucceeded | Stage::UploadSucceeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Stage::EditFailed | Stage::UploadFailed)
    }

    /// 失敗ではないが最後まで進まなかったもの
    pub fn is_skipped(&self) -> bool {
        matches!(self, Stage::Skipped | Stage::CatalogNotFound)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::EditSucceeded => "EditSucceeded",
            Stage::EditFailed => "EditFailed",
            Stage::CatalogNotFound => "CatalogNotFound",
            Stage::UploadSucceeded => "UploadSucceeded",
            Stage::UploadFailed => "UploadFailed",
            Stage::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

/// 失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// 通信エラーが再試行上限まで続いた
    RetriesExhausted,
    /// 402: 利用枠・課金上限
    QuotaExceeded,
    /// 402以外の4xx/5xx
    ProviderRejected,
    /// 商品検索・画像アップロードのエラー
    UploadFailed,
    /// 再試行対象外の通信エラー
    Transport,
    /// プラン非対応オプション
    TierUnsupported,
    /// ローカルファイルの読み書き
    Io,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::RetriesExhausted => "RetriesExhaustedError",
            FailureKind::QuotaExceeded => "QuotaExceededError",
            FailureKind::ProviderRejected => "ProviderRejectedError",
            FailureKind::UploadFailed => "UploadFailedError",
            FailureKind::Transport => "TransportError",
            FailureKind::TierUnsupported => "TierUnsupportedError",
            FailureKind::Io => "IoError",
            FailureKind::Other => "Error",
        };
        f.write_str(s)
    }
}

/// アップロード段階の状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    /// 実行しなかった（認証情報なし・編集失敗・ドライラン等）
    Skipped,
    /// 照合キーに一致する商品が無かった
    NotFound,
    Succeeded { attachment_id: String },
    Failed,
}

/// 1アイテムの最終結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub item: WorkItem,
    pub stage: Stage,
    pub upload: UploadStatus,
    pub failure: Option<FailureKind>,
    pub error_detail: Option<String>,
    /// 保存した出力ファイル
    pub output_path: Option<PathBuf>,
}

impl OperationOutcome {
    /// 編集成功（アップロードなし）
    pub fn edited(item: WorkItem, output_path: PathBuf) -> Self {
        Self {
            item,
            stage: Stage::EditSucceeded,
            upload: UploadStatus::Skipped,
            failure: None,
            error_detail: None,
            output_path: Some(output_path),
        }
    }

    /// 編集失敗
    pub fn edit_failed(item: WorkItem, kind: FailureKind, detail: String) -> Self {
        Self {
            item,
            stage: Stage::EditFailed,
            upload: UploadStatus::Skipped,
            failure: Some(kind),
            error_detail: Some(detail),
            output_path: None,
        }
    }

    /// 未実行
    pub fn skipped(item: WorkItem, reason: impl Into<String>) -> Self {
        Self {
            item,
            stage: Stage::Skipped,
            upload: UploadStatus::Skipped,
            failure: None,
            error_detail: Some(reason.into()),
            output_path: None,
        }
    }

    /// 商品が見つからなかった
    pub fn not_found(item: WorkItem, output_path: Option<PathBuf>, key: &str) -> Self {
        Self {
            item,
            stage: Stage::CatalogNotFound,
            upload: UploadStatus::NotFound,
            failure: None,
            error_detail: Some(format!("照合キー {} に一致する商品がありません", key)),
            output_path,
        }
    }

    /// アップロード成功
    pub fn uploaded(item: WorkItem, output_path: Option<PathBuf>, attachment_id: String) -> Self {
        Self {
            item,
            stage: Stage::UploadSucceeded,
            upload: UploadStatus::Succeeded { attachment_id },
            failure: None,
            error_detail: None,
            output_path,
        }
    }

    /// アップロード失敗（商品検索の失敗も含む）
    pub fn upload_failed(
        item: WorkItem,
        output_path: Option<PathBuf>,
        kind: FailureKind,
        detail: String,
    ) -> Self {
        Self {
            item,
            stage: Stage::UploadFailed,
            upload: UploadStatus::Failed,
            failure: Some(kind),
            error_detail: Some(detail),
            output_path,
        }
    }

    pub fn attachment_id(&self) -> Option<&str> {
        match &self.upload {
            UploadStatus::Succeeded { attachment_id } => Some(attachment_id),
            _ => None,
        }
    }
}

/// 実行全体の集計
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    /// 段階ごとの件数（[`Stage::ALL`] の順）
    pub by_stage: Vec<(Stage, usize)>,
}

impl BatchSummary {
    /// 結果一覧から集計する
    pub fn from_outcomes(outcomes: &[OperationOutcome], elapsed: Duration) -> Self {
        let by_stage = Stage::ALL
            .iter()
            .map(|stage| (*stage, outcomes.iter().filter(|o| o.stage == *stage).count()))
            .collect();

        Self {
            total: outcomes.len(),
            succeeded: outcomes.iter().filter(|o| o.stage.is_success()).count(),
            failed: outcomes.iter().filter(|o| o.stage.is_failure()).count(),
            skipped: outcomes.iter().filter(|o| o.stage.is_skipped()).count(),
            elapsed,
            by_stage,
        }
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.by_stage
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
