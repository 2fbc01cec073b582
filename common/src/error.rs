//! エラー型定義

use crate::options::ApiTier;
use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// 上位プラン専用オプションを下位プランで送ろうとした
    #[error("オプション `{option}` は {tier} プランでは使用できません（plus プランが必要です）")]
    TierUnsupported { option: String, tier: ApiTier },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::Io(io_error);
        let display = format!("{}", error);
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_error_display_config() {
        let error = Error::Config("設定ファイルが見つかりません".to_string());
        assert_eq!(error.to_string(), "Config error: 設定ファイルが見つかりません");
    }

    #[test]
    fn test_error_display_tier() {
        let error = Error::TierUnsupported {
            option: "upscale.mode".to_string(),
            tier: ApiTier::Basic,
        };
        let display = error.to_string();
        assert!(display.contains("upscale.mode"));
        assert!(display.contains("basic"));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }
}
