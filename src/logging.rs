//! ログ初期化
//!
//! コンソール（stderr）への出力に加え、`--log-file` 指定時はファイルにも追記する。
//! `RUST_LOG` が設定されていればそちらを優先する。

use crate::error::Result;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 既定のフィルター
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "photoroom_batch=debug,photoroom_common=debug,info"
    } else {
        "photoroom_batch=info,warn"
    }
}

/// ロガーを初期化する（プロセスで1回だけ呼ぶ）
pub fn init(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug);

    // 二重初期化（テストなど）は無視する
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Some(path) = log_file {
        tracing::debug!(path = %path.display(), "ログファイルに出力します");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert!(default_directive(true).contains("debug"));
        assert!(!default_directive(false).contains("debug"));
    }

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.log");
        init(false, Some(&path)).unwrap();
        assert!(path.exists());
    }
}
