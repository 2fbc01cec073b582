//! 対話モード
//!
//! 画像の取得元（URL またはローカルファイル）、プリセット、出力先を順に尋ね、
//! 1枚ずつ編集する。

use crate::error::{BatchError, Result};
use crate::photoroom::ImageEditor;
use dialoguer::{Confirm, Input, Select};
use photoroom_common::{OutputFormat, WorkItem, PRESETS};
use std::path::{Path, PathBuf};
use tracing::warn;

/// 既定の出力先（`output.<拡張子>`）
pub fn default_output_for(format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("output.{}", format.extension()))
}

/// 出力フォーマットと拡張子が食い違う場合は拡張子を合わせる
pub fn normalize_output(path: &Path, format: OutputFormat) -> PathBuf {
    let matches = path
        .extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            e == format.extension() || (format == OutputFormat::Jpg && e == "jpeg")
        })
        .unwrap_or(false);

    if matches {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

fn dialog_error(e: dialoguer::Error) -> BatchError {
    BatchError::Config(format!("入力を受け付けられません: {}", e))
}

/// 対話式で編集を繰り返す
pub async fn run_interactive(editor: &dyn ImageEditor, initial_preset: Option<&str>) -> Result<()> {
    let names: Vec<String> = PRESETS
        .iter()
        .map(|p| format!("{:<14} {}", p.name, p.description))
        .collect();
    let default_index = initial_preset
        .and_then(|name| photoroom_common::find_preset(name))
        .and_then(|found| PRESETS.iter().position(|p| p.name == found.name))
        .unwrap_or(0);

    loop {
        let sources = ["画像URL", "ローカルファイル"];
        let source_kind = Select::new()
            .with_prompt("画像の取得元")
            .items(&sources)
            .default(0)
            .interact()
            .map_err(dialog_error)?;

        let item = if source_kind == 0 {
            let url: String = Input::new()
                .with_prompt("画像URL")
                .interact_text()
                .map_err(dialog_error)?;
            WorkItem::from_url(url.trim())
        } else {
            let path: String = Input::new()
                .with_prompt("画像ファイルのパス")
                .interact_text()
                .map_err(dialog_error)?;
            crate::scanner::single_file(Path::new(path.trim()))?
        };

        let preset_index = Select::new()
            .with_prompt("プリセット")
            .items(&names)
            .default(default_index)
            .interact()
            .map_err(dialog_error)?;
        let config = PRESETS[preset_index].config();
        let format = config.output_format();

        let default_output = default_output_for(format);
        let output: String = Input::new()
            .with_prompt("出力ファイル")
            .default(default_output.display().to_string())
            .interact_text()
            .map_err(dialog_error)?;
        let requested = PathBuf::from(output.trim());
        let destination = normalize_output(&requested, format);
        if destination != requested {
            warn!(
                requested = %requested.display(),
                renamed = %destination.display(),
                "出力フォーマットに合わせて拡張子を変更します"
            );
        }

        println!("\n[1/1] 処理中: {}", item.display_name);
        match editor.edit(&item, &config, &destination).await {
            Ok(output) => println!("✔ 保存しました: {} ({} bytes)\n", output.path.display(), output.bytes_written),
            Err(e) => println!("✗ 処理に失敗しました: {}\n", e),
        }

        let again = Confirm::new()
            .with_prompt("続けて処理しますか？")
            .default(false)
            .interact()
            .map_err(dialog_error)?;
        if !again {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_for() {
        assert_eq!(default_output_for(OutputFormat::Webp), PathBuf::from("output.webp"));
        assert_eq!(default_output_for(OutputFormat::Png), PathBuf::from("output.png"));
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(
            normalize_output(Path::new("out/a.png"), OutputFormat::Webp),
            PathBuf::from("out/a.webp")
        );
        assert_eq!(
            normalize_output(Path::new("a.JPEG"), OutputFormat::Jpg),
            PathBuf::from("a.JPEG")
        );
        assert_eq!(normalize_output(Path::new("a"), OutputFormat::Png), PathBuf::from("a.png"));
    }
}
