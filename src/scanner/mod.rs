use crate::error::{BatchError, Result};
use photoroom_common::WorkItem;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// 既定の対象拡張子（大文字小文字は区別しない）
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// フォルダを再帰的にスキャンして画像を列挙する
///
/// 結果は入力ルートからの相対パス順に並ぶ。画像が無くてもエラーにはしない。
pub fn scan_folder(folder: &Path, extensions: &[&str]) -> Result<Vec<WorkItem>> {
    if !folder.is_dir() {
        return Err(BatchError::InputNotFound(folder.display().to_string()));
    }

    let mut found: Vec<(PathBuf, WorkItem)> = Vec::new();

    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !entry.file_type().is_file() || !has_extension(path, extensions) {
            continue;
        }

        let relative = path.strip_prefix(folder).unwrap_or(path).to_path_buf();
        let relative_dir = relative
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        found.push((relative, WorkItem::from_path(path, relative_dir)));
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(found.into_iter().map(|(_, item)| item).collect())
}

/// 単一ファイルを作業単位にする
pub fn single_file(path: &Path) -> Result<WorkItem> {
    if !path.is_file() {
        return Err(BatchError::InputNotFound(path.display().to_string()));
    }
    Ok(WorkItem::from_path(path, PathBuf::new()))
}

/// 先頭から `limit` 件だけ残す（お試し実行用）
pub fn take_sample(mut items: Vec<WorkItem>, limit: Option<usize>) -> Vec<WorkItem> {
    if let Some(limit) = limit {
        if items.len() > limit {
            info!(total = items.len(), limit, "先頭の画像のみ処理します");
            items.truncate(limit);
        }
    }
    items
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}
