//! プリセット比較
//!
//! 1枚の画像を複数のプリセットで加工し、`名前_プリセット.拡張子` として並べて保存する。
//! 仕上がりを見比べてから一括処理のプリセットを決めるために使う。

use crate::batch::BatchReport;
use crate::error::{BatchError, Result};
use crate::photoroom::ImageEditor;
use photoroom_common::{find_preset, ApiTier, BatchSummary, OperationOutcome, Preset, WorkItem, PRESETS};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// 名前からプリセットを選ぶ（空なら全プリセット）
pub fn select_presets(names: &[String]) -> Result<Vec<&'static Preset>> {
    if names.is_empty() {
        return Ok(PRESETS.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            find_preset(name).ok_or_else(|| BatchError::Config(format!("不明なプリセット: {}", name)))
        })
        .collect()
}

/// `output_dir/元の名前_プリセット.拡張子`
pub fn destination_for(item: &WorkItem, preset: &Preset, output_dir: &Path) -> PathBuf {
    let format = preset.config().output_format();
    output_dir.join(format!("{}_{}.{}", item.stem(), preset.name, format.extension()))
}

/// プリセットを順に適用する
///
/// plus 専用のプリセットは basic プランでは送らずにスキップする。
/// 402 を受けたら残りは送らない。
pub async fn run_presets(
    editor: &dyn ImageEditor,
    item: &WorkItem,
    presets: &[&Preset],
    tier: ApiTier,
    output_dir: &Path,
) -> BatchReport {
    let started = Instant::now();
    let mut outcomes = Vec::with_capacity(presets.len());
    let mut halted = false;

    for preset in presets {
        if halted {
            outcomes.push(OperationOutcome::skipped(
                item.clone(),
                format!("{}: 利用上限に達したため未実行", preset.name),
            ));
            continue;
        }

        let config = preset.config();
        if let Err(e) = config.validate_for(tier) {
            warn!(preset = preset.name, "{}", e);
            outcomes.push(OperationOutcome::skipped(
                item.clone(),
                format!("{}: {}", preset.name, e),
            ));
            continue;
        }

        let destination = destination_for(item, preset, output_dir);
        info!(preset = preset.name, output = %destination.display(), "プリセットを適用");
        let outcome = match editor.edit(item, &config, &destination).await {
            Ok(output) => OperationOutcome::edited(item.clone(), output.path),
            Err(e) => {
                halted = e.is_quota_exceeded();
                error!(preset = preset.name, "編集に失敗: {}", e);
                OperationOutcome::edit_failed(
                    item.clone(),
                    e.failure_kind(),
                    format!("{}: {}", preset.name, e),
                )
            }
        };
        outcomes.push(outcome);
    }

    let summary = BatchSummary::from_outcomes(&outcomes, started.elapsed());
    BatchReport {
        group_sizes: if outcomes.is_empty() { Vec::new() } else { vec![outcomes.len()] },
        outcomes,
        summary,
        halted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_presets() {
        assert_eq!(select_presets(&[]).unwrap().len(), PRESETS.len());

        let selected = select_presets(&["white".to_string(), "shopify".to_string()]).unwrap();
        let names: Vec<_> = selected.iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["white", "shopify"]);

        assert!(matches!(
            select_presets(&["nope".to_string()]),
            Err(BatchError::Config(_))
        ));
    }

    #[test]
    fn test_destination_uses_preset_name_and_format() {
        let item = WorkItem::from_path(Path::new("/in/5991234.jpg"), PathBuf::new());
        let white = find_preset("white").unwrap();
        assert_eq!(
            destination_for(&item, white, Path::new("/out")),
            PathBuf::from("/out/5991234_white.webp")
        );
        let transparent = find_preset("transparent").unwrap();
        assert_eq!(
            destination_for(&item, transparent, Path::new("/out")),
            PathBuf::from("/out/5991234_transparent.png")
        );
    }
}
