//! プリセット比較のテスト

mod support;

use photoroom_batch::compare::{run_presets, select_presets};
use photoroom_common::{ApiTier, FailureKind, Stage};
use support::{create_inputs, EditBehavior, FakeEditor};
use tempfile::tempdir;

/// 各プリセットの結果を `名前_プリセット.拡張子` に保存する
#[tokio::test]
async fn test_each_preset_gets_own_output() {
    let dir = tempdir().unwrap();
    let items = create_inputs(dir.path(), &["5991234.jpg"]);
    let out = dir.path().join("compare");
    let editor = FakeEditor::succeeding();
    let presets = select_presets(&["white".into(), "transparent".into(), "square".into()]).unwrap();

    let report = run_presets(&editor, &items[0], &presets, ApiTier::Plus, &out).await;

    assert_eq!(editor.calls(), 3);
    assert_eq!(report.summary.succeeded, 3);
    assert!(out.join("5991234_white.webp").is_file());
    assert!(out.join("5991234_transparent.png").is_file());
    assert!(out.join("5991234_square.webp").is_file());
}

/// basicプランでは上位プラン専用のプリセットを送らない
#[tokio::test]
async fn test_plus_presets_skipped_on_basic_tier() {
    let dir = tempdir().unwrap();
    let items = create_inputs(dir.path(), &["a.jpg"]);
    let out = dir.path().join("compare");
    let editor = FakeEditor::succeeding();
    let presets = select_presets(&["white".into(), "upscale".into()]).unwrap();

    let report = run_presets(&editor, &items[0], &presets, ApiTier::Basic, &out).await;

    assert_eq!(editor.calls(), 1);
    assert_eq!(report.outcomes[0].stage, Stage::EditSucceeded);
    assert_eq!(report.outcomes[1].stage, Stage::Skipped);
    assert!(!out.join("a_upscale.webp").exists());
    assert_eq!(report.exit_code(), 0);
}

/// 402の後は残りのプリセットを送らない
#[tokio::test]
async fn test_quota_stops_remaining_presets() {
    let dir = tempdir().unwrap();
    let items = create_inputs(dir.path(), &["a.jpg"]);
    let editor = FakeEditor::succeeding().on("a.jpg", EditBehavior::Quota);
    let presets = select_presets(&[]).unwrap();

    let report = run_presets(&editor, &items[0], &presets, ApiTier::Plus, dir.path()).await;

    assert!(report.halted);
    assert_eq!(editor.calls(), 1);
    assert_eq!(report.outcomes.len(), presets.len());
    assert_eq!(report.outcomes[0].failure, Some(FailureKind::QuotaExceeded));
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.skipped, presets.len() - 1);
    assert_eq!(report.exit_code(), 1);
}
