//! 結果の表示とCSV出力

use crate::batch::BatchReport;
use crate::error::Result;
use crate::output::write_atomic_with;
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use photoroom_common::{OperationOutcome, Stage};
use std::io::Write;
use std::path::{Path, PathBuf};

const CSV_HEADER: &[&str] = &["file", "stage", "failure", "detail", "output", "attachment"];

/// `batch_results_YYYYmmddHHMMSS.csv`
pub fn result_csv_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("batch_results_{}.csv", now.format("%Y%m%d%H%M%S")))
}

/// 1件1行で結果を書き出す
pub fn write_result_csv(path: &Path, outcomes: &[OperationOutcome]) -> Result<()> {
    write_atomic_with(path, |file| {
        let mut out = std::io::BufWriter::new(file);
        writeln!(out, "{}", CSV_HEADER.join(","))?;
        for outcome in outcomes {
            writeln!(out, "{}", csv_row(outcome))?;
        }
        out.flush()
    })
}

fn csv_row(outcome: &OperationOutcome) -> String {
    let failure = outcome.failure.map(|f| f.to_string()).unwrap_or_default();
    let output = outcome
        .output_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    [
        outcome.item.source_path.as_str(),
        outcome.stage.to_string().as_str(),
        failure.as_str(),
        outcome.error_detail.as_deref().unwrap_or(""),
        output.as_str(),
        outcome.attachment_id().unwrap_or(""),
    ]
    .iter()
    .map(|field| escape_csv(field))
    .collect::<Vec<_>>()
    .join(",")
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 件数サマリーを表示（0件の段階も含めて全段階を出す）
pub fn print_summary(report: &BatchReport) {
    let summary = &report.summary;
    println!("\n📊 処理結果");
    println!("  合計: {}", summary.total);
    println!("  成功: {}", summary.succeeded);
    println!("  失敗: {}", summary.failed);
    println!("  スキップ: {}", summary.skipped);
    for stage in Stage::ALL {
        println!("    {:<16} {}", stage.to_string(), summary.count(stage));
    }
    println!("  所要時間: {:.1}秒", summary.elapsed.as_secs_f64());

    if report.halted {
        println!("\n⚠ 利用上限に達したため途中で停止しました");
    }

    let failures: Vec<_> = report.outcomes.iter().filter(|o| o.stage.is_failure()).collect();
    if !failures.is_empty() {
        println!("\n✗ 失敗した画像:");
        for outcome in failures {
            println!(
                "  {} [{}] {}",
                outcome.item.source_path,
                outcome.failure.map(|f| f.to_string()).unwrap_or_default(),
                outcome.error_detail.as_deref().unwrap_or("")
            );
        }
    }
}

/// 進捗バー（端末でなければ表示しない）
pub fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr());
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
