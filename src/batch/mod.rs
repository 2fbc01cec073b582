//! バッチ処理
//!
//! 入力を `batch_size` 件ずつのグループに分け、グループ内は
//! `concurrency` 件まで並行に「編集 → 商品検索 → アップロード」を流す。
//! グループ間には待ち時間を入れる。1件の失敗が他の件を止めることはない。

use crate::error::BatchError;
use crate::photoroom::ImageEditor;
use crate::shopify::Catalog;
use futures::future::join_all;
use indicatif::ProgressBar;
use photoroom_common::{
    extract_key, BatchSummary, EditRequestConfig, FailureKind, OperationOutcome, OutputFormat,
    WorkItem,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 実行オプション
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 1グループの件数
    pub batch_size: usize,
    /// グループ内の同時実行数
    pub concurrency: usize,
    /// グループ間の待ち時間
    pub group_delay: Duration,
    pub output_dir: PathBuf,
    /// 402 を受けたら以降の件を送信しない
    pub halt_on_quota: bool,
    /// 商品検索だけ行い、編集・アップロード・書き出しはしない
    pub dry_run: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            concurrency: 3,
            group_delay: Duration::from_secs(1),
            output_dir: PathBuf::from("output"),
            halt_on_quota: true,
            dry_run: false,
        }
    }
}

/// 実行結果
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// 入力順の結果
    pub outcomes: Vec<OperationOutcome>,
    pub summary: BatchSummary,
    /// 各グループの件数
    pub group_sizes: Vec<usize>,
    /// 利用上限で途中停止したか
    pub halted: bool,
}

impl BatchReport {
    /// 失敗が1件でもあれば 1
    pub fn exit_code(&self) -> u8 {
        if self.summary.has_failures() {
            1
        } else {
            0
        }
    }
}

/// 先頭から `batch_size` 件ずつに分割
pub fn partition<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}

/// 出力先: `output_dir/相対ディレクトリ/元の名前.拡張子`
pub fn destination_for(item: &WorkItem, output_dir: &Path, format: OutputFormat) -> PathBuf {
    output_dir
        .join(&item.relative_dir)
        .join(format!("{}.{}", item.stem(), format.extension()))
}

/// 入力順に出力先を割り当てる
///
/// 同じ出力先になる2件目以降は `名前_2.拡張子`, `名前_3.拡張子` … とする。
/// 大文字小文字だけが違う名前も衝突として扱う。
pub fn assign_destinations(items: &[WorkItem], output_dir: &Path, format: OutputFormat) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    items
        .iter()
        .map(|item| {
            let base = destination_for(item, output_dir, format);
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.to_string_lossy().to_lowercase()) {
                candidate = base.with_file_name(format!("{}_{}.{}", item.stem(), n, format.extension()));
                n += 1;
            }
            if candidate != base {
                warn!(
                    file = %item.source_path,
                    output = %candidate.display(),
                    "出力先が重複するため名前を変更"
                );
            }
            candidate
        })
        .collect()
}

/// 1回の `run` の間だけ有効な状態
struct RunState {
    semaphore: Semaphore,
    halted: AtomicBool,
}

pub struct Pipeline {
    editor: Option<Arc<dyn ImageEditor>>,
    catalog: Option<Arc<dyn Catalog>>,
    config: EditRequestConfig,
    options: BatchOptions,
    progress: ProgressBar,
}

impl Pipeline {
    /// `editor` が無ければ入力ファイルをそのままアップロードする。
    /// `catalog` が無ければ編集のみ。ドライランはどちらも無くてよい。
    pub fn new(
        editor: Option<Arc<dyn ImageEditor>>,
        catalog: Option<Arc<dyn Catalog>>,
        config: EditRequestConfig,
        options: BatchOptions,
    ) -> crate::error::Result<Self> {
        if editor.is_none() && catalog.is_none() && !options.dry_run {
            return Err(BatchError::Config(
                "編集もアップロードも設定されていません".into(),
            ));
        }
        Ok(Self {
            editor,
            catalog,
            config,
            options,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// 全件を処理して集計する
    pub async fn run(&self, items: &[WorkItem]) -> BatchReport {
        let started = Instant::now();
        let destinations =
            assign_destinations(items, &self.options.output_dir, self.config.output_format());
        let jobs: Vec<(&WorkItem, PathBuf)> = items.iter().zip(destinations).collect();
        let groups = partition(&jobs, self.options.batch_size);
        let group_sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        let state = RunState {
            semaphore: Semaphore::new(self.options.concurrency.max(1)),
            halted: AtomicBool::new(false),
        };
        let mut outcomes = Vec::with_capacity(items.len());

        self.progress.set_length(items.len() as u64);
        info!(
            total = items.len(),
            groups = groups.len(),
            concurrency = self.options.concurrency,
            dry_run = self.options.dry_run,
            "バッチ処理を開始"
        );

        for (index, group) in groups.iter().enumerate() {
            if index > 0 && !self.options.group_delay.is_zero() && !self.is_halted(&state) {
                info!(
                    group = index + 1,
                    delay_ms = self.options.group_delay.as_millis() as u64,
                    "次のグループまで待機"
                );
                tokio::time::sleep(self.options.group_delay).await;
            }

            let results = join_all(
                group
                    .iter()
                    .map(|(item, destination)| self.dispatch(&state, item, destination)),
            )
            .await;
            outcomes.extend(results);
        }

        self.progress.finish_and_clear();
        let summary = BatchSummary::from_outcomes(&outcomes, started.elapsed());
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "バッチ処理が完了"
        );

        BatchReport {
            outcomes,
            summary,
            group_sizes,
            halted: self.is_halted(&state),
        }
    }

    fn is_halted(&self, state: &RunState) -> bool {
        self.options.halt_on_quota && state.halted.load(Ordering::SeqCst)
    }

    async fn dispatch(&self, state: &RunState, item: &WorkItem, destination: &Path) -> OperationOutcome {
        let outcome = match state.semaphore.acquire().await {
            // 枠を得た時点で停止済みなら送らない
            Ok(_permit) if self.is_halted(state) => {
                OperationOutcome::skipped(item.clone(), "利用上限に達したため未実行")
            }
            Ok(_permit) => self.process(state, item, destination).await,
            Err(_) => OperationOutcome::skipped(item.clone(), "処理が中断されました"),
        };

        self.progress.set_message(item.display_name.clone());
        self.progress.inc(1);
        outcome
    }

    /// 1件分（失敗はすべて結果に変換する）
    async fn process(&self, state: &RunState, item: &WorkItem, destination: &Path) -> OperationOutcome {
        if self.options.dry_run {
            return self.preview(item).await;
        }

        let Some(editor) = &self.editor else {
            // アップロードのみ
            let source = PathBuf::from(&item.source_path);
            return self.upload(item, None, &source).await;
        };

        match editor.edit(item, &self.config, destination).await {
            Ok(output) => {
                if self.catalog.is_some() {
                    let path = output.path.clone();
                    self.upload(item, Some(output.path), &path).await
                } else {
                    OperationOutcome::edited(item.clone(), output.path)
                }
            }
            Err(e) => {
                if e.is_quota_exceeded() && self.options.halt_on_quota {
                    if !state.halted.swap(true, Ordering::SeqCst) {
                        error!("Photoroom APIの利用上限に達しました。以降の画像は送信しません");
                    }
                }
                error!(file = %item.source_path, stage = "edit", "編集に失敗: {}", e);
                OperationOutcome::edit_failed(item.clone(), e.failure_kind(), e.to_string())
            }
        }
    }

    async fn upload(&self, item: &WorkItem, output: Option<PathBuf>, path: &Path) -> OperationOutcome {
        let Some(catalog) = &self.catalog else {
            return OperationOutcome::skipped(item.clone(), "アップロード先が設定されていません");
        };

        let key = extract_key(&item.display_name);
        let record = match catalog.find_by_key(&key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(file = %item.source_path, key = %key, "一致する商品がないためアップロードしません");
                return OperationOutcome::not_found(item.clone(), output, &key);
            }
            Err(e) => return self.upload_error(item, output, e),
        };

        match catalog.upload_image(&record, path).await {
            Ok(attachment_id) => OperationOutcome::uploaded(item.clone(), output, attachment_id),
            Err(e) => self.upload_error(item, output, e),
        }
    }

    fn upload_error(&self, item: &WorkItem, output: Option<PathBuf>, e: BatchError) -> OperationOutcome {
        error!(file = %item.source_path, stage = "upload", "アップロードに失敗: {}", e);
        let kind = match e.failure_kind() {
            FailureKind::Other | FailureKind::Io => FailureKind::UploadFailed,
            kind => kind,
        };
        OperationOutcome::upload_failed(item.clone(), output, kind, e.to_string())
    }

    /// ドライラン: 照合キーの確認と商品検索のみ
    async fn preview(&self, item: &WorkItem) -> OperationOutcome {
        let key = extract_key(&item.display_name);
        let Some(catalog) = &self.catalog else {
            info!(file = %item.display_name, key = %key, "[dry-run] 送信せずにスキップ");
            return OperationOutcome::skipped(item.clone(), format!("dry-run: 照合キー {}", key));
        };

        match catalog.find_by_key(&key).await {
            Ok(Some(record)) => {
                info!(file = %item.display_name, key = %key, product = %record.title, "[dry-run] 商品が見つかりました");
                OperationOutcome::skipped(
                    item.clone(),
                    format!("dry-run: {} ({})", record.title, record.id),
                )
            }
            Ok(None) => OperationOutcome::not_found(item.clone(), None, &key),
            Err(e) => self.upload_error(item, None, e),
        }
    }
}
