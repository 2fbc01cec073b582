use crate::error::{BatchError, Result};
use crate::resize::{parse_color, ResizeSpec};
use clap::{Args, Parser, Subcommand};
use photoroom_common::{find_preset, ApiTier, EditRequestConfig, OutputFormat, OutputSize};
use std::path::PathBuf;

/// 全件成功（未実行・商品なしを含む）
pub const EXIT_OK: u8 = 0;
/// 1件以上失敗
pub const EXIT_ITEM_FAILURES: u8 = 1;
/// 実行前の致命的エラー（入力なし・認証情報なしなど）
pub const EXIT_FATAL: u8 = 2;
/// 対象画像が0件
pub const EXIT_NO_INPUT: u8 = 3;

#[derive(Parser)]
#[command(name = "photoroom-batch", version)]
#[command(about = "Photoroom APIで商品写真を一括加工し、Shopifyの商品画像に登録するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力（レスポンスヘッダーを含む）
    #[arg(long, global = true)]
    pub debug: bool,

    /// ログファイル（追記）
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像を加工（Shopify設定があればアップロードも行う）
    Process(ProcessArgs),

    /// 加工済み画像をShopifyにアップロード
    Upload(UploadArgs),

    /// バーコードから商品を検索
    Lookup {
        /// バーコード（ファイル名でも可）
        #[arg(required = true)]
        barcode: String,

        #[command(flatten)]
        shopify: ShopifyArgs,
    },

    /// プリセット一覧を表示
    Presets,

    /// 1枚の画像を複数のプリセットで加工して見比べる
    Compare(CompareArgs),

    /// 対話的に1枚ずつ加工
    Interactive {
        /// 初期選択するプリセット
        #[arg(long)]
        preset: Option<String>,

        #[command(flatten)]
        photoroom: PhotoroomArgs,
    },

    /// 設定を表示/編集
    Config {
        /// Photoroom APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// サンドボックス用APIキーを設定
        #[arg(long)]
        set_sandbox_key: Option<String>,

        /// Shopifyストア（example.myshopify.com）を設定
        #[arg(long)]
        set_shopify_store: Option<String>,

        /// Shopifyアクセストークンを設定
        #[arg(long)]
        set_shopify_token: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// 入力フォルダ（サブフォルダも対象）
    #[arg(short, long, conflicts_with_all = ["input_file", "image_url"])]
    pub input_dir: Option<PathBuf>,

    /// 入力ファイル
    #[arg(long, conflicts_with = "image_url")]
    pub input_file: Option<PathBuf>,

    /// 画像URL（複数指定可）
    #[arg(long)]
    pub image_url: Vec<String>,

    /// 出力フォルダ
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// 対象拡張子（複数指定可、デフォルト: jpg/jpeg/png/webp）
    #[arg(long)]
    pub extension: Vec<String>,

    #[command(flatten)]
    pub edit: EditArgs,

    #[command(flatten)]
    pub photoroom: PhotoroomArgs,

    #[command(flatten)]
    pub batch: BatchArgs,

    #[command(flatten)]
    pub shopify: ShopifyArgs,

    /// Shopifyへアップロードしない
    #[arg(long)]
    pub no_upload: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// 加工済み画像のフォルダ
    #[arg(short, long, required = true)]
    pub input_dir: PathBuf,

    /// 対象拡張子（複数指定可）
    #[arg(long)]
    pub extension: Vec<String>,

    #[command(flatten)]
    pub batch: BatchArgs,

    #[command(flatten)]
    pub shopify: ShopifyArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// 入力ファイル
    #[arg(short, long)]
    pub input_file: PathBuf,

    /// 出力フォルダ
    #[arg(short, long, default_value = "compare")]
    pub output_dir: PathBuf,

    /// 使うプリセット（複数指定可、省略時は全プリセット）
    #[arg(short, long)]
    pub preset: Vec<String>,

    /// 背景画像
    #[arg(long = "bg-image")]
    pub background_image: Option<PathBuf>,

    #[command(flatten)]
    pub photoroom: PhotoroomArgs,
}

/// 編集オプション（プリセットに上書きする）
#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// プリセット（`presets` で一覧表示）
    #[arg(short, long)]
    pub preset: Option<String>,

    /// 背景色（例: FFFFFF, transparent）
    #[arg(long)]
    pub background_color: Option<String>,

    /// 出力形式 (png/jpg/webp)
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// 品質 (1-100)
    #[arg(short, long)]
    pub quality: Option<u8>,

    /// 出力サイズ（例: 1600x2000, originalImage）
    #[arg(long)]
    pub output_size: Option<OutputSize>,

    /// 保存前にリサイズして余白を付ける（例: 1600x2000）
    #[arg(long)]
    pub resize: Option<ResizeSpec>,

    /// 余白の色（例: F2F2F2）
    #[arg(long, requires = "resize")]
    pub pad_color: Option<String>,

    /// 背景画像（入力画像と一緒に送る）
    #[arg(long = "bg-image")]
    pub background_image: Option<PathBuf>,
}

impl EditArgs {
    /// プリセットにフラグを重ねた設定
    pub fn edit_config(&self) -> Result<EditRequestConfig> {
        let mut config = match &self.preset {
            Some(name) => find_preset(name)
                .map(|p| p.config())
                .ok_or_else(|| BatchError::Config(format!("不明なプリセット: {}", name)))?,
            None => EditRequestConfig::default(),
        };

        if let Some(color) = &self.background_color {
            config.background_color = Some(color.clone());
        }
        if let Some(format) = self.format {
            config.format = Some(format);
        }
        if let Some(quality) = self.quality {
            config.quality = Some(quality);
        }
        if let Some(size) = &self.output_size {
            config.output_size = Some(size.clone());
        }
        Ok(config)
    }

    pub fn resize_spec(&self) -> Result<Option<ResizeSpec>> {
        let Some(mut spec) = self.resize else {
            return Ok(None);
        };
        if let Some(color) = &self.pad_color {
            spec.background = parse_color(color).map_err(BatchError::Config)?;
        }
        Ok(Some(spec))
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct PhotoroomArgs {
    /// APIプラン (basic/plus)
    #[arg(long)]
    pub tier: Option<ApiTier>,

    /// Photoroom APIキー（省略時は設定・環境変数）
    #[arg(long)]
    pub api_key: Option<String>,

    /// サンドボックス用キーを使う
    #[arg(long)]
    pub sandbox: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// グループあたりの件数
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// 同時実行数
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// グループ間の待ち時間（秒）
    #[arg(long)]
    pub delay: Option<f64>,

    /// 商品検索とログ出力のみ（送信・保存しない）
    #[arg(long)]
    pub dry_run: bool,

    /// 先頭から指定件数だけ処理する
    #[arg(long)]
    pub limit: Option<usize>,

    /// 結果CSVの出力先（デフォルト: 出力フォルダ/batch_results_日時.csv）
    #[arg(long)]
    pub result_csv: Option<PathBuf>,

    /// 結果CSVを出力しない
    #[arg(long, conflicts_with = "result_csv")]
    pub no_result_csv: bool,

    /// 402（利用上限）を受けても残りの送信を続ける
    #[arg(long)]
    pub keep_going_on_quota: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShopifyArgs {
    /// Shopifyストア（example.myshopify.com）
    #[arg(long)]
    pub shopify_store: Option<String>,

    /// Shopifyアクセストークン
    #[arg(long)]
    pub shopify_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process() {
        let cli = Cli::parse_from([
            "photoroom-batch",
            "process",
            "--input-dir",
            "photos",
            "--preset",
            "shopify",
            "--format",
            "webp",
            "--batch-size",
            "3",
            "--dry-run",
        ]);
        let Commands::Process(args) = cli.command else {
            panic!("process expected");
        };
        assert_eq!(args.input_dir, Some(PathBuf::from("photos")));
        assert_eq!(args.batch.batch_size, Some(3));
        assert!(args.batch.dry_run);

        let config = args.edit.edit_config().unwrap();
        assert_eq!(config.format, Some(OutputFormat::Webp));
        assert_eq!(config.shadow_mode.as_deref(), Some("ai.soft"));
    }

    #[test]
    fn test_unknown_preset() {
        let args = EditArgs {
            preset: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(args.edit_config(), Err(BatchError::Config(_))));
    }

    #[test]
    fn test_resize_with_pad_color() {
        let args = EditArgs {
            resize: Some("100x200".parse().unwrap()),
            pad_color: Some("#FFFFFF".into()),
            ..Default::default()
        };
        let spec = args.resize_spec().unwrap().unwrap();
        assert_eq!((spec.width, spec.height), (100, 200));
        assert_eq!(spec.background, [255, 255, 255, 255]);
    }

    #[test]
    fn test_parse_limit_and_background_image() {
        let cli = Cli::parse_from([
            "photoroom-batch",
            "process",
            "--input-dir",
            "photos",
            "--limit",
            "5",
            "--bg-image",
            "studio.png",
        ]);
        let Commands::Process(args) = cli.command else {
            panic!("process expected");
        };
        assert_eq!(args.batch.limit, Some(5));
        assert_eq!(args.edit.background_image, Some(PathBuf::from("studio.png")));
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::parse_from([
            "photoroom-batch",
            "compare",
            "-i",
            "shoe.jpg",
            "-p",
            "white",
            "-p",
            "square",
            "--tier",
            "basic",
        ]);
        let Commands::Compare(args) = cli.command else {
            panic!("compare expected");
        };
        assert_eq!(args.input_file, PathBuf::from("shoe.jpg"));
        assert_eq!(args.preset, vec!["white", "square"]);
        assert_eq!(args.output_dir, PathBuf::from("compare"));
        assert_eq!(args.photoroom.tier, Some(ApiTier::Basic));
    }

    #[test]
    fn test_input_conflicts() {
        let result = Cli::try_parse_from([
            "photoroom-batch",
            "process",
            "--input-dir",
            "a",
            "--input-file",
            "b.jpg",
        ]);
        assert!(result.is_err());
    }
}
