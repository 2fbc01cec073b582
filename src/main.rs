use clap::Parser;
use photoroom_batch::{
    batch, cli, compare, config, error, http, interactive, logging, photoroom, report, scanner, shopify,
};
use cli::{BatchArgs, Cli, Commands, CompareArgs, PhotoroomArgs, ProcessArgs, ShopifyArgs, UploadArgs};
use config::Config;
use error::{BatchError, Result};
use photoroom_common::{extract_key, ApiTier, EditRequestConfig, ImageSource, WorkItem, PRESETS};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.debug, cli.log_file.as_deref()) {
        eprintln!("✗ ログの初期化に失敗しました: {}", e);
        return ExitCode::from(cli::EXIT_FATAL);
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("✗ {}", e);
            ExitCode::from(match e {
                BatchError::NoImagesFound(_) => cli::EXIT_NO_INPUT,
                _ => cli::EXIT_FATAL,
            })
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load()?;

    match cli.command {
        Commands::Process(args) => process(args, &config).await,
        Commands::Upload(args) => upload(args, &config).await,
        Commands::Lookup { barcode, shopify } => lookup(&barcode, &shopify, &config).await,
        Commands::Presets => {
            println!("プリセット一覧:");
            for preset in PRESETS {
                let plus = if preset.requires_plus() { " [plus]" } else { "" };
                println!("  {:<14} {}{}", preset.name, preset.description, plus);
            }
            Ok(cli::EXIT_OK)
        }
        Commands::Compare(args) => compare_presets(args, &config).await,
        Commands::Interactive { preset, photoroom } => {
            println!("🖼 photoroom-batch - 対話モード\n");
            let client = photoroom_client(&photoroom, &config, None, None)?;
            interactive::run_interactive(&client, preset.as_deref()).await?;
            Ok(cli::EXIT_OK)
        }
        Commands::Config {
            set_api_key,
            set_sandbox_key,
            set_shopify_store,
            set_shopify_token,
            show,
        } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }
            if let Some(key) = set_sandbox_key {
                config.set_sandbox_api_key(key)?;
                println!("✔ サンドボックス用APIキーを設定しました");
            }
            if let Some(store) = set_shopify_store {
                config.set_shopify_store(store)?;
                println!("✔ Shopifyストアを設定しました");
            }
            if let Some(token) = set_shopify_token {
                config.set_shopify_token(token)?;
                println!("✔ Shopifyアクセストークンを設定しました");
            }

            if show {
                println!("設定 ({}):", Config::config_path()?.display());
                println!("  APIキー: {}", config::mask(&config.api_key));
                println!("  サンドボックスキー: {}", config::mask(&config.sandbox_api_key));
                println!("  プラン: {}", config.tier);
                println!("  Shopifyストア: {}", config.shopify_store.as_deref().unwrap_or("未設定"));
                println!("  Shopifyトークン: {}", config::mask(&config.shopify_access_token));
                println!("  Shopify APIバージョン: {}", config.shopify_api_version);
                println!("  バッチサイズ: {}", config.default_batch_size);
                println!("  同時実行数: {}", config.default_concurrency);
                println!("  グループ間待機: {}秒", config.batch_delay_seconds);
                println!(
                    "  再試行: {}回 (初回{}秒, x{})",
                    config.retry_max_attempts,
                    config.retry_initial_delay_seconds,
                    config.retry_backoff_factor
                );
            }
            Ok(cli::EXIT_OK)
        }
    }
}

async fn process(args: ProcessArgs, config: &Config) -> Result<u8> {
    println!("🚀 photoroom-batch - 一括処理{}\n", if args.batch.dry_run { " (dry-run)" } else { "" });

    // 入力・認証情報の確認は送信前に済ませる
    let edit_config = args.edit.edit_config()?;
    let resize = args.edit.resize_spec()?;
    let extensions = extensions_or_default(&args.extension);

    println!("[1/3] 入力をスキャン中...");
    let items = if let Some(dir) = &args.input_dir {
        scanner::scan_folder(dir, &extensions)?
    } else if let Some(file) = &args.input_file {
        vec![scanner::single_file(file)?]
    } else if !args.image_url.is_empty() {
        args.image_url.iter().map(|url| WorkItem::from_url(url)).collect()
    } else {
        return Err(BatchError::Config(
            "--input-dir / --input-file / --image-url のいずれかを指定してください".into(),
        ));
    };
    let items = scanner::take_sample(items, args.batch.limit);
    if items.is_empty() {
        return Err(BatchError::NoImagesFound(
            args.input_dir.as_ref().map(|d| d.display().to_string()).unwrap_or_default(),
        ));
    }
    println!("✔ {}枚の画像を検出\n", items.len());

    let editor: Option<Arc<dyn photoroom::ImageEditor>> = if args.batch.dry_run {
        None
    } else {
        let client = photoroom_client(
            &args.photoroom,
            config,
            resize,
            args.edit.background_image.clone(),
        )?;
        edit_config.validate_for(client.tier())?;
        if client.tier() == ApiTier::Basic
            && items.iter().any(|item| matches!(item.source(), ImageSource::Remote(_)))
        {
            return Err(BatchError::Config(
                "basic プランでは --image-url を使用できません（plus プランが必要です）".into(),
            ));
        }
        Some(Arc::new(client))
    };
    let catalog: Option<Arc<dyn shopify::Catalog>> = if args.no_upload {
        None
    } else {
        shopify_client(&args.shopify, config)?.map(|c| Arc::new(c) as Arc<dyn shopify::Catalog>)
    };
    if catalog.is_none() {
        println!("- Shopify設定なし: 加工のみ行います");
    }

    println!("[2/3] 処理中...");
    let options = batch_options(&args.batch, config, &args.output_dir)?;
    let pipeline = batch::Pipeline::new(editor, catalog, edit_config, options)?;
    let pipeline = pipeline.with_progress(report::progress_bar(items.len() as u64));
    let result = pipeline.run(&items).await;

    println!("[3/3] 結果を出力中...");
    finish(&result, &args.batch, &args.output_dir)
}

async fn upload(args: UploadArgs, config: &Config) -> Result<u8> {
    println!("📤 photoroom-batch - アップロード{}\n", if args.batch.dry_run { " (dry-run)" } else { "" });

    let catalog = shopify_client(&args.shopify, config)?.ok_or_else(|| {
        BatchError::MissingCredential(format!("{} / {}", config::ENV_SHOPIFY_STORE, config::ENV_SHOPIFY_TOKEN))
    })?;

    let items = scanner::scan_folder(&args.input_dir, &extensions_or_default(&args.extension))?;
    let items = scanner::take_sample(items, args.batch.limit);
    if items.is_empty() {
        return Err(BatchError::NoImagesFound(args.input_dir.display().to_string()));
    }
    println!("✔ {}枚の画像を検出\n", items.len());

    let pipeline = batch::Pipeline::new(
        None,
        Some(Arc::new(catalog)),
        EditRequestConfig::default(),
        batch_options(&args.batch, config, &args.input_dir)?,
    )?
    .with_progress(report::progress_bar(items.len() as u64));
    let result = pipeline.run(&items).await;

    finish(&result, &args.batch, &args.input_dir)
}

async fn compare_presets(args: CompareArgs, config: &Config) -> Result<u8> {
    println!("🎨 photoroom-batch - プリセット比較\n");

    let item = scanner::single_file(&args.input_file)?;
    let presets = compare::select_presets(&args.preset)?;
    let client = photoroom_client(&args.photoroom, config, None, args.background_image.clone())?;
    println!("✔ {}個のプリセットで加工します ({} プラン)\n", presets.len(), client.tier());

    let result =
        compare::run_presets(&client, &item, &presets, client.tier(), &args.output_dir).await;
    for outcome in &result.outcomes {
        if let Some(path) = &outcome.output_path {
            println!("  ✔ {}", path.display());
        }
    }

    report::print_summary(&result);
    Ok(result.exit_code())
}

async fn lookup(barcode: &str, args: &ShopifyArgs, config: &Config) -> Result<u8> {
    let catalog = shopify_client(args, config)?.ok_or_else(|| {
        BatchError::MissingCredential(format!("{} / {}", config::ENV_SHOPIFY_STORE, config::ENV_SHOPIFY_TOKEN))
    })?;

    let key = extract_key(barcode);
    match shopify::Catalog::find_by_key(&catalog, &key).await? {
        Some(record) => {
            println!("✔ {} ({})", record.title, record.id);
            for image in &record.image_refs {
                println!("  - {} {}", image.id, image.src);
            }
            Ok(cli::EXIT_OK)
        }
        None => {
            println!("一致する商品がありません: {}", key);
            Ok(cli::EXIT_ITEM_FAILURES)
        }
    }
}

fn finish(result: &batch::BatchReport, args: &BatchArgs, output_dir: &Path) -> Result<u8> {
    if !args.no_result_csv && !args.dry_run {
        let path = args
            .result_csv
            .clone()
            .unwrap_or_else(|| report::result_csv_path(output_dir, chrono::Local::now()));
        match report::write_result_csv(&path, &result.outcomes) {
            Ok(()) => println!("✔ 結果CSV: {}", path.display()),
            Err(e) => error!(path = %path.display(), "結果CSVの書き込みに失敗: {}", e),
        }
    }

    report::print_summary(result);
    if result.exit_code() == cli::EXIT_OK {
        println!("\n✅ 完了");
    }
    Ok(result.exit_code())
}

fn photoroom_client(
    args: &PhotoroomArgs,
    config: &Config,
    resize: Option<photoroom_batch::resize::ResizeSpec>,
    background_image: Option<PathBuf>,
) -> Result<photoroom::PhotoroomClient> {
    let api_key = match &args.api_key {
        Some(key) => key.clone(),
        None => config.get_api_key(args.sandbox)?,
    };
    let tier: ApiTier = args.tier.unwrap_or(config.tier);
    let transport = http::ReqwestTransport::new(config.edit_timeout.connect())?;

    if let Some(path) = &background_image {
        if !path.is_file() {
            return Err(BatchError::InputNotFound(path.display().to_string()));
        }
    }

    Ok(photoroom::PhotoroomClient::new(Arc::new(transport), api_key, tier)
        .with_retry(config.retry_policy()?)
        .with_timeout(config.edit_timeout.read())
        .with_resize(resize)
        .with_background_image(background_image))
}

fn shopify_client(args: &ShopifyArgs, config: &Config) -> Result<Option<shopify::ShopifyClient>> {
    let credentials =
        config.get_shopify_credentials(args.shopify_store.clone(), args.shopify_token.clone())?;
    let Some((store, token)) = credentials else {
        return Ok(None);
    };

    let transport = http::ReqwestTransport::new(config.lookup_timeout.connect())?;
    Ok(Some(
        shopify::ShopifyClient::new(Arc::new(transport), store, token)
            .with_api_version(config.shopify_api_version.clone())
            .with_retry(config.retry_policy()?)
            .with_timeouts(config.lookup_timeout.read(), config.upload_timeout.read())
            .with_max_upload_bytes(config.max_upload_bytes)
            .with_max_matches(config.lookup_max_matches),
    ))
}

fn batch_options(args: &BatchArgs, config: &Config, output_dir: &Path) -> Result<batch::BatchOptions> {
    let group_delay = match args.delay {
        Some(delay) => config::seconds("--delay", delay)?,
        None => config.batch_delay()?,
    };

    Ok(batch::BatchOptions {
        batch_size: args.batch_size.unwrap_or(config.default_batch_size),
        concurrency: args.concurrency.unwrap_or(config.default_concurrency),
        group_delay,
        output_dir: output_dir.to_path_buf(),
        halt_on_quota: !args.keep_going_on_quota,
        dry_run: args.dry_run,
    })
}

fn extensions_or_default(extensions: &[String]) -> Vec<&str> {
    if extensions.is_empty() {
        scanner::IMAGE_EXTENSIONS.to_vec()
    } else {
        extensions.iter().map(String::as_str).collect()
    }
}
