use crate::error::{BatchError, Result};
use crate::retry::RetryPolicy;
use photoroom_common::ApiTier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_API_KEY: &str = "PHOTOROOM_API_KEY";
pub const ENV_SANDBOX_API_KEY: &str = "PHOTOROOM_SANDBOX_API_KEY";
pub const ENV_SHOPIFY_STORE: &str = "SHOPIFY_STORE";
pub const ENV_SHOPIFY_TOKEN: &str = "SHOPIFY_ACCESS_TOKEN";

/// 接続・読み取りタイムアウト（秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub connect_secs: u64,
    pub read_secs: u64,
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub sandbox_api_key: Option<String>,
    pub tier: ApiTier,
    pub shopify_store: Option<String>,
    pub shopify_access_token: Option<String>,
    pub shopify_api_version: String,
    pub default_batch_size: usize,
    pub default_concurrency: usize,
    /// グループ間の待ち時間（秒）
    pub batch_delay_seconds: f64,
    pub retry_max_attempts: u32,
    pub retry_initial_delay_seconds: f64,
    pub retry_backoff_factor: f64,
    pub edit_timeout: Timeouts,
    pub lookup_timeout: Timeouts,
    pub upload_timeout: Timeouts,
    /// これを超えるアップロードは警告する（送信は止めない）
    pub max_upload_bytes: u64,
    /// 商品検索で取得する件数（2以上で重複を警告できる）
    pub lookup_max_matches: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = serde_json::to_string_pretty(self)?;
        crate::output::write_atomic(&config_path, content.as_bytes())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| BatchError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("photoroom-batch").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            api_key: None,
            sandbox_api_key: None,
            tier: ApiTier::Plus,
            shopify_store: None,
            shopify_access_token: None,
            shopify_api_version: crate::shopify::DEFAULT_API_VERSION.into(),
            default_batch_size: 5,
            default_concurrency: 3,
            batch_delay_seconds: 1.0,
            retry_max_attempts: 3,
            retry_initial_delay_seconds: 2.0,
            retry_backoff_factor: 2.0,
            edit_timeout: Timeouts { connect_secs: 10, read_secs: 60 },
            lookup_timeout: Timeouts { connect_secs: 5, read_secs: 30 },
            upload_timeout: Timeouts { connect_secs: 5, read_secs: 60 },
            max_upload_bytes: 20 * 1024 * 1024,
            lookup_max_matches: crate::shopify::DEFAULT_MAX_MATCHES,
        }
    }

    /// Photoroom APIキー（環境変数を優先）
    pub fn get_api_key(&self, sandbox: bool) -> Result<String> {
        if sandbox {
            env_or(ENV_SANDBOX_API_KEY, &self.sandbox_api_key)
                .ok_or_else(|| BatchError::MissingCredential(ENV_SANDBOX_API_KEY.into()))
        } else {
            env_or(ENV_API_KEY, &self.api_key)
                .ok_or_else(|| BatchError::MissingCredential(ENV_API_KEY.into()))
        }
    }

    /// Shopifyのストアとトークン。どちらも無ければ `None`（編集のみ）
    ///
    /// 引数（コマンドライン指定）、環境変数、設定ファイルの順に優先する。
    pub fn get_shopify_credentials(
        &self,
        store: Option<String>,
        token: Option<String>,
    ) -> Result<Option<(String, String)>> {
        let store = store.or_else(|| env_or(ENV_SHOPIFY_STORE, &self.shopify_store));
        let token = token.or_else(|| env_or(ENV_SHOPIFY_TOKEN, &self.shopify_access_token));
        match (store, token) {
            (Some(store), Some(token)) => Ok(Some((store, token))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(BatchError::MissingCredential(ENV_SHOPIFY_TOKEN.into())),
            (None, Some(_)) => Err(BatchError::MissingCredential(ENV_SHOPIFY_STORE.into())),
        }
    }

    /// 再試行ポリシー（不正な値は実行前に設定エラー）
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let policy = RetryPolicy::new(
            self.retry_max_attempts,
            seconds("retry_initial_delay_seconds", self.retry_initial_delay_seconds)?,
            self.retry_backoff_factor,
        );
        policy.validate().map_err(BatchError::Config)?;
        Ok(policy)
    }

    pub fn batch_delay(&self) -> Result<Duration> {
        seconds("batch_delay_seconds", self.batch_delay_seconds)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_sandbox_api_key(&mut self, key: String) -> Result<()> {
        self.sandbox_api_key = Some(key);
        self.save()
    }

    pub fn set_shopify_store(&mut self, store: String) -> Result<()> {
        self.shopify_store = Some(store);
        self.save()
    }

    pub fn set_shopify_token(&mut self, token: String) -> Result<()> {
        self.shopify_access_token = Some(token);
        self.save()
    }
}

/// 秒数を `Duration` に変換する（負数・NaN・無限大・桁あふれは設定エラー）
pub fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| BatchError::Config(format!("{} の秒数が不正です: {}", name, value)))
}

fn env_or(name: &str, stored: &Option<String>) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| stored.clone().filter(|v| !v.trim().is_empty()))
}

/// 表示用に秘密情報を伏せる
pub fn mask(secret: &Option<String>) -> String {
    match secret {
        Some(s) if s.chars().count() > 8 => {
            let head: String = s.chars().take(4).collect();
            format!("{}…（設定済み）", head)
        }
        Some(_) => "設定済み".into(),
        None => "未設定".into(),
    }
}
