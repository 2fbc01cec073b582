//! 作業単位とカタログ関連の型定義

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 1枚分の処理単位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// ローカルファイルパスまたは画像URL
    pub source_path: String,
    /// ログ・レポート用の表示名
    pub display_name: String,
    /// 入力ルートからの相対ディレクトリ（出力先の構成に使う）
    #[serde(default)]
    pub relative_dir: PathBuf,
}

/// 画像の取得元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// ローカルファイル（multipartで送信）
    Local(&'a Path),
    /// リモート画像URL（クエリ文字列で渡す）
    Remote(&'a str),
}

impl WorkItem {
    /// ローカルファイルから作成
    pub fn from_path(path: &Path, relative_dir: PathBuf) -> Self {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            source_path: path.display().to_string(),
            display_name,
            relative_dir,
        }
    }

    /// 画像URLから作成
    pub fn from_url(url: &str) -> Self {
        let trimmed = url.split(['?', '#']).next().unwrap_or(url);
        let display_name = trimmed
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("remote-image")
            .to_string();

        Self {
            source_path: url.to_string(),
            display_name,
            relative_dir: PathBuf::new(),
        }
    }

    /// 取得元の種類を判定
    pub fn source(&self) -> ImageSource<'_> {
        let lower = self.source_path.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ImageSource::Remote(&self.source_path)
        } else {
            ImageSource::Local(Path::new(&self.source_path))
        }
    }

    /// 拡張子を除いた表示名
    pub fn stem(&self) -> String {
        Path::new(&self.display_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.display_name.clone())
    }
}

/// カタログ（Shopify商品）レコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// GraphQL ID（gid://shopify/Product/123）
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub image_refs: Vec<ImageRef>,
}

/// 既存の商品画像への参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub src: String,
}
