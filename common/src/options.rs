//! 画像編集リクエストの設定
//!
//! 各オプションはPhotoroom APIのフォーム/クエリのキーに1対1で対応し、
//! 値は加工せずそのまま送る。上位プラン専用のオプションは
//! [`EditRequestConfig::validate_for`] で送信前に弾く。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// APIプラン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiTier {
    /// 背景除去・リサイズ・背景色など基本機能のみ
    Basic,
    /// AI影・リライティング・AI背景・拡張・アップスケール等も使える
    #[default]
    Plus,
}

impl std::fmt::Display for ApiTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiTier::Basic => write!(f, "basic"),
            ApiTier::Plus => write!(f, "plus"),
        }
    }
}

impl std::str::FromStr for ApiTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" | "base" | "v1" => Ok(ApiTier::Basic),
            "plus" | "v2" => Ok(ApiTier::Plus),
            _ => Err(format!("Unknown tier: {}. Use basic or plus", s)),
        }
    }
}

/// 出力フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
    Webp,
}

impl OutputFormat {
    /// 出力ファイルの拡張子
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }

    /// アップロード時のMIMEタイプ
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "webp" => Ok(OutputFormat::Webp),
            _ => Err(format!("Unknown format: {}. Use png, jpg, or webp", s)),
        }
    }
}

/// 出力サイズ（プリセット名または幅×高さ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputSize {
    Preset(String),
    Dimensions { width: u32, height: u32 },
}

impl std::fmt::Display for OutputSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputSize::Preset(name) => f.write_str(name),
            OutputSize::Dimensions { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

impl std::str::FromStr for OutputSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("出力サイズが空です".to_string());
        }
        if let Some((w, h)) = s.split_once(['x', 'X', '×']) {
            if let (Ok(width), Ok(height)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
                if width == 0 || height == 0 {
                    return Err(format!("出力サイズが不正です: {}", s));
                }
                return Ok(OutputSize::Dimensions { width, height });
            }
        }
        Ok(OutputSize::Preset(s.to_string()))
    }
}

/// 上下左右の割合指定（padding/margin）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
    pub right: Option<String>,
}

impl EdgeInsets {
    /// 全辺同じ値
    pub fn uniform(value: &str) -> Self {
        Self {
            top: Some(value.to_string()),
            bottom: Some(value.to_string()),
            left: Some(value.to_string()),
            right: Some(value.to_string()),
        }
    }

    fn push_fields(&self, prefix: &str, fields: &mut Vec<(String, String)>) {
        for (edge, value) in [
            ("Top", &self.top),
            ("Bottom", &self.bottom),
            ("Left", &self.left),
            ("Right", &self.right),
        ] {
            if let Some(v) = value {
                fields.push((format!("{}{}", prefix, edge), v.clone()));
            }
        }
    }
}

/// セグメンテーション設定
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segmentation {
    pub mode: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
}

/// リライティング設定
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Relighting {
    pub mode: Option<String>,
    pub direction: Option<String>,
    pub strength: Option<String>,
}

/// AI生成背景
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AiBackground {
    pub prompt: String,
    pub style: Option<String>,
}

/// 拡張・アップスケール設定
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AiResize {
    pub mode: Option<String>,
    pub factor: Option<String>,
}

/// 画像編集リクエスト設定
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditRequestConfig {
    /// 背景色（hex または white/transparent 等）
    pub background_color: Option<String>,
    pub format: Option<OutputFormat>,
    /// 出力品質 (1-100)
    pub quality: Option<u8>,
    pub output_size: Option<OutputSize>,
    pub crop: Option<bool>,
    pub position: Option<String>,
    /// 被写体の拡大率（%）
    pub scale: Option<String>,
    pub padding: EdgeInsets,
    pub margin: EdgeInsets,
    pub segmentation: Segmentation,
    pub ignore_padding_and_snap_on_cropped_sides: Option<bool>,

    // --- 以下 plus プラン専用 ---
    pub shadow_mode: Option<String>,
    pub lighting: Option<Relighting>,
    pub ai_background: Option<AiBackground>,
    pub text_removal: Option<String>,
    pub expand: Option<AiResize>,
    pub upscale: Option<AiResize>,
    pub dpi: Option<u32>,

    /// 上記以外のキーをそのまま渡す
    pub extra: Vec<(String, String)>,
}

impl EditRequestConfig {
    /// 出力フォーマット（未指定時はPNG）
    pub fn output_format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// plus プラン専用として設定されているオプションのキー一覧
    pub fn plus_only_options(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.shadow_mode.is_some() {
            keys.push("shadow.mode");
        }
        if self.lighting.is_some() {
            keys.push("lighting.mode");
        }
        if self.ai_background.is_some() {
            keys.push("background.prompt");
        }
        if self.text_removal.is_some() {
            keys.push("textRemoval.mode");
        }
        if self.expand.is_some() {
            keys.push("expand.mode");
        }
        if self.upscale.is_some() {
            keys.push("upscale.mode");
        }
        if self.dpi.is_some() {
            keys.push("export.dpi");
        }
        keys
    }

    /// 指定プランで送信可能か検証する（ネットワーク呼び出し前に行う）
    pub fn validate_for(&self, tier: ApiTier) -> Result<()> {
        if let Some(q) = self.quality {
            if q == 0 || q > 100 {
                return Err(Error::Config(format!("quality は 1-100 で指定してください: {}", q)));
            }
        }
        if let Some(bg) = &self.ai_background {
            if bg.prompt.trim().is_empty() {
                return Err(Error::Config("AI背景のプロンプトが空です".into()));
            }
        }
        if tier == ApiTier::Basic {
            if let Some(option) = self.plus_only_options().first() {
                return Err(Error::TierUnsupported {
                    option: (*option).to_string(),
                    tier,
                });
            }
        }
        Ok(())
    }

    /// フォーム/クエリのキーと値に展開する（設定順で安定）
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut push = |key: &str, value: String| fields.push((key.to_string(), value));

        if let Some(v) = &self.background_color {
            push("background.color", v.clone());
        }
        if let Some(bg) = &self.ai_background {
            push("background.prompt", bg.prompt.clone());
            if let Some(style) = &bg.style {
                push("background.style", style.clone());
            }
        }
        if let Some(v) = self.ignore_padding_and_snap_on_cropped_sides {
            push("ignorePaddingAndSnapOnCroppedSides", v.to_string());
        }
        if let Some(v) = &self.output_size {
            push("outputSize", v.to_string());
        }
        if let Some(v) = self.crop {
            push("crop", v.to_string());
        }
        if let Some(v) = &self.position {
            push("position", v.clone());
        }
        if let Some(v) = &self.scale {
            push("scale", v.clone());
        }
        if let Some(v) = &self.segmentation.mode {
            push("segmentation.mode", v.clone());
        }
        if let Some(v) = &self.segmentation.prompt {
            push("segmentation.prompt", v.clone());
        }
        if let Some(v) = &self.segmentation.negative_prompt {
            push("segmentation.negativePrompt", v.clone());
        }
        if let Some(v) = &self.shadow_mode {
            push("shadow.mode", v.clone());
        }
        if let Some(light) = &self.lighting {
            push("lighting.mode", light.mode.clone().unwrap_or_else(|| "ai.auto".into()));
            if let Some(d) = &light.direction {
                push("lighting.direction", d.clone());
            }
            if let Some(s) = &light.strength {
                push("lighting.strength", s.clone());
            }
        }
        if let Some(v) = &self.text_removal {
            push("textRemoval.mode", v.clone());
        }
        if let Some(expand) = &self.expand {
            push("expand.mode", expand.mode.clone().unwrap_or_else(|| "ai.auto".into()));
            if let Some(f) = &expand.factor {
                push("expand.factor", f.clone());
            }
        }
        if let Some(up) = &self.upscale {
            push("upscale.mode", up.mode.clone().unwrap_or_else(|| "ai.fast".into()));
            if let Some(f) = &up.factor {
                push("upscale.factor", f.clone());
            }
        }
        if let Some(v) = self.dpi {
            push("export.dpi", v.to_string());
        }

        self.margin.push_fields("margin", &mut fields);
        self.padding.push_fields("padding", &mut fields);

        if let Some(v) = self.format {
            fields.push(("format".into(), v.to_string()));
        }
        if let Some(v) = self.quality {
            fields.push(("quality".into(), v.to_string()));
        }
        for (k, v) in &self.extra {
            fields.push((k.clone(), v.clone()));
        }

        fields
    }

    /// basic プラン（v1 segment API）のキー名で展開する
    ///
    /// 背景色は `bg_color`、出力サイズは `size` または `width`/`height`。
    /// それ以外のキーと値は [`to_fields`](Self::to_fields) と同じ。
    pub fn to_basic_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        for (key, value) in self.to_fields() {
            match (key.as_str(), &self.output_size) {
                ("background.color", _) => fields.push(("bg_color".to_string(), value)),
                ("outputSize", Some(OutputSize::Dimensions { width, height })) => {
                    fields.push(("width".to_string(), width.to_string()));
                    fields.push(("height".to_string(), height.to_string()));
                }
                ("outputSize", _) => fields.push(("size".to_string(), value)),
                _ => fields.push((key, value)),
            }
        }
        fields
    }

    /// プランに応じたキー名で展開する
    pub fn fields_for(&self, tier: ApiTier) -> Vec<(String, String)> {
        match tier {
            ApiTier::Basic => self.to_basic_fields(),
            ApiTier::Plus => self.to_fields(),
        }
    }
}
