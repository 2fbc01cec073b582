//! 編集プリセット
//!
//! 用途別のパラメータ一式を名前で引けるようにする。

use crate::options::{
    AiBackground, AiResize, EdgeInsets, EditRequestConfig, OutputFormat, OutputSize, Relighting,
    Segmentation,
};

/// プリセット定義
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> EditRequestConfig,
}

impl Preset {
    /// プリセットの設定を生成
    pub fn config(&self) -> EditRequestConfig {
        (self.build)()
    }

    /// plus プランが必要か
    pub fn requires_plus(&self) -> bool {
        !self.config().plus_only_options().is_empty()
    }
}

/// 組み込みプリセット一覧
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "shopify",
        description: "Shopify商品画像（1600x2000, AI影, 余白10%, PNG）",
        build: shopify_preset,
    },
    Preset {
        name: "playground",
        description: "明るいグレー背景（F2F2F2FF, 元サイズ, AI影）",
        build: playground_preset,
    },
    Preset {
        name: "webp-studio",
        description: "スタジオ風背景（EBECF0, 余白12%, WebP）",
        build: webp_studio_preset,
    },
    Preset {
        name: "transparent",
        description: "背景除去のみ（透過PNG）",
        build: EditRequestConfig::default,
    },
    Preset {
        name: "white",
        description: "白背景（WebP）",
        build: white_preset,
    },
    Preset {
        name: "square",
        description: "正方形 1:1（クロップあり, WebP 90%）",
        build: square_preset,
    },
    Preset {
        name: "portrait",
        description: "縦長 4:5（クロップあり, WebP 90%）",
        build: portrait_preset,
    },
    Preset {
        name: "relight",
        description: "AIリライティング（左から, 中程度）",
        build: relight_preset,
    },
    Preset {
        name: "upscale",
        description: "AIアップスケール（2倍）",
        build: upscale_preset,
    },
    Preset {
        name: "expand",
        description: "AI画像拡張（1.5倍）",
        build: expand_preset,
    },
    Preset {
        name: "remove-text",
        description: "画像内テキストの除去",
        build: remove_text_preset,
    },
    Preset {
        name: "ai-background",
        description: "AI生成背景（撮影風）",
        build: ai_background_preset,
    },
];

/// 名前からプリセットを探す（大文字小文字・`_` と `-` を区別しない）
pub fn find_preset(name: &str) -> Option<&'static Preset> {
    let normalized = name.trim().to_lowercase().replace('_', "-");
    PRESETS.iter().find(|p| p.name == normalized)
}

fn shopify_preset() -> EditRequestConfig {
    EditRequestConfig {
        background_color: Some("white".into()),
        ignore_padding_and_snap_on_cropped_sides: Some(false),
        output_size: Some(OutputSize::Dimensions { width: 1600, height: 2000 }),
        segmentation: Segmentation {
            mode: Some("keepSalientObject".into()),
            prompt: Some("product".into()),
            negative_prompt: Some("hand, finger".into()),
        },
        shadow_mode: Some("ai.soft".into()),
        lighting: Some(Relighting {
            mode: Some("ai.auto".into()),
            ..Default::default()
        }),
        margin: EdgeInsets::uniform("0%"),
        padding: EdgeInsets::uniform("10%"),
        format: Some(OutputFormat::Png),
        quality: Some(90),
        ..Default::default()
    }
}

fn playground_preset() -> EditRequestConfig {
    EditRequestConfig {
        background_color: Some("F2F2F2FF".into()),
        output_size: Some(OutputSize::Preset("originalImage".into())),
        padding: EdgeInsets::uniform("10%"),
        shadow_mode: Some("ai.soft".into()),
        format: Some(OutputFormat::Png),
        ..Default::default()
    }
}

fn webp_studio_preset() -> EditRequestConfig {
    EditRequestConfig {
        padding: EdgeInsets::uniform("12%"),
        format: Some(OutputFormat::Webp),
        background_color: Some("EBECF0".into()),
        ..shopify_preset()
    }
}

fn white_preset() -> EditRequestConfig {
    EditRequestConfig {
        background_color: Some("#FFFFFF".into()),
        format: Some(OutputFormat::Webp),
        ..Default::default()
    }
}

fn square_preset() -> EditRequestConfig {
    EditRequestConfig {
        background_color: Some("#EEEEE5".into()),
        output_size: Some(OutputSize::Dimensions { width: 2000, height: 2000 }),
        position: Some("center".into()),
        crop: Some(true),
        format: Some(OutputFormat::Webp),
        quality: Some(90),
        ..Default::default()
    }
}

fn portrait_preset() -> EditRequestConfig {
    EditRequestConfig {
        output_size: Some(OutputSize::Dimensions { width: 1600, height: 2000 }),
        ..square_preset()
    }
}

fn relight_preset() -> EditRequestConfig {
    EditRequestConfig {
        lighting: Some(Relighting {
            mode: Some("ai.auto".into()),
            direction: Some("left".into()),
            strength: Some("medium".into()),
        }),
        format: Some(OutputFormat::Webp),
        ..Default::default()
    }
}

fn upscale_preset() -> EditRequestConfig {
    EditRequestConfig {
        upscale: Some(AiResize {
            mode: Some("ai.fast".into()),
            factor: Some("2".into()),
        }),
        format: Some(OutputFormat::Webp),
        ..Default::default()
    }
}

fn expand_preset() -> EditRequestConfig {
    EditRequestConfig {
        expand: Some(AiResize {
            mode: Some("ai.auto".into()),
            factor: Some("1.5".into()),
        }),
        format: Some(OutputFormat::Webp),
        ..Default::default()
    }
}

fn remove_text_preset() -> EditRequestConfig {
    EditRequestConfig {
        text_removal: Some("ai.all".into()),
        format: Some(OutputFormat::Webp),
        ..Default::default()
    }
}

fn ai_background_preset() -> EditRequestConfig {
    EditRequestConfig {
        ai_background: Some(AiBackground {
            prompt: "A beautiful beach at sunset".into(),
            style: Some("photographic".into()),
        }),
        format: Some(OutputFormat::Webp),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ApiTier;

    #[test]
    fn test_find_preset() {
        assert_eq!(find_preset("shopify").unwrap().name, "shopify");
        assert_eq!(find_preset(" Remove_Text ").unwrap().name, "remove-text");
        assert!(find_preset("unknown").is_none());
    }

    #[test]
    fn test_preset_names_unique() {
        let mut names: Vec<_> = PRESETS.iter().map(|p| p.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PRESETS.len());
    }

    #[test]
    fn test_shopify_preset_fields() {
        let fields = find_preset("shopify").unwrap().config().to_fields();
        assert!(fields.contains(&("outputSize".to_string(), "1600x2000".to_string())));
        assert!(fields.contains(&("paddingTop".to_string(), "10%".to_string())));
        assert!(fields.contains(&("segmentation.prompt".to_string(), "product".to_string())));
    }

    #[test]
    fn test_tier_requirements() {
        assert!(!find_preset("white").unwrap().requires_plus());
        assert!(!find_preset("square").unwrap().requires_plus());
        assert!(find_preset("shopify").unwrap().requires_plus());
        assert!(find_preset("upscale").unwrap().requires_plus());

        for preset in PRESETS {
            let config = preset.config();
            assert!(config.validate_for(ApiTier::Plus).is_ok(), "{}", preset.name);
            assert_eq!(
                config.validate_for(ApiTier::Basic).is_ok(),
                !preset.requires_plus(),
                "{}",
                preset.name
            );
        }
    }

    #[test]
    fn test_webp_studio_overrides() {
        let config = find_preset("webp-studio").unwrap().config();
        assert_eq!(config.background_color.as_deref(), Some("EBECF0"));
        assert_eq!(config.output_format(), OutputFormat::Webp);
        assert_eq!(config.padding.left.as_deref(), Some("12%"));
    }
}
