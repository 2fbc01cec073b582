//! 出力画像のリサイズと余白付け
//!
//! APIの出力を指定サイズに収まるよう縦横比を保って縮小し、
//! 単色の背景の中央に配置する。

use crate::error::{BatchError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use photoroom_common::OutputFormat;
use std::io::Cursor;

/// リサイズ指定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
    /// 背景色 RGBA
    pub background: [u8; 4],
}

impl ResizeSpec {
    pub fn new(width: u32, height: u32, background: [u8; 4]) -> Self {
        Self {
            width,
            height,
            background,
        }
    }
}

impl std::str::FromStr for ResizeSpec {
    type Err = String;

    /// `1600x2000` 形式（背景色は F2F2F2FF）
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("サイズは WIDTHxHEIGHT で指定してください: {}", s))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("幅が不正です: {}", w))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("高さが不正です: {}", h))?;
        if width == 0 || height == 0 {
            return Err(format!("サイズが不正です: {}", s));
        }
        Ok(Self::new(width, height, [242, 242, 242, 255]))
    }
}

/// `#RGB` / `RRGGBB` / `RRGGBBAA` 形式の色を解析
pub fn parse_color(s: &str) -> std::result::Result<[u8; 4], String> {
    let hex = s.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return Err(format!("色の形式が不正です: {}", s)),
    };

    let mut rgba = [0u8, 0, 0, 255];
    for (i, chunk) in expanded.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).map_err(|_| format!("色の形式が不正です: {}", s))?;
        rgba[i] = u8::from_str_radix(pair, 16).map_err(|_| format!("色の形式が不正です: {}", s))?;
    }
    Ok(rgba)
}

/// 画像を指定サイズの背景に収めて再エンコードする
pub fn fit_and_pad(bytes: &[u8], spec: &ResizeSpec, format: OutputFormat) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| BatchError::ImageProcessing(format!("画像の読み込みに失敗: {}", e)))?;

    let (new_width, new_height) = fit_dimensions(img.width(), img.height(), spec.width, spec.height);
    let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);

    let mut canvas = RgbaImage::from_pixel(spec.width, spec.height, Rgba(spec.background));
    let x = (spec.width - new_width) / 2;
    let y = (spec.height - new_height) / 2;
    image::imageops::overlay(&mut canvas, &resized.to_rgba8(), x as i64, y as i64);

    encode(DynamicImage::ImageRgba8(canvas), format)
}

/// 縦横比を保って枠内に収まるサイズ
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_width, max_height);
    }
    let ratio = width as f64 / height as f64;
    let target_ratio = max_width as f64 / max_height as f64;

    let (w, h) = if ratio > target_ratio {
        (max_width, (max_width as f64 / ratio) as u32)
    } else {
        ((max_height as f64 * ratio) as u32, max_height)
    };
    (w.clamp(1, max_width), h.clamp(1, max_height))
}

fn encode(img: DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let result = match format {
        OutputFormat::Png => img.write_to(&mut buf, ImageFormat::Png),
        OutputFormat::Webp => img.write_to(&mut buf, ImageFormat::WebP),
        // JPEGはアルファ非対応
        OutputFormat::Jpg => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buf, ImageFormat::Jpeg),
    };
    result.map_err(|e| BatchError::ImageProcessing(format!("画像のエンコードに失敗: {}", e)))?;
    Ok(buf.into_inner())
}
