//! ファイル名からの照合キー（バーコード）抽出
//!
//! ファイル名中の最初の数字列をバーコードとみなす。
//! 数字が無い場合は拡張子を除いたファイル名をそのまま使う。
//!
//! 注意: 先頭の数字列だけを見るため、`20240101_5991234567890.jpg` のように
//! 日付が前にあるファイル名では日付がキーになってしまう。

use regex::Regex;
use std::path::Path;

/// ファイル名から照合キーを取り出す
///
/// # Examples
/// ```
/// use photoroom_common::extract_key;
///
/// assert_eq!(extract_key("SKU-00881-v2.jpg"), "00881");
/// assert_eq!(extract_key("bottle.jpg"), "bottle");
/// ```
pub fn extract_key(file_name: &str) -> String {
    lazy_static::lazy_static! {
        static ref DIGITS_RE: Regex = Regex::new(r"[0-9]+").unwrap();
    }

    let path = Path::new(file_name);
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());

    if let Some(m) = DIGITS_RE.find(&base) {
        return m.as_str().to_string();
    }

    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_digit_run() {
        assert_eq!(extract_key("SKU-00881-v2.jpg"), "00881");
        assert_eq!(extract_key("5991234567890.png"), "5991234567890");
    }

    #[test]
    fn test_leftmost_run_wins() {
        // 日付が先にあると日付がキーになる（既知の制限）
        assert_eq!(extract_key("20240101_5991234567890.jpg"), "20240101");
        assert_eq!(extract_key("a1b22c333.jpg"), "1");
    }

    #[test]
    fn test_no_digits_returns_stem() {
        assert_eq!(extract_key("bottle.jpg"), "bottle");
        assert_eq!(extract_key("red.bottle.webp"), "red.bottle");
        assert_eq!(extract_key("noext"), "noext");
    }

    #[test]
    fn test_directory_part_ignored() {
        assert_eq!(extract_key("/shop/2024/bottle.jpg"), "bottle");
        assert_eq!(extract_key("batch7/item_123.jpg"), "123");
    }

    #[test]
    fn test_digits_in_extension() {
        // 拡張子もファイル名の一部として走査する
        assert_eq!(extract_key("scan.mp4"), "4");
    }

    #[test]
    fn test_non_ascii_digits_ignored() {
        assert_eq!(extract_key("商品１２３.jpg"), "商品１２３");
    }
}
