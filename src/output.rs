//! 出力ファイルの書き込み
//!
//! 同じディレクトリに一時ファイルを作って書き込み、最後にリネームする。
//! 途中で失敗しても最終ファイル名で壊れたファイルが見えることはない。

use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// バイト列をアトミックに書き込む
pub fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(destination, |file| file.write_all(bytes))
}

/// 書き込み処理を指定してアトミックに書き込む
///
/// `write` がエラーを返した場合、一時ファイルは削除され、
/// 既存の `destination` はそのまま残る。
pub fn write_atomic_with<F>(destination: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let dir = parent_dir(destination);
    std::fs::create_dir_all(&dir)?;

    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".part")
        .tempfile_in(&dir)?;

    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    temp.persist(destination).map_err(|e| e.error)?;
    debug!(path = %destination.display(), "出力ファイルを保存");
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempdir().expect("Failed to create temp dir");
        let dest = dir.path().join("a").join("b").join("out.png");

        write_atomic(&dest, b"\x89PNG data").unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"\x89PNG data");
        assert_eq!(entries(&dest.parent().unwrap()), vec!["out.png"]);
    }

    #[test]
    fn test_overwrite_existing() {
        let dir = tempdir().expect("Failed to create temp dir");
        let dest = dir.path().join("out.webp");
        std::fs::write(&dest, b"old").unwrap();

        write_atomic(&dest, b"new").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let dest = dir.path().join("out.webp");
        std::fs::write(&dest, b"previous").unwrap();

        let result = write_atomic_with(&dest, |file| {
            file.write_all(b"partial")?;
            Err(std::io::Error::other("disk full"))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
        assert_eq!(entries(dir.path()), vec!["out.webp"]);
    }
}
