//! リネーム済み写真のZIPパッケージ

use crate::error::Result;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_NAME: &str = "renamed_photos.zip";

/// ファイル名をエントリ名としてZIPにまとめ、格納した件数を返す
///
/// JPEGは既に圧縮済みなので Stored で格納する。
/// 同名のファイルは最初の1件だけを入れる。
pub fn create_archive(zip_path: &Path, files: &[&Path]) -> Result<usize> {
    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut names = HashSet::new();
    for path in files {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        if !names.insert(name.clone()) {
            warn!("Duplicate name in archive, skipped: {}", path.display());
            continue;
        }

        zip.start_file(name, options)?;
        let mut source = File::open(path)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;

    info!("Archive created: {} ({} files)", zip_path.display(), names.len());
    Ok(names.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_create_archive() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("gdn248_76656.jpg");
        let b = dir.path().join("gdn248_76657.jpg");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();

        let zip_path = dir.path().join("out").join(ARCHIVE_NAME);
        let count = create_archive(&zip_path, &[a.as_path(), b.as_path()]).unwrap();
        assert_eq!(count, 2);

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("gdn248_76657.jpg")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");
    }

    #[test]
    fn test_create_archive_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.jpg");
        let result = create_archive(&dir.path().join(ARCHIVE_NAME), &[missing.as_path()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_empty_archive() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join(ARCHIVE_NAME);
        assert_eq!(create_archive(&zip_path, &[]).unwrap(), 0);
        assert!(zip_path.exists());
    }
}
