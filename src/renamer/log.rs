//! 一括処理ログ（JSON）
//!
//! 本番実行のあと、出力先（なければ入力元）に
//! `artifact_rename_log_YYYYmmdd_HHMMSS.json` を書き出す。

use crate::error::Result;
use artifact_renamer_common::{BatchResult, FailureKind};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct BatchLog<'a> {
    timestamp: String,
    source_directory: String,
    output_directory: Option<String>,
    total: usize,
    success: usize,
    failed: usize,
    files: Vec<LogEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    file: String,
    success: bool,
    message: &'a str,
    failure: Option<FailureKind>,
    site_number: Option<&'a str>,
    artifact_number: Option<&'a str>,
    new_name: Option<String>,
}

pub fn write_batch_log(
    log_dir: &Path,
    source: &Path,
    output_dir: Option<&Path>,
    result: &BatchResult,
) -> Result<PathBuf> {
    let now = chrono::Local::now();

    let files = result
        .details()
        .iter()
        .map(|d| LogEntry {
            file: d.source.display().to_string(),
            success: d.success,
            message: &d.message,
            failure: d.failure,
            site_number: d.site_number.as_deref(),
            artifact_number: d.artifact_number.as_deref(),
            new_name: d.proposed_name(),
        })
        .collect();

    let log = BatchLog {
        timestamp: now.to_rfc3339(),
        source_directory: source.display().to_string(),
        output_directory: output_dir.map(|p| p.display().to_string()),
        total: result.total(),
        success: result.success(),
        failed: result.failed(),
        files,
    };

    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(format!(
        "artifact_rename_log_{}.json",
        now.format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, serde_json::to_string_pretty(&log)?)?;

    info!("Batch log written: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifact_renamer_common::FileOutcome;
    use tempfile::tempdir;

    #[test]
    fn test_write_batch_log() {
        let dir = tempdir().unwrap();
        let result: BatchResult = vec![
            FileOutcome::succeeded("a.jpg", "Renamed: a.jpg -> gdn248_76656.jpg")
                .with_destination(dir.path().join("gdn248_76656.jpg"), true)
                .with_identifiers(Some("GDN-248"), Some("76656")),
            FileOutcome::failed("b.jpg", FailureKind::NoDetection, "b.jpg: No identifiers found"),
        ]
        .into_iter()
        .collect();

        let path = write_batch_log(dir.path(), dir.path(), None, &result).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("artifact_rename_log_"));
        assert!(name.ends_with(".json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["success"], 1);
        assert_eq!(json["files"][0]["new_name"], "gdn248_76656.jpg");
        assert_eq!(json["files"][0]["site_number"], "GDN-248");
        assert_eq!(json["files"][1]["failure"], "no_detection");
        assert!(json["output_directory"].is_null());
    }
}
