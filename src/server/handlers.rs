use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info, warn};

use super::AppState;
use crate::archive::{create_archive, ARCHIVE_NAME};
use crate::error::RenamerError;
use crate::job::JobHandle;
use crate::renamer::{ArtifactRenamer, BatchOptions, RenameOptions};

const UPLOAD_FIELD: &str = "photos";
const UPLOAD_PATTERN: &str = "*.{jpg,jpeg}";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// 写真を受け取り、バックグラウンドでリネームを開始する
pub async fn upload_and_process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    // 先にジョブを確保する（処理中なら既存の作業ディレクトリに触れない）
    let job = match state.tracker.start("Uploading photos...") {
        Ok(job) => job,
        Err(e @ RenamerError::ConcurrentJobConflict) => {
            return error_response(StatusCode::CONFLICT, e.to_string());
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let cleared = async {
        clear_dir(&state.upload_dir).await?;
        clear_dir(&state.output_dir).await
    }
    .await;
    if let Err(e) = cleared {
        job.fail(format!("Error: {}", e));
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let mut saved = HashSet::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                job.fail(format!("Upload failed: {}", e));
                return error_response(StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().and_then(sanitize_file_name) else {
            continue;
        };
        if !is_jpeg_name(&file_name) {
            warn!("Skipping non-JPEG upload: {}", file_name);
            continue;
        }

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                job.fail(format!("Upload failed: {}", e));
                return error_response(StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        let file_name = unique_name(&file_name, &mut saved);
        if let Err(e) = tokio::fs::write(state.upload_dir.join(&file_name), &bytes).await {
            job.fail(format!("Error: {}", e));
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    }

    if saved.is_empty() {
        job.fail("No valid JPG files found");
        return error_response(StatusCode::BAD_REQUEST, "No valid JPG files found");
    }

    info!("Received {} photo(s)", saved.len());
    job.update_progress(5, format!("Processing {} photos...", saved.len()));

    let renamer = state.renamer.clone();
    let upload_dir = state.upload_dir.clone();
    let output_dir = state.output_dir.clone();
    let worker_job = job.clone();
    let worker = tokio::task::spawn_blocking(move || {
        process_uploads(&renamer, &worker_job, &upload_dir, &output_dir);
    });
    // ワーカーが異常終了してもジョブを処理中のまま残さない
    tokio::spawn(async move {
        if let Err(e) = worker.await {
            error!("Worker stopped unexpectedly: {}", e);
            job.fail(format!("Error: processing stopped unexpectedly ({})", e));
        }
    });

    Json(json!({ "status": "started" })).into_response()
}

/// ワーカー本体: リネーム（10→90%）、ZIP作成（90%）、完了（100%）
fn process_uploads(
    renamer: &ArtifactRenamer,
    job: &JobHandle,
    upload_dir: &Path,
    output_dir: &Path,
) {
    job.update_progress(10, "Reading labels...");

    let options = BatchOptions {
        pattern: UPLOAD_PATTERN.into(),
        output_dir: Some(output_dir.to_path_buf()),
        recursive: false,
        rename: RenameOptions::default(),
    };

    let result = renamer.rename_batch(upload_dir, &options, |p| {
        let percent = 10 + (p.done * 80 / p.total.max(1)) as u8;
        let name = p.path.file_name().unwrap_or_default().to_string_lossy();
        job.update_progress(
            percent,
            format!("Processing {}/{}: {}", p.done, p.total, name),
        );
    });

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            error!("Batch failed: {}", e);
            job.fail(format!("Error: {}", e));
            return;
        }
    };

    if result.success() > 0 {
        job.update_progress(90, "Creating download package...");
        let outputs = result.produced_outputs();
        if let Err(e) = create_archive(&output_dir.join(ARCHIVE_NAME), &outputs) {
            error!("Archive failed: {}", e);
            job.fail(format!("Error: {}", e));
            return;
        }
    }

    let message = format!(
        "Completed! Processed {} of {} photos",
        result.success(),
        result.total()
    );
    info!("{}", message);
    job.complete(result, message);
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tracker.status())
}

pub async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    match state.tracker.reset() {
        Ok(()) => Json(json!({ "status": "reset" })).into_response(),
        Err(e) => error_response(StatusCode::CONFLICT, e.to_string()),
    }
}

pub async fn download_results(State(state): State<AppState>) -> impl IntoResponse {
    let zip_path = state.output_dir.join(ARCHIVE_NAME);
    if state.tracker.is_processing() {
        return error_response(StatusCode::CONFLICT, "Processing is still running");
    }

    match tokio::fs::read(&zip_path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", ARCHIVE_NAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "No results available for download"),
    }
}

async fn clear_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

/// クライアント指定のファイル名から安全な名前だけを残す
///
/// パス区切りより前は捨て、英数字と `.` `-` `_` 以外は `_` に置き換える。
fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// 同じ名前のアップロードには `-1` `-2` … を付ける（大文字小文字は区別しない）
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    let mut candidate = name.to_string();
    let mut n = 1;
    while !taken.insert(candidate.to_ascii_lowercase()) {
        candidate = match &extension {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        n += 1;
    }
    candidate
}

fn is_jpeg_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("IMG_0001.JPG").as_deref(), Some("IMG_0001.JPG"));
        assert_eq!(
            sanitize_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_file_name("C:\\photos\\tray 1.jpg").as_deref(),
            Some("tray_1.jpg")
        );
        assert_eq!(sanitize_file_name("..").as_deref(), None);
        assert_eq!(sanitize_file_name("").as_deref(), None);
    }

    #[test]
    fn test_unique_name_adds_suffix_on_collision() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("IMG_0001.jpg", &mut taken), "IMG_0001.jpg");
        assert_eq!(unique_name("IMG_0001.jpg", &mut taken), "IMG_0001-1.jpg");
        assert_eq!(unique_name("img_0001.JPG", &mut taken), "img_0001-2.JPG");
        assert_eq!(unique_name("IMG_0002.jpg", &mut taken), "IMG_0002.jpg");
        assert_eq!(taken.len(), 4);
    }

    #[test]
    fn test_is_jpeg_name() {
        assert!(is_jpeg_name("a.jpg"));
        assert!(is_jpeg_name("a.JPEG"));
        assert!(!is_jpeg_name("a.png"));
        assert!(!is_jpeg_name("jpg"));
    }
}
