//! Webアップロード画面のバックエンド
//!
//! - `POST /api/upload_and_process` 写真（multipart の `photos`）を受け取り処理開始
//! - `GET  /api/status` 進捗と結果
//! - `GET|POST /api/reset` 終了したジョブを片付ける
//! - `GET  /api/download_results` リネーム済み写真のZIP
//!
//! 同時に処理できるバッチは1つ。処理中のアップロードは 409 を返す。

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::job::JobStatusTracker;
use crate::renamer::ArtifactRenamer;

#[derive(Clone)]
pub struct AppState {
    pub renamer: Arc<ArtifactRenamer>,
    pub tracker: JobStatusTracker,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl AppState {
    /// `work_dir` 配下に uploads/ と output/ を使う
    pub fn new(renamer: ArtifactRenamer, work_dir: &Path) -> Self {
        Self {
            renamer: Arc::new(renamer),
            tracker: JobStatusTracker::new(),
            upload_dir: work_dir.join("uploads"),
            output_dir: work_dir.join("output"),
        }
    }
}

/// サーバを起動する（Ctrl+C で停止し、作業ディレクトリを削除する）
pub async fn serve(renamer: ArtifactRenamer, host: &str, port: u16) -> anyhow::Result<()> {
    let work_dir = tempfile::Builder::new()
        .prefix("artifact_renamer_")
        .tempdir()?;
    let state = AppState::new(renamer, work_dir.path());
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);
    tracing::debug!("Working directory: {}", work_dir.path().display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ArtifactDetector;
    use crate::job::JobStatus;
    use crate::ocr::{OcrBackend, OcrError};
    use artifact_renamer_common::PatternExtractor;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::io::Read;
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "artifact-renamer-test-boundary";

    struct FileTextOcr;

    impl OcrBackend for FileTextOcr {
        fn name(&self) -> &str {
            "file-text"
        }

        fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
            let text = std::fs::read_to_string(image_path)?;
            if text.starts_with("PANIC") {
                panic!("ocr engine aborted");
            }
            Ok(text)
        }
    }

    async fn wait_until_idle(state: &AppState) {
        for _ in 0..200 {
            if !state.tracker.is_processing() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job did not finish");
    }

    fn setup_test_app() -> (axum::Router, AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let renamer = ArtifactRenamer::new(ArtifactDetector::new(
            Box::new(FileTextOcr),
            Box::new(PatternExtractor::default()),
        ));
        let state = AppState::new(renamer, dir.path());
        (create_router(state.clone()), state, dir)
    }

    fn multipart_body(files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photos\"; filename=\"{name}\"\r\nContent-Type: image/jpeg\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn upload_request(files: &[(&str, &str)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/upload_and_process")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(files)))
            .unwrap()
    }

    async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_status_idle() {
        let (app, _state, _dir) = setup_test_app();

        let response = get(&app, "/api/status").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "idle");
        assert_eq!(json["progress"], 0);
        assert!(json["results"].is_null());
    }

    #[tokio::test]
    async fn test_download_without_results_is_not_found() {
        let (app, _state, _dir) = setup_test_app();
        let response = get(&app, "/api/download_results").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_while_processing_is_conflict() {
        let (app, state, _dir) = setup_test_app();
        let _job = state.tracker.start("busy").unwrap();

        let response = app
            .clone()
            .oneshot(upload_request(&[("IMG_1.jpg", "GDN-248 76656")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = get(&app, "/api/reset").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(state.tracker.status().message, "busy");
    }

    #[tokio::test]
    async fn test_upload_without_jpegs_is_bad_request() {
        let (app, state, _dir) = setup_test_app();

        let response = app
            .clone()
            .oneshot(upload_request(&[("notes.txt", "GDN-248 76656")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.tracker.status().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_worker_panic_marks_job_failed() {
        let (app, state, _dir) = setup_test_app();

        let response = app
            .clone()
            .oneshot(upload_request(&[("IMG_1.jpg", "PANIC")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        wait_until_idle(&state).await;
        let snapshot = state.tracker.status();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert!(snapshot.message.contains("stopped unexpectedly"));

        let response = get(&app, "/api/reset").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_duplicate_upload_names_are_both_processed() {
        let (app, state, _dir) = setup_test_app();

        let response = app
            .clone()
            .oneshot(upload_request(&[
                ("tray1/IMG_0001.jpg", "GDN-248 76656"),
                ("tray2/IMG_0001.jpg", "GDN-248 76657"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        wait_until_idle(&state).await;
        let json = json_body(get(&app, "/api/status").await).await;
        assert_eq!(json["status"], "complete");
        assert_eq!(json["results"]["total"], 2);
        assert_eq!(json["results"]["success"], 2);
    }

    #[tokio::test]
    async fn test_upload_process_and_download() {
        let (app, state, _dir) = setup_test_app();

        let response = app
            .clone()
            .oneshot(upload_request(&[
                ("IMG_1.jpg", "Site: GDN-248\nArtifact No 76656"),
                ("IMG_2.jpg", ""),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "started");

        let mut finished = false;
        for _ in 0..200 {
            if !state.tracker.is_processing() {
                finished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(finished, "job did not finish");

        let json = json_body(get(&app, "/api/status").await).await;
        assert_eq!(json["status"], "complete");
        assert_eq!(json["progress"], 100);
        assert_eq!(json["message"], "Completed! Processed 1 of 2 photos");
        assert_eq!(json["results"]["total"], 2);
        assert_eq!(json["results"]["success"], 1);
        assert_eq!(json["results"]["failed"], 1);

        let response = get(&app, "/api/download_results").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body.to_vec())).unwrap();
        assert_eq!(archive.len(), 1);
        let mut content = String::new();
        archive
            .by_name("gdn248_76656.jpg")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.contains("76656"));

        let response = get(&app, "/api/reset").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.tracker.status().status, JobStatus::Idle);
    }
}
