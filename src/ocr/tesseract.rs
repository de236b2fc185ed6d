//! tesseract コマンド連携
//!
//! `tesseract <image> stdout --psm N -l LANG` を実行し、標準出力をそのまま返す。
//! 前処理は行わない（ラベル写真は素の画像の方が読める）。

use super::{OcrBackend, OcrError};
use crate::config::Config;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct TesseractBackend {
    command: String,
    language: String,
    page_seg_mode: u8,
    timeout: Duration,
}

impl TesseractBackend {
    pub fn new(command: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            command: command.into(),
            language: defaults.ocr_language,
            page_seg_mode: defaults.ocr_page_seg_mode,
            timeout: Duration::from_secs(defaults.ocr_timeout_seconds),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            command: config.tesseract_cmd(),
            language: config.ocr_language.clone(),
            page_seg_mode: config.ocr_page_seg_mode,
            timeout: Duration::from_secs(config.ocr_timeout_seconds),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let mut child = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .args(["--psm", &self.page_seg_mode.to_string()])
            .args(["-l", &self.language])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::NotAvailable(format!(
                    "'{}' not found (install tesseract-ocr or set TESSERACT_CMD)",
                    self.command
                )),
                _ => OcrError::Io(e),
            })?;

        // パイプが詰まらないよう、待機中も別スレッドで読み切る
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let stdout_reader = std::thread::spawn(move || read_all(stdout.as_mut()));
        let stderr_reader = std::thread::spawn(move || read_all(stderr.as_mut()));

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Timeout(self.timeout.as_secs()));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(OcrError::Failed(format!(
                "{} exited with code {:?}: {}",
                self.command,
                status.code(),
                stderr.trim()
            )));
        }

        debug!(
            "tesseract {} ({} chars, {:?})",
            image_path.display(),
            stdout.len(),
            start.elapsed()
        );
        Ok(stdout)
    }
}

fn read_all<R: Read>(reader: Option<&mut R>) -> String {
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        let _ = reader.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// 画像ヘッダを読んで壊れたファイルを先に弾く
fn check_image(image_path: &Path) -> Result<(), OcrError> {
    if !image_path.is_file() {
        return Err(OcrError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("image not found: {}", image_path.display()),
        )));
    }

    match image::image_dimensions(image_path) {
        Ok((0, _)) | Ok((_, 0)) => Err(OcrError::InvalidImage(format!(
            "{} has zero size",
            image_path.display()
        ))),
        Ok(_) => Ok(()),
        Err(e) => Err(OcrError::InvalidImage(format!("{}: {}", image_path.display(), e))),
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        check_image(image_path)?;
        self.run_tesseract(image_path)
    }
}
