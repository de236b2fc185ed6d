//! 遺物ラベル検出
//!
//! OCR → 正規化 → 抽出 → DetectionResult の組み立て。
//! 再試行はしない（必要ならOCRバックエンド側の責務）。

use crate::config::Config;
use crate::error::Result;
use crate::ocr::{OcrBackend, OcrError, TesseractBackend};
use artifact_renamer_common::{normalize, DetectionResult, IdentifierExtractor, PatternExtractor};
use std::path::Path;
use tracing::{debug, warn};

pub struct ArtifactDetector {
    backend: Box<dyn OcrBackend>,
    extractor: Box<dyn IdentifierExtractor>,
}

impl ArtifactDetector {
    pub fn new(backend: Box<dyn OcrBackend>, extractor: Box<dyn IdentifierExtractor>) -> Self {
        Self { backend, extractor }
    }

    /// 設定ファイルのパターンと tesseract で組み立てる
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = PatternExtractor::new(&config.site_pattern, &config.artifact_pattern)?;
        Ok(Self::new(
            Box::new(TesseractBackend::from_config(config)),
            Box::new(extractor),
        ))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 画像1枚から識別子を検出する
    ///
    /// OCRが失敗した場合は Err。識別子が揃わないだけなら
    /// `is_success() == false` の結果を返す。
    pub fn detect(&self, image_path: &Path) -> std::result::Result<DetectionResult, OcrError> {
        let raw_text = self.backend.recognize(image_path)?;
        let result = self.detect_text(&raw_text);

        let name = image_path.file_name().unwrap_or_default().to_string_lossy();
        if result.is_success() {
            debug!(
                "{}: site={:?} artifact={:?}",
                name,
                result.site_number(),
                result.artifact_number()
            );
        } else if raw_text.trim().is_empty() {
            warn!("No text detected in {}", name);
        } else {
            warn!(
                "Incomplete detection for {}: site={:?}, artifact={:?}",
                name,
                result.site_number(),
                result.artifact_number()
            );
        }

        Ok(result)
    }

    /// OCR済みテキストから検出する
    pub fn detect_text(&self, raw_text: &str) -> DetectionResult {
        let normalized = normalize(raw_text);
        let extraction = self.extractor.extract(&normalized);
        DetectionResult::new(extraction.site, extraction.artifact, raw_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FixedOcr(HashMap<PathBuf, String>);

    impl OcrBackend for FixedOcr {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, image_path: &Path) -> std::result::Result<String, OcrError> {
            self.0
                .get(image_path)
                .cloned()
                .ok_or_else(|| OcrError::Failed("engine crashed".into()))
        }
    }

    fn detector(entries: &[(&str, &str)]) -> ArtifactDetector {
        let map = entries
            .iter()
            .map(|(p, t)| (PathBuf::from(p), t.to_string()))
            .collect();
        ArtifactDetector::new(Box::new(FixedOcr(map)), Box::new(PatternExtractor::default()))
    }

    #[test]
    fn test_detect_label_scenario() {
        let detector = detector(&[("a.jpg", "Site: GDN-248\nArtifact No 76656")]);
        let result = detector.detect(Path::new("a.jpg")).unwrap();

        assert!(result.is_success());
        assert_eq!(result.site_number(), Some("GDN-248"));
        assert_eq!(result.artifact_number(), Some("76656"));
        assert_eq!(result.raw_text(), "Site: GDN-248\nArtifact No 76656");
        assert_eq!(result.file_name("jpg").as_deref(), Some("gdn248_76656.jpg"));
    }

    #[test]
    fn test_detect_blank_label() {
        let detector = detector(&[("blank.jpg", "")]);
        let result = detector.detect(Path::new("blank.jpg")).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.site_number(), None);
        assert_eq!(result.artifact_number(), None);
    }

    #[test]
    fn test_detect_partial() {
        let detector = detector(&[("half.jpg", "GDN-248 only")]);
        let result = detector.detect(Path::new("half.jpg")).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.confidence(), 0.5);
    }

    #[test]
    fn test_backend_failure_is_error() {
        let detector = detector(&[]);
        let result = detector.detect(Path::new("missing.jpg"));
        assert!(matches!(result, Err(OcrError::Failed(_))));
    }

    #[test]
    fn test_from_config_rejects_bad_pattern() {
        let config = Config {
            site_pattern: "(".into(),
            ..Config::default()
        };
        assert!(ArtifactDetector::from_config(&config).is_err());
    }
}
