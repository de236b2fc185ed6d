use crate::error::{RenamerError, Result};
use artifact_renamer_common::{DEFAULT_ARTIFACT_PATTERN, DEFAULT_SITE_PATTERN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// tesseract 実行ファイル（None なら PATH から探す）
    pub tesseract_cmd: Option<String>,
    pub ocr_language: String,
    /// tesseract の --psm（11: まばらなテキスト）
    pub ocr_page_seg_mode: u8,
    pub ocr_timeout_seconds: u64,
    pub site_pattern: String,
    pub artifact_pattern: String,
    /// 一括処理で対象にするファイルのglob
    pub file_pattern: String,
    /// OCRを並列実行するワーカー数
    pub workers: usize,
    pub backup_dir_name: String,
    pub web_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tesseract_cmd: None,
            ocr_language: "eng".into(),
            ocr_page_seg_mode: 11,
            ocr_timeout_seconds: 60,
            site_pattern: DEFAULT_SITE_PATTERN.clone(),
            artifact_pattern: DEFAULT_ARTIFACT_PATTERN.clone(),
            file_pattern: "*.jpg".into(),
            workers: 4,
            backup_dir_name: "backup".into(),
            web_port: 5000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RenamerError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("artifact-renamer").join("config.json"))
    }

    /// 環境変数 TESSERACT_CMD を優先
    pub fn tesseract_cmd(&self) -> String {
        if let Ok(cmd) = std::env::var("TESSERACT_CMD") {
            if !cmd.trim().is_empty() {
                return cmd;
            }
        }

        self.tesseract_cmd.clone().unwrap_or_else(|| "tesseract".into())
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(RenamerError::Config("workers must be at least 1".into()));
        }
        if self.ocr_timeout_seconds == 0 {
            return Err(RenamerError::Config("ocr_timeout_seconds must be at least 1".into()));
        }
        if self.backup_dir_name.is_empty() || self.backup_dir_name.contains(['/', '\\']) {
            return Err(RenamerError::Config(format!(
                "backup_dir_name must be a plain directory name: '{}'",
                self.backup_dir_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.file_pattern, "*.jpg");
        assert_eq!(config.backup_dir_name, "backup");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"workers": 2, "ocr_language": "eng+fra"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.ocr_language, "eng+fra");
        assert_eq!(config.web_port, 5000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            tesseract_cmd: Some("/opt/tesseract/bin/tesseract".into()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"workers": 0}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(RenamerError::Config(_))));

        std::fs::write(&path, r#"{"backup_dir_name": "a/b"}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(RenamerError::Config(_))));
    }
}
