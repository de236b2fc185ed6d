//! 検出結果の型定義
//!
//! - SiteCode: 遺跡コード（表示形式とファイル名用の正準形式）
//! - ArtifactNumber: 遺物番号（数字のみ）
//! - DetectionResult: 画像1枚分の検出結果（生成後は不変）

use crate::normalizer::correct_digit_confusions;

/// 遺物番号の桁数範囲と、候補ごとに許す紛らわしい文字の置換数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaRules {
    pub artifact_min_digits: usize,
    pub artifact_max_digits: usize,
    pub max_confusion_fixes: usize,
}

impl Default for SchemaRules {
    fn default() -> Self {
        Self {
            artifact_min_digits: 5,
            artifact_max_digits: 7,
            max_confusion_fixes: 2,
        }
    }
}

/// 遺跡コード（例: `GDN-248`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCode {
    display: String,
    canonical: String,
}

impl SiteCode {
    /// 既定ルールで候補文字列を検証する
    pub fn parse(candidate: &str) -> Option<Self> {
        Self::parse_with(candidate, &SchemaRules::default()).map(|(site, _)| site)
    }

    /// 英字プレフィックス + 区切り(任意) + 数字サフィックスとして検証する
    ///
    /// サフィックス内の紛らわしい文字は数字に修正する。
    /// 戻り値の2番目は修正数（空白の除去 + 文字の置換）。
    pub fn parse_with(candidate: &str, rules: &SchemaRules) -> Option<(Self, usize)> {
        let candidate = candidate.trim();
        let prefix_len = candidate
            .char_indices()
            .find(|(_, c)| !c.is_ascii_alphabetic())
            .map(|(i, _)| i)
            .unwrap_or(candidate.len());
        let (prefix, rest) = candidate.split_at(prefix_len);
        if prefix.is_empty() {
            return None;
        }

        let suffix = rest.trim_start_matches(|c: char| c == '-' || c.is_whitespace());
        let separator = &rest[..rest.len() - suffix.len()];
        let whitespace = separator.chars().filter(|c| c.is_whitespace()).count();

        let (digits, fixes) = correct_digit_confusions(suffix);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !genuine_digits_dominate(digits.len(), fixes, rules) {
            return None;
        }

        let display = format!("{}{}{}", prefix, separator, digits);
        let canonical = format!("{}{}", prefix, digits).to_lowercase();
        Some((Self { display, canonical }, whitespace + fixes))
    }

    /// 表示用（元の大文字小文字・ハイフンを保持）
    pub fn display(&self) -> &str {
        &self.display
    }

    /// ファイル名用（小文字、区切りなし）
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl std::fmt::Display for SiteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// 遺物番号（空白除去後の数字列）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNumber(String);

impl ArtifactNumber {
    /// 既定ルール（5〜7桁）で候補文字列を検証する
    pub fn parse(candidate: &str) -> Option<Self> {
        Self::parse_with(candidate, &SchemaRules::default()).map(|(number, _)| number)
    }

    /// 空白を除去し、紛らわしい文字を修正した上で桁数を検証する
    pub fn parse_with(candidate: &str, rules: &SchemaRules) -> Option<(Self, usize)> {
        let compact: String = candidate.chars().filter(|c| !c.is_whitespace()).collect();
        let whitespace = candidate.chars().count() - compact.chars().count();

        let (digits, fixes) = correct_digit_confusions(&compact);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if digits.len() < rules.artifact_min_digits || digits.len() > rules.artifact_max_digits {
            return None;
        }
        if !genuine_digits_dominate(digits.len(), fixes, rules) {
            return None;
        }

        Some((Self(digits), whitespace + fixes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 置換数が上限以内で、かつ本物の数字が置換文字より多いこと
fn genuine_digits_dominate(len: usize, fixes: usize, rules: &SchemaRules) -> bool {
    fixes <= rules.max_confusion_fixes && len - fixes > fixes
}

/// 画像1枚分の検出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    site: Option<SiteCode>,
    artifact: Option<ArtifactNumber>,
    raw_text: String,
}

impl DetectionResult {
    pub fn new(
        site: Option<SiteCode>,
        artifact: Option<ArtifactNumber>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            site,
            artifact,
            raw_text: raw_text.into(),
        }
    }

    pub fn site(&self) -> Option<&SiteCode> {
        self.site.as_ref()
    }

    pub fn artifact(&self) -> Option<&ArtifactNumber> {
        self.artifact.as_ref()
    }

    /// 遺跡コード（表示形式）
    pub fn site_number(&self) -> Option<&str> {
        self.site.as_ref().map(|s| s.display())
    }

    pub fn artifact_number(&self) -> Option<&str> {
        self.artifact.as_ref().map(|a| a.as_str())
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// 遺跡コードと遺物番号が両方揃っているか
    pub fn is_success(&self) -> bool {
        self.site.is_some() && self.artifact.is_some()
    }

    /// 1.0: 両方検出 / 0.5: 片方のみ / 0.0: どちらもなし
    pub fn confidence(&self) -> f32 {
        match (self.site.is_some(), self.artifact.is_some()) {
            (true, true) => 1.0,
            (false, false) => 0.0,
            _ => 0.5,
        }
    }

    /// 正準ファイル名 `{site}_{artifact}.{ext}` を生成
    pub fn file_name(&self, extension: &str) -> Option<String> {
        let site = self.site.as_ref()?;
        let artifact = self.artifact.as_ref()?;
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            Some(format!("{}_{}", site.canonical(), artifact))
        } else {
            Some(format!("{}_{}.{}", site.canonical(), artifact, extension))
        }
    }
}
