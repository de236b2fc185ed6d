//! 遺跡コード・遺物番号の抽出
//!
//! 正規化済みテキストに2つの正規表現（差し替え可能）を適用して候補を集め、
//! 次の順で1つに絞る:
//! 1. 修正数（除去した空白 + 置換した紛らわしい文字）が少ないもの
//! 2. 読み順で先に現れるもの

use crate::detection::{ArtifactNumber, SchemaRules, SiteCode};
use crate::error::Result;
use crate::normalizer::confusable_class;
use regex::Regex;
use std::ops::Range;

lazy_static::lazy_static! {
    /// 既定の遺跡コードパターン: 英字2〜4文字 + 区切り(任意) + 数字2〜4桁（例: GDN-248）
    pub static ref DEFAULT_SITE_PATTERN: String =
        format!(r"(?i)\b[A-Z]{{2,4}}[-\s]?[{0}]{{2,4}}\b", confusable_class());

    /// 既定の遺物番号パターン: 5〜7桁、桁間の空白を許容（例: 105 407）
    pub static ref DEFAULT_ARTIFACT_PATTERN: String =
        format!(r"\b[{0}](?: ?[{0}]){{4,6}}\b", confusable_class());
}

/// 抽出結果（見つからないフィールドは None）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub site: Option<SiteCode>,
    pub artifact: Option<ArtifactNumber>,
}

/// 識別子スキーマの差し替え口
///
/// 検出器はこのトレイトにのみ依存する。
pub trait IdentifierExtractor: Send + Sync {
    fn extract(&self, normalized: &str) -> Extraction;
}

/// 正規表現ベースの抽出器
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    site_pattern: Regex,
    artifact_pattern: Regex,
    rules: SchemaRules,
}

#[derive(Debug)]
struct Candidate<T> {
    value: T,
    corrections: usize,
}

impl PatternExtractor {
    pub fn new(site_pattern: &str, artifact_pattern: &str) -> Result<Self> {
        Self::with_rules(site_pattern, artifact_pattern, SchemaRules::default())
    }

    pub fn with_rules(site_pattern: &str, artifact_pattern: &str, rules: SchemaRules) -> Result<Self> {
        if rules.artifact_min_digits == 0 || rules.artifact_min_digits > rules.artifact_max_digits {
            return Err(crate::Error::InvalidSchema(format!(
                "artifact digit range {}..={} is empty",
                rules.artifact_min_digits, rules.artifact_max_digits
            )));
        }

        Ok(Self {
            site_pattern: Regex::new(site_pattern)?,
            artifact_pattern: Regex::new(artifact_pattern)?,
            rules,
        })
    }

    pub fn site_pattern(&self) -> &str {
        self.site_pattern.as_str()
    }

    pub fn artifact_pattern(&self) -> &str {
        self.artifact_pattern.as_str()
    }

    /// 遺跡コード候補を1つ選ぶ
    pub fn find_site(&self, text: &str) -> Option<SiteCode> {
        self.site_match(text).map(|(site, _)| site)
    }

    /// 遺物番号候補を1つ選ぶ
    ///
    /// 採用した遺跡コードの一致箇所だけを改行に置き換えてから探す
    /// （`GDN-248 76656` の `248` と `76656` が連結されないように）。
    /// 採用しなかった一致（`No 105 407` の `No 105` など）は残す。
    pub fn find_artifact(&self, text: &str) -> Option<ArtifactNumber> {
        let site = self.site_match(text).map(|(_, range)| range);
        self.artifact_outside(text, site)
    }

    fn site_match(&self, text: &str) -> Option<(SiteCode, Range<usize>)> {
        let candidates = self.site_pattern.find_iter(text).filter_map(|m| {
            SiteCode::parse_with(m.as_str(), &self.rules).map(|(code, corrections)| Candidate {
                value: (code, m.range()),
                corrections,
            })
        });
        pick(candidates)
    }

    fn artifact_outside(&self, text: &str, site: Option<Range<usize>>) -> Option<ArtifactNumber> {
        let mut masked = text.to_string();
        if let Some(range) = site {
            masked.replace_range(range, "\n");
        }

        let mut candidates = Vec::new();
        for m in self.artifact_pattern.find_iter(&masked) {
            let matched = m.as_str();
            if let Some((value, corrections)) = ArtifactNumber::parse_with(matched, &self.rules) {
                candidates.push(Candidate { value, corrections });
            }
            // 空白で連結された一致は、単独で成立する断片も候補にする
            if matched.contains(char::is_whitespace) {
                for piece in matched.split_whitespace() {
                    if let Some((value, corrections)) = ArtifactNumber::parse_with(piece, &self.rules) {
                        candidates.push(Candidate { value, corrections });
                    }
                }
            }
        }
        pick(candidates)
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self {
            site_pattern: Regex::new(&DEFAULT_SITE_PATTERN).expect("default site pattern is valid"),
            artifact_pattern: Regex::new(&DEFAULT_ARTIFACT_PATTERN)
                .expect("default artifact pattern is valid"),
            rules: SchemaRules::default(),
        }
    }
}

impl IdentifierExtractor for PatternExtractor {
    fn extract(&self, normalized: &str) -> Extraction {
        let site = self.site_match(normalized);
        let artifact = self.artifact_outside(normalized, site.as_ref().map(|(_, range)| range.clone()));
        Extraction {
            site: site.map(|(code, _)| code),
            artifact,
        }
    }
}

/// 修正数が最少のうち最初の候補（min_by_keyは同値なら先頭を返す）
fn pick<T>(candidates: impl IntoIterator<Item = Candidate<T>>) -> Option<T> {
    candidates
        .into_iter()
        .min_by_key(|c| c.corrections)
        .map(|c| c.value)
}
