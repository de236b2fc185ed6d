//! Artifact Renamer Common Library
//!
//! CLIとWebサーバで共有される、I/Oを持たない型と規則

pub mod batch;
pub mod conflict;
pub mod detection;
pub mod error;
pub mod extractor;
pub mod normalizer;

pub use batch::{BatchResult, FailureKind, FileOutcome};
pub use conflict::{ConflictPolicy, RenameAction};
pub use detection::{ArtifactNumber, DetectionResult, SchemaRules, SiteCode};
pub use error::{Error, Result};
pub use extractor::{
    Extraction, IdentifierExtractor, PatternExtractor, DEFAULT_ARTIFACT_PATTERN,
    DEFAULT_SITE_PATTERN,
};
pub use normalizer::normalize;
