//! Parser error type.

use thiserror::Error;

/// Errors produced by `mf-parser`.
///
/// Every variant is a fatal structural error: the file violates the exchange
/// format and the enclosing build must abort. Recoverable oddities (a lane
/// missing its link, an unsupported object type) are skipped and logged, not
/// raised.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("road {road} has no lanes element")]
    RoadWithoutLanes { road: String },

    #[error("road {road} section {section} has no center lane")]
    SectionWithoutCenterLane { road: String, section: usize },

    #[error("road {road} section {section} has no left or right lanes")]
    SectionWithoutLanes { road: String, section: usize },

    #[error("{context}: missing required attribute {attribute}")]
    MissingAttribute {
        context: String,
        attribute: &'static str,
    },

    #[error("{context}: attribute {attribute} is not a number: {value}")]
    BadNumber {
        context: String,
        attribute: &'static str,
        value: String,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;
