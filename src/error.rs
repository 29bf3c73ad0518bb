use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProposalError>;

/// Errors raised while building or running a [ProposalModel](crate::model::ProposalModel).
#[derive(Debug, Error)]
pub enum ProposalError {
  #[error("unknown backbone `{name}` (expected one of: {known})")]
  UnknownBackbone { name: String, known: String },

  #[error("invalid anchors: {reason}")]
  InvalidAnchors { reason: String },

  #[error("invalid configuration: {reason}")]
  Config { reason: String },

  #[error("shape mismatch at {stage}: expected {expected}, got {actual}")]
  ShapeMismatch {
    stage: &'static str,
    expected: String,
    actual: String,
  },

  #[error("weights at {path}: {reason}")]
  Weights { path: PathBuf, reason: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

impl ProposalError {
  pub(crate) fn shape_mismatch(
    stage: &'static str,
    expected: impl std::fmt::Debug,
    actual: impl std::fmt::Debug,
  ) -> Self {
    Self::ShapeMismatch {
      stage,
      expected: format!("{expected:?}"),
      actual: format!("{actual:?}"),
    }
  }
}
