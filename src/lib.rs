//! Multi-scale YOLO proposal head on top of a Darknet backbone.
//!
//! The head refines the coarsest backbone map, then twice projects, upsamples
//! and concatenates the refined map with the next finer backbone map. It returns
//! one raw prediction map per scale:
//!
//! ```text
//! image -> backbone -> (fine, middle, coarse)
//!   coarse                      -> refine -> prediction0, compact0
//!   fuse(compact0, middle)      -> refine -> prediction1, compact1
//!   fuse(compact1, fine)        -> refine -> prediction2
//! ```
//!
//! Every prediction is `[batch, anchors * 5, height, width]`. Each anchor owns
//! five consecutive channels `tx, ty, tw, th, objectness`.

pub mod backbone;
pub mod config;
pub mod error;
pub mod hook;
pub mod model;
pub mod scale;

pub use backbone::{Backbone, BackboneKind};
pub use config::ProposalConfig;
pub use error::{ProposalError, Result};
pub use hook::{FeatureObserver, FeatureRecorder};
pub use model::{Mode, ProposalModel};
pub use scale::{BOX_ATTRS, PyramidFeatures, Scale, ScaleDescriptor, ScalePredictions};
