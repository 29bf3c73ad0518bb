//! The multi-scale proposal network: transform units, refinement blocks,
//! fusion stages and the wiring between them.

mod conv;
mod fusion;
mod head;
mod proposal;
mod refinement;

pub use conv::{ConvBlock, LEAKY_SLOPE};
pub use fusion::{FusionStage, FusionStageConfig, UPSAMPLE_FACTOR};
pub use head::{PyramidHead, PyramidHeadConfig};
pub use proposal::ProposalModel;
pub use refinement::{RefinementBlock, RefinementBlockConfig, RefinementOutput};

use burn::tensor::backend::Backend;

/// Source of the batch-norm statistics.
///
/// Carried by the backend type: an `Autodiff<B>` model trains on batch statistics,
/// and `AutodiffModule::valid` yields the inference model on `B`, which uses running statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Training,
  Inference,
}

impl Mode {
  pub fn of<B: Backend>() -> Self {
    if B::ad_enabled() {
      Mode::Training
    } else {
      Mode::Inference
    }
  }
}
