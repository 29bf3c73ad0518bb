use burn::{
  module::Module,
  tensor::{Device, backend::Backend},
};
use tracing::debug;

use super::{
  fusion::{FusionStage, FusionStageConfig},
  refinement::{RefinementBlock, RefinementBlockConfig},
};
use crate::{
  error::{ProposalError, Result},
  scale::{LevelChannels, PyramidFeatures, ScaleDescriptor, ScalePredictions},
};

// [reduce, expand] widths of each refinement block
const COARSE_WIDTHS: [usize; 2] = [512, 1024];
const MIDDLE_WIDTHS: [usize; 2] = [256, 512];
const FINE_WIDTHS: [usize; 2] = [128, 256];

/// Top-down feature pyramid head: one refinement block per scale, one fusion stage
/// between each pair of adjacent scales.
#[derive(Module, Debug)]
pub struct PyramidHead<B: Backend> {
  refine_coarse: RefinementBlock<B>,
  fuse_middle: FusionStage<B>,
  refine_middle: RefinementBlock<B>,
  fuse_fine: FusionStage<B>,
  refine_fine: RefinementBlock<B>,
}

impl<B: Backend> PyramidHead<B> {
  #[cfg(test)]
  pub(crate) fn refine_fine(&self) -> &RefinementBlock<B> {
    &self.refine_fine
  }

  pub fn forward(&self, features: PyramidFeatures<B>) -> Result<ScalePredictions<B>> {
    let PyramidFeatures {
      fine,
      middle,
      coarse,
    } = features;

    let coarse_out = self.refine_coarse.forward(coarse)?;

    let x = self.fuse_middle.forward(coarse_out.compact, middle)?;
    let middle_out = self.refine_middle.forward(x)?;

    let x = self.fuse_fine.forward(middle_out.compact, fine)?;
    // nothing consumes the finest compact map
    let fine_out = self.refine_fine.forward(x)?;

    debug!(
      coarse = ?coarse_out.prediction.dims(),
      middle = ?middle_out.prediction.dims(),
      fine = ?fine_out.prediction.dims(),
      "pyramid head predictions"
    );
    Ok(ScalePredictions {
      coarse: coarse_out.prediction,
      middle: middle_out.prediction,
      fine: fine_out.prediction,
    })
  }
}

/// [PyramidHead] configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidHeadConfig {
  pub lateral: LevelChannels,
  pub refine_coarse: RefinementBlockConfig,
  pub fuse_middle: FusionStageConfig,
  pub refine_middle: RefinementBlockConfig,
  pub fuse_fine: FusionStageConfig,
  pub refine_fine: RefinementBlockConfig,
}

impl PyramidHeadConfig {
  /// `scales` is in head order: coarse, middle, fine.
  pub fn new(lateral: LevelChannels, scales: &[ScaleDescriptor; 3]) -> Self {
    let [coarse, middle, fine] = scales;

    let refine_coarse =
      RefinementBlockConfig::new(lateral.coarse, COARSE_WIDTHS, coarse.output_channels());

    let fuse_middle = FusionStageConfig::new(COARSE_WIDTHS[0], COARSE_WIDTHS[0] / 2);
    let refine_middle = RefinementBlockConfig::new(
      fuse_middle.out_channels + lateral.middle,
      MIDDLE_WIDTHS,
      middle.output_channels(),
    );

    let fuse_fine = FusionStageConfig::new(MIDDLE_WIDTHS[0], MIDDLE_WIDTHS[0] / 2);
    let refine_fine = RefinementBlockConfig::new(
      fuse_fine.out_channels + lateral.fine,
      FINE_WIDTHS,
      fine.output_channels(),
    );

    Self {
      lateral,
      refine_coarse,
      fuse_middle,
      refine_middle,
      fuse_fine,
      refine_fine,
    }
  }

  /// Check that every concatenation lines up with the block consuming it.
  pub fn validate(&self) -> Result<()> {
    let check = |stage: &'static str, expected: usize, actual: usize| {
      if expected == actual {
        Ok(())
      } else {
        Err(ProposalError::shape_mismatch(stage, expected, actual))
      }
    };

    check(
      "coarse block input",
      self.refine_coarse.in_channels,
      self.lateral.coarse,
    )?;
    check(
      "middle fusion input",
      self.fuse_middle.in_channels,
      self.refine_coarse.compact_channels(),
    )?;
    check(
      "middle block input",
      self.refine_middle.in_channels,
      self.fuse_middle.out_channels + self.lateral.middle,
    )?;
    check(
      "fine fusion input",
      self.fuse_fine.in_channels,
      self.refine_middle.compact_channels(),
    )?;
    check(
      "fine block input",
      self.refine_fine.in_channels,
      self.fuse_fine.out_channels + self.lateral.fine,
    )?;

    for block in [&self.refine_coarse, &self.refine_middle, &self.refine_fine] {
      if block.out_channels == 0 {
        return Err(ProposalError::Config {
          reason: "refinement block with zero output channels".to_string(),
        });
      }
    }
    Ok(())
  }

  pub fn init<B: Backend>(&self, device: &Device<B>) -> Result<PyramidHead<B>> {
    self.validate()?;
    Ok(PyramidHead {
      refine_coarse: self.refine_coarse.init(device),
      fuse_middle: self.fuse_middle.init(device),
      refine_middle: self.refine_middle.init(device),
      fuse_fine: self.fuse_fine.init(device),
      refine_fine: self.refine_fine.init(device),
    })
  }
}
