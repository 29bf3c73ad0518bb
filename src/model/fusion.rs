use burn::{
  module::Module,
  tensor::{
    Device, Tensor,
    backend::Backend,
    module::interpolate,
    ops::{InterpolateMode, InterpolateOptions},
  },
};
use tracing::debug;

use super::conv::ConvBlock;
use crate::error::{ProposalError, Result};

pub const UPSAMPLE_FACTOR: usize = 2;

fn upsample<B: Backend>(x: Tensor<B, 4>, scale: usize) -> Tensor<B, 4> {
  let [_, _, h, w] = x.dims();
  interpolate(
    x,
    [h * scale, w * scale],
    InterpolateOptions::new(InterpolateMode::Nearest),
  )
}

/// Projects a coarse compact map, upsamples it by 2 and appends the finer backbone map.
#[derive(Module, Debug)]
pub struct FusionStage<B: Backend> {
  reduce: ConvBlock<B>,
}

impl<B: Backend> FusionStage<B> {
  pub fn in_channels(&self) -> usize {
    self.reduce.in_channels()
  }

  pub fn out_channels(&self) -> usize {
    self.reduce.out_channels()
  }

  /// Returns `cat([upsample(reduce(compact)), lateral], 1)`.
  pub fn forward(&self, compact: Tensor<B, 4>, lateral: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
    let [_, channels, _, _] = compact.dims();
    if channels != self.in_channels() {
      return Err(ProposalError::shape_mismatch(
        "fusion stage input channels",
        self.in_channels(),
        channels,
      ));
    }

    let x = self.reduce.forward(compact);
    let x = upsample(x, UPSAMPLE_FACTOR);

    let [batch, _, height, width] = x.dims();
    let [lateral_batch, _, lateral_height, lateral_width] = lateral.dims();
    if (batch, height, width) != (lateral_batch, lateral_height, lateral_width) {
      return Err(ProposalError::shape_mismatch(
        "fusion stage concatenation",
        [batch, height, width],
        [lateral_batch, lateral_height, lateral_width],
      ));
    }

    let fused = Tensor::cat(vec![x, lateral], 1);
    debug!(fused = ?fused.dims(), "fusion stage");
    Ok(fused)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionStageConfig {
  pub in_channels: usize,
  pub out_channels: usize,
}

impl FusionStageConfig {
  pub fn new(in_channels: usize, out_channels: usize) -> Self {
    Self {
      in_channels,
      out_channels,
    }
  }

  pub fn init<B: Backend>(&self, device: &Device<B>) -> FusionStage<B> {
    FusionStage {
      reduce: ConvBlock::new(self.in_channels, self.out_channels, 1, 1, device),
    }
  }
}
