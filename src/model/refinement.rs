use burn::{
  module::Module,
  nn::conv::{Conv2d, Conv2dConfig},
  tensor::{Device, Tensor, backend::Backend},
};
use tracing::debug;

use super::conv::ConvBlock;
use crate::error::{ProposalError, Result};

// stage whose output feeds the next fusion stage
const COMPACT_STAGE: usize = 4;

/// Output of a [RefinementBlock].
#[derive(Debug, Clone)]
pub struct RefinementOutput<B: Backend> {
  pub prediction: Tensor<B, 4>,
  pub compact: Tensor<B, 4>,
}

/// Six alternating 1x1 reduce / 3x3 expand stages followed by a 1x1 output conv with bias.
#[derive(Module, Debug)]
pub struct RefinementBlock<B: Backend> {
  stages: Vec<ConvBlock<B>>,
  conv_out: Conv2d<B>,
  in_channels: usize,
}

impl<B: Backend> RefinementBlock<B> {
  pub fn in_channels(&self) -> usize {
    self.in_channels
  }

  #[cfg(test)]
  pub(crate) fn output_weight(&self) -> Tensor<B, 4> {
    self.conv_out.weight.val()
  }

  pub fn forward(&self, input: Tensor<B, 4>) -> Result<RefinementOutput<B>> {
    let [_, channels, _, _] = input.dims();
    if channels != self.in_channels {
      return Err(ProposalError::shape_mismatch(
        "refinement block input channels",
        self.in_channels,
        channels,
      ));
    }

    let (leading, trailing) = self.stages.split_at(COMPACT_STAGE + 1);
    let compact = leading.iter().fold(input, |x, stage| stage.forward(x));
    let x = trailing
      .iter()
      .fold(compact.clone(), |x, stage| stage.forward(x));

    let prediction = self.conv_out.forward(x);
    debug!(
      compact = ?compact.dims(),
      prediction = ?prediction.dims(),
      "refinement block"
    );
    Ok(RefinementOutput {
      prediction,
      compact,
    })
  }
}

/// [RefinementBlock] configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementBlockConfig {
  pub in_channels: usize,
  /// `[reduce, expand]` widths, e.g. `[512, 1024]`.
  pub widths: [usize; 2],
  pub out_channels: usize,
}

impl RefinementBlockConfig {
  pub fn new(in_channels: usize, widths: [usize; 2], out_channels: usize) -> Self {
    Self {
      in_channels,
      widths,
      out_channels,
    }
  }

  pub fn compact_channels(&self) -> usize {
    self.widths[0]
  }

  pub fn init<B: Backend>(&self, device: &Device<B>) -> RefinementBlock<B> {
    let [reduce, expand] = self.widths;
    let stages = vec![
      ConvBlock::new(self.in_channels, reduce, 1, 1, device),
      ConvBlock::new(reduce, expand, 3, 1, device),
      ConvBlock::new(expand, reduce, 1, 1, device),
      ConvBlock::new(reduce, expand, 3, 1, device),
      ConvBlock::new(expand, reduce, 1, 1, device),
      ConvBlock::new(reduce, expand, 3, 1, device),
    ];
    let conv_out = Conv2dConfig::new([expand, self.out_channels], [1, 1])
      .with_bias(true)
      .init(device);

    RefinementBlock {
      stages,
      conv_out,
      in_channels: self.in_channels,
    }
  }
}
