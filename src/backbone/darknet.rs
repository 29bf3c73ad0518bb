use std::path::Path;

use burn::{
  module::Module,
  record::{FullPrecisionSettings, NamedMpkFileRecorder},
  tensor::{Device, Tensor, backend::Backend},
};
use tracing::info;

use super::Backbone;
use crate::{
  error::{ProposalError, Result},
  model::ConvBlock,
  scale::{LevelChannels, PyramidFeatures},
};

const STEM_CHANNELS: usize = 32;
const STAGE_CHANNELS: [usize; 5] = [64, 128, 256, 512, 1024];

// Stages whose outputs feed the head: fine, middle, coarse
const FINE_STAGE: usize = 2;
const MIDDLE_STAGE: usize = 3;
const COARSE_STAGE: usize = 4;

type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

// ResidualBlock Definition
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
  conv1: ConvBlock<B>,
  conv2: ConvBlock<B>,
}

impl<B: Backend> ResidualBlock<B> {
  pub fn new(channels: usize, device: &Device<B>) -> Self {
    let half_channels = channels / 2;
    Self {
      conv1: ConvBlock::new(channels, half_channels, 1, 1, device),
      conv2: ConvBlock::new(half_channels, channels, 3, 1, device),
    }
  }

  pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
    let residual = input.clone();
    let x = self.conv1.forward(input);
    let x = self.conv2.forward(x);
    x + residual
  }
}

/// A stride-2 3x3 downsampling conv followed by residual blocks.
#[derive(Module, Debug)]
pub struct DarknetStage<B: Backend> {
  downsample: ConvBlock<B>,
  blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> DarknetStage<B> {
  fn new(in_channels: usize, out_channels: usize, depth: usize, device: &Device<B>) -> Self {
    Self {
      downsample: ConvBlock::new(in_channels, out_channels, 3, 2, device),
      blocks: (0..depth)
        .map(|_| ResidualBlock::new(out_channels, device))
        .collect(),
    }
  }

  fn out_channels(&self) -> usize {
    self.downsample.out_channels()
  }

  pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
    let mut x = self.downsample.forward(input);
    for block in &self.blocks {
      x = block.forward(x);
    }
    x
  }
}

/// Darknet backbone. Emits the outputs of its last three stages at strides 8, 16 and 32.
#[derive(Module, Debug)]
pub struct Darknet<B: Backend> {
  stem: ConvBlock<B>,
  stages: Vec<DarknetStage<B>>,
}

impl<B: Backend> Darknet<B> {
  /// Load a record written by [save_weights](Self::save_weights).
  pub fn load_weights(self, path: &Path, device: &Device<B>) -> Result<Self> {
    let darknet = self
      .load_file(path.to_path_buf(), &WeightsRecorder::new(), device)
      .map_err(|err| ProposalError::Weights {
        path: path.to_path_buf(),
        reason: format!("{err:?}"),
      })?;
    info!(path = %path.display(), "loaded backbone weights");
    Ok(darknet)
  }

  pub fn save_weights(&self, path: &Path) -> Result<()> {
    self
      .clone()
      .save_file(path.to_path_buf(), &WeightsRecorder::new())
      .map_err(|err| ProposalError::Weights {
        path: path.to_path_buf(),
        reason: format!("{err:?}"),
      })
  }
}

impl<B: Backend> Backbone<B> for Darknet<B> {
  fn level_channels(&self) -> LevelChannels {
    LevelChannels {
      fine: self.stages[FINE_STAGE].out_channels(),
      middle: self.stages[MIDDLE_STAGE].out_channels(),
      coarse: self.stages[COARSE_STAGE].out_channels(),
    }
  }

  fn forward(&self, image: Tensor<B, 4>) -> PyramidFeatures<B> {
    let x = self.stem.forward(image);
    let x = self.stages[0].forward(x);
    let x = self.stages[1].forward(x);
    let fine = self.stages[FINE_STAGE].forward(x);
    let middle = self.stages[MIDDLE_STAGE].forward(fine.clone());
    let coarse = self.stages[COARSE_STAGE].forward(middle.clone());

    PyramidFeatures {
      fine,
      middle,
      coarse,
    }
  }
}

/// [Darknet] configuration: residual blocks per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DarknetConfig {
  pub depths: [usize; 5],
}

impl DarknetConfig {
  pub fn darknet21() -> Self {
    Self {
      depths: [1, 1, 2, 2, 1],
    }
  }

  pub fn darknet53() -> Self {
    Self {
      depths: [1, 2, 8, 8, 4],
    }
  }

  pub fn init<B: Backend>(&self, device: &Device<B>) -> Darknet<B> {
    let stem = ConvBlock::new(3, STEM_CHANNELS, 3, 1, device);

    let mut in_channels = STEM_CHANNELS;
    let mut stages = Vec::with_capacity(STAGE_CHANNELS.len());
    for (out_channels, depth) in STAGE_CHANNELS.into_iter().zip(self.depths) {
      stages.push(DarknetStage::new(in_channels, out_channels, depth, device));
      in_channels = out_channels;
    }

    Darknet { stem, stages }
  }
}
