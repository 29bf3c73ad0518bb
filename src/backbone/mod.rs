//! Image backbones feeding the pyramid head.
//!
//! A backbone is anything implementing [Backbone]. Concrete networks are picked
//! by name through [BackboneKind], mirroring the `backbone_name` config key.

mod darknet;

use std::{fmt, path::Path, str::FromStr};

use burn::tensor::{Device, Tensor, backend::Backend};
use tracing::info;

pub use darknet::{Darknet, DarknetConfig, DarknetStage, ResidualBlock};

use crate::{
  error::{ProposalError, Result},
  scale::{LevelChannels, PyramidFeatures},
};

/// Feature extractor producing three maps, each at twice the resolution of the next.
pub trait Backbone<B: Backend> {
  /// Channels of each emitted level. Sizes the head's inputs.
  fn level_channels(&self) -> LevelChannels;

  /// `image` is `[batch, 3, height, width]`.
  fn forward(&self, image: Tensor<B, 4>) -> PyramidFeatures<B>;
}

/// Registry of the backbones that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackboneKind {
  Darknet21,
  Darknet53,
}

impl BackboneKind {
  pub const ALL: [BackboneKind; 2] = [BackboneKind::Darknet21, BackboneKind::Darknet53];

  pub fn name(self) -> &'static str {
    match self {
      BackboneKind::Darknet21 => "darknet_21",
      BackboneKind::Darknet53 => "darknet_53",
    }
  }

  pub fn config(self) -> DarknetConfig {
    match self {
      BackboneKind::Darknet21 => DarknetConfig::darknet21(),
      BackboneKind::Darknet53 => DarknetConfig::darknet53(),
    }
  }

  /// Build the backbone, loading `pretrained` weights when a path is given.
  pub fn init<B: Backend>(self, pretrained: Option<&Path>, device: &Device<B>) -> Result<Darknet<B>> {
    let backbone = self.config().init(device);
    info!(backbone = self.name(), pretrained = pretrained.is_some(), "backbone initialized");
    match pretrained {
      Some(path) => backbone.load_weights(path, device),
      None => Ok(backbone),
    }
  }
}

impl fmt::Display for BackboneKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for BackboneKind {
  type Err = ProposalError;

  fn from_str(name: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.name() == name)
      .ok_or_else(|| ProposalError::UnknownBackbone {
        name: name.to_string(),
        known: Self::ALL.map(|kind| kind.name()).join(", "),
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use burn::backend::NdArray;
  use burn::module::Module;
  use burn::tensor::Distribution;

  type TB = NdArray;

  #[test]
  fn test_backbone_names_round_trip() {
    for kind in BackboneKind::ALL {
      assert_eq!(kind.name().parse::<BackboneKind>().unwrap(), kind);
    }
  }

  #[test]
  fn test_unknown_backbone_lists_known_names() {
    let err = "resnet_50".parse::<BackboneKind>().unwrap_err();
    match err {
      ProposalError::UnknownBackbone { name, known } => {
        assert_eq!(name, "resnet_50");
        assert!(known.contains("darknet_53"));
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn test_darknet_levels_halve_resolution() {
    let device = Default::default();
    let backbone: Darknet<TB> = DarknetConfig::darknet21().init(&device);

    assert_eq!(
      backbone.level_channels(),
      LevelChannels {
        fine: 256,
        middle: 512,
        coarse: 1024,
      }
    );

    let image: Tensor<TB, 4> = Tensor::zeros([2, 3, 64, 96], &device);
    let features = backbone.forward(image);
    assert_eq!(
      features.dims(),
      [[2, 256, 8, 12], [2, 512, 4, 6], [2, 1024, 2, 3]]
    );
  }

  #[test]
  fn test_darknet53_levels_and_strides() {
    let device = Default::default();
    let backbone: Darknet<TB> = BackboneKind::Darknet53.init(None, &device).unwrap();

    assert_eq!(
      backbone.level_channels(),
      LevelChannels {
        fine: 256,
        middle: 512,
        coarse: 1024,
      }
    );
    // same widths as darknet_21, deeper stages
    let shallow: Darknet<TB> = BackboneKind::Darknet21.init(None, &device).unwrap();
    assert!(backbone.num_params() > shallow.num_params());

    let image: Tensor<TB, 4> = Tensor::random([1, 3, 64, 64], Distribution::Default, &device);
    let features = backbone.forward(image);
    assert_eq!(
      features.dims(),
      [[1, 256, 8, 8], [1, 512, 4, 4], [1, 1024, 2, 2]]
    );
    for (scale, map) in features.iter() {
      assert_eq!(64 / map.dims()[2], scale.stride());
    }
  }

  #[test]
  fn test_residual_block_keeps_shape() {
    let device = Default::default();
    let block = ResidualBlock::<TB>::new(16, &device);

    let input: Tensor<TB, 4> = Tensor::ones([1, 16, 8, 8], &device);
    let output = block.forward(input.clone());
    assert_eq!(output.dims(), input.dims());
  }
}
