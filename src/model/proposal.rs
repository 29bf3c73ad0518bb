use burn::{
  module::Module,
  tensor::{Device, Tensor, backend::Backend},
};
use tracing::{debug, info};

use super::{
  Mode,
  head::{PyramidHead, PyramidHeadConfig},
};
use crate::{
  backbone::Backbone,
  error::{ProposalError, Result},
  hook::FeatureObserver,
  scale::{Scale, ScaleDescriptor, ScalePredictions},
};

const IMAGE_CHANNELS: usize = 3;

/// A [Backbone] followed by the three-scale [PyramidHead].
#[derive(Module, Debug)]
pub struct ProposalModel<B: Backend, N> {
  backbone: N,
  head: PyramidHead<B>,
  anchors_coarse: usize,
  anchors_middle: usize,
  anchors_fine: usize,
}

impl<B, N> ProposalModel<B, N>
where
  B: Backend,
  N: Backbone<B> + Module<B>,
{
  /// Wire `backbone` to a head sized for `scales` (coarse, middle, fine).
  pub fn new(backbone: N, scales: &[ScaleDescriptor; 3], device: &Device<B>) -> Result<Self> {
    for (descriptor, expected) in scales.iter().zip(Scale::ALL) {
      if descriptor.scale != expected {
        return Err(ProposalError::Config {
          reason: format!(
            "scale {} must be {expected:?}, got {:?}",
            expected.index(),
            descriptor.scale
          ),
        });
      }
    }

    let head = PyramidHeadConfig::new(backbone.level_channels(), scales).init(device)?;
    let [coarse, middle, fine] = scales.map(|s| s.num_anchors);
    info!(
      anchors = ?[coarse, middle, fine],
      outputs = ?scales.map(|s| s.output_channels()),
      "proposal model initialized"
    );

    Ok(Self {
      backbone,
      head,
      anchors_coarse: coarse,
      anchors_middle: middle,
      anchors_fine: fine,
    })
  }

  /// The instrumentable feature extractor.
  pub fn backbone(&self) -> &N {
    &self.backbone
  }

  pub fn head(&self) -> &PyramidHead<B> {
    &self.head
  }

  pub fn scales(&self) -> [ScaleDescriptor; 3] {
    Scale::ALL.map(|scale| ScaleDescriptor {
      scale,
      num_anchors: match scale {
        Scale::Coarse => self.anchors_coarse,
        Scale::Middle => self.anchors_middle,
        Scale::Fine => self.anchors_fine,
      },
    })
  }

  pub fn output_channels(&self, scale: Scale) -> usize {
    self.scales()[scale.index()].output_channels()
  }

  pub fn mode(&self) -> Mode {
    Mode::of::<B>()
  }

  pub fn forward(&self, image: Tensor<B, 4>) -> Result<ScalePredictions<B>> {
    self.run(image, None)
  }

  /// Same as [forward](Self::forward), handing the backbone output to `observer` first.
  pub fn forward_observed(
    &self,
    image: Tensor<B, 4>,
    observer: &mut impl FeatureObserver<B>,
  ) -> Result<ScalePredictions<B>> {
    self.run(image, Some(observer as &mut dyn FeatureObserver<B>))
  }

  fn run(
    &self,
    image: Tensor<B, 4>,
    observer: Option<&mut dyn FeatureObserver<B>>,
  ) -> Result<ScalePredictions<B>> {
    let dims = image.dims();
    let [_, channels, height, width] = dims;
    if channels != IMAGE_CHANNELS || height == 0 || width == 0 {
      return Err(ProposalError::shape_mismatch(
        "input image",
        format!("[batch, {IMAGE_CHANNELS}, height, width]"),
        dims,
      ));
    }
    debug!(image = ?dims, mode = ?self.mode(), "proposal forward");

    let features = self.backbone.forward(image);
    debug!(features = ?features.dims(), "backbone features");
    if let Some(observer) = observer {
      observer.observe(&features);
    }

    self.head.forward(features)
  }
}
