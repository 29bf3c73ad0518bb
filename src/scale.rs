//! Scale tagging for the three detection levels.
//!
//! Backbone outputs and head predictions are carried in structs with named
//! fields instead of positional tuples, so a fine map can never be fed where a
//! coarse one is expected.

use burn::tensor::{Tensor, backend::Backend};

use crate::error::{ProposalError, Result};

/// Values predicted per anchor: `tx, ty, tw, th, objectness`.
pub const BOX_ATTRS: usize = 5;

/// One of the three detection levels.
///
/// `Coarse` is scale 0 (lowest resolution, largest anchors) and `Fine` is scale 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
  Coarse,
  Middle,
  Fine,
}

impl Scale {
  pub const ALL: [Scale; 3] = [Scale::Coarse, Scale::Middle, Scale::Fine];

  pub fn index(self) -> usize {
    match self {
      Scale::Coarse => 0,
      Scale::Middle => 1,
      Scale::Fine => 2,
    }
  }

  // relative to the input image
  pub fn stride(self) -> usize {
    match self {
      Scale::Coarse => 32,
      Scale::Middle => 16,
      Scale::Fine => 8,
    }
  }
}

/// Channel counts a backbone declares for each of its output levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChannels {
  pub fine: usize,
  pub middle: usize,
  pub coarse: usize,
}

impl LevelChannels {
  pub fn get(&self, scale: Scale) -> usize {
    match scale {
      Scale::Coarse => self.coarse,
      Scale::Middle => self.middle,
      Scale::Fine => self.fine,
    }
  }
}

/// The three feature maps produced by a backbone.
#[derive(Debug, Clone)]
pub struct PyramidFeatures<B: Backend> {
  pub fine: Tensor<B, 4>,
  pub middle: Tensor<B, 4>,
  pub coarse: Tensor<B, 4>,
}

impl<B: Backend> PyramidFeatures<B> {
  pub fn get(&self, scale: Scale) -> &Tensor<B, 4> {
    match scale {
      Scale::Coarse => &self.coarse,
      Scale::Middle => &self.middle,
      Scale::Fine => &self.fine,
    }
  }

  /// Maps in the order the backbone returns them: fine, middle, coarse.
  pub fn iter(&self) -> impl Iterator<Item = (Scale, &Tensor<B, 4>)> {
    [
      (Scale::Fine, &self.fine),
      (Scale::Middle, &self.middle),
      (Scale::Coarse, &self.coarse),
    ]
    .into_iter()
  }

  /// Maps ordered coarse first, the layout feature-visualization tooling expects.
  pub fn coarse_first(&self) -> [(Scale, Tensor<B, 4>); 3] {
    [
      (Scale::Coarse, self.coarse.clone()),
      (Scale::Middle, self.middle.clone()),
      (Scale::Fine, self.fine.clone()),
    ]
  }

  pub fn dims(&self) -> [[usize; 4]; 3] {
    [self.fine.dims(), self.middle.dims(), self.coarse.dims()]
  }
}

#[derive(Debug, Clone)]
pub struct ScalePredictions<B: Backend> {
  pub coarse: Tensor<B, 4>,
  pub middle: Tensor<B, 4>,
  pub fine: Tensor<B, 4>,
}

impl<B: Backend> ScalePredictions<B> {
  pub fn get(&self, scale: Scale) -> &Tensor<B, 4> {
    match scale {
      Scale::Coarse => &self.coarse,
      Scale::Middle => &self.middle,
      Scale::Fine => &self.fine,
    }
  }

  pub fn into_tuple(self) -> (Tensor<B, 4>, Tensor<B, 4>, Tensor<B, 4>) {
    (self.coarse, self.middle, self.fine)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleDescriptor {
  pub scale: Scale,
  pub num_anchors: usize,
}

impl ScaleDescriptor {
  pub fn output_channels(&self) -> usize {
    self.num_anchors * BOX_ATTRS
  }
}

/// Reshapes a raw prediction `[b, a * 5, h, w]` into `[b, a, 5, h, w]`.
///
/// Each anchor owns a contiguous block of [BOX_ATTRS] channels, so this is a pure view change.
pub fn split_anchors<B: Backend>(prediction: Tensor<B, 4>) -> Result<Tensor<B, 5>> {
  let [batch, channels, height, width] = prediction.dims();
  if channels == 0 || channels % BOX_ATTRS != 0 {
    return Err(ProposalError::shape_mismatch(
      "split_anchors",
      format!("a multiple of {BOX_ATTRS} channels"),
      channels,
    ));
  }
  Ok(prediction.reshape([batch, channels / BOX_ATTRS, BOX_ATTRS, height, width]))
}

#[cfg(test)]
mod tests {
  use super::*;
  use burn::backend::NdArray;
  use burn::tensor::TensorData;

  type TB = NdArray;

  #[test]
  fn test_split_anchors_keeps_per_anchor_blocks() {
    let device = Default::default();
    // 2 anchors * 5 attrs on a 1x1 grid, channel i holds value i
    let values: Vec<f32> = (0..10).map(|i| i as f32).collect();
    let prediction: Tensor<TB, 4> =
      Tensor::from_data(TensorData::new(values, [1, 10, 1, 1]), &device);

    let split = split_anchors(prediction).unwrap();
    assert_eq!(split.dims(), [1, 2, 5, 1, 1]);

    let second_anchor: Vec<f32> = split
      .slice([0..1, 1..2, 0..5, 0..1, 0..1])
      .into_data()
      .to_vec()
      .unwrap();
    assert_eq!(second_anchor, vec![5.0, 6.0, 7.0, 8.0, 9.0]);
  }

  #[test]
  fn test_split_anchors_rejects_partial_blocks() {
    let device = Default::default();
    let prediction: Tensor<TB, 4> = Tensor::zeros([1, 7, 2, 2], &device);
    assert!(matches!(
      split_anchors(prediction),
      Err(ProposalError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn test_scale_order_and_strides() {
    let indices: Vec<usize> = Scale::ALL.iter().map(|s| s.index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(Scale::Coarse.stride(), 2 * Scale::Middle.stride());
    assert_eq!(Scale::Middle.stride(), 2 * Scale::Fine.stride());
  }
}
