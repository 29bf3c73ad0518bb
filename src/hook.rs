//! Observation of the backbone output, for feature-visualization tooling.
//!
//! Observers only get a shared reference to the features and cannot change
//! what the head computes.

use burn::tensor::backend::Backend;

use crate::scale::PyramidFeatures;

/// Receives the backbone's feature maps once per forward pass.
pub trait FeatureObserver<B: Backend> {
  fn observe(&mut self, features: &PyramidFeatures<B>);
}

impl<B, F> FeatureObserver<B> for F
where
  B: Backend,
  F: FnMut(&PyramidFeatures<B>),
{
  fn observe(&mut self, features: &PyramidFeatures<B>) {
    self(features)
  }
}

/// Keeps every observed [PyramidFeatures] in call order, each in the backbone's order.
#[derive(Debug)]
pub struct FeatureRecorder<B: Backend> {
  captured: Vec<PyramidFeatures<B>>,
}

impl<B: Backend> Default for FeatureRecorder<B> {
  fn default() -> Self {
    Self {
      captured: Vec::new(),
    }
  }
}

impl<B: Backend> FeatureRecorder<B> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn captured(&self) -> &[PyramidFeatures<B>] {
    &self.captured
  }

  pub fn last(&self) -> Option<&PyramidFeatures<B>> {
    self.captured.last()
  }

  pub fn clear(&mut self) {
    self.captured.clear();
  }

  pub fn into_captured(self) -> Vec<PyramidFeatures<B>> {
    self.captured
  }
}

impl<B: Backend> FeatureObserver<B> for FeatureRecorder<B> {
  fn observe(&mut self, features: &PyramidFeatures<B>) {
    // tensor clones share storage
    self.captured.push(features.clone());
  }
}
