use burn::{
  module::Module,
  nn::{
    BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, PaddingConfig2d,
    conv::{Conv2d, Conv2dConfig},
  },
  tensor::{Device, Tensor, backend::Backend},
};

pub const LEAKY_SLOPE: f64 = 0.1;

/// Conv (no bias) -> BatchNorm -> LeakyReLU(0.1).
///
/// Padding is `(kernel_size - 1) / 2`, so a stride of 1 keeps the spatial size.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
  conv: Conv2d<B>,
  bn: BatchNorm<B, 2>,
  activation: LeakyRelu,
  in_channels: usize,
  out_channels: usize,
}

impl<B: Backend> ConvBlock<B> {
  pub fn new(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    device: &Device<B>,
  ) -> Self {
    let padding = (kernel_size - 1) / 2;
    Self {
      conv: Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false)
        .init(device),
      bn: BatchNormConfig::new(out_channels).init(device),
      activation: LeakyReluConfig::new()
        .with_negative_slope(LEAKY_SLOPE)
        .init(),
      in_channels,
      out_channels,
    }
  }

  pub fn in_channels(&self) -> usize {
    self.in_channels
  }

  pub fn out_channels(&self) -> usize {
    self.out_channels
  }

  pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
    let x = self.conv.forward(input);
    let x = self.bn.forward(x);
    self.activation.forward(x)
  }
}
