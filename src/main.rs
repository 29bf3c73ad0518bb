#![recursion_limit = "256"]

use std::path::PathBuf;

use burn::backend::wgpu::WgpuDevice;
use burn::backend::{NdArray, Wgpu};
use burn::tensor::{Distribution, Tensor, backend::Backend};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use yolo_proposal::{FeatureRecorder, ProposalConfig, Scale};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
  Wgpu,
  Ndarray,
}

// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// JSON model configuration; the reference darknet_53 / COCO anchors setup when omitted
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[arg(long, default_value_t = 416)]
  height: usize,

  #[arg(long, default_value_t = 416)]
  width: usize,

  #[arg(short, long, default_value_t = 1)]
  batch: usize,

  #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
  backend: BackendKind,
}

fn run<B: Backend>(args: &Args, config: &ProposalConfig, device: B::Device) -> yolo_proposal::Result<()> {
  let model = config.init::<B>(&device)?;
  let image = Tensor::<B, 4>::random(
    [args.batch, 3, args.height, args.width],
    Distribution::Default,
    &device,
  );

  let mut recorder = FeatureRecorder::new();
  let predictions = model.forward_observed(image, &mut recorder)?;

  println!("----------------------------------------");
  for scale in Scale::ALL {
    println!("Prediction {:?}: {:?}", scale, predictions.get(scale).dims());
  }
  if let Some(features) = recorder.last() {
    for (scale, feature) in features.iter() {
      println!("Backbone feature {:?}: {:?}", scale, feature.dims());
    }
  }
  println!("----------------------------------------");
  Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let config = match &args.config {
    Some(path) => ProposalConfig::from_file(path)?,
    None => ProposalConfig::default(),
  };

  println!("YOLO Proposal Example");
  println!("Backbone: {}", config.model_params.backbone_name);
  println!("Input: [{}, 3, {}, {}]", args.batch, args.height, args.width);

  match args.backend {
    BackendKind::Wgpu => run::<Wgpu>(&args, &config, WgpuDevice::default())?,
    BackendKind::Ndarray => run::<NdArray>(&args, &config, Default::default())?,
  }

  println!("YOLO Proposal Example Finished.");
  Ok(())
}
