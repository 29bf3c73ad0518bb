use std::{fs, path::Path};

use burn::tensor::{Device, backend::Backend};
use serde::{Deserialize, Serialize};

use crate::{
  backbone::{BackboneKind, Darknet},
  error::{ProposalError, Result},
  model::ProposalModel,
  scale::{Scale, ScaleDescriptor},
};

/// Model configuration, mirroring the `model_params` / `yolo` JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalConfig {
  pub model_params: ModelParams,
  pub yolo: YoloParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
  /// Key into [BackboneKind], e.g. `darknet_53`.
  pub backbone_name: String,
  /// Path to a backbone weight record. Empty disables loading.
  #[serde(default)]
  pub backbone_pretrained: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoloParams {
  /// `[width, height]` anchors per scale, coarse scale first.
  /// Only the number of anchors per scale shapes the model.
  pub anchors: Vec<Vec<[f32; 2]>>,
}

impl Default for ProposalConfig {
  fn default() -> Self {
    Self {
      model_params: ModelParams {
        backbone_name: BackboneKind::Darknet53.name().to_string(),
        backbone_pretrained: String::new(),
      },
      yolo: YoloParams {
        anchors: vec![
          vec![[116., 90.], [156., 198.], [373., 326.]],
          vec![[30., 61.], [62., 45.], [59., 119.]],
          vec![[10., 13.], [16., 30.], [33., 23.]],
        ],
      },
    }
  }
}

impl ProposalConfig {
  pub fn from_json_str(json: &str) -> Result<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let json = fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  pub fn backbone(&self) -> Result<BackboneKind> {
    self.model_params.backbone_name.parse()
  }

  pub fn pretrained(&self) -> Option<&Path> {
    let path = self.model_params.backbone_pretrained.trim();
    (!path.is_empty()).then(|| Path::new(path))
  }

  pub fn scales(&self) -> Result<[ScaleDescriptor; 3]> {
    let anchors = &self.yolo.anchors;
    if anchors.len() != Scale::ALL.len() {
      return Err(ProposalError::InvalidAnchors {
        reason: format!("expected {} scales, got {}", Scale::ALL.len(), anchors.len()),
      });
    }

    let mut scales = Scale::ALL.map(|scale| ScaleDescriptor {
      scale,
      num_anchors: 0,
    });
    for (descriptor, anchors) in scales.iter_mut().zip(anchors) {
      if anchors.is_empty() {
        return Err(ProposalError::InvalidAnchors {
          reason: format!("scale {:?} has no anchors", descriptor.scale),
        });
      }
      descriptor.num_anchors = anchors.len();
    }
    Ok(scales)
  }

  pub fn init<B: Backend>(&self, device: &Device<B>) -> Result<ProposalModel<B, Darknet<B>>> {
    let scales = self.scales()?;
    let backbone = self.backbone()?.init(self.pretrained(), device)?;
    ProposalModel::new(backbone, &scales, device)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const REFERENCE_JSON: &str = r#"{
    "model_params": {
      "backbone_name": "darknet_53",
      "backbone_pretrained": ""
    },
    "yolo": {
      "anchors": [[[116, 90], [156, 198], [373, 326]],
                  [[30, 61], [62, 45], [59, 119]],
                  [[10, 13], [16, 30], [33, 23]]],
      "classes": 80
    }
  }"#;

  #[test]
  fn test_reference_json_matches_default() {
    let config = ProposalConfig::from_json_str(REFERENCE_JSON).unwrap();
    assert_eq!(config, ProposalConfig::default());
    assert_eq!(config.backbone().unwrap(), BackboneKind::Darknet53);
    assert!(config.pretrained().is_none());
  }

  #[test]
  fn test_scales_follow_anchor_counts() {
    let mut config = ProposalConfig::default();
    config.yolo.anchors[1].pop();
    config.yolo.anchors[2].push([8., 8.]);

    let scales = config.scales().unwrap();
    let counts: Vec<(Scale, usize)> = scales.iter().map(|s| (s.scale, s.num_anchors)).collect();
    assert_eq!(
      counts,
      vec![(Scale::Coarse, 3), (Scale::Middle, 2), (Scale::Fine, 4)]
    );
    assert_eq!(scales[2].output_channels(), 20);
  }

  #[test]
  fn test_missing_scale_is_rejected() {
    let mut config = ProposalConfig::default();
    config.yolo.anchors.truncate(2);
    assert!(matches!(
      config.scales(),
      Err(ProposalError::InvalidAnchors { .. })
    ));
  }

  #[test]
  fn test_empty_scale_is_rejected() {
    let mut config = ProposalConfig::default();
    config.yolo.anchors[0].clear();
    assert!(matches!(
      config.scales(),
      Err(ProposalError::InvalidAnchors { .. })
    ));
  }

  #[test]
  fn test_missing_pretrained_key_disables_loading() {
    let json = r#"{"model_params": {"backbone_name": "darknet_21"}, "yolo": {"anchors": [[[1, 1]], [[1, 1]], [[1, 1]]]}}"#;
    let config = ProposalConfig::from_json_str(json).unwrap();
    assert!(config.pretrained().is_none());
    assert_eq!(config.backbone().unwrap(), BackboneKind::Darknet21);
  }

  #[test]
  fn test_malformed_json_is_reported() {
    assert!(matches!(
      ProposalConfig::from_json_str("{\"yolo\": 3}"),
      Err(ProposalError::Json(_))
    ));
  }
}
