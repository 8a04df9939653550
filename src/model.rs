// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/model.rs - 颜色区域检测模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::Serialize;

use crate::{config::JobConfig, frame::PixelBuffer, tile::TileDescriptor};

pub trait Model {
  type Output;
  type Error;

  fn infer(&self, input: &PixelBuffer<'_>) -> Result<Self::Output, Self::Error>;
}

/// 分块内的检测结果，坐标相对分块左上角
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionLocal {
  pub x: f64,
  pub y: f64,
  pub area: u32,
}

impl DetectionLocal {
  pub fn to_global(&self, tile: &TileDescriptor) -> Detection {
    Detection {
      x: tile.x as f64 + self.x,
      y: tile.y as f64 + self.y,
      area: self.area,
    }
  }
}

/// 全局坐标下的检测结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub x: f64,
  pub y: f64,
  pub area: u32,
}

impl Detection {
  /// 最近的整数像素位置，超出 `i32` 范围时为 `None`
  pub fn pixel(&self) -> Option<(i32, i32)> {
    Some((round_to_i32(self.x)?, round_to_i32(self.y)?))
  }
}

fn round_to_i32(value: f64) -> Option<i32> {
  let rounded = value.round();
  if rounded >= i32::MIN as f64 && rounded <= i32::MAX as f64 {
    Some(rounded as i32)
  } else {
    None
  }
}

/// 分类 + 连通域提取
#[derive(Debug, Clone)]
pub struct ColorBlobModel {
  classifier: PixelClassifier,
  detector: ComponentDetector,
}

impl ColorBlobModel {
  pub fn new(classifier: PixelClassifier, detector: ComponentDetector) -> Self {
    Self {
      classifier,
      detector,
    }
  }

  pub fn from_config(config: &JobConfig) -> Self {
    Self::new(
      PixelClassifier::new(config.rule.clone(), config.zoom),
      ComponentDetector::new(config.min_area, config.zoom, config.open_mask),
    )
  }
}

impl Model for ColorBlobModel {
  type Output = Vec<DetectionLocal>;
  type Error = ClassificationError;

  fn infer(&self, input: &PixelBuffer<'_>) -> Result<Self::Output, Self::Error> {
    let mask = self.classifier.classify(input)?;
    Ok(self.detector.detect(&mask))
  }
}

mod classifier;
mod component;
pub use self::classifier::{
  ClassificationError, ClassifierRule, ColorChannel, Dominance, DualHueRange, HueRange,
  LinearThreshold, PixelClassifier, magnify, rgb_to_hsv,
};
pub use self::component::ComponentDetector;
