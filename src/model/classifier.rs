// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/model/classifier.rs - 像素分类
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

use image::{GrayImage, Luma, RgbImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{PixelBuffer, RgbView, ToRgbImage};

const MASK_ON: u8 = 255;
const COLOR_CHANNELS: usize = 3;
/// 8 位 HSV 中色相的上限（含）
pub const HUE_MAX: u8 = 179;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
  #[error("分类规则需要 {expected} 个颜色通道, 分块只有 {actual} 个")]
  ChannelMismatch { expected: usize, actual: usize },
  #[error("放大后的尺寸溢出: {width}x{height} x{zoom}")]
  MagnifiedTooLarge { width: u32, height: u32, zoom: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChannel {
  Red,
  Green,
  Blue,
}

impl ColorChannel {
  /// 主通道与其余两个通道（按 R、G、B 顺序）的取值
  fn split(self, rgb: [u8; 3]) -> (u8, u8, u8) {
    match self {
      ColorChannel::Red => (rgb[0], rgb[1], rgb[2]),
      ColorChannel::Green => (rgb[1], rgb[0], rgb[2]),
      ColorChannel::Blue => (rgb[2], rgb[0], rgb[1]),
    }
  }
}

/// 主通道高于下界，其余两个通道低于各自上界（均为严格比较）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearThreshold {
  pub channel: ColorChannel,
  pub above: u8,
  pub others_below: [u8; 2],
}

impl Default for LinearThreshold {
  fn default() -> Self {
    Self {
      channel: ColorChannel::Red,
      above: 150,
      others_below: [100, 100],
    }
  }
}

impl LinearThreshold {
  fn matches(&self, rgb: [u8; 3]) -> bool {
    let (main, first, second) = self.channel.split(rgb);
    main > self.above && first < self.others_below[0] && second < self.others_below[1]
  }
}

/// 闭区间 `[min, max]`，取值范围 0..=179
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HueRange {
  pub min: u8,
  pub max: u8,
}

impl HueRange {
  fn contains(&self, hue: u8) -> bool {
    self.min <= hue && hue <= self.max
  }

  fn overlaps(&self, other: &HueRange) -> bool {
    self.min <= other.max && other.min <= self.max
  }
}

/// 两段互不相交的色相区间，任一命中且饱和度、明度不低于下界即为目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualHueRange {
  pub ranges: [HueRange; 2],
  pub saturation_min: u8,
  pub value_min: u8,
}

impl Default for DualHueRange {
  fn default() -> Self {
    Self {
      ranges: [HueRange { min: 0, max: 10 }, HueRange { min: 170, max: HUE_MAX }],
      saturation_min: 100,
      value_min: 100,
    }
  }
}

impl DualHueRange {
  fn matches(&self, rgb: [u8; 3]) -> bool {
    let [hue, saturation, value] = rgb_to_hsv(rgb);
    saturation >= self.saturation_min
      && value >= self.value_min
      && self.ranges.iter().any(|range| range.contains(hue))
  }
}

/// 主通道高于下界，且比其余两个通道都高出 `margin` 以上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dominance {
  pub channel: ColorChannel,
  pub above: u8,
  pub margin: u8,
}

impl Default for Dominance {
  fn default() -> Self {
    Self {
      channel: ColorChannel::Red,
      above: 180,
      margin: 80,
    }
  }
}

impl Dominance {
  fn matches(&self, rgb: [u8; 3]) -> bool {
    let (main, first, second) = self.channel.split(rgb);
    let margin = self.margin as i16;
    main > self.above
      && main as i16 - first as i16 > margin
      && main as i16 - second as i16 > margin
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClassifierRule {
  Threshold(LinearThreshold),
  Hue(DualHueRange),
  Dominance(Dominance),
}

impl Default for ClassifierRule {
  fn default() -> Self {
    ClassifierRule::Threshold(LinearThreshold::default())
  }
}

impl ClassifierRule {
  pub fn matches(&self, rgb: [u8; 3]) -> bool {
    match self {
      ClassifierRule::Threshold(rule) => rule.matches(rgb),
      ClassifierRule::Hue(rule) => rule.matches(rgb),
      ClassifierRule::Dominance(rule) => rule.matches(rgb),
    }
  }

  /// 检查规则参数，返回不合法的原因
  pub fn validate(&self) -> Result<(), String> {
    let ClassifierRule::Hue(rule) = self else {
      return Ok(());
    };

    for range in &rule.ranges {
      if range.min > range.max || range.max > HUE_MAX {
        return Err(format!(
          "色相区间 [{}, {}] 不合法, 取值须在 0..={} 且 min <= max",
          range.min, range.max, HUE_MAX
        ));
      }
    }
    if rule.ranges[0].overlaps(&rule.ranges[1]) {
      return Err(format!(
        "色相区间 [{}, {}] 与 [{}, {}] 相交",
        rule.ranges[0].min, rule.ranges[0].max, rule.ranges[1].min, rule.ranges[1].max
      ));
    }
    Ok(())
  }

  pub fn name(&self) -> &'static str {
    match self {
      ClassifierRule::Threshold(_) => "threshold",
      ClassifierRule::Hue(_) => "hue",
      ClassifierRule::Dominance(_) => "dominance",
    }
  }
}

/// RGB 转 8 位 HSV：H ∈ [0, 179]，S、V ∈ [0, 255]
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
  let [r, g, b] = rgb.map(|value| value as f32);
  let value = r.max(g).max(b);
  let delta = value - r.min(g).min(b);

  let saturation = if value == 0.0 {
    0.0
  } else {
    (delta * 255.0 / value).round()
  };

  let hue = if delta == 0.0 {
    0.0
  } else {
    let degrees = if value == r {
      60.0 * (g - b) / delta
    } else if value == g {
      120.0 + 60.0 * (b - r) / delta
    } else {
      240.0 + 60.0 * (r - g) / delta
    };
    let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };
    let half = (degrees / 2.0).round();
    if half >= 180.0 { half - 180.0 } else { half }
  };

  [hue as u8, saturation as u8, value as u8]
}

/// 以 Catmull-Rom 三次插值将分块放大 `zoom` 倍
pub fn magnify(buffer: &PixelBuffer<'_>, zoom: u32) -> Result<RgbImage, ClassificationError> {
  let too_large = || ClassificationError::MagnifiedTooLarge {
    width: buffer.width(),
    height: buffer.height(),
    zoom,
  };
  let width = buffer.width().checked_mul(zoom).ok_or_else(too_large)?;
  let height = buffer.height().checked_mul(zoom).ok_or_else(too_large)?;

  Ok(image::imageops::resize(
    &buffer.to_rgb_image(),
    width,
    height,
    FilterType::CatmullRom,
  ))
}

/// 把像素分块映射为 0 / 255 掩码
#[derive(Debug, Clone)]
pub struct PixelClassifier {
  rule: ClassifierRule,
  zoom: u32,
}

impl PixelClassifier {
  pub fn new(rule: ClassifierRule, zoom: u32) -> Self {
    Self {
      rule,
      zoom: zoom.max(1),
    }
  }

  pub fn rule(&self) -> &ClassifierRule {
    &self.rule
  }

  pub fn classify(&self, buffer: &PixelBuffer<'_>) -> Result<GrayImage, ClassificationError> {
    if buffer.order().rgb_indices().is_none() {
      return Err(ClassificationError::ChannelMismatch {
        expected: COLOR_CHANNELS,
        actual: buffer.channels(),
      });
    }
    if buffer.is_empty() {
      return Ok(GrayImage::new(0, 0));
    }

    if self.zoom > 1 {
      let magnified = magnify(buffer, self.zoom)?;
      Ok(self.mask(&magnified))
    } else {
      Ok(self.mask(buffer))
    }
  }

  fn mask<V: RgbView>(&self, view: &V) -> GrayImage {
    let (width, height) = view.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
      if self.rule.matches(view.rgb(x, y)) {
        Luma([MASK_ON])
      } else {
        Luma([0])
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::ChannelOrder;

  #[test]
  fn threshold_is_strict() {
    let rule = ClassifierRule::default();
    assert!(rule.matches([151, 99, 99]));
    assert!(!rule.matches([150, 0, 0]));
    assert!(!rule.matches([255, 100, 0]));
    assert!(!rule.matches([255, 0, 100]));
  }

  #[test]
  fn threshold_on_green_channel() {
    let rule = ClassifierRule::Threshold(LinearThreshold {
      channel: ColorChannel::Green,
      above: 200,
      others_below: [50, 60],
    });
    assert!(rule.matches([49, 201, 59]));
    assert!(!rule.matches([49, 201, 60]));
  }

  #[test]
  fn hsv_matches_eight_bit_convention() {
    assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
    assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
    assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
    assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
    assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
  }

  #[test]
  fn hue_rule_wraps_around_red() {
    let rule = ClassifierRule::Hue(DualHueRange::default());
    // 偏紫的红色落在高端区间
    assert_eq!(rgb_to_hsv([255, 0, 10])[0], 179);
    assert!(rule.matches([255, 0, 10]));
    assert!(rule.matches([255, 20, 0]));
    assert!(!rule.matches([0, 255, 0]));
    // 暗红色明度不足
    assert!(!rule.matches([90, 0, 0]));
  }

  #[test]
  fn dominance_uses_signed_margin() {
    let rule = ClassifierRule::Dominance(Dominance::default());
    assert!(rule.matches([200, 100, 100]));
    assert!(!rule.matches([200, 120, 0]));
    assert!(!rule.matches([180, 0, 0]));
  }

  #[test]
  fn overlapping_hue_ranges_are_invalid() {
    let rule = ClassifierRule::Hue(DualHueRange {
      ranges: [HueRange { min: 0, max: 20 }, HueRange { min: 15, max: 30 }],
      ..DualHueRange::default()
    });
    assert!(rule.validate().is_err());

    let rule = ClassifierRule::Hue(DualHueRange {
      ranges: [HueRange { min: 0, max: 10 }, HueRange { min: 170, max: 180 }],
      ..DualHueRange::default()
    });
    assert!(rule.validate().is_err());
    assert!(ClassifierRule::Hue(DualHueRange::default()).validate().is_ok());
  }

  #[test]
  fn rule_json_is_tagged_by_kind() {
    let rule: ClassifierRule =
      serde_json::from_str(r#"{"kind": "dominance", "channel": "blue", "margin": 40}"#).unwrap();
    assert_eq!(
      rule,
      ClassifierRule::Dominance(Dominance {
        channel: ColorChannel::Blue,
        above: 180,
        margin: 40,
      })
    );
  }

  #[test]
  fn gray_buffer_is_a_channel_mismatch() {
    let data = [255u8; 4];
    let buffer = PixelBuffer::new(&data, 2, 2, 2, ChannelOrder::Gray).unwrap();
    let err = PixelClassifier::new(ClassifierRule::default(), 1)
      .classify(&buffer)
      .unwrap_err();
    assert_eq!(
      err,
      ClassificationError::ChannelMismatch {
        expected: 3,
        actual: 1
      }
    );
  }

  #[test]
  fn bgra_buffer_ignores_alpha() {
    // 纯红，alpha 为 0
    let data = [0u8, 0, 255, 0];
    let buffer = PixelBuffer::new(&data, 1, 1, 4, ChannelOrder::Bgra).unwrap();
    let mask = PixelClassifier::new(ClassifierRule::default(), 1)
      .classify(&buffer)
      .unwrap();
    assert_eq!(mask.get_pixel(0, 0).0, [MASK_ON]);
  }

  #[test]
  fn magnified_mask_scales_dimensions() {
    let data = vec![255u8; 3 * 2 * 3];
    let buffer = PixelBuffer::new(&data, 3, 2, 9, ChannelOrder::Rgb).unwrap();
    let mask = PixelClassifier::new(ClassifierRule::default(), 4)
      .classify(&buffer)
      .unwrap();
    assert_eq!(mask.dimensions(), (12, 8));
  }

  #[test]
  fn empty_buffer_gives_empty_mask() {
    let mask = PixelClassifier::new(ClassifierRule::default(), 2)
      .classify(&PixelBuffer::empty(ChannelOrder::Rgb))
      .unwrap();
    assert_eq!(mask.dimensions(), (0, 0));
  }
}
