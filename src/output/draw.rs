// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/output/draw.rs - 检测结果标注
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

use image::Rgb;
use imageproc::drawing::{Canvas, draw_hollow_circle_mut};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::Detection;

// 标注常量
const MARKER_RADIUS: i32 = 6;
const MARKER_THICKNESS: i32 = 2;
const MARKER_COLOR: [u8; 3] = [255, 0, 0]; // 红色

/// 圆环标记的样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
  pub radius: i32,
  /// 向内叠加的圆环圈数
  pub thickness: i32,
  pub color: [u8; 3],
}

impl Default for MarkerStyle {
  fn default() -> Self {
    Self {
      radius: MARKER_RADIUS,
      thickness: MARKER_THICKNESS,
      color: MARKER_COLOR,
    }
  }
}

impl MarkerStyle {
  pub fn validate(&self) -> Result<(), String> {
    if self.radius < 1 {
      return Err(format!("半径 {} 必须为正", self.radius));
    }
    if self.thickness < 1 || self.thickness > self.radius + 1 {
      return Err(format!(
        "线宽 {} 须在 1..={} 之间",
        self.thickness,
        self.radius + 1
      ));
    }
    Ok(())
  }
}

/// 以检测质心（取整）为圆心画圆环，超出画布的部分被裁掉
///
/// 圆环坐标超出 `i32` 范围时跳过该标记。
pub fn draw_marker<C>(canvas: &mut C, detection: &Detection, style: &MarkerStyle)
where
  C: Canvas<Pixel = Rgb<u8>>,
{
  let Some(center) = detection
    .pixel()
    .filter(|&(x, y)| fits_ring(x, style.radius) && fits_ring(y, style.radius))
  else {
    warn!(
      "标记位置 ({:.1}, {:.1}) 超出可绘制范围, 跳过",
      detection.x, detection.y
    );
    return;
  };
  for ring in 0..style.thickness {
    draw_hollow_circle_mut(canvas, center, style.radius - ring, Rgb(style.color));
  }
}

fn fits_ring(center: i32, radius: i32) -> bool {
  center.checked_add(radius).is_some() && center.checked_sub(radius).is_some()
}
