// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/model/component.rs - 连通域提取
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

use image::{GrayImage, Luma, imageops};
use imageproc::{
  distance_transform::Norm,
  morphology,
  region_labelling::{Connectivity, connected_components},
};

use crate::model::DetectionLocal;

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
  count: u64,
  sum_x: u64,
  sum_y: u64,
}

#[derive(Debug, Clone)]
pub struct ComponentDetector {
  min_area: u32,
  zoom: u32,
  open: bool,
}

impl ComponentDetector {
  pub fn new(min_area: u32, zoom: u32, open: bool) -> Self {
    Self {
      min_area,
      zoom: zoom.max(1),
      open,
    }
  }

  /// 提取 8 连通域，按行主序首次出现的顺序输出面积不小于 `min_area` 的质心
  pub fn detect(&self, mask: &GrayImage) -> Vec<DetectionLocal> {
    if mask.width() == 0 || mask.height() == 0 {
      return Vec::new();
    }

    let opened;
    let mask = if self.open {
      opened = open_mask(mask);
      &opened
    } else {
      mask
    };

    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // 标签 -> 首次出现的序号
    let mut slots: Vec<Option<usize>> = Vec::new();
    let mut components: Vec<Accumulator> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
      let label = label.0[0] as usize;
      if label == 0 {
        continue;
      }
      if slots.len() <= label {
        slots.resize(label + 1, None);
      }
      let slot = *slots[label].get_or_insert_with(|| {
        components.push(Accumulator::default());
        components.len() - 1
      });

      let component = &mut components[slot];
      component.count += 1;
      component.sum_x += x as u64;
      component.sum_y += y as u64;
    }

    components
      .into_iter()
      .filter(|component| component.count >= self.min_area as u64)
      .map(|component| self.centroid(component))
      .collect()
  }

  fn centroid(&self, component: Accumulator) -> DetectionLocal {
    let count = component.count as f64;
    let mut x = component.sum_x as f64 / count;
    let mut y = component.sum_y as f64 / count;
    if self.zoom > 1 {
      x = (x / self.zoom as f64).trunc();
      y = (y / self.zoom as f64).trunc();
    }

    DetectionLocal {
      x,
      y,
      area: u32::try_from(component.count).unwrap_or(u32::MAX),
    }
  }
}

/// 3x3 开运算，分块外的像素视为背景
fn open_mask(mask: &GrayImage) -> GrayImage {
  let (width, height) = mask.dimensions();
  let mut padded = GrayImage::new(width + 2, height + 2);
  imageops::replace(&mut padded, mask, 1, 1);
  let opened = morphology::open(&padded, Norm::LInf, 1);
  imageops::crop_imm(&opened, 1, 1, width, height).to_image()
}
