// 该文件是 Liaoyuan （燎原） 项目的一部分。
// tests/common/synthetic_raster.rs - 合成测试栅格
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

use std::path::{Path, PathBuf};

use liaoyuan::{
  frame::ChannelOrder,
  input::{MemoryRaster, RasterInfo, RawRasterWriter},
};

pub const RED: [u8; 3] = [255, 0, 0];

/// 黑底栅格上画若干个以 `(cx, cy)` 为中心、边长为奇数的红色方块
pub struct SyntheticRaster {
  pub width: u32,
  pub height: u32,
  rgb: Vec<u8>,
}

impl SyntheticRaster {
  pub fn black(width: u32, height: u32) -> Self {
    assert!(width > 0 && height > 0, "栅格尺寸必须为正");
    Self {
      width,
      height,
      rgb: vec![0u8; (width * height * 3) as usize],
    }
  }

  pub fn with_square(mut self, cx: u32, cy: u32, side: u32) -> Self {
    assert!(side % 2 == 1, "边长必须为奇数");
    let half = side / 2;
    for y in cy - half..=cy + half {
      for x in cx - half..=cx + half {
        self = self.with_pixel(x, y, RED);
      }
    }
    self
  }

  pub fn with_pixel(mut self, x: u32, y: u32, rgb: [u8; 3]) -> Self {
    let offset = ((y * self.width + x) * 3) as usize;
    self.rgb[offset..offset + 3].copy_from_slice(&rgb);
    self
  }

  /// 按声明的通道顺序排列样本
  pub fn samples(&self, order: ChannelOrder) -> Vec<u8> {
    match order {
      ChannelOrder::Rgb => self.rgb.clone(),
      ChannelOrder::Bgr => self
        .rgb
        .chunks(3)
        .flat_map(|p| [p[2], p[1], p[0]])
        .collect(),
      ChannelOrder::Rgba => self
        .rgb
        .chunks(3)
        .flat_map(|p| [p[0], p[1], p[2], 255])
        .collect(),
      ChannelOrder::Bgra => self
        .rgb
        .chunks(3)
        .flat_map(|p| [p[2], p[1], p[0], 255])
        .collect(),
      ChannelOrder::Gray => self.rgb.chunks(3).map(|p| p[0]).collect(),
    }
  }

  pub fn info(&self, order: ChannelOrder) -> RasterInfo {
    RasterInfo {
      width: self.width,
      height: self.height,
      order,
    }
  }

  pub fn memory(&self, order: ChannelOrder) -> MemoryRaster {
    MemoryRaster::new(self.info(order), self.samples(order)).unwrap()
  }

  /// 写成原始栅格容器
  pub fn write_raw(&self, dir: &Path, name: &str, order: ChannelOrder) -> PathBuf {
    let info = self.info(order);
    let samples = self.samples(order);
    let mut writer = RawRasterWriter::create(dir.join(name), info).unwrap();
    for row in samples.chunks(self.width as usize * order.channels()) {
      writer.write_row(row).unwrap();
    }
    writer.finish().unwrap()
  }

  pub fn to_rgb_image(&self) -> image::RgbImage {
    image::RgbImage::from_raw(self.width, self.height, self.rgb.clone()).unwrap()
  }
}
