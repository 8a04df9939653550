// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/input/memory_raster.rs - 内存栅格
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

use std::sync::Arc;

use image::RgbImage;

use crate::{
  frame::{ChannelOrder, PixelBuffer},
  input::{OpenRaster, RasterError, RasterInfo, RasterSource, window_view},
};

/// 常驻内存的栅格，克隆只增加引用计数
#[derive(Debug, Clone)]
pub struct MemoryRaster {
  info: RasterInfo,
  pixels: Arc<[u8]>,
}

impl MemoryRaster {
  pub fn new(info: RasterInfo, pixels: impl Into<Arc<[u8]>>) -> Result<Self, RasterError> {
    let pixels = pixels.into();
    if pixels.len() as u64 != info.pixel_bytes() {
      return Err(RasterError::UnsupportedFormat(format!(
        "{}x{} {} 需要 {} 字节, 实际 {} 字节",
        info.width,
        info.height,
        info.order,
        info.pixel_bytes(),
        pixels.len()
      )));
    }
    Ok(Self { info, pixels })
  }

  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      info: RasterInfo {
        width,
        height,
        order: ChannelOrder::Rgb,
      },
      pixels: Arc::from(image.as_raw().as_slice()),
    }
  }

  pub fn pixels(&self) -> &[u8] {
    &self.pixels
  }
}

impl OpenRaster for MemoryRaster {
  type Source = MemoryRaster;

  fn open(&self) -> Result<Self::Source, RasterError> {
    Ok(self.clone())
  }
}

impl RasterSource for MemoryRaster {
  fn info(&self) -> &RasterInfo {
    &self.info
  }

  fn read_window(
    &self,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
  ) -> Result<PixelBuffer<'_>, RasterError> {
    window_view(&self.pixels, &self.info, x, y, width, height)
  }
}
