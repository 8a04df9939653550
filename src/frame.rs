// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/frame.rs - 通道顺序与分块像素视图
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

use std::fmt;

use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::input::RasterError;

const RGB_CHANNELS: usize = 3;

/// 栅格声明的通道顺序，打开时确定，之后不再改变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
  Gray,
  Rgb,
  Bgr,
  Rgba,
  Bgra,
}

impl ChannelOrder {
  pub fn channels(self) -> usize {
    match self {
      ChannelOrder::Gray => 1,
      ChannelOrder::Rgb | ChannelOrder::Bgr => RGB_CHANNELS,
      ChannelOrder::Rgba | ChannelOrder::Bgra => 4,
    }
  }

  /// R、G、B 分量在单个像素内的下标，灰度没有颜色分量
  pub fn rgb_indices(self) -> Option<[usize; 3]> {
    match self {
      ChannelOrder::Gray => None,
      ChannelOrder::Rgb | ChannelOrder::Rgba => Some([0, 1, 2]),
      ChannelOrder::Bgr | ChannelOrder::Bgra => Some([2, 1, 0]),
    }
  }

  /// 原始容器头中的编码
  pub fn code(self) -> u8 {
    match self {
      ChannelOrder::Gray => 0,
      ChannelOrder::Rgb => 1,
      ChannelOrder::Bgr => 2,
      ChannelOrder::Rgba => 3,
      ChannelOrder::Bgra => 4,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(ChannelOrder::Gray),
      1 => Some(ChannelOrder::Rgb),
      2 => Some(ChannelOrder::Bgr),
      3 => Some(ChannelOrder::Rgba),
      4 => Some(ChannelOrder::Bgra),
      _ => None,
    }
  }
}

impl fmt::Display for ChannelOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ChannelOrder::Gray => "gray",
      ChannelOrder::Rgb => "rgb",
      ChannelOrder::Bgr => "bgr",
      ChannelOrder::Rgba => "rgba",
      ChannelOrder::Bgra => "bgra",
    };
    f.write_str(name)
  }
}

/// 分块窗口的像素视图
///
/// 只借用栅格底层存储（内存映射或解码后的图像），不拥有数据；
/// 生命周期与产生它的栅格句柄绑定，只在处理该分块期间有效。
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
  data: &'a [u8],
  width: u32,
  height: u32,
  stride: usize,
  order: ChannelOrder,
}

impl<'a> PixelBuffer<'a> {
  /// `data` 从窗口左上角像素开始，`stride` 为相邻两行起点之间的字节数
  pub fn new(
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    order: ChannelOrder,
  ) -> Result<Self, RasterError> {
    let row_bytes = width as usize * order.channels();
    if height > 0 {
      let needed = (height as usize - 1) * stride + row_bytes;
      if data.len() < needed || stride < row_bytes {
        return Err(RasterError::Layout {
          needed,
          stride,
          actual: data.len(),
        });
      }
    }

    Ok(Self {
      data,
      width,
      height,
      stride,
      order,
    })
  }

  pub fn empty(order: ChannelOrder) -> Self {
    Self {
      data: &[],
      width: 0,
      height: 0,
      stride: 0,
      order,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn channels(&self) -> usize {
    self.order.channels()
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  /// 第 `y` 行的全部样本（不含行尾填充）
  pub fn row(&self, y: u32) -> &'a [u8] {
    let start = y as usize * self.stride;
    &self.data[start..start + self.width as usize * self.channels()]
  }

  pub fn pixel(&self, x: u32, y: u32) -> &'a [u8] {
    let channels = self.channels();
    let start = y as usize * self.stride + x as usize * channels;
    &self.data[start..start + channels]
  }
}

/// 按 R、G、B 顺序读取像素的二维视图
pub trait RgbView {
  fn dimensions(&self) -> (u32, u32);
  fn rgb(&self, x: u32, y: u32) -> [u8; 3];
}

impl RgbView for PixelBuffer<'_> {
  fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
    let pixel = self.pixel(x, y);
    match self.order.rgb_indices() {
      Some([r, g, b]) => [pixel[r], pixel[g], pixel[b]],
      None => [pixel[0]; 3],
    }
  }
}

impl RgbView for RgbImage {
  fn dimensions(&self) -> (u32, u32) {
    ImageBuffer::dimensions(self)
  }

  fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
    self.get_pixel(x, y).0
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for PixelBuffer<'_> {
  fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| Rgb(self.rgb(x, y)))
  }
}
