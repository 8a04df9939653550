// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/input.rs - 栅格输入
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

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::{
  FromUrl,
  frame::{ChannelOrder, PixelBuffer},
};

/// 栅格的尺寸与声明的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RasterInfo {
  pub width: u32,
  pub height: u32,
  pub order: ChannelOrder,
}

impl RasterInfo {
  pub fn channels(&self) -> usize {
    self.order.channels()
  }

  /// 像素数据总字节数
  pub fn pixel_bytes(&self) -> u64 {
    self.width as u64 * self.height as u64 * self.channels() as u64
  }
}

#[derive(Error, Debug)]
pub enum RasterError {
  #[error("无法读取栅格文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("栅格文件已损坏 {path}: {reason}")]
  Corrupt { path: PathBuf, reason: String },
  #[error("不支持的栅格格式: {0}")]
  UnsupportedFormat(String),
  #[error("窗口 ({x}, {y}, {width}x{height}) 读取失败: {reason}")]
  Window {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    reason: String,
  },
  #[error("像素视图越界: 需要 {needed} 字节 (行跨度 {stride}), 实际 {actual} 字节")]
  Layout {
    needed: usize,
    stride: usize,
    actual: usize,
  },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl RasterError {
  pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| RasterError::Io { path, source }
  }

  /// 属于格式类错误（通道数、位深等不受支持），其余均为 I/O 类
  pub fn is_format_error(&self) -> bool {
    matches!(self, RasterError::UnsupportedFormat(_))
  }
}

/// 已打开的栅格句柄，提供窗口随机读取
pub trait RasterSource {
  fn info(&self) -> &RasterInfo;

  /// 读取 `(x, y, width, height)` 窗口。越界部分被裁剪到栅格范围内，
  /// 完全越界时返回空视图。
  fn read_window(
    &self,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
  ) -> Result<PixelBuffer<'_>, RasterError>;
}

/// 打开栅格的能力，每个工作线程各自调用一次得到独立的句柄
pub trait OpenRaster: Sync {
  type Source: RasterSource;

  fn open(&self) -> Result<Self::Source, RasterError>;
}

/// 将窗口裁剪到栅格范围内，返回 `(x, y, width, height)`
pub fn clamp_window(
  info: &RasterInfo,
  x: u32,
  y: u32,
  width: u32,
  height: u32,
) -> (u32, u32, u32, u32) {
  let x0 = x.min(info.width);
  let y0 = y.min(info.height);
  let x1 = x.saturating_add(width).min(info.width);
  let y1 = y.saturating_add(height).min(info.height);
  (x0, y0, x1 - x0, y1 - y0)
}

/// 在按行主序紧密排列的像素数据上截取窗口视图
pub(crate) fn window_view<'a>(
  pixels: &'a [u8],
  info: &RasterInfo,
  x: u32,
  y: u32,
  width: u32,
  height: u32,
) -> Result<PixelBuffer<'a>, RasterError> {
  let (x, y, width, height) = clamp_window(info, x, y, width, height);
  if width == 0 || height == 0 {
    return Ok(PixelBuffer::empty(info.order));
  }

  let channels = info.channels();
  let stride = info.width as usize * channels;
  let start = y as usize * stride + x as usize * channels;
  let end = (y + height - 1) as usize * stride + (x + width) as usize * channels;
  let data = pixels.get(start..end).ok_or(RasterError::Layout {
    needed: end,
    stride,
    actual: pixels.len(),
  })?;
  PixelBuffer::new(data, width, height, stride, info.order)
}

mod memory_raster;
mod raw_raster;
pub use self::memory_raster::MemoryRaster;
pub use self::raw_raster::{
  RAW_RASTER_HEADER_LEN, RAW_RASTER_MAGIC, RAW_RASTER_VERSION, RawRaster, RawRasterHeader,
  RawRasterOpener, RawRasterWriter,
};

#[cfg(feature = "read_image_file")]
mod image_raster;
#[cfg(feature = "read_image_file")]
pub use self::image_raster::{ImageFileRaster, ImageRasterSource};

/// 按 URL 方案选择的栅格输入
pub enum RasterWrapper {
  RawRaster(RawRasterOpener),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileRaster),
}

impl FromUrl for RasterWrapper {
  type Error = RasterError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    if url.scheme() == RawRasterOpener::SCHEME {
      return Ok(RasterWrapper::RawRaster(RawRasterOpener::from_url(url)?));
    }
    #[cfg(feature = "read_image_file")]
    {
      if url.scheme() == ImageFileRaster::SCHEME {
        return Ok(RasterWrapper::ImageFile(ImageFileRaster::from_url(url)?));
      }
    }
    Err(RasterError::SchemeMismatch(url.scheme().to_string()))
  }
}

pub enum RasterWrapperSource {
  RawRaster(RawRaster),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageRasterSource),
}

impl OpenRaster for RasterWrapper {
  type Source = RasterWrapperSource;

  fn open(&self) -> Result<Self::Source, RasterError> {
    match self {
      RasterWrapper::RawRaster(opener) => opener.open().map(RasterWrapperSource::RawRaster),
      #[cfg(feature = "read_image_file")]
      RasterWrapper::ImageFile(opener) => opener.open().map(RasterWrapperSource::ImageFile),
    }
  }
}

impl RasterSource for RasterWrapperSource {
  fn info(&self) -> &RasterInfo {
    match self {
      RasterWrapperSource::RawRaster(source) => source.info(),
      #[cfg(feature = "read_image_file")]
      RasterWrapperSource::ImageFile(source) => source.info(),
    }
  }

  fn read_window(
    &self,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
  ) -> Result<PixelBuffer<'_>, RasterError> {
    match self {
      RasterWrapperSource::RawRaster(source) => source.read_window(x, y, width, height),
      #[cfg(feature = "read_image_file")]
      RasterWrapperSource::ImageFile(source) => source.read_window(x, y, width, height),
    }
  }
}
