// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/input/image_raster.rs - 图像文件输入
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

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
};

use image::{DynamicImage, ImageReader};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ChannelOrder,
  input::{MemoryRaster, OpenRaster, RasterError, RasterInfo},
  url_file_path,
};

/// 图像文件解码后即为内存栅格
pub type ImageRasterSource = MemoryRaster;

/// `image:///path/to/scene.png`
///
/// 整幅图像只解码一次，之后各工作线程共享解码结果。
pub struct ImageFileRaster {
  path: PathBuf,
  decoded: Mutex<Option<MemoryRaster>>,
}

impl ImageFileRaster {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      decoded: Mutex::new(None),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn decode(path: &Path) -> Result<MemoryRaster, RasterError> {
    let mut reader = ImageReader::open(path)
      .map_err(RasterError::io(path))?
      .with_guessed_format()
      .map_err(RasterError::io(path))?;
    reader.no_limits();

    let image = reader.decode().map_err(|err| match err {
      image::ImageError::IoError(source) => RasterError::Io {
        path: path.to_path_buf(),
        source,
      },
      image::ImageError::Unsupported(err) => RasterError::UnsupportedFormat(err.to_string()),
      other => RasterError::Corrupt {
        path: path.to_path_buf(),
        reason: other.to_string(),
      },
    })?;

    let (order, width, height, pixels) = match image {
      DynamicImage::ImageLuma8(image) => {
        (ChannelOrder::Gray, image.width(), image.height(), image.into_raw())
      }
      DynamicImage::ImageRgb8(image) => {
        (ChannelOrder::Rgb, image.width(), image.height(), image.into_raw())
      }
      DynamicImage::ImageRgba8(image) => {
        (ChannelOrder::Rgba, image.width(), image.height(), image.into_raw())
      }
      other => {
        error!("不支持的像素格式 {:?}: {}", other.color(), path.display());
        return Err(RasterError::UnsupportedFormat(format!(
          "像素格式 {:?}",
          other.color()
        )));
      }
    };

    info!(
      "解码图像文件 {}: {}x{} {}",
      path.display(),
      width,
      height,
      order
    );
    MemoryRaster::new(
      RasterInfo {
        width,
        height,
        order,
      },
      pixels,
    )
  }
}

impl FromUrlWithScheme for ImageFileRaster {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileRaster {
  type Error = RasterError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RasterError::SchemeMismatch(format!(
        "期望输入方式 '{}', 实际输入方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(Self::new(url_file_path(url)))
  }
}

impl OpenRaster for ImageFileRaster {
  type Source = ImageRasterSource;

  fn open(&self) -> Result<Self::Source, RasterError> {
    let mut decoded = self
      .decoded
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(raster) = decoded.as_ref() {
      return Ok(raster.clone());
    }

    let raster = Self::decode(&self.path)?;
    *decoded = Some(raster.clone());
    Ok(raster)
  }
}
