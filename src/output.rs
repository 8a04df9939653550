// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub mod draw;

mod aggregate;
mod canvas;
mod partial;
mod raw_file;
mod record;
mod save_image_file;

pub use self::aggregate::{AggregateSummary, FailedTile, ResultAggregator};
pub use self::canvas::OutputCanvas;
pub use self::draw::{MarkerStyle, draw_marker};
pub use self::raw_file::{RawFileError, RawFileOutput};
pub use self::record::{DetectionRecord, RecordError};
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("原始栅格输出错误: {0}")]
  RawFileError(#[from] RawFileError),
  #[error("画布 {width}x{height} 过大, 无法在内存中分配")]
  CanvasTooLarge { width: u32, height: u32 },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 标注结果的去向
pub enum OutputTarget {
  SaveImageFile(SaveImageFileOutput),
  RawFile(RawFileOutput),
  /// 只保留在内存中，由调用方读取
  Memory,
}

impl FromUrl for OutputTarget {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => Ok(OutputTarget::SaveImageFile(
        SaveImageFileOutput::from_url(url)?,
      )),
      RawFileOutput::SCHEME => Ok(OutputTarget::RawFile(RawFileOutput::from_url(url)?)),
      other => Err(OutputError::SchemeMismatch(format!(
        "不支持的输出方式 '{}'",
        other
      ))),
    }
  }
}

impl OutputTarget {
  /// 创建与输入同尺寸、全零的三通道画布
  pub fn create_canvas(&self, width: u32, height: u32) -> Result<OutputCanvas, OutputError> {
    match self {
      OutputTarget::SaveImageFile(output) => {
        OutputCanvas::in_memory(width, height, Some(output.clone()))
      }
      OutputTarget::RawFile(output) => Ok(output.create_canvas(width, height)?),
      OutputTarget::Memory => OutputCanvas::in_memory(width, height, None),
    }
  }
}

impl fmt::Display for OutputTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OutputTarget::SaveImageFile(output) => write!(f, "图像文件 {}", output.path().display()),
      OutputTarget::RawFile(output) => write!(f, "原始栅格 {}", output.path().display()),
      OutputTarget::Memory => f.write_str("内存"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scheme_selects_target() {
    let url = Url::parse("image:///tmp/out.png").unwrap();
    assert!(matches!(
      OutputTarget::from_url(&url),
      Ok(OutputTarget::SaveImageFile(_))
    ));
    let url = Url::parse("raw:///tmp/out.raw").unwrap();
    assert!(matches!(
      OutputTarget::from_url(&url),
      Ok(OutputTarget::RawFile(_))
    ));
    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputTarget::from_url(&url),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}
