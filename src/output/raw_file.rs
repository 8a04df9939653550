// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/output/raw_file.rs - 原始栅格文件输出
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

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{OutputCanvas, partial::partial_path},
  url_file_path,
};

/// `raw:///path/to/annotated.raw`
///
/// 画布直接映射到磁盘文件，适合无法整体放入内存的大栅格。
#[derive(Debug, Clone)]
pub struct RawFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum RawFileError {
  #[error("I/O 错误 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl RawFileError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.to_path_buf();
    move |source| RawFileError::Io { path, source }
  }
}

impl FromUrlWithScheme for RawFileOutput {
  const SCHEME: &'static str = "raw";
}

impl FromUrl for RawFileOutput {
  type Error = RawFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(RawFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(Self::new(url_file_path(uri)))
  }
}

impl RawFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 未完成前写入的临时文件
  pub fn partial_path(&self) -> PathBuf {
    partial_path(&self.path)
  }

  pub fn create_canvas(&self, width: u32, height: u32) -> Result<OutputCanvas, RawFileError> {
    OutputCanvas::mapped(&self.path, width, height)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_path_appends_suffix() {
    let output = RawFileOutput::new("/data/out.raw");
    assert_eq!(output.partial_path(), PathBuf::from("/data/out.raw.partial"));
  }
}
