// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/output/record.rs - 检测结果记录
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
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

use crate::{model::Detection, output::partial::PartialFile};

#[derive(Error, Debug)]
#[error("无法写入检测记录 {path}: {source}")]
pub struct RecordError {
  path: PathBuf,
  #[source]
  source: std::io::Error,
}

/// 每个检测结果一行：`x, y, area`，顺序与分块完成顺序一致
///
/// 写入 `<path>.partial`，[`DetectionRecord::finish`] 之后才出现在 `path`。
pub struct DetectionRecord {
  path: PathBuf,
  writer: BufWriter<File>,
  file: PartialFile,
  lines: u64,
}

impl DetectionRecord {
  pub fn create(path: impl AsRef<Path>) -> Result<Self, RecordError> {
    let path = path.as_ref().to_path_buf();
    let guard = PartialFile::new(&path);
    let file = File::create(guard.partial()).map_err(|source| RecordError {
      path: guard.partial().to_path_buf(),
      source,
    })?;
    Ok(Self {
      path,
      writer: BufWriter::new(file),
      file: guard,
      lines: 0,
    })
  }

  pub fn record(&mut self, detection: &Detection) -> Result<(), RecordError> {
    writeln!(
      self.writer,
      "{:.4}, {:.4}, {}",
      detection.x, detection.y, detection.area
    )
    .map_err(|source| RecordError {
      path: self.path.clone(),
      source,
    })?;
    self.lines += 1;
    Ok(())
  }

  pub fn finish(self) -> Result<PathBuf, RecordError> {
    let Self {
      path,
      writer,
      file,
      lines,
    } = self;
    writer.into_inner().map_err(|err| RecordError {
      path: path.clone(),
      source: err.into_error(),
    })?;
    let path = file.commit().map_err(|source| RecordError { path, source })?;
    info!("写出 {} 条检测记录: {}", lines, path.display());
    Ok(path)
  }
}
