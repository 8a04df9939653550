// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/output/partial.rs - 未完成的输出文件
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

use tracing::{debug, warn};

/// `<path>.partial`
pub fn partial_path(target: &Path) -> PathBuf {
  let mut partial = target.as_os_str().to_owned();
  partial.push(".partial");
  PathBuf::from(partial)
}

/// 写在 `<target>.partial` 的文件，提交时改名为 `target`，未提交就丢弃时删除
pub(crate) struct PartialFile {
  partial: PathBuf,
  target: PathBuf,
  committed: bool,
}

impl PartialFile {
  pub(crate) fn new(target: &Path) -> Self {
    Self {
      partial: partial_path(target),
      target: target.to_path_buf(),
      committed: false,
    }
  }

  pub(crate) fn partial(&self) -> &Path {
    &self.partial
  }

  pub(crate) fn target(&self) -> &Path {
    &self.target
  }

  pub(crate) fn commit(mut self) -> std::io::Result<PathBuf> {
    std::fs::rename(&self.partial, &self.target)?;
    self.committed = true;
    Ok(self.target.clone())
  }
}

impl Drop for PartialFile {
  fn drop(&mut self) {
    if self.committed {
      return;
    }
    match std::fs::remove_file(&self.partial) {
      Ok(()) => debug!("丢弃未完成的输出: {}", self.partial.display()),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
      Err(err) => warn!("无法删除未完成的输出 {}: {}", self.partial.display(), err),
    }
  }
}
