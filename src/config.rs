// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/config.rs - 任务配置
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{model::ClassifierRule, output::MarkerStyle};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置项 {field} 不合法: {reason}")]
  Invalid { field: &'static str, reason: String },
  #[error("无法读取配置文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("配置文件解析失败: {0}")]
  Parse(#[from] serde_json::Error),
}

/// 一次扫描任务的全部参数，任务运行期间不可变
///
/// JSON 中缺省的字段取默认值：
///
/// ```json
/// {
///   "tile_size": 1024,
///   "min_area": 5,
///   "zoom": 1,
///   "rule": { "kind": "hue", "saturation_min": 120 },
///   "workers": 8
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
  /// 分块边长（像素）
  pub tile_size: u32,
  /// 保留连通域的最小面积（在放大后的掩码上计）
  pub min_area: u32,
  /// 分类前的整数放大倍数
  pub zoom: u32,
  pub rule: ClassifierRule,
  /// 提取连通域前是否做 3x3 开运算
  pub open_mask: bool,
  pub workers: usize,
  /// 每次分发给工作线程的分块数
  pub batch_size: usize,
  pub marker: MarkerStyle,
}

impl Default for JobConfig {
  fn default() -> Self {
    Self {
      tile_size: 1024,
      min_area: 1,
      zoom: 1,
      rule: ClassifierRule::default(),
      open_mask: true,
      workers: std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1),
      batch_size: 10,
      marker: MarkerStyle::default(),
    }
  }
}

impl JobConfig {
  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    let config: JobConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    debug!("读取配置文件: {}", path.display());
    Self::from_json_str(&json)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let positive = |field: &'static str, value: u64| {
      if value == 0 {
        Err(ConfigError::Invalid {
          field,
          reason: "必须为正数".to_string(),
        })
      } else {
        Ok(())
      }
    };

    positive("tile_size", self.tile_size as u64)?;
    positive("min_area", self.min_area as u64)?;
    positive("zoom", self.zoom as u64)?;
    positive("workers", self.workers as u64)?;
    positive("batch_size", self.batch_size as u64)?;

    if self.tile_size.checked_mul(self.zoom).is_none() {
      return Err(ConfigError::Invalid {
        field: "zoom",
        reason: format!("分块边长 {} 放大 {} 倍后溢出", self.tile_size, self.zoom),
      });
    }

    self
      .rule
      .validate()
      .map_err(|reason| ConfigError::Invalid {
        field: "rule",
        reason,
      })?;
    self
      .marker
      .validate()
      .map_err(|reason| ConfigError::Invalid {
        field: "marker",
        reason,
      })?;

    Ok(())
  }
}
