// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/output/aggregate.rs - 结果汇总
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

use serde::Serialize;
use tracing::warn;

use crate::{
  model::DetectionLocal,
  output::{DetectionRecord, MarkerStyle, OutputCanvas, RecordError, draw_marker},
  tile::TileDescriptor,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTile {
  pub tile: TileDescriptor,
  pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateSummary {
  pub total_detections: u64,
  pub tiles_done: usize,
  pub failures: Vec<FailedTile>,
}

/// 把各分块的局部结果换算到全局坐标并画到画布上
///
/// 结果以任意顺序到达，总数与画布内容都与到达顺序无关。
pub struct ResultAggregator {
  canvas: OutputCanvas,
  style: MarkerStyle,
  record: Option<DetectionRecord>,
  record_error: Option<RecordError>,
  summary: AggregateSummary,
}

impl ResultAggregator {
  pub fn new(canvas: OutputCanvas, style: MarkerStyle) -> Self {
    Self {
      canvas,
      style,
      record: None,
      record_error: None,
      summary: AggregateSummary::default(),
    }
  }

  pub fn with_record(mut self, record: Option<DetectionRecord>) -> Self {
    self.record = record;
    self
  }

  pub fn accept(&mut self, tile: &TileDescriptor, detections: &[DetectionLocal]) {
    for local in detections {
      let detection = local.to_global(tile);
      draw_marker(&mut self.canvas, &detection, &self.style);
      self.summary.total_detections += 1;

      if let Some(record) = self.record.as_mut()
        && let Err(err) = record.record(&detection)
      {
        // 记录失败后不再继续写
        warn!("{}", err);
        self.record = None;
        self.record_error.get_or_insert(err);
      }
    }
    self.summary.tiles_done += 1;
  }

  pub fn reject(&mut self, tile: &TileDescriptor, reason: impl Into<String>) {
    self.summary.failures.push(FailedTile {
      tile: *tile,
      reason: reason.into(),
    });
    self.summary.tiles_done += 1;
  }

  pub fn total(&self) -> u64 {
    self.summary.total_detections
  }

  pub fn tiles_done(&self) -> usize {
    self.summary.tiles_done
  }

  pub fn canvas(&self) -> &OutputCanvas {
    &self.canvas
  }

  /// 结束汇总，交出画布；记录文件出错时画布被丢弃
  pub fn finish(self) -> Result<(OutputCanvas, AggregateSummary), RecordError> {
    if let Some(err) = self.record_error {
      return Err(err);
    }
    if let Some(record) = self.record {
      record.finish()?;
    }

    let mut summary = self.summary;
    summary
      .failures
      .sort_by_key(|failed| (failed.tile.y, failed.tile.x));
    Ok((self.canvas, summary))
  }
}
