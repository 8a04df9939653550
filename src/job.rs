// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/job.rs - 扫描任务
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

use std::{num::NonZeroU32, path::PathBuf, time::Instant};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::{ConfigError, JobConfig},
  input::{OpenRaster, RasterError, RasterInfo, RasterSource},
  model::ColorBlobModel,
  output::{
    DetectionRecord, FailedTile, OutputCanvas, OutputError, OutputTarget, RecordError,
    ResultAggregator,
  },
  task::{CancelToken, WorkerEvent, WorkerPool},
  tile::{TileDescriptor, grid_shape, partition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
  Init,
  Partition,
  Dispatch,
  AggregateComplete,
  WriteOutput,
  Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TileState {
  Pending,
  Running,
  Done,
  Failed,
}

#[derive(Error, Debug)]
pub enum JobError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("无法打开栅格: {0}")]
  Open(#[from] RasterError),
  #[error("输出错误: {0}")]
  Output(#[from] OutputError),
  #[error("检测记录错误: {0}")]
  Record(#[from] RecordError),
  #[error("任务已取消, 完成 {tiles_done} / {tiles} 个分块")]
  Cancelled { tiles_done: usize, tiles: usize },
}

/// 任务结束后交给调用方的摘要
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
  /// RFC 3339 格式的开始时间
  pub started_at: String,
  pub raster: RasterInfo,
  pub tile_size: u32,
  pub tiles: usize,
  pub total_detections: u64,
  pub failed_tiles: usize,
  pub failures: Vec<FailedTile>,
  pub elapsed_ms: u64,
  pub output: Option<PathBuf>,
}

impl JobReport {
  /// 有分块失败但任务仍然完成
  pub fn is_degraded(&self) -> bool {
    self.failed_tiles > 0
  }
}

/// 汇总完成、尚未写出的扫描结果
pub struct ScanOutcome {
  pub canvas: OutputCanvas,
  pub report: JobReport,
  started: Instant,
}

pub struct Job<O> {
  opener: O,
  config: JobConfig,
  cancel: CancelToken,
  record: Option<PathBuf>,
  state: JobState,
}

impl<O: OpenRaster> Job<O> {
  pub fn new(opener: O, config: JobConfig) -> Self {
    Self {
      opener,
      config,
      cancel: CancelToken::new(),
      record: None,
      state: JobState::Init,
    }
  }

  pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// 把每个检测结果逐行写入 `path`
  pub fn with_record(mut self, path: Option<PathBuf>) -> Self {
    self.record = path;
    self
  }

  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  pub fn config(&self) -> &JobConfig {
    &self.config
  }

  pub fn state(&self) -> JobState {
    self.state
  }

  fn enter(&mut self, state: JobState) {
    debug!("任务状态 {:?} -> {:?}", self.state, state);
    self.state = state;
  }

  fn cancelled(&self, tiles_done: usize, tiles: usize) -> Result<(), JobError> {
    if self.cancel.is_cancelled() {
      warn!("任务已取消, 丢弃未完成的输出");
      return Err(JobError::Cancelled { tiles_done, tiles });
    }
    Ok(())
  }

  /// 分块扫描并汇总，画布留给调用方决定是否写出
  pub fn scan(&mut self, target: &OutputTarget) -> Result<ScanOutcome, JobError> {
    let started = Instant::now();
    let started_at = Utc::now().to_rfc3339();
    self.enter(JobState::Init);
    self.config.validate()?;

    let raster = {
      let source = self.opener.open()?;
      *source.info()
    };
    info!(
      "打开栅格: {}x{} {}",
      raster.width, raster.height, raster.order
    );
    self.cancelled(0, 0)?;

    self.enter(JobState::Partition);
    let tile_size =
      NonZeroU32::new(self.config.tile_size).ok_or_else(|| ConfigError::Invalid {
        field: "tile_size",
        reason: "必须为正数".to_string(),
      })?;
    let tiles = partition(raster.width, raster.height, tile_size);
    let (columns, rows) = grid_shape(raster.width, raster.height, tile_size);
    info!(
      "分块边长 {}, 共 {} x {} = {} 个分块",
      self.config.tile_size,
      columns,
      rows,
      tiles.len()
    );

    let canvas = target.create_canvas(raster.width, raster.height)?;
    let record = self
      .record
      .as_ref()
      .map(DetectionRecord::create)
      .transpose()?;
    let mut aggregator =
      ResultAggregator::new(canvas, self.config.marker).with_record(record);

    self.enter(JobState::Dispatch);
    let model = ColorBlobModel::from_config(&self.config);
    let pool = WorkerPool::new(self.config.workers, self.config.batch_size);
    let mut states = vec![TileState::Pending; tiles.len()];
    let mut progress = Progress::new(tiles.len());

    pool.run(&self.opener, &model, &tiles, &self.cancel, |event| match event {
      WorkerEvent::Running { index, .. } => states[index] = TileState::Running,
      WorkerEvent::Finished {
        worker,
        index,
        tile,
        result,
      } => {
        match result {
          Ok(detections) => {
            states[index] = TileState::Done;
            aggregator.accept(&tile, &detections);
          }
          Err(err) => {
            states[index] = TileState::Failed;
            warn!("分块 {} 处理失败 (工作线程 {}): {}", describe(&tile), worker, err);
            aggregator.reject(&tile, err.to_string());
          }
        }
        progress.advance(aggregator.tiles_done(), aggregator.total());
      }
    });

    let tiles_done = aggregator.tiles_done();
    self.cancelled(tiles_done, tiles.len())?;
    let unfinished = states
      .iter()
      .filter(|state| matches!(state, TileState::Pending | TileState::Running))
      .count();
    if unfinished > 0 {
      // 只有取消才会留下未完成的分块
      return Err(JobError::Cancelled {
        tiles_done,
        tiles: tiles.len(),
      });
    }

    let (canvas, summary) = aggregator.finish()?;
    self.enter(JobState::AggregateComplete);

    let report = JobReport {
      started_at,
      raster,
      tile_size: self.config.tile_size,
      tiles: tiles.len(),
      total_detections: summary.total_detections,
      failed_tiles: summary.failures.len(),
      failures: summary.failures,
      elapsed_ms: started.elapsed().as_millis() as u64,
      output: None,
    };
    Ok(ScanOutcome {
      canvas,
      report,
      started,
    })
  }

  /// 扫描并写出标注结果
  pub fn run(mut self, target: &OutputTarget) -> Result<JobReport, JobError> {
    let ScanOutcome {
      canvas,
      mut report,
      started,
    } = self.scan(target)?;

    self.enter(JobState::WriteOutput);
    report.output = canvas.finalize()?;
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    self.enter(JobState::Terminal);

    if report.is_degraded() {
      warn!(
        "任务完成, 检测到 {} 个区域, {} / {} 个分块失败, 耗时 {} ms",
        report.total_detections, report.failed_tiles, report.tiles, report.elapsed_ms
      );
    } else {
      info!(
        "任务完成, 检测到 {} 个区域, 耗时 {} ms",
        report.total_detections, report.elapsed_ms
      );
    }
    Ok(report)
  }
}

fn describe(tile: &TileDescriptor) -> String {
  format!("({}, {}) {}x{}", tile.x, tile.y, tile.width, tile.height)
}

/// 每完成 10% 的分块输出一次进度
struct Progress {
  total: usize,
  reported: usize,
}

impl Progress {
  fn new(total: usize) -> Self {
    Self { total, reported: 0 }
  }

  fn advance(&mut self, done: usize, detections: u64) {
    if self.total == 0 {
      return;
    }
    let decile = done * 10 / self.total;
    if decile > self.reported {
      self.reported = decile;
      info!(
        "进度 {}% ({} / {} 个分块), 已检测到 {} 个区域",
        decile * 10,
        done,
        self.total,
        detections
      );
    }
  }
}
