// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/task.rs - 分块任务与工作线程池
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
  panic::{self, AssertUnwindSafe},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  input::{OpenRaster, RasterError, RasterSource},
  model::{ClassificationError, Model},
  tile::TileDescriptor,
};

/// 可在线程间共享的取消标记
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// 单个分块处理失败的原因，只影响该分块
#[derive(Error, Debug)]
pub enum WorkerError {
  #[error("分块读取失败: {0}")]
  Read(#[from] RasterError),
  #[error("分块分类失败: {0}")]
  Classification(#[from] ClassificationError),
  #[error("工作线程无法打开栅格: {0}")]
  Open(Arc<RasterError>),
  #[error("分块处理时发生 panic: {0}")]
  Panicked(String),
}

/// 工作线程上报给汇总线程的事件
#[derive(Debug)]
pub enum WorkerEvent<T> {
  Running {
    worker: usize,
    index: usize,
  },
  Finished {
    worker: usize,
    index: usize,
    tile: TileDescriptor,
    result: Result<T, WorkerError>,
  },
}

/// 工作线程启动时建立的上下文，之后每个分块任务都使用它
pub struct WorkerContext<S> {
  id: usize,
  source: Result<S, Arc<RasterError>>,
}

impl<S: RasterSource> WorkerContext<S> {
  pub fn open<O: OpenRaster<Source = S>>(id: usize, opener: &O) -> Self {
    let source = opener.open().map_err(|err| {
      warn!("工作线程 {} 打开栅格失败: {}", id, err);
      Arc::new(err)
    });
    Self { id, source }
  }

  pub fn id(&self) -> usize {
    self.id
  }

  /// 读取分块并运行模型；panic 被捕获为 `WorkerError::Panicked`
  pub fn run_tile<M>(&self, model: &M, tile: &TileDescriptor) -> Result<M::Output, WorkerError>
  where
    M: Model,
    WorkerError: From<M::Error>,
  {
    let source = self.source.as_ref().map_err(|err| WorkerError::Open(err.clone()))?;

    panic::catch_unwind(AssertUnwindSafe(|| -> Result<M::Output, WorkerError> {
      let buffer = source.read_window(tile.x, tile.y, tile.width, tile.height)?;
      Ok(model.infer(&buffer)?)
    }))
    .unwrap_or_else(|payload| {
      let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知原因".to_string());
      Err(WorkerError::Panicked(message))
    })
  }
}

/// 固定数量的工作线程，从有界队列中按批次领取分块
#[derive(Debug, Clone)]
pub struct WorkerPool {
  workers: usize,
  batch_size: usize,
}

impl WorkerPool {
  pub fn new(workers: usize, batch_size: usize) -> Self {
    Self {
      workers: workers.max(1),
      batch_size: batch_size.max(1),
    }
  }

  /// 处理全部分块，事件在调用线程上依次交给 `on_event`
  ///
  /// 每个工作线程各自打开一次栅格。取消后工作线程不再领取新的分块，
  /// 正在处理的分块会正常结束。
  pub fn run<O, M, F>(
    &self,
    opener: &O,
    model: &M,
    tiles: &[TileDescriptor],
    cancel: &CancelToken,
    mut on_event: F,
  ) where
    O: OpenRaster,
    M: Model + Sync,
    M::Output: Send,
    WorkerError: From<M::Error>,
    F: FnMut(WorkerEvent<M::Output>),
  {
    if tiles.is_empty() {
      return;
    }

    let batches: Vec<(usize, &[TileDescriptor])> = tiles
      .chunks(self.batch_size)
      .enumerate()
      .map(|(i, batch)| (i * self.batch_size, batch))
      .collect();
    let worker_count = self.workers.min(batches.len());
    info!(
      "启动 {} 个工作线程, 共 {} 个分块 / {} 个批次",
      worker_count,
      tiles.len(),
      batches.len()
    );

    let (task_tx, task_rx) = crossbeam_channel::bounded(batches.len());
    for batch in batches {
      // 容量等于批次数，不会阻塞
      let _ = task_tx.send(batch);
    }
    drop(task_tx);

    let (event_tx, event_rx) = mpsc::channel();
    thread::scope(|scope| {
      for id in 0..worker_count {
        let task_rx = task_rx.clone();
        let event_tx = event_tx.clone();
        scope.spawn(move || {
          let context = WorkerContext::open(id, opener);
          for (start, batch) in task_rx.iter() {
            for (offset, tile) in batch.iter().enumerate() {
              if cancel.is_cancelled() {
                debug!("工作线程 {} 收到取消信号", id);
                return;
              }

              let index = start + offset;
              if event_tx
                .send(WorkerEvent::Running { worker: id, index })
                .is_err()
              {
                return;
              }
              let result = context.run_tile(model, tile);
              let finished = WorkerEvent::Finished {
                worker: id,
                index,
                tile: *tile,
                result,
              };
              if event_tx.send(finished).is_err() {
                return;
              }
            }
          }
          debug!("工作线程 {} 退出", context.id());
        });
      }
      drop(event_tx);

      for event in event_rx {
        on_event(event);
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use std::num::NonZeroU32;

  use super::*;
  use crate::{
    frame::{ChannelOrder, PixelBuffer},
    input::{MemoryRaster, RasterInfo},
    tile::partition,
  };

  /// 返回分块尺寸，宽度为 3 时 panic
  struct ShapeModel;

  impl Model for ShapeModel {
    type Output = (u32, u32);
    type Error = ClassificationError;

    fn infer(&self, input: &PixelBuffer<'_>) -> Result<Self::Output, Self::Error> {
      if input.width() == 3 {
        panic!("宽度为 3 的分块");
      }
      Ok((input.width(), input.height()))
    }
  }

  /// 在指定原点的窗口上读取失败
  struct FlakyRaster {
    inner: MemoryRaster,
    fail_at: (u32, u32),
  }

  impl RasterSource for FlakyRaster {
    fn info(&self) -> &RasterInfo {
      self.inner.info()
    }

    fn read_window(
      &self,
      x: u32,
      y: u32,
      width: u32,
      height: u32,
    ) -> Result<PixelBuffer<'_>, RasterError> {
      if (x, y) == self.fail_at {
        return Err(RasterError::Window {
          x,
          y,
          width,
          height,
          reason: "模拟读取失败".to_string(),
        });
      }
      self.inner.read_window(x, y, width, height)
    }
  }

  struct FlakyOpener {
    inner: MemoryRaster,
    fail_at: (u32, u32),
  }

  impl OpenRaster for FlakyOpener {
    type Source = FlakyRaster;

    fn open(&self) -> Result<Self::Source, RasterError> {
      Ok(FlakyRaster {
        inner: self.inner.clone(),
        fail_at: self.fail_at,
      })
    }
  }

  struct BrokenOpener;

  impl OpenRaster for BrokenOpener {
    type Source = MemoryRaster;

    fn open(&self) -> Result<Self::Source, RasterError> {
      Err(RasterError::UnsupportedFormat("测试".to_string()))
    }
  }

  fn raster(width: u32, height: u32) -> MemoryRaster {
    let info = RasterInfo {
      width,
      height,
      order: ChannelOrder::Rgb,
    };
    MemoryRaster::new(info, vec![0u8; (width * height * 3) as usize]).unwrap()
  }

  fn collect<O: OpenRaster>(
    pool: &WorkerPool,
    opener: &O,
    tiles: &[TileDescriptor],
    cancel: &CancelToken,
  ) -> (usize, Vec<(usize, Result<(u32, u32), WorkerError>)>) {
    let mut running = 0;
    let mut finished = Vec::new();
    pool.run(opener, &ShapeModel, tiles, cancel, |event| match event {
      WorkerEvent::Running { .. } => running += 1,
      WorkerEvent::Finished { index, result, .. } => finished.push((index, result)),
    });
    finished.sort_by_key(|(index, _)| *index);
    (running, finished)
  }

  #[test]
  fn every_tile_runs_exactly_once() {
    let tiles = partition(100, 70, NonZeroU32::new(16).unwrap());
    let (running, finished) = collect(
      &WorkerPool::new(4, 3),
      &raster(100, 70),
      &tiles,
      &CancelToken::new(),
    );
    assert_eq!(running, tiles.len());
    let indices: Vec<_> = finished.iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, (0..tiles.len()).collect::<Vec<_>>());
    for (index, result) in &finished {
      let tile = tiles[*index];
      assert_eq!(result.as_ref().unwrap(), &(tile.width, tile.height));
    }
  }

  #[test]
  fn failed_read_only_affects_its_tile() {
    let tiles = partition(64, 64, NonZeroU32::new(32).unwrap());
    let opener = FlakyOpener {
      inner: raster(64, 64),
      fail_at: (32, 0),
    };
    let (_, finished) = collect(&WorkerPool::new(2, 1), &opener, &tiles, &CancelToken::new());
    assert_eq!(finished.len(), 4);
    assert!(matches!(finished[1].1, Err(WorkerError::Read(_))));
    assert_eq!(finished.iter().filter(|(_, r)| r.is_ok()).count(), 3);
  }

  #[test]
  fn panic_is_reported_as_worker_error() {
    // 宽 35 时最后一列分块宽 3
    let tiles = partition(35, 16, NonZeroU32::new(16).unwrap());
    let (_, finished) = collect(
      &WorkerPool::new(2, 2),
      &raster(35, 16),
      &tiles,
      &CancelToken::new(),
    );
    assert_eq!(finished.len(), 3);
    match &finished[2].1 {
      Err(WorkerError::Panicked(message)) => assert!(message.contains("宽度为 3")),
      other => panic!("意外结果: {:?}", other),
    }
    assert!(finished[0].1.is_ok() && finished[1].1.is_ok());
  }

  #[test]
  fn open_failure_fails_every_tile_of_that_worker() {
    let tiles = partition(40, 40, NonZeroU32::new(20).unwrap());
    let pool = WorkerPool::new(2, 1);
    let (_, finished) = collect(&pool, &BrokenOpener, &tiles, &CancelToken::new());
    assert_eq!(finished.len(), 4);
    assert!(
      finished
        .iter()
        .all(|(_, result)| matches!(result, Err(WorkerError::Open(_))))
    );
  }

  #[test]
  fn cancelled_pool_takes_no_tiles() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let tiles = partition(40, 40, NonZeroU32::new(10).unwrap());
    let (running, finished) = collect(&WorkerPool::new(3, 2), &raster(40, 40), &tiles, &cancel);
    assert_eq!(running, 0);
    assert!(finished.is_empty());
  }

  #[test]
  fn empty_tile_list_is_a_no_op() {
    let (running, finished) = collect(
      &WorkerPool::new(3, 2),
      &raster(1, 1),
      &[],
      &CancelToken::new(),
    );
    assert_eq!(running, 0);
    assert!(finished.is_empty());
  }
}
