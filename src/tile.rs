// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/tile.rs - 分块划分
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

use std::num::NonZeroU32;

use serde::Serialize;

/// 栅格上的矩形分块，坐标为全局像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileDescriptor {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl TileDescriptor {
  pub fn area(&self) -> u64 {
    self.width as u64 * self.height as u64
  }
}

/// 分块网格的 `(列数, 行数)`
pub fn grid_shape(width: u32, height: u32, tile_size: NonZeroU32) -> (u32, u32) {
  let size = tile_size.get();
  (width.div_ceil(size), height.div_ceil(size))
}

/// 将 `width x height` 的栅格按行主序划分为互不重叠的分块
///
/// 行、列末尾的分块被裁剪到栅格边界，所有分块恰好覆盖整个栅格。
/// 尺寸为零的栅格不产生分块。
pub fn partition(width: u32, height: u32, tile_size: NonZeroU32) -> Vec<TileDescriptor> {
  let (columns, rows) = grid_shape(width, height, tile_size);
  let tile_size = tile_size.get();
  let mut tiles = Vec::with_capacity(columns as usize * rows as usize);

  for row in 0..rows {
    let y = row * tile_size;
    let tile_height = tile_size.min(height - y);
    for column in 0..columns {
      let x = column * tile_size;
      tiles.push(TileDescriptor {
        x,
        y,
        width: tile_size.min(width - x),
        height: tile_height,
      });
    }
  }

  tiles
}
