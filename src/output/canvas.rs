// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/output/canvas.rs - 输出画布
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
  fs::OpenOptions,
  path::{Path, PathBuf},
};

use image::{Rgb, RgbImage};
use imageproc::drawing::Canvas;
use memmap2::MmapMut;
use tracing::{debug, info};

use crate::{
  frame::ChannelOrder,
  input::{RAW_RASTER_HEADER_LEN, RasterInfo, RawRasterHeader},
  output::{OutputError, RawFileError, SaveImageFileOutput, partial::PartialFile},
};

const CANVAS_CHANNELS: usize = 3;

enum Storage {
  Memory {
    image: RgbImage,
    save_to: Option<SaveImageFileOutput>,
  },
  Mapped {
    map: MmapMut,
    file: PartialFile,
  },
}

/// 与输入同尺寸的三通道画布，只由汇总线程修改
///
/// 未调用 [`OutputCanvas::finalize`] 就被丢弃时，不会留下任何输出文件。
pub struct OutputCanvas {
  width: u32,
  height: u32,
  storage: Storage,
}

impl OutputCanvas {
  pub(crate) fn in_memory(
    width: u32,
    height: u32,
    save_to: Option<SaveImageFileOutput>,
  ) -> Result<Self, OutputError> {
    let bytes = width as u64 * height as u64 * CANVAS_CHANNELS as u64;
    if bytes > isize::MAX as u64 {
      return Err(OutputError::CanvasTooLarge { width, height });
    }

    Ok(Self {
      width,
      height,
      storage: Storage::Memory {
        image: RgbImage::new(width, height),
        save_to,
      },
    })
  }

  pub(crate) fn mapped(target: &Path, width: u32, height: u32) -> Result<Self, RawFileError> {
    if let Some(parent) = target.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(RawFileError::io(parent))?;
    }

    let guard = PartialFile::new(target);
    let partial = guard.partial();
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(partial)
      .map_err(RawFileError::io(partial))?;

    let info = RasterInfo {
      width,
      height,
      order: ChannelOrder::Rgb,
    };
    let length = RAW_RASTER_HEADER_LEN as u64 + info.pixel_bytes();
    // 新扩展的部分全为零
    file.set_len(length).map_err(RawFileError::io(partial))?;

    // SAFETY: 临时文件由本画布独占创建，映射期间不会被其他代码截断
    let mut map = unsafe { MmapMut::map_mut(&file) }.map_err(RawFileError::io(partial))?;
    map[..RAW_RASTER_HEADER_LEN].copy_from_slice(&RawRasterHeader { info }.encode());

    debug!(
      "映射输出画布 {}: {}x{}",
      partial.display(),
      width,
      height
    );
    Ok(Self {
      width,
      height,
      storage: Storage::Mapped { map, file: guard },
    })
  }

  /// 按行主序排列的 RGB 样本
  pub fn pixels(&self) -> &[u8] {
    match &self.storage {
      Storage::Memory { image, .. } => image.as_raw(),
      Storage::Mapped { map, .. } => &map[RAW_RASTER_HEADER_LEN..],
    }
  }

  fn offset(&self, x: u32, y: u32) -> usize {
    (y as usize * self.width as usize + x as usize) * CANVAS_CHANNELS
  }

  /// 写出画布，返回最终的文件位置；内存画布没有文件位置
  pub fn finalize(self) -> Result<Option<PathBuf>, OutputError> {
    match self.storage {
      Storage::Memory {
        image,
        save_to: Some(output),
      } => Ok(Some(output.save_image(&image)?)),
      Storage::Memory { save_to: None, .. } => Ok(None),
      Storage::Mapped { map, file } => {
        map.flush().map_err(RawFileError::io(file.partial()))?;
        drop(map);
        let target = file.target().to_path_buf();
        let path = file.commit().map_err(RawFileError::io(&target))?;
        info!("写出标注栅格: {}", path.display());
        Ok(Some(path))
      }
    }
  }
}

impl Canvas for OutputCanvas {
  type Pixel = Rgb<u8>;

  fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn get_pixel(&self, x: u32, y: u32) -> Self::Pixel {
    let offset = self.offset(x, y);
    let pixels = self.pixels();
    Rgb([pixels[offset], pixels[offset + 1], pixels[offset + 2]])
  }

  fn draw_pixel(&mut self, x: u32, y: u32, color: Self::Pixel) {
    let offset = self.offset(x, y);
    match &mut self.storage {
      Storage::Memory { image, .. } => image.put_pixel(x, y, color),
      Storage::Mapped { map, .. } => {
        let start = RAW_RASTER_HEADER_LEN + offset;
        map[start..start + CANVAS_CHANNELS].copy_from_slice(&color.0);
      }
    }
  }
}
