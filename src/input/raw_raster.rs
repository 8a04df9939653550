// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/input/raw_raster.rs - 原始栅格容器（内存映射读取）
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

//! 原始栅格容器格式
//!
//! ```text
//! 偏移  长度  内容
//! 0     8     魔数 "LYRASTER"
//! 8     2     版本号 (u16, 小端)
//! 10    1     通道顺序编码
//! 11    1     每样本位数，仅支持 8
//! 12    4     保留
//! 16    8     宽度 (u64, 小端)
//! 24    8     高度 (u64, 小端)
//! 32    ...   按行主序交错排列的样本
//! ```

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use memmap2::Mmap;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, PixelBuffer},
  input::{OpenRaster, RasterError, RasterInfo, RasterSource, window_view},
  url_file_path,
};

pub const RAW_RASTER_MAGIC: &[u8; 8] = b"LYRASTER";
pub const RAW_RASTER_VERSION: u16 = 1;
pub const RAW_RASTER_HEADER_LEN: usize = 32;
const BITS_PER_SAMPLE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRasterHeader {
  pub info: RasterInfo,
}

impl RawRasterHeader {
  pub fn encode(&self) -> [u8; RAW_RASTER_HEADER_LEN] {
    let mut bytes = [0u8; RAW_RASTER_HEADER_LEN];
    bytes[0..8].copy_from_slice(RAW_RASTER_MAGIC);
    bytes[8..10].copy_from_slice(&RAW_RASTER_VERSION.to_le_bytes());
    bytes[10] = self.info.order.code();
    bytes[11] = BITS_PER_SAMPLE;
    bytes[16..24].copy_from_slice(&(self.info.width as u64).to_le_bytes());
    bytes[24..32].copy_from_slice(&(self.info.height as u64).to_le_bytes());
    bytes
  }

  pub fn decode(bytes: &[u8], path: &Path) -> Result<Self, RasterError> {
    let corrupt = |reason: &str| RasterError::Corrupt {
      path: path.to_path_buf(),
      reason: reason.to_string(),
    };

    if bytes.len() < RAW_RASTER_HEADER_LEN {
      return Err(corrupt("文件头不完整"));
    }
    if &bytes[0..8] != RAW_RASTER_MAGIC {
      return Err(corrupt("魔数不匹配"));
    }

    let version = u16::from_le_bytes([bytes[8], bytes[9]]);
    if version != RAW_RASTER_VERSION {
      return Err(RasterError::UnsupportedFormat(format!(
        "容器版本 {}",
        version
      )));
    }

    let order = ChannelOrder::from_code(bytes[10]).ok_or_else(|| {
      RasterError::UnsupportedFormat(format!("通道顺序编码 {}", bytes[10]))
    })?;
    if bytes[11] != BITS_PER_SAMPLE {
      return Err(RasterError::UnsupportedFormat(format!(
        "每样本 {} 位",
        bytes[11]
      )));
    }

    let read_u64 = |offset: usize| {
      let mut buf = [0u8; 8];
      buf.copy_from_slice(&bytes[offset..offset + 8]);
      u64::from_le_bytes(buf)
    };
    let width = read_u64(16);
    let height = read_u64(24);
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
      return Err(RasterError::UnsupportedFormat(format!(
        "尺寸 {}x{} 超出支持范围",
        width, height
      )));
    };

    Ok(Self {
      info: RasterInfo {
        width,
        height,
        order,
      },
    })
  }
}

/// `raw:///path/to/scene.raw`
pub struct RawRasterOpener {
  path: PathBuf,
}

impl RawRasterOpener {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl FromUrlWithScheme for RawRasterOpener {
  const SCHEME: &'static str = "raw";
}

impl FromUrl for RawRasterOpener {
  type Error = RasterError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RasterError::SchemeMismatch(format!(
        "期望输入方式 '{}', 实际输入方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(Self::new(url_file_path(url)))
  }
}

impl OpenRaster for RawRasterOpener {
  type Source = RawRaster;

  fn open(&self) -> Result<Self::Source, RasterError> {
    RawRaster::open(&self.path)
  }
}

/// 已映射的原始栅格，各线程持有各自的映射
pub struct RawRaster {
  info: RasterInfo,
  map: Mmap,
}

impl RawRaster {
  pub fn open(path: &Path) -> Result<Self, RasterError> {
    let file = File::open(path).map_err(RasterError::io(path))?;
    let length = file.metadata().map_err(RasterError::io(path))?.len();
    if length < RAW_RASTER_HEADER_LEN as u64 {
      return Err(RasterError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("文件长度 {} 字节, 不足以容纳文件头", length),
      });
    }

    // SAFETY: 映射只读，扫描期间不允许其他进程截断或改写输入文件
    let map = unsafe { Mmap::map(&file) }.map_err(RasterError::io(path))?;
    let header = RawRasterHeader::decode(&map[..RAW_RASTER_HEADER_LEN], path)?;
    if header.info.width == 0 || header.info.height == 0 {
      return Err(RasterError::Corrupt {
        path: path.to_path_buf(),
        reason: "栅格尺寸为零".to_string(),
      });
    }

    let expected = RAW_RASTER_HEADER_LEN as u64 + header.info.pixel_bytes();
    if length < expected {
      return Err(RasterError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("声明需要 {} 字节, 文件只有 {} 字节", expected, length),
      });
    }

    debug!(
      "映射原始栅格 {}: {}x{} {}",
      path.display(),
      header.info.width,
      header.info.height,
      header.info.order
    );

    Ok(Self {
      info: header.info,
      map,
    })
  }
}

impl RasterSource for RawRaster {
  fn info(&self) -> &RasterInfo {
    &self.info
  }

  fn read_window(
    &self,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
  ) -> Result<PixelBuffer<'_>, RasterError> {
    window_view(
      &self.map[RAW_RASTER_HEADER_LEN..],
      &self.info,
      x,
      y,
      width,
      height,
    )
  }
}

/// 按行写出原始栅格
pub struct RawRasterWriter {
  path: PathBuf,
  info: RasterInfo,
  writer: BufWriter<File>,
  rows: u32,
}

impl RawRasterWriter {
  pub fn create(path: impl Into<PathBuf>, info: RasterInfo) -> Result<Self, RasterError> {
    let path = path.into();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(RasterError::io(&path))?;
    }

    let file = File::create(&path).map_err(RasterError::io(&path))?;
    let mut writer = BufWriter::new(file);
    writer
      .write_all(&RawRasterHeader { info }.encode())
      .map_err(RasterError::io(&path))?;

    Ok(Self {
      path,
      info,
      writer,
      rows: 0,
    })
  }

  pub fn write_row(&mut self, row: &[u8]) -> Result<(), RasterError> {
    let expected = self.info.width as usize * self.info.channels();
    if row.len() != expected || self.rows >= self.info.height {
      return Err(RasterError::Corrupt {
        path: self.path.clone(),
        reason: format!(
          "第 {} 行长度 {} 字节, 期望 {} 字节",
          self.rows,
          row.len(),
          expected
        ),
      });
    }

    self.writer.write_all(row).map_err(RasterError::io(&self.path))?;
    self.rows += 1;
    Ok(())
  }

  pub fn finish(mut self) -> Result<PathBuf, RasterError> {
    if self.rows != self.info.height {
      return Err(RasterError::Corrupt {
        path: self.path,
        reason: format!("只写入了 {} / {} 行", self.rows, self.info.height),
      });
    }

    self.writer.flush().map_err(RasterError::io(&self.path))?;
    info!(
      "写出原始栅格 {}: {}x{} {}",
      self.path.display(),
      self.info.width,
      self.info.height,
      self.info.order
    );
    Ok(self.path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_raster(dir: &Path, info: RasterInfo, pixels: &[u8]) -> PathBuf {
    let path = dir.join("scene.raw");
    let mut writer = RawRasterWriter::create(&path, info).unwrap();
    let row_bytes = info.width as usize * info.channels();
    for row in pixels.chunks(row_bytes) {
      writer.write_row(row).unwrap();
    }
    writer.finish().unwrap()
  }

  #[test]
  fn header_layout_is_fixed() {
    let header = RawRasterHeader {
      info: RasterInfo {
        width: 0x0102,
        height: 3,
        order: ChannelOrder::Bgr,
      },
    };
    let bytes = header.encode();
    assert_eq!(&bytes[0..8], b"LYRASTER");
    assert_eq!(&bytes[8..10], &[1, 0]);
    assert_eq!(bytes[10], 2);
    assert_eq!(bytes[11], 8);
    assert_eq!(&bytes[16..18], &[0x02, 0x01]);
    assert_eq!(bytes[24], 3);
    assert_eq!(
      RawRasterHeader::decode(&bytes, Path::new("x")).unwrap(),
      header
    );
  }

  #[test]
  fn oversized_dimensions_are_format_errors() {
    let mut bytes = RawRasterHeader {
      info: RasterInfo {
        width: 1,
        height: 1,
        order: ChannelOrder::Rgb,
      },
    }
    .encode();
    bytes[16..24].copy_from_slice(&(u32::MAX as u64 + 1).to_le_bytes());
    let err = RawRasterHeader::decode(&bytes, Path::new("x")).unwrap_err();
    assert!(err.is_format_error());
  }

  #[test]
  fn sixteen_bit_samples_are_rejected() {
    let mut bytes = RawRasterHeader {
      info: RasterInfo {
        width: 1,
        height: 1,
        order: ChannelOrder::Rgb,
      },
    }
    .encode();
    bytes[11] = 16;
    assert!(
      RawRasterHeader::decode(&bytes, Path::new("x"))
        .unwrap_err()
        .is_format_error()
    );
  }

  #[test]
  fn mapped_window_matches_written_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let info = RasterInfo {
      width: 4,
      height: 3,
      order: ChannelOrder::Rgb,
    };
    let pixels: Vec<u8> = (0..36).collect();
    let path = write_raster(dir.path(), info, &pixels);

    let raster = RawRasterOpener::new(&path).open().unwrap();
    assert_eq!(raster.info(), &info);
    let view = raster.read_window(2, 1, 8, 8).unwrap();
    assert_eq!((view.width(), view.height()), (2, 2));
    assert_eq!(view.row(0), &pixels[18..24]);
    assert_eq!(view.row(1), &pixels[30..36]);
  }

  #[test]
  fn truncated_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.raw");
    let header = RawRasterHeader {
      info: RasterInfo {
        width: 10,
        height: 10,
        order: ChannelOrder::Rgb,
      },
    };
    std::fs::write(&path, header.encode()).unwrap();

    let err = RawRaster::open(&path).err().unwrap();
    assert!(matches!(err, RasterError::Corrupt { .. }));
  }

  #[test]
  fn missing_file_is_io_error() {
    let err = RawRaster::open(Path::new("/nonexistent/liaoyuan.raw"))
      .err()
      .unwrap();
    assert!(matches!(err, RasterError::Io { .. }));
  }

  #[test]
  fn short_row_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let info = RasterInfo {
      width: 2,
      height: 1,
      order: ChannelOrder::Gray,
    };
    let mut writer = RawRasterWriter::create(dir.path().join("a.raw"), info).unwrap();
    assert!(writer.write_row(&[1]).is_err());
  }
}
