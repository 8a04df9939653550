// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/bin/raster_convert.rs - 转换为原始栅格容器
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use liaoyuan::{
  FromUrl,
  input::{OpenRaster, RasterSource, RasterWrapper, RawRasterWriter},
};

/// 把可解码的栅格逐行写成原始栅格容器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入栅格 (image:///path/to/scene.png 或 raw:///path/to/scene.raw)
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出文件路径
  #[arg(long, value_name = "FILE")]
  pub output: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入栅格: {}", args.input);
  info!("输出文件: {}", args.output.display());

  let source = RasterWrapper::from_url(&args.input)?.open()?;
  let raster = *source.info();
  let mut writer = RawRasterWriter::create(&args.output, raster)?;
  for y in 0..raster.height {
    let row = source.read_window(0, y, raster.width, 1)?;
    writer.write_row(row.row(0))?;
  }
  let path = writer.finish()?;

  println!(
    "已写出 {}x{} {} 栅格: {}",
    raster.width,
    raster.height,
    raster.order,
    path.display()
  );

  Ok(())
}
