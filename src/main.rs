// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use liaoyuan::{FromUrl, Job, input::RasterWrapper, output::OutputTarget};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入栅格: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = args.job_config()?;
  info!(
    "分块边长 {}, 最小面积 {}, 放大倍数 {}, 规则 {}, 工作线程 {}",
    config.tile_size,
    config.min_area,
    config.zoom,
    config.rule.name(),
    config.workers
  );

  let input = RasterWrapper::from_url(&args.input)?;
  let output = OutputTarget::from_url(&args.output)?;

  let job = Job::new(input, config).with_record(args.record.clone());
  let cancel = job.cancel_token();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    cancel.cancel();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  let report = job.run(&output)?;

  if let Some(path) = &args.report {
    std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    info!("任务摘要已写入: {}", path.display());
  }

  println!();
  println!("处理完成!");
  println!("栅格尺寸: {}x{}", report.raster.width, report.raster.height);
  println!("分块数: {}", report.tiles);
  println!("失败分块数: {}", report.failed_tiles);
  println!("总检测数: {}", report.total_detections);
  println!("耗时: {} ms", report.elapsed_ms);
  println!("输出: {}", output);

  Ok(())
}
