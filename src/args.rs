// 该文件是 Liaoyuan （燎原） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::{Parser, ValueEnum};
use url::Url;

use liaoyuan::{
  ConfigError, JobConfig,
  model::{ClassifierRule, Dominance, DualHueRange, LinearThreshold},
};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
  /// 主通道高于下界、其余通道低于上界
  Threshold,
  /// 双色相区间
  Hue,
  /// 主通道明显高于其余通道
  Dominance,
}

impl RuleKind {
  fn name(self) -> &'static str {
    match self {
      RuleKind::Threshold => "threshold",
      RuleKind::Hue => "hue",
      RuleKind::Dominance => "dominance",
    }
  }

  fn default_rule(self) -> ClassifierRule {
    match self {
      RuleKind::Threshold => ClassifierRule::Threshold(LinearThreshold::default()),
      RuleKind::Hue => ClassifierRule::Hue(DualHueRange::default()),
      RuleKind::Dominance => ClassifierRule::Dominance(Dominance::default()),
    }
  }
}

/// Liaoyuan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入栅格
  /// 支持格式:
  /// - 原始栅格: raw:///path/to/scene.raw
  /// - 图像文件: image:///path/to/scene.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 标注结果输出
  /// 支持格式:
  /// - 原始栅格: raw:///path/to/annotated.raw
  /// - 图像文件: image:///path/to/annotated.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// JSON 任务配置文件，命令行参数优先
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 分块边长（像素）
  #[arg(long, value_name = "PIXELS")]
  pub tile_size: Option<u32>,

  /// 保留连通域的最小面积
  #[arg(long, value_name = "PIXELS")]
  pub min_area: Option<u32>,

  /// 分类前的放大倍数
  #[arg(long, value_name = "FACTOR")]
  pub zoom: Option<u32>,

  /// 分类规则，使用该规则的默认参数
  #[arg(long, value_enum)]
  pub rule: Option<RuleKind>,

  /// 工作线程数
  #[arg(long, value_name = "COUNT")]
  pub workers: Option<usize>,

  /// 每批分发的分块数
  #[arg(long, value_name = "COUNT")]
  pub batch_size: Option<usize>,

  /// 不做开运算
  #[arg(long)]
  pub no_open: bool,

  /// 逐行记录每个检测结果
  #[arg(long, value_name = "FILE")]
  pub record: Option<PathBuf>,

  /// 以 JSON 写出任务摘要
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,
}

impl Args {
  /// 默认值 < 配置文件 < 命令行参数
  pub fn job_config(&self) -> Result<JobConfig, ConfigError> {
    let mut config = match &self.config {
      Some(path) => JobConfig::from_json_file(path)?,
      None => JobConfig::default(),
    };

    if let Some(tile_size) = self.tile_size {
      config.tile_size = tile_size;
    }
    if let Some(min_area) = self.min_area {
      config.min_area = min_area;
    }
    if let Some(zoom) = self.zoom {
      config.zoom = zoom;
    }
    if let Some(rule) = self.rule
      && rule.name() != config.rule.name()
    {
      config.rule = rule.default_rule();
    }
    if let Some(workers) = self.workers {
      config.workers = workers;
    }
    if let Some(batch_size) = self.batch_size {
      config.batch_size = batch_size;
    }
    if self.no_open {
      config.open_mask = false;
    }

    config.validate()?;
    Ok(config)
  }
}
