// 该文件是 Toulan （投篮） 项目的一部分。
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

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use url::Url;

use toulan::{
  frame::Resolution,
  sampler::{DEFAULT_SAMPLE_RATE, SamplerConfig},
  session::SessionConfig,
};

/// Toulan 投篮姿态分析参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入视频
  /// 支持格式:
  /// - 图片序列目录: frames:///path/to/dir?fps=30
  /// - 视频文件（需启用 gstreamer_input）: gst://file/path/to/shot.mp4
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 姿态估计器，例如 replay:///path/to/poses.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 骨架叠加图输出，例如 image:///path/to/overlay.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 分析报告输出，例如 report:///path/to/result.json
  #[arg(long, value_name = "REPORT")]
  pub report: Option<Url>,

  /// 采样率（帧/秒）
  #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE, value_name = "RATE")]
  pub rate: f64,

  /// 采集宽度
  #[arg(long, default_value = "640", value_name = "PIXELS")]
  pub capture_width: u32,

  /// 采集高度
  #[arg(long, default_value = "480", value_name = "PIXELS")]
  pub capture_height: u32,

  /// 叠加图宽度
  #[arg(long, default_value = "640", value_name = "PIXELS")]
  pub overlay_width: u32,

  /// 叠加图高度
  #[arg(long, default_value = "480", value_name = "PIXELS")]
  pub overlay_height: u32,

  /// 单步（seek 或姿态估计）超时，毫秒；不设置则不限
  #[arg(long, value_name = "MILLIS")]
  pub step_timeout_ms: Option<u64>,

  /// 关节标签字体（TTF/OTF），不设置则不绘制标签
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

impl Args {
  pub fn session_config(&self) -> SessionConfig {
    SessionConfig {
      sampler: SamplerConfig {
        rate: self.rate,
        capture: Resolution::new(self.capture_width, self.capture_height),
        step_timeout: self.step_timeout_ms.map(Duration::from_millis),
      },
      ..SessionConfig::default()
    }
  }

  pub fn overlay(&self) -> Resolution {
    Resolution::new(self.overlay_width, self.overlay_height)
  }
}
