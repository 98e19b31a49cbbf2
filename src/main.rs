// 该文件是 Toulan （投篮） 项目的一部分。
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use toulan::{
  FromUrl,
  input::InputWrapper,
  model::ModelWrapper,
  output::{OutputWrapper, draw::Draw},
  task::{ShotAnalysisTask, Task},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("姿态估计器: {}", args.model);
  info!("输出路径: {}", args.output);
  if let Some(report) = &args.report {
    info!("报告路径: {}", report);
  }

  let input = InputWrapper::from_url(&args.input)?;
  let model = ModelWrapper::from_url(&args.model)?;

  let mut draw = Draw::default();
  if let Some(font) = &args.font {
    draw = draw.with_font(Draw::load_font(font)?);
  }
  let mut outputs = vec![OutputWrapper::from_url(&args.output)?.with_overlay(args.overlay(), draw)];
  if let Some(report) = &args.report {
    outputs.push(OutputWrapper::from_url(report)?);
  }

  ShotAnalysisTask::new(args.session_config())
    .interruptible(true)
    .run_task(input, model, outputs)
    .await
}
