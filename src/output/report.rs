// 该文件是 Toulan （投篮） 项目的一部分。
// src/output/report.rs - 分析报告
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

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  analysis::{AnalysisResult, Metric, ScoreBand},
  input::decoded_path,
  output::{Render, skeleton::best_sample},
  sampler::SampledClip,
};

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 单项指标的展示信息
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDisplay {
  pub metric: Metric,
  pub label: &'static str,
  pub display_value: String,
  pub band: ScoreBand,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report<'a> {
  pub analyzed_at: String,
  pub sample_count: usize,
  pub duration: f64,
  pub best_frame_time: Option<f64>,
  pub description: &'static str,
  pub band: ScoreBand,
  pub display: Vec<MetricDisplay>,
  #[serde(flatten)]
  pub result: &'a AnalysisResult,
}

impl<'a> Report<'a> {
  pub fn new(clip: &SampledClip, result: &'a AnalysisResult) -> Self {
    let display = Metric::ALL
      .iter()
      .map(|metric| {
        let m = result.metric(*metric);
        MetricDisplay {
          metric: *metric,
          label: metric.label(),
          display_value: m.display_value(*metric),
          band: m.band(),
        }
      })
      .collect();

    Report {
      analyzed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
      sample_count: clip.samples.len(),
      duration: clip.duration,
      best_frame_time: best_sample(&clip.samples).map(|s| s.time),
      description: result.description(),
      band: result.band(),
      display,
      result,
    }
  }
}

/// 结果面板的命令行呈现：各项指标展示值、总分、评语与建议，写成 JSON
///
/// 不包含采样与关键点，不能据此重放分析。
pub struct ReportOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for ReportOutput {
  const SCHEME: &'static str = "report";
}

impl FromUrl for ReportOutput {
  type Error = ReportError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ReportError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }
    Ok(ReportOutput::new(decoded_path(uri)))
  }
}

impl ReportOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl Render<SampledClip, AnalysisResult> for ReportOutput {
  type Error = ReportError;

  fn render_result(&self, clip: &SampledClip, result: &AnalysisResult) -> Result<(), Self::Error> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let report = Report::new(clip, result);
    std::fs::write(&self.path, serde_json::to_string_pretty(&report)?)?;
    info!("保存分析报告到文件: {}", self.path.display());
    Ok(())
  }
}
