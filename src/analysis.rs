// 该文件是 Toulan （投篮） 项目的一部分。
// src/analysis.rs - 投篮姿态分析
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

//! # 姿态分析
//!
//! 从采样序列计算四项指标：肘部角度、出手时机、屈膝程度、身体对齐。
//! 每项指标相互独立，得分在 [0, 100]，总分为加权平均。

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::pose::{Sample, Side};

pub mod kinematics;
pub mod tips;

pub use self::kinematics::{JumpTiming, Release};
pub use self::tips::ScoreBand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
  ElbowAngle,
  ReleasePoint,
  KneeBend,
  Alignment,
}

impl Metric {
  pub const ALL: [Metric; 4] = [
    Metric::ElbowAngle,
    Metric::ReleasePoint,
    Metric::KneeBend,
    Metric::Alignment,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      Metric::ElbowAngle => "Elbow Angle",
      Metric::ReleasePoint => "Release Timing",
      Metric::KneeBend => "Knee Bend",
      Metric::Alignment => "Body Alignment",
    }
  }

  pub fn unit(&self) -> &'static str {
    match self {
      Metric::ElbowAngle => "°",
      _ => "%",
    }
  }

  /// 在总分中的权重
  pub fn weight(&self) -> f64 {
    match self {
      Metric::ElbowAngle | Metric::ReleasePoint => 0.3,
      Metric::KneeBend | Metric::Alignment => 0.2,
    }
  }

  /// 低于此得分时给出针对性建议
  pub fn tip_threshold(&self) -> f64 {
    80.0
  }
}

impl fmt::Display for Metric {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
  #[error("没有可分析的采样")]
  NoSamples,
  #[error("关键点不足，无法计算 {0}")]
  InsufficientKeypoints(Metric),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
  pub value: f64,
  pub score: f64,
  pub feedback: String,
}

impl MetricResult {
  pub fn new(metric: Metric, value: f64, score: f64) -> Self {
    MetricResult {
      value,
      score,
      feedback: tips::feedback(metric, value, score).to_string(),
    }
  }

  /// 显示用数值，四舍五入并带单位
  pub fn display_value(&self, metric: Metric) -> String {
    format!("{}{}", self.value.round(), metric.unit())
  }

  pub fn band(&self) -> ScoreBand {
    ScoreBand::of(self.score)
  }
}

/// 分析过程中的中间量，便于排查得分
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotKinematics {
  pub shooting_side: Side,
  pub release_time: f64,
  pub jump: JumpTiming,
  pub peak_knee_flexion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
  pub elbow_angle: MetricResult,
  pub release_point: MetricResult,
  pub knee_bend: MetricResult,
  pub alignment: MetricResult,
  pub overall_score: u8,
  pub tips: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kinematics: Option<ShotKinematics>,
}

/// 肘部角度得分：90° 为满分，每偏离 1° 扣 2.5 分
pub fn elbow_score(angle: f64) -> f64 {
  (100.0 - (angle - 90.0).abs() * 2.5).max(0.0)
}

pub fn overall_score(elbow: f64, release: f64, knee: f64, alignment: f64) -> u8 {
  let weighted = Metric::ElbowAngle.weight() * elbow
    + Metric::ReleasePoint.weight() * release
    + Metric::KneeBend.weight() * knee
    + Metric::Alignment.weight() * alignment;
  weighted.round().clamp(0.0, 100.0) as u8
}

impl AnalysisResult {
  /// 由四项指标数值组合结果
  ///
  /// 肘部角度单位为度，其余三项为百分比，超出 [0, 100] 的部分会被截断。
  pub fn from_metrics(elbow_angle: f64, release_timing: f64, knee_bend: f64, alignment: f64) -> Self {
    let release_timing = release_timing.clamp(0.0, 100.0);
    let knee_bend = knee_bend.clamp(0.0, 100.0);
    let alignment = alignment.clamp(0.0, 100.0);

    let elbow_angle = MetricResult::new(Metric::ElbowAngle, elbow_angle, elbow_score(elbow_angle));
    let release_point = MetricResult::new(Metric::ReleasePoint, release_timing, release_timing);
    let knee_bend = MetricResult::new(Metric::KneeBend, knee_bend, knee_bend);
    let alignment = MetricResult::new(Metric::Alignment, alignment, alignment);

    let overall = overall_score(
      elbow_angle.score,
      release_point.score,
      knee_bend.score,
      alignment.score,
    );
    let tips = tips::generate_tips(
      &[
        (Metric::ElbowAngle, &elbow_angle),
        (Metric::ReleasePoint, &release_point),
        (Metric::KneeBend, &knee_bend),
        (Metric::Alignment, &alignment),
      ],
      overall,
    );

    AnalysisResult {
      elbow_angle,
      release_point,
      knee_bend,
      alignment,
      overall_score: overall,
      tips,
      kinematics: None,
    }
  }

  pub fn metric(&self, metric: Metric) -> &MetricResult {
    match metric {
      Metric::ElbowAngle => &self.elbow_angle,
      Metric::ReleasePoint => &self.release_point,
      Metric::KneeBend => &self.knee_bend,
      Metric::Alignment => &self.alignment,
    }
  }

  pub fn band(&self) -> ScoreBand {
    ScoreBand::of(self.overall_score as f64)
  }

  pub fn description(&self) -> &'static str {
    tips::describe(self.overall_score)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
  /// 关键点置信度需严格大于该值
  pub min_keypoint_score: f32,
  /// 达到满分所需的屈膝角度（度）
  pub ideal_knee_flexion_deg: f64,
  /// 对齐偏差（相对身高）达到该值时对齐得分为 0
  pub alignment_tolerance: f64,
}

impl Default for AnalyzerConfig {
  fn default() -> Self {
    AnalyzerConfig {
      min_keypoint_score: 0.5,
      ideal_knee_flexion_deg: 45.0,
      alignment_tolerance: 0.1,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct FormAnalyzer {
  config: AnalyzerConfig,
}

impl FormAnalyzer {
  pub fn new(config: AnalyzerConfig) -> Self {
    FormAnalyzer { config }
  }

  pub fn config(&self) -> &AnalyzerConfig {
    &self.config
  }

  pub fn analyze(&self, samples: &[Sample]) -> Result<AnalysisResult, AnalysisError> {
    if samples.is_empty() {
      return Err(AnalysisError::NoSamples);
    }
    let min = self.config.min_keypoint_score;
    info!("分析 {} 个采样", samples.len());

    let release = kinematics::find_release(samples, min)
      .ok_or(AnalysisError::InsufficientKeypoints(Metric::ElbowAngle))?;
    debug!(
      "出手帧 #{} @ {:.3}s, 投篮手 {:?}, 肘部角度 {:.1}°",
      release.index, release.time, release.side, release.elbow_angle
    );

    let jump = kinematics::jump_timing(samples, &release, min)
      .ok_or(AnalysisError::InsufficientKeypoints(Metric::ReleasePoint))?;
    debug!(
      "起跳 {:.3}s, 最高点 {:.3}s, 出手 {:.3}s",
      jump.start_time, jump.apex_time, jump.release_time
    );

    let flexion = kinematics::peak_knee_flexion(samples, min)
      .ok_or(AnalysisError::InsufficientKeypoints(Metric::KneeBend))?;
    debug!("最大屈膝 {:.1}°", flexion);

    let alignment = kinematics::alignment_percent(samples, min, self.config.alignment_tolerance)
      .ok_or(AnalysisError::InsufficientKeypoints(Metric::Alignment))?;

    let mut result = AnalysisResult::from_metrics(
      release.elbow_angle,
      jump.percent(),
      kinematics::knee_bend_percent(flexion, self.config.ideal_knee_flexion_deg),
      alignment,
    );
    result.kinematics = Some(ShotKinematics {
      shooting_side: release.side,
      release_time: release.time,
      jump,
      peak_knee_flexion: flexion,
    });

    info!("总分 {}", result.overall_score);
    Ok(result)
  }
}
