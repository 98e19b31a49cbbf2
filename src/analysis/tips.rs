// 该文件是 Toulan （投篮） 项目的一部分。
// src/analysis/tips.rs - 反馈文本与训练建议
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

use serde::Serialize;

use crate::analysis::{Metric, MetricResult};

pub const MIN_TIPS: usize = 3;

pub const MULTIPLE_ANGLES_TIP: &str =
  "Consider recording your shot from multiple angles to identify additional areas for improvement.";
pub const REPETITION_TIP: &str =
  "Focus on consistent repetition of proper mechanics to build muscle memory.";
pub const SOLID_TIP: &str =
  "Your shot mechanics are solid. Focus on consistency and minor refinements.";
pub const EXCELLENT_TIP: &str =
  "You have excellent shooting mechanics! Continue to maintain this form.";
pub const FOLLOW_THROUGH_TIP: &str =
  "Remember to follow through with your shot, holding your form until the ball reaches the basket.";

/// 补足建议条数时依次使用
const FALLBACK_TIPS: [&str; 2] = [FOLLOW_THROUGH_TIP, REPETITION_TIP];

/// 按指标阈值选择一条反馈
///
/// 肘部角度按角度值判断，其余指标按得分判断。
pub fn feedback(metric: Metric, value: f64, score: f64) -> &'static str {
  match metric {
    Metric::ElbowAngle => {
      if value < 80.0 {
        "Your elbow angle is too acute. Try to maintain a 90° angle for better shooting mechanics."
      } else if value > 100.0 {
        "Your elbow angle is too obtuse. Bend your elbow closer to 90° for optimal shooting form."
      } else {
        "Good elbow angle! You're maintaining close to the ideal 90° bend."
      }
    }
    Metric::ReleasePoint => {
      if score < 70.0 {
        "You're releasing the ball too early. Try to release at the peak of your jump for better accuracy."
      } else if score < 85.0 {
        "Your release timing is good, but could be slightly improved by releasing closer to the apex of your jump."
      } else {
        "Excellent release timing! You're releasing the ball at the optimal point in your shooting motion."
      }
    }
    Metric::KneeBend => {
      if score < 75.0 {
        "Your knee bend is insufficient. Deeper knee bend provides more power for your shot."
      } else if score < 90.0 {
        "Good knee bend, but you could benefit from slightly more flexion for optimal power transfer."
      } else {
        "Excellent knee bend! You're getting great power from your legs into your shot."
      }
    }
    Metric::Alignment => {
      if score < 80.0 {
        "Your body alignment could be improved. Try to keep your shoulders, hips, and feet aligned vertically."
      } else if score < 90.0 {
        "Good alignment, with minor improvements possible in your vertical stack position."
      } else {
        "Excellent body alignment! Your vertical stacking is providing great stability for your shot."
      }
    }
  }
}

/// 生成训练建议
///
/// 得分最低的两项指标在低于各自阈值时给出反馈，然后按总分档位追加通用建议，
/// 不足三条时用通用建议补齐。
pub fn generate_tips(metrics: &[(Metric, &MetricResult)], overall_score: u8) -> Vec<String> {
  let mut ranked = metrics.to_vec();
  // 稳定排序，同分保持指标顺序
  ranked.sort_by(|a, b| a.1.score.total_cmp(&b.1.score));

  let mut tips: Vec<String> = ranked
    .iter()
    .take(2)
    .filter(|(metric, result)| result.score < metric.tip_threshold())
    .map(|(_, result)| result.feedback.clone())
    .collect();

  if overall_score < 70 {
    tips.push(MULTIPLE_ANGLES_TIP.to_string());
    tips.push(REPETITION_TIP.to_string());
  } else if overall_score < 85 {
    tips.push(SOLID_TIP.to_string());
  } else {
    tips.push(EXCELLENT_TIP.to_string());
  }

  for fallback in FALLBACK_TIPS {
    if tips.len() >= MIN_TIPS {
      break;
    }
    if !tips.iter().any(|t| t == fallback) {
      tips.push(fallback.to_string());
    }
  }
  tips
}

/// 得分档位，用于数值与进度条配色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreBand {
  Excellent,
  Good,
  Average,
  Poor,
}

impl ScoreBand {
  pub fn of(score: f64) -> Self {
    if score >= 90.0 {
      ScoreBand::Excellent
    } else if score >= 75.0 {
      ScoreBand::Good
    } else if score >= 60.0 {
      ScoreBand::Average
    } else {
      ScoreBand::Poor
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ScoreBand::Excellent => "excellent",
      ScoreBand::Good => "good",
      ScoreBand::Average => "average",
      ScoreBand::Poor => "poor",
    }
  }
}

/// 总分评语
pub fn describe(overall_score: u8) -> &'static str {
  match overall_score {
    90.. => "Excellent form! Professional quality shooting mechanics.",
    80..=89 => "Very good form. Minor adjustments can perfect your technique.",
    70..=79 => "Good form with some areas for improvement.",
    _ => "Your form needs work. Focus on the suggested improvements.",
  }
}
