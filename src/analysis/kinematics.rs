// 该文件是 Toulan （投篮） 项目的一部分。
// src/analysis/kinematics.rs - 关键点几何计算
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

use crate::pose::{BodyPart, PoseEstimate, Position, Sample, Side};

const DEGENERATE_LENGTH: f64 = 1e-6;

/// 顶点处两条边的夹角（度），范围 [0, 180]
///
/// 任一边长度为 0 时夹角无定义。
pub fn joint_angle(a: Position, vertex: Position, c: Position) -> Option<f64> {
  let (ax, ay) = ((a.x - vertex.x) as f64, (a.y - vertex.y) as f64);
  let (cx, cy) = ((c.x - vertex.x) as f64, (c.y - vertex.y) as f64);
  if ax.hypot(ay) < DEGENERATE_LENGTH || cx.hypot(cy) < DEGENERATE_LENGTH {
    return None;
  }

  let cross = ax * cy - ay * cx;
  let dot = ax * cx + ay * cy;
  Some(cross.abs().atan2(dot).to_degrees())
}

struct Arm {
  wrist_y: f32,
  elbow_angle: f64,
}

fn arm(pose: &PoseEstimate, side: Side, min_score: f32) -> Option<Arm> {
  let shoulder = pose.confident_position(side.shoulder(), min_score)?;
  let elbow = pose.confident_position(side.elbow(), min_score)?;
  let wrist = pose.confident_position(side.wrist(), min_score)?;
  let elbow_angle = joint_angle(shoulder, elbow, wrist)?;
  Some(Arm {
    wrist_y: wrist.y,
    elbow_angle,
  })
}

/// 出手帧
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
  pub index: usize,
  pub time: f64,
  pub side: Side,
  pub elbow_angle: f64,
}

/// 投篮手：可信手腕能到达更高位置（y 更小）的一侧，高度相同取右手
pub fn shooting_side(samples: &[Sample], min_score: f32) -> Option<Side> {
  let highest = |side: Side| {
    samples
      .iter()
      .filter_map(|s| s.pose.confident_position(side.wrist(), min_score))
      .map(|p| p.y)
      .min_by(f32::total_cmp)
  };
  match (highest(Side::Right), highest(Side::Left)) {
    (Some(right), Some(left)) if left < right => Some(Side::Left),
    (Some(_), _) => Some(Side::Right),
    (None, Some(_)) => Some(Side::Left),
    (None, None) => None,
  }
}

/// 寻找出手帧：投篮手手腕位置最高（y 最小）的采样
///
/// 只考虑投篮手一侧肩、肘、腕均可信的采样，同一高度取最早的采样。
pub fn find_release(samples: &[Sample], min_score: f32) -> Option<Release> {
  let side = shooting_side(samples, min_score)?;
  let mut best: Option<(usize, Arm)> = None;
  for (index, sample) in samples.iter().enumerate() {
    let Some(candidate) = arm(&sample.pose, side, min_score) else {
      continue;
    };
    if best
      .as_ref()
      .is_none_or(|(_, current)| candidate.wrist_y < current.wrist_y)
    {
      best = Some((index, candidate));
    }
  }

  best.map(|(index, arm)| Release {
    index,
    time: samples[index].time,
    side,
    elbow_angle: arm.elbow_angle,
  })
}

fn hip_height(pose: &PoseEstimate, min_score: f32) -> Option<f64> {
  let ys: Vec<f64> = Side::BOTH
    .iter()
    .filter_map(|side| pose.confident_position(side.hip(), min_score))
    .map(|p| p.y as f64)
    .collect();
  if ys.is_empty() {
    None
  } else {
    Some(ys.iter().sum::<f64>() / ys.len() as f64)
  }
}

/// 起跳到最高点的时间轴
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpTiming {
  /// 出手前髋部最低的时刻（下蹲最深）
  pub start_time: f64,
  /// 起跳后髋部最高的时刻
  pub apex_time: f64,
  pub release_time: f64,
}

impl JumpTiming {
  /// 出手时刻在起跳到最高点过程中的百分比，出手在最高点或之后记为 100
  pub fn percent(&self) -> f64 {
    let span = self.apex_time - self.start_time;
    if span <= 0.0 {
      return 100.0;
    }
    (100.0 * (self.release_time - self.start_time) / span).clamp(0.0, 100.0)
  }
}

pub fn jump_timing(samples: &[Sample], release: &Release, min_score: f32) -> Option<JumpTiming> {
  let mut start: Option<(usize, f64)> = None;
  for (index, sample) in samples.iter().enumerate().take(release.index + 1) {
    if let Some(y) = hip_height(&sample.pose, min_score)
      && start.is_none_or(|(_, lowest)| y > lowest)
    {
      start = Some((index, y));
    }
  }
  let (start_index, _) = start?;

  let mut apex: Option<(usize, f64)> = None;
  for (index, sample) in samples.iter().enumerate().skip(start_index) {
    if let Some(y) = hip_height(&sample.pose, min_score)
      && apex.is_none_or(|(_, highest)| y < highest)
    {
      apex = Some((index, y));
    }
  }
  let (apex_index, _) = apex?;

  Some(JumpTiming {
    start_time: samples[start_index].time,
    apex_time: samples[apex_index].time,
    release_time: release.time,
  })
}

fn knee_angle(pose: &PoseEstimate, side: Side, min_score: f32) -> Option<f64> {
  let hip = pose.confident_position(side.hip(), min_score)?;
  let knee = pose.confident_position(side.knee(), min_score)?;
  let ankle = pose.confident_position(side.ankle(), min_score)?;
  joint_angle(hip, knee, ankle)
}

/// 整段采样中双腿最大的屈膝角度（180° 减去髋-膝-踝夹角）
pub fn peak_knee_flexion(samples: &[Sample], min_score: f32) -> Option<f64> {
  samples
    .iter()
    .flat_map(|sample| {
      Side::BOTH
        .iter()
        .filter_map(move |side| knee_angle(&sample.pose, *side, min_score))
    })
    .map(|angle| 180.0 - angle)
    .fold(None, |peak: Option<f64>, flexion| {
      Some(peak.map_or(flexion, |p| p.max(flexion)))
    })
}

/// 屈膝占理想屈膝角度的百分比，上限 100
pub fn knee_bend_percent(flexion: f64, ideal_flexion: f64) -> f64 {
  if ideal_flexion <= 0.0 {
    return 100.0;
  }
  (100.0 * flexion / ideal_flexion).clamp(0.0, 100.0)
}

fn center(pose: &PoseEstimate, a: BodyPart, b: BodyPart, min_score: f32) -> Option<Position> {
  let a = pose.confident_position(a, min_score)?;
  let b = pose.confident_position(b, min_score)?;
  Some(a.midpoint(&b))
}

/// 单帧的身体竖直对齐程度（0-100）
///
/// 肩、髋、踝三个中点到公共竖直轴的平均水平偏差，按身高（肩到踝）归一化，
/// 偏差达到 `tolerance` 时为 0。
pub fn pose_alignment(pose: &PoseEstimate, min_score: f32, tolerance: f64) -> Option<f64> {
  let shoulders = center(pose, BodyPart::LeftShoulder, BodyPart::RightShoulder, min_score)?;
  let hips = center(pose, BodyPart::LeftHip, BodyPart::RightHip, min_score)?;
  let ankles = center(pose, BodyPart::LeftAnkle, BodyPart::RightAnkle, min_score)?;

  let height = (ankles.y - shoulders.y).abs() as f64;
  if height < DEGENERATE_LENGTH {
    return None;
  }

  let xs = [shoulders.x as f64, hips.x as f64, ankles.x as f64];
  let axis = xs.iter().sum::<f64>() / xs.len() as f64;
  let deviation = xs.iter().map(|x| (x - axis).abs()).sum::<f64>() / xs.len() as f64 / height;

  let tolerance = tolerance.max(f64::EPSILON);
  Some((100.0 * (1.0 - deviation / tolerance)).clamp(0.0, 100.0))
}

/// 所有可用采样的平均对齐程度
pub fn alignment_percent(samples: &[Sample], min_score: f32, tolerance: f64) -> Option<f64> {
  let values: Vec<f64> = samples
    .iter()
    .filter_map(|sample| pose_alignment(&sample.pose, min_score, tolerance))
    .collect();
  if values.is_empty() {
    None
  } else {
    Some(values.iter().sum::<f64>() / values.len() as f64)
  }
}
