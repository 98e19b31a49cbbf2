// 该文件是 Toulan （投篮） 项目的一部分。
// src/output/skeleton.rs - 骨架叠加层布局
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

//! 从采样序列中挑出置信度最高的姿态，计算画布上的线段、关节点与标签。
//! 这里只产生绘制指令，光栅化在 [`crate::output::draw`] 中完成。

use image::Rgba;

use crate::{
  frame::Resolution,
  pose::{BodyPart, PoseEstimate, Position, Sample},
};

/// 骨架连线（左右对称）
pub const CONNECTIONS: [(BodyPart, BodyPart); 12] = [
  (BodyPart::LeftShoulder, BodyPart::LeftElbow),
  (BodyPart::LeftElbow, BodyPart::LeftWrist),
  (BodyPart::RightShoulder, BodyPart::RightElbow),
  (BodyPart::RightElbow, BodyPart::RightWrist),
  (BodyPart::LeftShoulder, BodyPart::RightShoulder),
  (BodyPart::LeftShoulder, BodyPart::LeftHip),
  (BodyPart::RightShoulder, BodyPart::RightHip),
  (BodyPart::LeftHip, BodyPart::RightHip),
  (BodyPart::LeftHip, BodyPart::LeftKnee),
  (BodyPart::LeftKnee, BodyPart::LeftAnkle),
  (BodyPart::RightHip, BodyPart::RightKnee),
  (BodyPart::RightKnee, BodyPart::RightAnkle),
];

/// 需要标注名称的上肢关节
pub const LABELED_JOINTS: [BodyPart; 6] = [
  BodyPart::LeftShoulder,
  BodyPart::LeftElbow,
  BodyPart::LeftWrist,
  BodyPart::RightShoulder,
  BodyPart::RightElbow,
  BodyPart::RightWrist,
];

const SCALE: f32 = 0.8;
const MARGIN: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
  pub min_keypoint_score: f32,
  pub line_width: u32,
  pub marker_radius: i32,
  /// 标签基线在关节点上方的距离（像素）
  pub label_offset: f32,
  pub label_size: f32,
  pub line_color: Rgba<u8>,
  pub joint_color: Rgba<u8>,
  /// 手腕、脚踝
  pub extremity_color: Rgba<u8>,
  pub label_color: Rgba<u8>,
}

impl Default for RenderConfig {
  fn default() -> Self {
    Self {
      min_keypoint_score: 0.5,
      line_width: 3,
      marker_radius: 5,
      label_offset: 10.0,
      label_size: 12.0,
      line_color: Rgba([0x25, 0x63, 0xeb, 0xff]),
      joint_color: Rgba([0x25, 0x63, 0xeb, 0xff]),
      extremity_color: Rgba([0xf5, 0x9e, 0x0b, 0xff]),
      label_color: Rgba([0x1f, 0x29, 0x37, 0xff]),
    }
  }
}

/// 采集坐标到画布坐标的映射：缩放到 80%，四周各留 10%
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
  scale_x: f32,
  scale_y: f32,
  offset_x: f32,
  offset_y: f32,
}

impl Projection {
  pub fn new(capture: Resolution, surface: Resolution) -> Self {
    let (sw, sh) = (surface.width as f32, surface.height as f32);
    Self {
      scale_x: SCALE * sw / capture.width.max(1) as f32,
      scale_y: SCALE * sh / capture.height.max(1) as f32,
      offset_x: MARGIN * sw,
      offset_y: MARGIN * sh,
    }
  }

  pub fn apply(&self, p: Position) -> Position {
    Position::new(
      p.x * self.scale_x + self.offset_x,
      p.y * self.scale_y + self.offset_y,
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
  pub from: BodyPart,
  pub to: BodyPart,
  pub start: Position,
  pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
  pub part: BodyPart,
  pub center: Position,
  pub color: Rgba<u8>,
}

/// 文本标签，`anchor` 为文字底边中点
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
  pub text: String,
  pub anchor: Position,
}

/// 一帧骨架叠加层的绘制指令，按线段、关节点、标签的顺序绘制
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonOverlay {
  pub surface: Resolution,
  /// 所选姿态的采样时刻
  pub time: f64,
  pub segments: Vec<Segment>,
  pub markers: Vec<Marker>,
  pub labels: Vec<Label>,
}

/// 置信度最高的采样，并列时取最早出现者
pub fn best_sample(samples: &[Sample]) -> Option<&Sample> {
  let mut iter = samples.iter();
  let mut best = iter.next()?;
  for sample in iter {
    if sample.pose.score > best.pose.score {
      best = sample;
    }
  }
  Some(best)
}

#[derive(Debug, Clone, Default)]
pub struct SkeletonRenderer {
  config: RenderConfig,
}

impl SkeletonRenderer {
  pub fn new(config: RenderConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &RenderConfig {
    &self.config
  }

  /// 计算叠加层，采样为空时返回 `None`
  pub fn layout(
    &self,
    samples: &[Sample],
    capture: Resolution,
    surface: Resolution,
  ) -> Option<SkeletonOverlay> {
    let best = best_sample(samples)?;
    let projection = Projection::new(capture, surface);
    let pose = &best.pose;

    Some(SkeletonOverlay {
      surface,
      time: best.time,
      segments: self.segments(pose, &projection),
      markers: self.markers(pose, &projection),
      labels: self.labels(pose, &projection),
    })
  }

  fn segments(&self, pose: &PoseEstimate, projection: &Projection) -> Vec<Segment> {
    let min = self.config.min_keypoint_score;
    CONNECTIONS
      .iter()
      .filter_map(|(from, to)| {
        let start = pose.confident_position(*from, min)?;
        let end = pose.confident_position(*to, min)?;
        Some(Segment {
          from: *from,
          to: *to,
          start: projection.apply(start),
          end: projection.apply(end),
        })
      })
      .collect()
  }

  fn markers(&self, pose: &PoseEstimate, projection: &Projection) -> Vec<Marker> {
    pose
      .keypoints
      .iter()
      .filter(|kp| kp.is_confident(self.config.min_keypoint_score))
      .map(|kp| Marker {
        part: kp.part,
        center: projection.apply(kp.position),
        color: if kp.part.is_extremity() {
          self.config.extremity_color
        } else {
          self.config.joint_color
        },
      })
      .collect()
  }

  fn labels(&self, pose: &PoseEstimate, projection: &Projection) -> Vec<Label> {
    LABELED_JOINTS
      .iter()
      .filter_map(|part| {
        let at = projection.apply(pose.confident_position(*part, self.config.min_keypoint_score)?);
        Some(Label {
          text: part.short_label(),
          anchor: Position::new(at.x, at.y - self.config.label_offset),
        })
      })
      .collect()
  }
}
