// 该文件是 Toulan （投篮） 项目的一部分。
// src/pose.rs - 姿态数据模型
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

use std::fmt;

use serde::{Deserialize, Serialize};

/// 人体关键点名称（PoseNet 的 17 个部位）
///
/// 序列化为 camelCase，与 PoseNet 输出的 `part` 字段一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
  Nose,
  LeftEye,
  RightEye,
  LeftEar,
  RightEar,
  LeftShoulder,
  RightShoulder,
  LeftElbow,
  RightElbow,
  LeftWrist,
  RightWrist,
  LeftHip,
  RightHip,
  LeftKnee,
  RightKnee,
  LeftAnkle,
  RightAnkle,
}

impl BodyPart {
  pub const ALL: [BodyPart; 17] = [
    BodyPart::Nose,
    BodyPart::LeftEye,
    BodyPart::RightEye,
    BodyPart::LeftEar,
    BodyPart::RightEar,
    BodyPart::LeftShoulder,
    BodyPart::RightShoulder,
    BodyPart::LeftElbow,
    BodyPart::RightElbow,
    BodyPart::LeftWrist,
    BodyPart::RightWrist,
    BodyPart::LeftHip,
    BodyPart::RightHip,
    BodyPart::LeftKnee,
    BodyPart::RightKnee,
    BodyPart::LeftAnkle,
    BodyPart::RightAnkle,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      BodyPart::Nose => "nose",
      BodyPart::LeftEye => "leftEye",
      BodyPart::RightEye => "rightEye",
      BodyPart::LeftEar => "leftEar",
      BodyPart::RightEar => "rightEar",
      BodyPart::LeftShoulder => "leftShoulder",
      BodyPart::RightShoulder => "rightShoulder",
      BodyPart::LeftElbow => "leftElbow",
      BodyPart::RightElbow => "rightElbow",
      BodyPart::LeftWrist => "leftWrist",
      BodyPart::RightWrist => "rightWrist",
      BodyPart::LeftHip => "leftHip",
      BodyPart::RightHip => "rightHip",
      BodyPart::LeftKnee => "leftKnee",
      BodyPart::RightKnee => "rightKnee",
      BodyPart::LeftAnkle => "leftAnkle",
      BodyPart::RightAnkle => "rightAnkle",
    }
  }

  /// 手腕与脚踝，绘制时使用高亮色
  pub fn is_extremity(&self) -> bool {
    matches!(
      self,
      BodyPart::LeftWrist | BodyPart::RightWrist | BodyPart::LeftAnkle | BodyPart::RightAnkle
    )
  }

  /// 缩写标签：`leftElbow` -> `LElbow`，`rightWrist` -> `RWrist`
  pub fn short_label(&self) -> String {
    let name = self.as_str();
    if let Some(rest) = name.strip_prefix("left") {
      format!("L{}", rest)
    } else if let Some(rest) = name.strip_prefix("right") {
      format!("R{}", rest)
    } else {
      name.to_string()
    }
  }
}

impl fmt::Display for BodyPart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 身体左右侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
  Left,
  Right,
}

impl Side {
  pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

  pub fn shoulder(self) -> BodyPart {
    match self {
      Side::Left => BodyPart::LeftShoulder,
      Side::Right => BodyPart::RightShoulder,
    }
  }

  pub fn elbow(self) -> BodyPart {
    match self {
      Side::Left => BodyPart::LeftElbow,
      Side::Right => BodyPart::RightElbow,
    }
  }

  pub fn wrist(self) -> BodyPart {
    match self {
      Side::Left => BodyPart::LeftWrist,
      Side::Right => BodyPart::RightWrist,
    }
  }

  pub fn hip(self) -> BodyPart {
    match self {
      Side::Left => BodyPart::LeftHip,
      Side::Right => BodyPart::RightHip,
    }
  }

  pub fn knee(self) -> BodyPart {
    match self {
      Side::Left => BodyPart::LeftKnee,
      Side::Right => BodyPart::RightKnee,
    }
  }

  pub fn ankle(self) -> BodyPart {
    match self {
      Side::Left => BodyPart::LeftAnkle,
      Side::Right => BodyPart::RightAnkle,
    }
  }
}

/// 源帧像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
  pub x: f32,
  pub y: f32,
}

impl Position {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }

  pub fn midpoint(&self, other: &Position) -> Position {
    Position::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
  }
}

/// 单个关键点，由姿态估计器产生后不再修改
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
  pub part: BodyPart,
  pub position: Position,
  pub score: f32,
}

impl Keypoint {
  pub fn new(part: BodyPart, x: f32, y: f32, score: f32) -> Self {
    Self {
      part,
      position: Position::new(x, y),
      score,
    }
  }

  /// 置信度严格大于阈值才视为可信
  pub fn is_confident(&self, min_score: f32) -> bool {
    self.score > min_score
  }
}

/// 单帧姿态估计结果
///
/// 每个部位至多一个关键点，未检测到的部位可以缺失。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawPose")]
pub struct PoseEstimate {
  pub score: f32,
  pub keypoints: Vec<Keypoint>,
}

/// 反序列化的中间形态，经 [`PoseEstimate::new`] 去重
#[derive(Deserialize)]
struct RawPose {
  score: f32,
  keypoints: Vec<Keypoint>,
}

impl From<RawPose> for PoseEstimate {
  fn from(raw: RawPose) -> Self {
    PoseEstimate::new(raw.score, raw.keypoints)
  }
}

impl PoseEstimate {
  /// 创建姿态，重复的部位只保留第一次出现的关键点
  pub fn new(score: f32, keypoints: impl IntoIterator<Item = Keypoint>) -> Self {
    let mut unique: Vec<Keypoint> = Vec::with_capacity(BodyPart::ALL.len());
    for keypoint in keypoints {
      if !unique.iter().any(|k| k.part == keypoint.part) {
        unique.push(keypoint);
      }
    }
    Self {
      score,
      keypoints: unique,
    }
  }

  pub fn keypoint(&self, part: BodyPart) -> Option<&Keypoint> {
    self.keypoints.iter().find(|k| k.part == part)
  }

  pub fn confident(&self, part: BodyPart, min_score: f32) -> Option<&Keypoint> {
    self.keypoint(part).filter(|k| k.is_confident(min_score))
  }

  pub fn confident_position(&self, part: BodyPart, min_score: f32) -> Option<Position> {
    self.confident(part, min_score).map(|k| k.position)
  }
}

/// 带时间戳的姿态采样，`time` 为距片头的秒数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
  pub time: f64,
  pub pose: PoseEstimate,
}

impl Sample {
  pub fn new(time: f64, pose: PoseEstimate) -> Self {
    Self { time, pose }
  }
}
