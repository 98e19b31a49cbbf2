// 该文件是 Toulan （投篮） 项目的一部分。
// src/model/replay.rs - 姿态回放估计器
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

//! 从 JSON 文件回放预先计算的 PoseNet 姿态。
//!
//! 文件内容为 `{ "time": 秒, "pose": { "score", "keypoints": [...] } }` 数组，
//! 每次推理返回时间最接近当前帧的姿态（距离相同取较早者）。

use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::CapturedFrame,
  input::decoded_path,
  model::{Model, ModelError},
  pose::{PoseEstimate, Sample},
};

#[derive(Error, Debug)]
pub enum PoseReplayError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("回放文件中没有姿态")]
  Empty,
}

pub struct PoseReplay {
  track: Vec<Sample>,
}

impl FromUrlWithScheme for PoseReplay {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for PoseReplay {
  type Error = PoseReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(PoseReplayError::SchemaMismatch);
    }
    Self::open(decoded_path(url))
  }
}

impl PoseReplay {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, PoseReplayError> {
    let path = path.as_ref();
    info!("加载姿态回放文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let track: Vec<Sample> = serde_json::from_str(&content)?;
    Self::new(track)
  }

  pub fn new(mut track: Vec<Sample>) -> Result<Self, PoseReplayError> {
    if track.is_empty() {
      return Err(PoseReplayError::Empty);
    }
    track.sort_by(|a, b| a.time.total_cmp(&b.time));
    debug!("回放姿态数量: {}", track.len());
    Ok(Self { track })
  }

  fn nearest(&self, time: f64) -> &Sample {
    let mut best = &self.track[0];
    for sample in &self.track[1..] {
      if (sample.time - time).abs() < (best.time - time).abs() {
        best = sample;
      }
    }
    best
  }
}

impl Model for PoseReplay {
  type Input = CapturedFrame;
  type Output = PoseEstimate;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(self.nearest(input.time()).pose.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::Resolution;
  use crate::pose::{BodyPart, Keypoint};

  fn frame_at(time: f64) -> CapturedFrame {
    CapturedFrame::from_raw(Resolution::new(2, 2), vec![0; 12], time).unwrap()
  }

  fn pose(score: f32) -> PoseEstimate {
    PoseEstimate::new(score, [Keypoint::new(BodyPart::Nose, 1.0, 1.0, score)])
  }

  #[test]
  fn returns_nearest_pose_by_time() {
    let replay = PoseReplay::new(vec![
      Sample::new(0.5, pose(0.2)),
      Sample::new(0.0, pose(0.1)),
      Sample::new(1.0, pose(0.3)),
    ])
    .unwrap();
    assert_eq!(replay.infer(&frame_at(0.6)).unwrap().score, 0.2);
    assert_eq!(replay.infer(&frame_at(0.25)).unwrap().score, 0.1);
    assert_eq!(replay.infer(&frame_at(9.0)).unwrap().score, 0.3);
  }

  #[test]
  fn empty_track_is_rejected() {
    assert!(matches!(PoseReplay::new(vec![]), Err(PoseReplayError::Empty)));
  }

  #[test]
  fn loads_track_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("poses.json");
    let track = vec![Sample::new(0.0, pose(0.7))];
    std::fs::write(&path, serde_json::to_string(&track).unwrap()).unwrap();

    let url = Url::parse(&format!("replay://{}", path.display())).unwrap();
    let replay = PoseReplay::from_url(&url).unwrap();
    assert_eq!(replay.infer(&frame_at(0.0)).unwrap().score, 0.7);
  }
}
