// 该文件是 Toulan （投篮） 项目的一部分。
// tests/pipeline.rs - 端到端流程测试
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

use std::sync::{Arc, Mutex};

use image::RgbImage;
use url::Url;

use toulan::{
  FromUrl,
  analysis::{FormAnalyzer, tips},
  frame::{CapturedFrame, Resolution},
  input::{InputError, UploadMeta, VideoSource},
  model::{Model, ModelError},
  output::{OutputWrapper, draw::Draw, skeleton::SkeletonRenderer},
  pose::{BodyPart, Keypoint, PoseEstimate, Sample},
  sampler::{CancelFlag, FrameSampler, SampledClip, SamplerConfig},
  session::SessionConfig,
  task::{ShotAnalysisTask, Task},
};

const CLIP_SECONDS: f64 = 10.0;

/// 内存中的 10 秒视频，画面内容不参与分析
struct InMemoryClip;

impl VideoSource for InMemoryClip {
  fn duration(&self) -> f64 {
    CLIP_SECONDS
  }

  fn native_resolution(&self) -> Resolution {
    Resolution::new(64, 48)
  }

  fn seek(&mut self, _time: f64) -> Result<(), InputError> {
    Ok(())
  }

  fn capture(&mut self) -> Result<RgbImage, InputError> {
    Ok(RgbImage::new(64, 48))
  }

  fn upload_meta(&self) -> Result<UploadMeta, InputError> {
    Ok(UploadMeta::new("jump-shot.mp4", "video/mp4", 4 * 1024 * 1024))
  }
}

/// 按帧时刻生成一次跳投：下蹲、起跳、在最高点出手、落地
struct JumpShotTrack;

fn hip_height(time: f64) -> f32 {
  if time < 3.0 {
    200.0
  } else if time < 4.0 {
    230.0
  } else if time < 5.0 {
    180.0
  } else if time < 5.5 {
    150.0
  } else {
    200.0
  }
}

fn jump_shot_pose(time: f64) -> PoseEstimate {
  let hip = hip_height(time);
  let shoulder = hip - 100.0;
  let squat = (3.0..4.0).contains(&time);
  let knee_x = if squat { 355.0 } else { 305.0 };
  // 出手瞬间的姿态最清晰
  let score = if time == 5.0 { 0.95 } else { 0.8 };

  let points = [
    (BodyPart::Nose, 320.0, shoulder - 40.0),
    (BodyPart::LeftShoulder, 300.0, shoulder),
    (BodyPart::RightShoulder, 340.0, shoulder),
    (BodyPart::LeftElbow, 260.0, shoulder + 40.0),
    (BodyPart::LeftWrist, 260.0, shoulder + 80.0),
    (BodyPart::RightElbow, 380.0, shoulder),
    (BodyPart::RightWrist, 380.0, shoulder - 40.0),
    (BodyPart::LeftHip, 305.0, hip),
    (BodyPart::RightHip, 335.0, hip),
    (BodyPart::LeftKnee, knee_x, hip + 50.0),
    (BodyPart::RightKnee, 335.0, hip + 50.0),
    (BodyPart::LeftAnkle, 305.0, hip + 100.0),
    (BodyPart::RightAnkle, 335.0, hip + 100.0),
  ];
  PoseEstimate::new(
    score,
    points
      .iter()
      .map(|(part, x, y)| Keypoint::new(*part, *x, *y, 0.9)),
  )
}

impl Model for JumpShotTrack {
  type Input = CapturedFrame;
  type Output = PoseEstimate;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(jump_shot_pose(input.time()))
  }
}

async fn sample_clip() -> SampledClip {
  let config = SamplerConfig::default();
  let capture = config.capture;
  let sampler = FrameSampler::new(config);
  let source = Arc::new(Mutex::new(InMemoryClip));
  let samples = sampler
    .sample(source, CLIP_SECONDS, Arc::new(JumpShotTrack), &CancelFlag::new(), &mut |_: u8| {})
    .await
    .unwrap();
  SampledClip::new(CLIP_SECONDS, capture, samples)
}

#[tokio::test]
async fn ten_second_clip_at_six_hertz() {
  let clip = sample_clip().await;
  assert_eq!(clip.samples.len(), 60);
  assert_eq!(clip.samples[0].time, 0.0);
  assert!((clip.samples[59].time - 59.0 / 6.0).abs() < 1e-9);
  assert!(clip.samples.windows(2).all(|w| w[0].time < w[1].time));
  assert!(clip.samples.iter().all(|s| s.time < CLIP_SECONDS));
}

#[tokio::test]
async fn ideal_jump_shot_scores_one_hundred() {
  let clip = sample_clip().await;
  let analyzer = FormAnalyzer::default();
  let result = analyzer.analyze(&clip.samples).unwrap();

  assert!((result.elbow_angle.value - 90.0).abs() < 1e-6);
  assert_eq!(result.release_point.value, 100.0);
  assert_eq!(result.knee_bend.value, 100.0);
  assert_eq!(result.alignment.value, 100.0);
  assert_eq!(result.overall_score, 100);

  assert!(result.tips.len() >= 3);
  assert!(result.tips.iter().any(|t| t == tips::EXCELLENT_TIP));
  assert_eq!(result.description(), "Excellent form! Professional quality shooting mechanics.");

  let kinematics = result.kinematics.clone().unwrap();
  assert_eq!(kinematics.release_time, 5.0);
  assert_eq!(kinematics.jump.start_time, 3.0);

  // 同一序列重复分析结果一致
  assert_eq!(analyzer.analyze(&clip.samples).unwrap(), result);
}

#[tokio::test]
async fn overlay_uses_most_confident_pose() {
  let clip = sample_clip().await;
  let overlay = SkeletonRenderer::default()
    .layout(&clip.samples, clip.capture, Resolution::new(800, 600))
    .unwrap();

  assert_eq!(overlay.time, 5.0);
  assert_eq!(overlay.segments.len(), 12);
  assert_eq!(overlay.markers.len(), 13);
  assert_eq!(overlay.labels.len(), 6);

  let image = Draw::default().draw_overlay(&overlay);
  assert_eq!(image.dimensions(), (800, 600));
}

#[test]
fn renderer_ignores_empty_sequence() {
  let samples: Vec<Sample> = Vec::new();
  assert!(
    SkeletonRenderer::default()
      .layout(&samples, Resolution::default(), Resolution::default())
      .is_none()
  );
}

#[tokio::test]
async fn task_writes_overlay_and_report() {
  let dir = tempfile::tempdir().unwrap();
  let overlay_path = dir.path().join("out/overlay.png");
  let report_path = dir.path().join("out/result.json");

  let outputs = vec![
    OutputWrapper::from_url(&Url::parse(&format!("image://{}", overlay_path.display())).unwrap())
      .unwrap()
      .with_overlay(Resolution::new(320, 240), Draw::default()),
    OutputWrapper::from_url(&Url::parse(&format!("report://{}", report_path.display())).unwrap())
      .unwrap(),
  ];

  ShotAnalysisTask::new(SessionConfig::default())
    .run_task(InMemoryClip, JumpShotTrack, outputs)
    .await
    .unwrap();

  let overlay = image::open(&overlay_path).unwrap();
  assert_eq!((overlay.width(), overlay.height()), (320, 240));

  let report: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
  assert_eq!(report["overallScore"], 100);
  assert_eq!(report["sampleCount"], 60);
  assert_eq!(report["bestFrameTime"], 5.0);
  assert_eq!(report["kinematics"]["shootingSide"], "right");
}
