// 该文件是 Toulan （投篮） 项目的一部分。
// src/session.rs - 分析会话
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

//! # 分析会话
//!
//! 会话持有当前视频、最近一次采样结果与分析结果，状态按
//! `Empty → Loaded → Sampling → Analyzed → (clear) → Empty` 迁移。
//!
//! 一次分析分三步：[`Session::begin_analysis`] 取得 [`AnalysisJob`]，
//! [`AnalysisJob::run`] 执行采样（不借用会话），[`Session::complete_analysis`] 交回结果。
//! 分析进行中再次请求分析不会排队，直接返回 `None`。清空会话会取消正在进行的采样，
//! 之后交回的结果会被丢弃。

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  analysis::{AnalysisError, AnalysisResult, AnalyzerConfig, FormAnalyzer},
  input::{Advisory, InputError, UploadError, UploadLimits, UploadMeta, VideoSource},
  model::PoseModel,
  sampler::{CancelFlag, FrameSampler, Progress, SampleError, SampledClip, SamplerConfig},
};

const MEBIBYTE: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("上传校验失败: {0}")]
  Validation(#[from] UploadError),
  #[error("尚未加载视频")]
  NoVideo,
  #[error("姿态估计器尚未就绪")]
  EstimatorNotReady,
  #[error("采样失败: {0}")]
  Sampling(#[from] SampleError),
  #[error("分析失败: {0}")]
  Analysis(#[from] AnalysisError),
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
}

impl SessionError {
  /// 展示给用户的提示
  pub fn user_message(&self) -> String {
    match self {
      SessionError::Validation(UploadError::NotVideo(_)) => {
        "Please select a valid video file (MP4, MOV, or WEBM).".to_string()
      }
      SessionError::Validation(UploadError::TooLarge { limit, .. }) => format!(
        "File size exceeds the {}MB limit. Please select a smaller file.",
        limit / MEBIBYTE
      ),
      SessionError::NoVideo => "Please upload a video before analyzing.".to_string(),
      SessionError::EstimatorNotReady => {
        "PoseNet model is still loading. Please try again in a few seconds.".to_string()
      }
      SessionError::Sampling(_) | SessionError::Analysis(_) | SessionError::Input(_) => {
        "An error occurred during analysis. Please try again.".to_string()
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Empty,
  Loaded,
  Sampling,
  Analyzed,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
  pub sampler: SamplerConfig,
  pub analyzer: AnalyzerConfig,
  pub limits: UploadLimits,
}

type SharedSource = Arc<Mutex<Box<dyn VideoSource>>>;

struct LoadedVideo {
  source: SharedSource,
  meta: UploadMeta,
  duration: f64,
}

/// 一次分析运行，持有视频源与估计器的共享引用
pub struct AnalysisJob {
  generation: u64,
  source: SharedSource,
  model: Arc<dyn PoseModel>,
  sampler: FrameSampler,
  duration: f64,
  cancel: CancelFlag,
}

/// 交回会话的采样结果
pub struct AnalysisOutcome {
  generation: u64,
  clip: Result<SampledClip, SampleError>,
}

impl std::fmt::Debug for AnalysisJob {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AnalysisJob")
      .field("generation", &self.generation)
      .field("duration", &self.duration)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish_non_exhaustive()
  }
}

impl AnalysisJob {
  pub fn cancel_flag(&self) -> CancelFlag {
    self.cancel.clone()
  }

  pub async fn run<P: Progress + ?Sized>(self, progress: &mut P) -> AnalysisOutcome {
    let capture = self.sampler.config().capture;
    let clip = self
      .sampler
      .sample(self.source, self.duration, self.model, &self.cancel, progress)
      .await
      .map(|samples| SampledClip::new(self.duration, capture, samples));
    AnalysisOutcome {
      generation: self.generation,
      clip,
    }
  }
}

pub struct Session {
  config: SessionConfig,
  analyzer: FormAnalyzer,
  estimator: Option<Arc<dyn PoseModel>>,
  video: Option<LoadedVideo>,
  state: SessionState,
  clip: Option<SampledClip>,
  result: Option<AnalysisResult>,
  cancel: Option<CancelFlag>,
  generation: u64,
}

impl Default for Session {
  fn default() -> Self {
    Self::new(SessionConfig::default())
  }
}

impl Session {
  pub fn new(config: SessionConfig) -> Self {
    let analyzer = FormAnalyzer::new(config.analyzer.clone());
    Self {
      config,
      analyzer,
      estimator: None,
      video: None,
      state: SessionState::Empty,
      clip: None,
      result: None,
      cancel: None,
      generation: 0,
    }
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn is_analyzing(&self) -> bool {
    self.state == SessionState::Sampling
  }

  pub fn result(&self) -> Option<&AnalysisResult> {
    self.result.as_ref()
  }

  pub fn clip(&self) -> Option<&SampledClip> {
    self.clip.as_ref()
  }

  pub fn video_meta(&self) -> Option<&UploadMeta> {
    self.video.as_ref().map(|v| &v.meta)
  }

  pub fn attach_estimator(&mut self, estimator: Arc<dyn PoseModel>) {
    info!("姿态估计器已就绪");
    self.estimator = Some(estimator);
  }

  pub fn is_estimator_ready(&self) -> bool {
    self.estimator.is_some()
  }

  /// 校验并加载视频，替换当前视频及其结果
  ///
  /// 校验失败时会话保持不变。返回非阻断性提示（如片长过长）。
  pub fn load_video(&mut self, source: Box<dyn VideoSource>) -> Result<Vec<Advisory>, SessionError> {
    let meta = source.upload_meta()?;
    if let Err(e) = self.config.limits.validate(&meta) {
      warn!("视频 {} 未通过校验: {}", meta.name, e);
      return Err(e.into());
    }

    let duration = source.duration();
    let advisories = self.config.limits.advisories(duration);
    for advisory in &advisories {
      warn!("{}", advisory.message());
    }

    self.reset();
    info!(
      "加载视频 {} ({}, {} 字节, {:.3}s)",
      meta.name, meta.mime, meta.size, duration
    );
    self.video = Some(LoadedVideo {
      source: Arc::new(Mutex::new(source)),
      meta,
      duration,
    });
    self.state = SessionState::Loaded;
    Ok(advisories)
  }

  /// 开始分析；已在分析中时返回 `None`
  pub fn begin_analysis(&mut self) -> Result<Option<AnalysisJob>, SessionError> {
    if self.is_analyzing() {
      warn!("分析正在进行，忽略重复请求");
      return Ok(None);
    }
    let video = self.video.as_ref().ok_or(SessionError::NoVideo)?;
    let model = self
      .estimator
      .as_ref()
      .ok_or(SessionError::EstimatorNotReady)?;

    let cancel = CancelFlag::new();
    self.generation += 1;
    let job = AnalysisJob {
      generation: self.generation,
      source: Arc::clone(&video.source),
      model: Arc::clone(model),
      sampler: FrameSampler::new(self.config.sampler.clone()),
      duration: video.duration,
      cancel: cancel.clone(),
    };

    self.clip = None;
    self.result = None;
    self.cancel = Some(cancel);
    self.state = SessionState::Sampling;
    info!("开始分析（第 {} 次）", self.generation);
    Ok(Some(job))
  }

  /// 交回采样结果并运行姿态分析
  ///
  /// 采样或分析失败时丢弃部分结果并回到 `Loaded`；来自已被清空或替换的运行的结果返回 `None`。
  pub fn complete_analysis(
    &mut self,
    outcome: AnalysisOutcome,
  ) -> Result<Option<&AnalysisResult>, SessionError> {
    if outcome.generation != self.generation || !self.is_analyzing() {
      warn!("丢弃过期的分析结果（第 {} 次）", outcome.generation);
      return Ok(None);
    }
    self.cancel = None;

    let clip = match outcome.clip {
      Ok(clip) => clip,
      Err(e) => {
        error!("采样失败: {}", e);
        self.state = SessionState::Loaded;
        return Err(e.into());
      }
    };

    match self.analyzer.analyze(&clip.samples) {
      Ok(result) => {
        info!("分析完成，总分 {}", result.overall_score);
        self.clip = Some(clip);
        self.state = SessionState::Analyzed;
        Ok(Some(&*self.result.insert(result)))
      }
      Err(e) => {
        error!("分析失败: {}", e);
        self.state = SessionState::Loaded;
        Err(e.into())
      }
    }
  }

  /// 完整执行一次分析
  pub async fn analyze<P: Progress + ?Sized>(
    &mut self,
    progress: &mut P,
  ) -> Result<Option<&AnalysisResult>, SessionError> {
    let Some(job) = self.begin_analysis()? else {
      return Ok(None);
    };
    let outcome = job.run(progress).await;
    self.complete_analysis(outcome)
  }

  /// 清空会话：取消正在进行的采样并释放视频源
  pub fn clear(&mut self) {
    self.reset();
    info!("会话已清空");
  }

  fn reset(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      warn!("取消正在进行的分析");
      cancel.cancel();
    }
    // 正在执行的阻塞步骤结束后，视频源随最后一个引用一起释放
    self.video = None;
    self.clip = None;
    self.result = None;
    self.generation += 1;
    self.state = SessionState::Empty;
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;
  use crate::{
    frame::{CapturedFrame, Resolution},
    model::{Model, ModelError},
    pose::{BodyPart, Keypoint, PoseEstimate},
  };

  struct StillSource {
    duration: f64,
    meta: UploadMeta,
  }

  impl StillSource {
    fn boxed(duration: f64, mime: &str, size: u64) -> Box<dyn VideoSource> {
      Box::new(StillSource {
        duration,
        meta: UploadMeta::new("shot.mp4", mime, size),
      })
    }
  }

  impl VideoSource for StillSource {
    fn duration(&self) -> f64 {
      self.duration
    }

    fn native_resolution(&self) -> Resolution {
      Resolution::new(16, 12)
    }

    fn seek(&mut self, _time: f64) -> Result<(), InputError> {
      Ok(())
    }

    fn capture(&mut self) -> Result<RgbImage, InputError> {
      Ok(RgbImage::new(16, 12))
    }

    fn upload_meta(&self) -> Result<UploadMeta, InputError> {
      Ok(self.meta.clone())
    }
  }

  struct FixedPose {
    fail: bool,
  }

  impl Model for FixedPose {
    type Input = CapturedFrame;
    type Output = PoseEstimate;
    type Error = ModelError;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      if self.fail {
        return Err(ModelError::InferenceError("estimator crashed".to_string()));
      }
      let points = [
        (BodyPart::LeftShoulder, 300.0, 100.0),
        (BodyPart::RightShoulder, 340.0, 100.0),
        (BodyPart::RightElbow, 380.0, 100.0),
        (BodyPart::RightWrist, 380.0, 60.0),
        (BodyPart::LeftHip, 305.0, 200.0),
        (BodyPart::RightHip, 335.0, 200.0),
        (BodyPart::LeftKnee, 305.0, 250.0),
        (BodyPart::LeftAnkle, 305.0, 300.0),
        (BodyPart::RightAnkle, 335.0, 300.0),
      ];
      Ok(PoseEstimate::new(
        0.9,
        points.iter().map(|(p, x, y)| Keypoint::new(*p, *x, *y, 0.9)),
      ))
    }
  }

  fn ready_session(fail: bool) -> Session {
    let mut session = Session::default();
    session.attach_estimator(Arc::new(FixedPose { fail }));
    session
      .load_video(StillSource::boxed(1.0, "video/mp4", 1024))
      .unwrap();
    session
  }

  #[test]
  fn rejects_non_video_upload_without_state_change() {
    let mut session = Session::default();
    let err = session
      .load_video(StillSource::boxed(1.0, "image/png", 10))
      .unwrap_err();
    assert_eq!(
      err.user_message(),
      "Please select a valid video file (MP4, MOV, or WEBM)."
    );
    assert_eq!(session.state(), SessionState::Empty);
    assert!(session.video_meta().is_none());
  }

  #[test]
  fn rejects_oversized_upload() {
    let mut session = Session::default();
    let err = session
      .load_video(StillSource::boxed(1.0, "video/mp4", 51 * MEBIBYTE))
      .unwrap_err();
    assert_eq!(
      err.user_message(),
      "File size exceeds the 50MB limit. Please select a smaller file."
    );
  }

  #[test]
  fn long_clip_is_advisory_only() {
    let mut session = Session::default();
    let advisories = session
      .load_video(StillSource::boxed(20.0, "video/webm", 10))
      .unwrap();
    assert_eq!(advisories.len(), 1);
    assert_eq!(session.state(), SessionState::Loaded);
  }

  #[test]
  fn preconditions_are_checked_in_order() {
    let mut session = Session::default();
    assert!(matches!(session.begin_analysis(), Err(SessionError::NoVideo)));

    session
      .load_video(StillSource::boxed(1.0, "video/mp4", 10))
      .unwrap();
    let Err(err) = session.begin_analysis() else {
      panic!("估计器未就绪时不应开始分析");
    };
    assert!(matches!(err, SessionError::EstimatorNotReady));
    assert_eq!(
      err.user_message(),
      "PoseNet model is still loading. Please try again in a few seconds."
    );
    assert_eq!(session.state(), SessionState::Loaded);
  }

  #[test]
  fn second_begin_while_sampling_is_ignored() {
    let mut session = ready_session(false);
    let job = session.begin_analysis().unwrap();
    assert!(format!("{:?}", job).contains("generation: 1"));
    assert!(job.is_some());
    assert!(session.begin_analysis().unwrap().is_none());
    assert!(session.is_analyzing());
  }

  #[tokio::test]
  async fn full_analysis_reaches_analyzed() {
    let mut session = ready_session(false);
    let mut last = 0u8;
    let overall = session
      .analyze(&mut |p: u8| last = p)
      .await
      .unwrap()
      .map(|r| r.overall_score);
    assert!(overall.is_some());
    assert_eq!(session.state(), SessionState::Analyzed);
    assert_eq!(session.clip().unwrap().samples.len(), 6);
    assert_eq!(last, 83);
  }

  #[tokio::test]
  async fn estimator_failure_reverts_to_loaded() {
    let mut session = ready_session(true);
    let err = session.analyze(&mut |_: u8| {}).await.unwrap_err();
    assert!(matches!(err, SessionError::Sampling(_)));
    assert_eq!(
      err.user_message(),
      "An error occurred during analysis. Please try again."
    );
    assert_eq!(session.state(), SessionState::Loaded);
    assert!(session.clip().is_none());
    assert!(session.result().is_none());
  }

  #[tokio::test]
  async fn clear_discards_in_flight_run() {
    let mut session = ready_session(false);
    let job = session.begin_analysis().unwrap().unwrap();
    let cancel = job.cancel_flag();

    session.clear();
    assert!(cancel.is_cancelled());
    assert_eq!(session.state(), SessionState::Empty);

    let outcome = job.run(&mut |_: u8| {}).await;
    assert!(session.complete_analysis(outcome).unwrap().is_none());
    assert_eq!(session.state(), SessionState::Empty);
    assert!(session.result().is_none());
  }
}
