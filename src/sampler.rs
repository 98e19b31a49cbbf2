// 该文件是 Toulan （投篮） 项目的一部分。
// src/sampler.rs - 帧采样器
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

//! # 帧采样
//!
//! 以固定采样率 `R` 依次定位到 `t_i = i / R`（`t_i < D`），每一步：
//! seek → 等待画面稳定 → 捕获 → 姿态估计 → 等待结果 → 追加采样 → 报告进度。
//!
//! 每一步都在阻塞线程池中执行并被等待完成后才进入下一步，
//! 视频源与估计器在任意时刻最多只有一个请求。任一步失败则整个采样失败，
//! 已采集的部分结果被丢弃。

use std::{
  sync::{
    Arc, Mutex, TryLockError,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use image::RgbImage;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::{
  frame::{CapturedFrame, FrameError, Resolution},
  input::{InputError, VideoSource},
  model::{ModelError, PoseModel},
  pose::Sample,
};

/// 默认采样率（帧/秒）
pub const DEFAULT_SAMPLE_RATE: f64 = 6.0;

#[derive(Error, Debug)]
pub enum SampleError {
  #[error("采样率无效: {0}")]
  InvalidRate(f64),
  #[error("片长无效: {0}")]
  InvalidDuration(f64),
  #[error("输入错误: {0}")]
  InputError(#[from] InputError),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("姿态估计错误: {0}")]
  ModelError(#[from] ModelError),
  #[error("{step} 在 {time:.3}s 处超时（上限 {limit:?}）")]
  Timeout {
    step: &'static str,
    time: f64,
    limit: Duration,
  },
  #[error("采样已取消")]
  Cancelled,
  #[error("视频源锁已失效")]
  SourcePoisoned,
  #[error("视频源仍被上一次请求占用")]
  SourceBusy,
  #[error("阻塞任务失败: {0}")]
  TaskError(#[from] JoinError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
  /// 采样率（帧/秒）
  pub rate: f64,
  /// 送入估计器的采集分辨率
  pub capture: Resolution,
  /// 单步（seek 或估计）的等待上限，`None` 表示不限
  pub step_timeout: Option<Duration>,
}

impl Default for SamplerConfig {
  fn default() -> Self {
    Self {
      rate: DEFAULT_SAMPLE_RATE,
      capture: Resolution::default(),
      step_timeout: None,
    }
  }
}

/// 协作式取消标志
///
/// 采样器在每一步开始前检查，一旦置位便不再发起新的 seek 或估计。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// 进度回调，参数为 0-100 的百分比
pub trait Progress: Send {
  fn report(&mut self, percent: u8);
}

impl<F: FnMut(u8) + Send> Progress for F {
  fn report(&mut self, percent: u8) {
    self(percent)
  }
}

/// 采样时刻：`t_i = i / rate`，包含 0，严格小于 `duration`
pub fn sample_times(duration: f64, rate: f64) -> Vec<f64> {
  let mut times = Vec::new();
  let mut index = 0u64;
  loop {
    let time = index as f64 / rate;
    if time >= duration {
      break;
    }
    times.push(time);
    index += 1;
  }
  times
}

pub fn progress_percent(time: f64, duration: f64) -> u8 {
  (100.0 * time / duration).round().clamp(0.0, 100.0) as u8
}

/// 一段视频的采样结果
///
/// `capture` 是采样时送入估计器的分辨率，渲染时用它把关键点映射到画布。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampledClip {
  pub duration: f64,
  pub capture: Resolution,
  pub samples: Vec<Sample>,
}

impl SampledClip {
  pub fn new(duration: f64, capture: Resolution, samples: Vec<Sample>) -> Self {
    Self {
      duration,
      capture,
      samples,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }
}

pub struct FrameSampler {
  config: SamplerConfig,
}

impl FrameSampler {
  pub fn new(config: SamplerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SamplerConfig {
    &self.config
  }

  /// 顺序采样整段视频
  ///
  /// `duration` 取自加载视频时记录的片长；视频源只在受时限约束的阻塞任务中加锁。
  pub async fn sample<S, M, P>(
    &self,
    source: Arc<Mutex<S>>,
    duration: f64,
    model: Arc<M>,
    cancel: &CancelFlag,
    progress: &mut P,
  ) -> Result<Vec<Sample>, SampleError>
  where
    S: VideoSource + ?Sized + 'static,
    M: PoseModel + ?Sized + 'static,
    P: Progress + ?Sized,
  {
    let rate = self.config.rate;
    if !(rate.is_finite() && rate > 0.0) {
      return Err(SampleError::InvalidRate(rate));
    }
    if !(duration.is_finite() && duration > 0.0) {
      return Err(SampleError::InvalidDuration(duration));
    }

    let times = sample_times(duration, rate);
    info!(
      "开始采样: 片长 {:.3}s, 采样率 {} 帧/秒, 共 {} 帧",
      duration,
      rate,
      times.len()
    );

    let capture = self.config.capture;
    let mut samples = Vec::with_capacity(times.len());
    for time in times {
      if cancel.is_cancelled() {
        warn!("采样在 {:.3}s 处被取消", time);
        return Err(SampleError::Cancelled);
      }

      let frame_source = Arc::clone(&source);
      let image = self
        .bounded(
          "seek",
          time,
          tokio::task::spawn_blocking(move || -> Result<RgbImage, SampleError> {
            // 上一次超时的 seek 可能仍占用视频源
            let mut source = frame_source.try_lock().map_err(|e| match e {
              TryLockError::WouldBlock => SampleError::SourceBusy,
              TryLockError::Poisoned(_) => SampleError::SourcePoisoned,
            })?;
            source.seek(time)?;
            Ok(source.capture()?)
          }),
        )
        .await?;

      let frame =
        tokio::task::spawn_blocking(move || CapturedFrame::fit(image, capture, time)).await??;

      if cancel.is_cancelled() {
        warn!("采样在 {:.3}s 处被取消", time);
        return Err(SampleError::Cancelled);
      }

      let frame_model = Arc::clone(&model);
      let pose = self
        .bounded(
          "estimate",
          time,
          tokio::task::spawn_blocking(move || -> Result<_, SampleError> {
            Ok(frame_model.infer(&frame)?)
          }),
        )
        .await?;

      debug!("采样 {:.3}s: 姿态置信度 {:.3}", time, pose.score);
      samples.push(Sample::new(time, pose));
      progress.report(progress_percent(time, duration));
    }

    info!("采样完成，共 {} 帧", samples.len());
    Ok(samples)
  }

  async fn bounded<T>(
    &self,
    step: &'static str,
    time: f64,
    task: JoinHandle<Result<T, SampleError>>,
  ) -> Result<T, SampleError> {
    let joined = match self.config.step_timeout {
      Some(limit) => tokio::time::timeout(limit, task)
        .await
        .map_err(|_| SampleError::Timeout { step, time, limit })?,
      None => task.await,
    };
    joined?
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::atomic::AtomicUsize, time::Instant};

  use super::*;
  use crate::{
    input::UploadMeta,
    model::Model,
    pose::{BodyPart, Keypoint, PoseEstimate},
  };

  struct StillSource {
    duration: f64,
    in_flight: Arc<AtomicUsize>,
    seeks: Vec<f64>,
  }

  impl VideoSource for StillSource {
    fn duration(&self) -> f64 {
      self.duration
    }

    fn native_resolution(&self) -> Resolution {
      Resolution::new(32, 24)
    }

    fn seek(&mut self, time: f64) -> Result<(), InputError> {
      assert_eq!(self.in_flight.fetch_add(1, Ordering::SeqCst), 0);
      self.seeks.push(time);
      Ok(())
    }

    fn capture(&mut self) -> Result<RgbImage, InputError> {
      self.in_flight.fetch_sub(1, Ordering::SeqCst);
      let capture = Resolution::default();
      Ok(RgbImage::new(capture.width, capture.height))
    }

    fn upload_meta(&self) -> Result<UploadMeta, InputError> {
      Ok(UploadMeta::new("still.mp4", "video/mp4", 1))
    }
  }

  struct CountingModel {
    in_flight: Arc<AtomicUsize>,
    fail_at: Option<usize>,
    calls: AtomicUsize,
    delay: Option<Duration>,
  }

  impl Model for CountingModel {
    type Input = CapturedFrame;
    type Output = PoseEstimate;
    type Error = ModelError;

    fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
      assert_eq!(self.in_flight.fetch_add(1, Ordering::SeqCst), 0);
      assert_eq!(input.resolution(), Resolution::default());
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(delay) = self.delay {
        std::thread::sleep(delay);
      }
      self.in_flight.fetch_sub(1, Ordering::SeqCst);
      if Some(call) == self.fail_at {
        return Err(ModelError::InferenceError("boom".to_string()));
      }
      Ok(PoseEstimate::new(
        0.9,
        [Keypoint::new(BodyPart::Nose, 320.0, 100.0, 0.9)],
      ))
    }
  }

  fn fixtures(
    duration: f64,
    fail_at: Option<usize>,
    delay: Option<Duration>,
  ) -> (Arc<Mutex<StillSource>>, Arc<CountingModel>) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let source = StillSource {
      duration,
      in_flight: Arc::clone(&in_flight),
      seeks: Vec::new(),
    };
    let model = CountingModel {
      in_flight,
      fail_at,
      calls: AtomicUsize::new(0),
      delay,
    };
    (Arc::new(Mutex::new(source)), Arc::new(model))
  }

  #[test]
  fn ten_seconds_at_six_hertz() {
    let times = sample_times(10.0, 6.0);
    assert_eq!(times.len(), 60);
    assert_eq!(times[0], 0.0);
    assert!((times[59] - 59.0 / 6.0).abs() < 1e-12);
    assert!(times.windows(2).all(|w| w[0] < w[1]));
  }

  #[test]
  fn sample_count_matches_ceil() {
    for (duration, rate) in [(1.0, 6.0), (2.5, 4.0), (0.1, 6.0), (3.3, 7.0), (12.0, 0.5)] {
      let times = sample_times(duration, rate);
      assert_eq!(times.len(), (duration * rate).ceil() as usize);
      assert!(times.iter().all(|t| *t < duration));
    }
  }

  #[test]
  fn progress_is_rounded_percentage() {
    assert_eq!(progress_percent(0.0, 10.0), 0);
    assert_eq!(progress_percent(59.0 / 6.0, 10.0), 98);
    assert_eq!(progress_percent(1.0 / 6.0, 2.0), 8);
  }

  #[tokio::test]
  async fn samples_sequentially_and_reports_progress() {
    let (source, model) = fixtures(2.0, None, None);
    let sampler = FrameSampler::new(SamplerConfig::default());
    let mut reported = Vec::new();
    let mut progress = |p: u8| reported.push(p);

    let samples = sampler
      .sample(Arc::clone(&source), 2.0, model, &CancelFlag::new(), &mut progress)
      .await
      .unwrap();

    assert_eq!(samples.len(), 12);
    assert!(samples.windows(2).all(|w| w[0].time < w[1].time));
    assert_eq!(source.lock().unwrap().seeks.len(), 12);
    assert_eq!(reported.first(), Some(&0));
    assert!(reported.windows(2).all(|w| w[0] <= w[1]));
  }

  #[tokio::test]
  async fn estimator_failure_aborts_run() {
    let (source, model) = fixtures(2.0, Some(3), None);
    let sampler = FrameSampler::new(SamplerConfig::default());
    let result = sampler
      .sample(source, 2.0, Arc::clone(&model), &CancelFlag::new(), &mut |_: u8| {})
      .await;
    assert!(matches!(result, Err(SampleError::ModelError(_))));
    assert_eq!(model.calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn cancelled_flag_stops_before_next_step() {
    let (source, model) = fixtures(2.0, None, None);
    let sampler = FrameSampler::new(SamplerConfig::default());
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    let mut progress = move |p: u8| {
      if p >= 25 {
        trigger.cancel();
      }
    };
    let result = sampler
      .sample(Arc::clone(&source), 2.0, model, &cancel, &mut progress)
      .await;
    assert!(matches!(result, Err(SampleError::Cancelled)));
    assert!(source.lock().unwrap().seeks.len() < 12);
  }

  #[tokio::test]
  async fn slow_estimate_expires() {
    let (source, model) = fixtures(1.0, None, Some(Duration::from_millis(200)));
    let sampler = FrameSampler::new(SamplerConfig {
      step_timeout: Some(Duration::from_millis(20)),
      ..SamplerConfig::default()
    });
    let result = sampler
      .sample(source, 1.0, model, &CancelFlag::new(), &mut |_: u8| {})
      .await;
    assert!(matches!(
      result,
      Err(SampleError::Timeout {
        step: "estimate",
        ..
      })
    ));
  }

  #[tokio::test]
  async fn rejects_non_positive_rate() {
    let (source, model) = fixtures(1.0, None, None);
    let sampler = FrameSampler::new(SamplerConfig {
      rate: 0.0,
      ..SamplerConfig::default()
    });
    let result = sampler
      .sample(source, 1.0, model, &CancelFlag::new(), &mut |_: u8| {})
      .await;
    assert!(matches!(result, Err(SampleError::InvalidRate(_))));
  }

  struct HangingSource {
    seek_delay: Duration,
  }

  impl VideoSource for HangingSource {
    fn duration(&self) -> f64 {
      1.0
    }

    fn native_resolution(&self) -> Resolution {
      Resolution::default()
    }

    fn seek(&mut self, _time: f64) -> Result<(), InputError> {
      std::thread::sleep(self.seek_delay);
      Ok(())
    }

    fn capture(&mut self) -> Result<RgbImage, InputError> {
      Ok(RgbImage::new(640, 480))
    }

    fn upload_meta(&self) -> Result<UploadMeta, InputError> {
      Ok(UploadMeta::new("hang.mp4", "video/mp4", 1))
    }
  }

  #[tokio::test]
  async fn retry_after_seek_timeout_stays_bounded() {
    let source = Arc::new(Mutex::new(HangingSource {
      seek_delay: Duration::from_millis(600),
    }));
    let (_, model) = fixtures(1.0, None, None);
    let sampler = FrameSampler::new(SamplerConfig {
      step_timeout: Some(Duration::from_millis(20)),
      ..SamplerConfig::default()
    });

    let first = sampler
      .sample(Arc::clone(&source), 1.0, Arc::clone(&model), &CancelFlag::new(), &mut |_: u8| {})
      .await;
    assert!(matches!(first, Err(SampleError::Timeout { step: "seek", .. })));

    // 第一次的 seek 仍在阻塞线程中持有视频源
    let started = Instant::now();
    let second = sampler
      .sample(source, 1.0, model, &CancelFlag::new(), &mut |_: u8| {})
      .await;
    assert!(matches!(
      second,
      Err(SampleError::SourceBusy | SampleError::Timeout { .. })
    ));
    assert!(started.elapsed() < Duration::from_millis(300));
  }

  #[tokio::test]
  async fn rejects_non_positive_duration() {
    let (source, model) = fixtures(0.0, None, None);
    let sampler = FrameSampler::new(SamplerConfig::default());
    let result = sampler
      .sample(source, 0.0, model, &CancelFlag::new(), &mut |_: u8| {})
      .await;
    assert!(matches!(result, Err(SampleError::InvalidDuration(_))));
  }
}
