// 该文件是 Toulan （投篮） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 可定位视频输入
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

//! # GStreamer 视频文件输入
//!
//! 管道保持在 `Paused` 状态，每次 seek 使用 `FLUSH | ACCURATE`，
//! 等待预滚动完成后从 appsink 取出预滚动帧，因此同一时刻只有一次 seek。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 用法
//!
//! ```no_run
//! use toulan::{FromUrl, input::{GStreamerInput, VideoSource}};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://file/data/shot.mp4")?;
//! let mut input = GStreamerInput::from_url(&url)?;
//! input.seek(0.5)?;
//! let frame = input.capture()?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Resolution,
  input::{InputError, UploadMeta, VideoSource, check_seek, decoded_path},
};

const STATE_CHANGE_TIMEOUT_SECS: u64 = 10;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://file/..."）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  #[error("Unsupported video format")]
  UnsupportedFormat,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("Unknown clip duration")]
  UnknownDuration,
}

/// 基于 GStreamer 的视频文件输入
pub struct GStreamerInput {
  path: PathBuf,
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  duration: f64,
  resolution: Resolution,
}

impl FromUrlWithScheme for GStreamerInput {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInput {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(GStreamerInputError::SchemeMismatch);
    }
    Self::open(decoded_path(url))
  }
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, GStreamerInputError> {
    gst::init()?;
    let path = path.into();

    let description = format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false max-buffers=1",
      path.display()
    );
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Paused)?;
    let (result, _, _) = pipeline.state(gst::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS));
    result?;

    let duration = pipeline
      .query_duration::<gst::ClockTime>()
      .ok_or(GStreamerInputError::UnknownDuration)?
      .nseconds() as f64
      / 1e9;

    let preroll = appsink.pull_preroll()?;
    let info = video_info(&preroll)?;
    let resolution = Resolution::new(info.width(), info.height());
    debug!(
      "视频时长 {:.3}s, 分辨率 {}x{}",
      duration, resolution.width, resolution.height
    );

    Ok(GStreamerInput {
      path,
      pipeline,
      appsink,
      duration,
      resolution,
    })
  }
}

impl VideoSource for GStreamerInput {
  fn duration(&self) -> f64 {
    self.duration
  }

  fn native_resolution(&self) -> Resolution {
    self.resolution
  }

  fn seek(&mut self, time: f64) -> Result<(), InputError> {
    check_seek(time, self.duration)?;
    let position = gst::ClockTime::from_nseconds((time * 1e9) as u64);
    self
      .pipeline
      .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE, position)
      .map_err(GStreamerInputError::from)?;
    // seek 完成后管道重新预滚动
    let (result, _, _) = self
      .pipeline
      .state(gst::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS));
    result.map_err(GStreamerInputError::from)?;
    Ok(())
  }

  fn capture(&mut self) -> Result<RgbImage, InputError> {
    let sample = self
      .appsink
      .pull_preroll()
      .map_err(GStreamerInputError::from)?;
    Ok(convert_sample_to_rgb(&sample)?)
  }

  fn upload_meta(&self) -> Result<UploadMeta, InputError> {
    Ok(UploadMeta::for_file(&self.path)?)
  }
}

fn video_info(sample: &gst::Sample) -> Result<gst_video::VideoInfo, GStreamerInputError> {
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;
  gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)
}

fn convert_sample_to_rgb(sample: &gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let video_info = video_info(sample)?;

  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::UnsupportedFormat);
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;
  if width == 0 || height == 0 {
    return Err(GStreamerInputError::VideoInfoError);
  }

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected = stride * (height - 1) + width * 3;
  if data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  // 去掉每行末尾的对齐填充
  let mut pixels = Vec::with_capacity(width * height * 3);
  for row in 0..height {
    let start = row * stride;
    pixels.extend_from_slice(&data[start..start + width * 3]);
  }

  RgbImage::from_raw(width as u32, height as u32, pixels).ok_or(
    GStreamerInputError::BufferSizeMismatch {
      expected: width * height * 3,
      actual: data.len(),
    },
  )
}
