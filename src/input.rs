// 该文件是 Toulan （投篮） 项目的一部分。
// src/input.rs - 视频输入
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

use image::RgbImage;
use thiserror::Error;

use crate::{FromUrl, frame::Resolution};

/// 可随机定位的视频源
///
/// 采样器按顺序调用 `seek` 与 `capture`，任意时刻只有一个请求在进行。
/// 实现可以阻塞，采样器会把调用放到阻塞线程池中执行。
pub trait VideoSource: Send {
  /// 片长（秒）
  fn duration(&self) -> f64;

  /// 源视频原始分辨率
  fn native_resolution(&self) -> Resolution;

  /// 定位到 `time` 秒，返回时该位置的画面已稳定
  fn seek(&mut self, time: f64) -> Result<(), InputError>;

  /// 捕获当前画面
  fn capture(&mut self) -> Result<RgbImage, InputError>;

  /// 上传信息，用于类型与大小校验
  fn upload_meta(&self) -> Result<UploadMeta, InputError>;
}

impl<T: VideoSource + ?Sized> VideoSource for Box<T> {
  fn duration(&self) -> f64 {
    (**self).duration()
  }

  fn native_resolution(&self) -> Resolution {
    (**self).native_resolution()
  }

  fn seek(&mut self, time: f64) -> Result<(), InputError> {
    (**self).seek(time)
  }

  fn capture(&mut self) -> Result<RgbImage, InputError> {
    (**self).capture()
  }

  fn upload_meta(&self) -> Result<UploadMeta, InputError> {
    (**self).upload_meta()
  }
}

mod upload;
pub use self::upload::{Advisory, UploadError, UploadLimits, UploadMeta};

#[cfg(feature = "frame_sequence_input")]
mod frame_sequence;
#[cfg(feature = "frame_sequence_input")]
pub use self::frame_sequence::{FrameSequenceInput, FrameSequenceInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "frame_sequence_input")]
  #[error("Frame sequence input error: {0}")]
  FrameSequenceInputError(#[from] FrameSequenceInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("Seek position {time:.3}s outside clip [0, {duration:.3}s]")]
  SeekOutOfRange { time: f64, duration: f64 },
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 按 URL 方案选择的输入源
pub enum InputWrapper {
  #[cfg(feature = "frame_sequence_input")]
  FrameSequence(FrameSequenceInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamer(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInput::SCHEME {
        let input = GStreamerInput::from_url(url)?;
        return Ok(InputWrapper::GStreamer(input));
      }
    }
    #[cfg(feature = "frame_sequence_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == FrameSequenceInput::SCHEME {
        let input = FrameSequenceInput::from_url(url)?;
        return Ok(InputWrapper::FrameSequence(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl InputWrapper {
  fn inner(&self) -> &dyn VideoSource {
    match self {
      #[cfg(feature = "frame_sequence_input")]
      InputWrapper::FrameSequence(input) => input,
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input,
    }
  }

  fn inner_mut(&mut self) -> &mut dyn VideoSource {
    match self {
      #[cfg(feature = "frame_sequence_input")]
      InputWrapper::FrameSequence(input) => input,
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamer(input) => input,
    }
  }
}

impl VideoSource for InputWrapper {
  fn duration(&self) -> f64 {
    self.inner().duration()
  }

  fn native_resolution(&self) -> Resolution {
    self.inner().native_resolution()
  }

  fn seek(&mut self, time: f64) -> Result<(), InputError> {
    self.inner_mut().seek(time)
  }

  fn capture(&mut self) -> Result<RgbImage, InputError> {
    self.inner_mut().capture()
  }

  fn upload_meta(&self) -> Result<UploadMeta, InputError> {
    self.inner().upload_meta()
  }
}

/// 百分号解码 URL 路径
pub(crate) fn decoded_path(url: &url::Url) -> String {
  urlencoding::decode(url.path())
    .map(|path| path.into_owned())
    .unwrap_or_else(|_| url.path().to_string())
}

/// 校验定位时间是否落在片长范围内
pub(crate) fn check_seek(time: f64, duration: f64) -> Result<(), InputError> {
  if time.is_finite() && time >= 0.0 && time <= duration {
    Ok(())
  } else {
    Err(InputError::SeekOutOfRange { time, duration })
  }
}
