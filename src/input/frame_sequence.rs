// 该文件是 Toulan （投篮） 项目的一部分。
// src/input/frame_sequence.rs - 图像序列输入
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

//! 将一个目录中按文件名排序的图片视为固定帧率的视频。
//!
//! ```text
//! frames:///data/shot-01?fps=30
//! ```

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Resolution,
  input::{InputError, UploadMeta, VideoSource, check_seek, decoded_path},
};

const DEFAULT_FPS: f64 = 30.0;
const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
const FRAME_SEQUENCE_MIME: &str = "video/x-frame-sequence";

#[derive(Error, Debug)]
pub enum FrameSequenceInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("No frames found in {0}")]
  Empty(String),
  #[error("Invalid frame rate: {0}")]
  InvalidFps(String),
  #[error("No frame selected, seek first")]
  NotPositioned,
}

pub struct FrameSequenceInput {
  directory: PathBuf,
  frames: Vec<PathBuf>,
  fps: f64,
  resolution: Resolution,
  position: Option<usize>,
}

impl FromUrlWithScheme for FrameSequenceInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for FrameSequenceInput {
  type Error = FrameSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(FrameSequenceInputError::SchemaMismatch);
    }

    let fps = match url.query_pairs().find(|(k, _)| k == "fps") {
      Some((_, v)) => v
        .parse::<f64>()
        .map_err(|_| FrameSequenceInputError::InvalidFps(v.to_string()))?,
      None => DEFAULT_FPS,
    };

    Self::open(decoded_path(url), fps)
  }
}

impl FrameSequenceInput {
  pub fn open(directory: impl AsRef<Path>, fps: f64) -> Result<Self, FrameSequenceInputError> {
    if !(fps.is_finite() && fps > 0.0) {
      return Err(FrameSequenceInputError::InvalidFps(fps.to_string()));
    }

    let directory = directory.as_ref().to_path_buf();
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      let is_frame = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);
      if is_frame {
        frames.push(path);
      }
    }
    frames.sort();

    let first = frames
      .first()
      .ok_or_else(|| FrameSequenceInputError::Empty(directory.display().to_string()))?;
    let (width, height) = image::image_dimensions(first)?;
    debug!(
      "图像序列: {} 帧, {}x{}, {} fps",
      frames.len(),
      width,
      height,
      fps
    );

    Ok(Self {
      directory,
      frames,
      fps,
      resolution: Resolution::new(width, height),
      position: None,
    })
  }

  pub fn frame_count(&self) -> usize {
    self.frames.len()
  }

  fn frame_index(&self, time: f64) -> usize {
    let index = (time * self.fps).floor() as usize;
    index.min(self.frames.len().saturating_sub(1))
  }

  fn load(&self, index: usize) -> Result<RgbImage, FrameSequenceInputError> {
    let image = ImageReader::open(&self.frames[index])?.decode()?;
    Ok(image.to_rgb8())
  }
}

impl VideoSource for FrameSequenceInput {
  fn duration(&self) -> f64 {
    self.frames.len() as f64 / self.fps
  }

  fn native_resolution(&self) -> Resolution {
    self.resolution
  }

  fn seek(&mut self, time: f64) -> Result<(), InputError> {
    check_seek(time, self.duration())?;
    self.position = Some(self.frame_index(time));
    Ok(())
  }

  fn capture(&mut self) -> Result<RgbImage, InputError> {
    let index = self
      .position
      .ok_or(FrameSequenceInputError::NotPositioned)?;
    Ok(self.load(index)?)
  }

  fn upload_meta(&self) -> Result<UploadMeta, InputError> {
    let mut size = 0;
    for frame in &self.frames {
      size += std::fs::metadata(frame)?.len();
    }
    let name = self
      .directory
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    Ok(UploadMeta::new(name, FRAME_SEQUENCE_MIME, size))
  }
}
