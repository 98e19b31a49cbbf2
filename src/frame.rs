// 该文件是 Toulan （投篮） 项目的一部分。
// src/frame.rs - 采集帧与采集分辨率
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

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 采集分辨率
///
/// 采样器按该分辨率捕获帧并送入姿态估计器，渲染器也以它作为源坐标空间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
  pub width: u32,
  pub height: u32,
}

impl Default for Resolution {
  fn default() -> Self {
    Self::new(640, 480)
  }
}

impl Resolution {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn byte_len(&self) -> usize {
    RGB_CHANNELS * self.width as usize * self.height as usize
  }
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  SizeMismatch { expected: usize, actual: usize },
  #[error("采集分辨率无效: {0}x{1}")]
  EmptyResolution(u32, u32),
}

/// 一次 seek 之后捕获的帧，已缩放到采集分辨率
#[derive(Debug, Clone)]
pub struct CapturedFrame {
  image: RgbImage,
  time: f64,
}

impl CapturedFrame {
  /// 将解码得到的图像缩放到采集分辨率
  pub fn fit(image: RgbImage, capture: Resolution, time: f64) -> Result<Self, FrameError> {
    if capture.width == 0 || capture.height == 0 {
      return Err(FrameError::EmptyResolution(capture.width, capture.height));
    }

    let image = if image.dimensions() == (capture.width, capture.height) {
      image
    } else {
      imageops::resize(&image, capture.width, capture.height, FilterType::Triangle)
    };

    Ok(Self { image, time })
  }

  /// 由 HWC 排列的 RGB 原始数据构造
  pub fn from_raw(capture: Resolution, data: Vec<u8>, time: f64) -> Result<Self, FrameError> {
    let expected = capture.byte_len();
    let actual = data.len();
    let image = RgbImage::from_raw(capture.width, capture.height, data)
      .ok_or(FrameError::SizeMismatch { expected, actual })?;
    Ok(Self { image, time })
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }

  pub fn time(&self) -> f64 {
    self.time
  }

  pub fn resolution(&self) -> Resolution {
    Resolution::new(self.image.width(), self.image.height())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fit_rescales_to_capture_resolution() {
    let image = RgbImage::new(1280, 720);
    let frame = CapturedFrame::fit(image, Resolution::default(), 0.5).unwrap();
    assert_eq!(frame.resolution(), Resolution::new(640, 480));
    assert_eq!(frame.time(), 0.5);
  }

  #[test]
  fn from_raw_rejects_wrong_length() {
    let err = CapturedFrame::from_raw(Resolution::new(4, 4), vec![0u8; 10], 0.0).unwrap_err();
    assert!(matches!(
      err,
      FrameError::SizeMismatch {
        expected: 48,
        actual: 10
      }
    ));
  }
}
