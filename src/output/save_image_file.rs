// 该文件是 Toulan （投篮） 项目的一部分。
// src/output/save_image_file.rs - 保存骨架叠加图
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

use std::path::{Path, PathBuf};

use image::RgbaImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  analysis::AnalysisResult,
  frame::Resolution,
  input::decoded_path,
  output::{
    Render,
    draw::Draw,
    skeleton::{RenderConfig, SkeletonRenderer},
  },
  sampler::SampledClip,
};

pub struct SaveImageFileOutput {
  path: PathBuf,
  surface: Resolution,
  renderer: SkeletonRenderer,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput::new(decoded_path(uri), Resolution::default(), Draw::default()))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>, surface: Resolution, draw: Draw) -> Self {
    let renderer = SkeletonRenderer::new(draw.config().clone());
    Self {
      path: path.into(),
      surface,
      renderer,
      draw,
    }
  }

  /// 替换画布尺寸与绘制样式
  pub fn with_overlay(self, surface: Resolution, draw: Draw) -> Self {
    Self::new(self.path, surface, draw)
  }

  pub fn render_config(&self) -> &RenderConfig {
    self.renderer.config()
  }

  fn save_image(&self, image: RgbaImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    info!("保存叠加图到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<SampledClip, AnalysisResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, clip: &SampledClip, _result: &AnalysisResult) -> Result<(), Self::Error> {
    let Some(overlay) = self.renderer.layout(&clip.samples, clip.capture, self.surface) else {
      warn!("没有采样，不生成叠加图");
      return Ok(());
    };
    info!("叠加图使用 {:.3}s 处的姿态", overlay.time);
    self.save_image(self.draw.draw_overlay(&overlay))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pose::{BodyPart, Keypoint, PoseEstimate, Sample};

  fn clip(samples: Vec<Sample>) -> SampledClip {
    SampledClip::new(1.0, Resolution::new(640, 480), samples)
  }

  #[test]
  fn writes_png_of_requested_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/overlay.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url)
      .unwrap()
      .with_overlay(Resolution::new(320, 240), Draw::default());

    let pose = PoseEstimate::new(
      0.9,
      [
        Keypoint::new(BodyPart::LeftShoulder, 100.0, 100.0, 0.9),
        Keypoint::new(BodyPart::RightShoulder, 200.0, 100.0, 0.9),
      ],
    );
    let result = AnalysisResult::from_metrics(90.0, 100.0, 100.0, 100.0);
    output
      .render_result(&clip(vec![Sample::new(0.0, pose)]), &result)
      .unwrap();

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (320, 240));
  }

  #[test]
  fn empty_clip_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlay.png");
    let output = SaveImageFileOutput::new(&path, Resolution::default(), Draw::default());
    let result = AnalysisResult::from_metrics(90.0, 100.0, 100.0, 100.0);
    output.render_result(&clip(vec![]), &result).unwrap();
    assert!(!path.exists());
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("report:///tmp/out.json").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
