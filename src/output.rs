// 该文件是 Toulan （投篮） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

#[cfg(feature = "save_image_file")]
use crate::frame::Resolution;
use crate::{FromUrl, FromUrlWithScheme, analysis::AnalysisResult, sampler::SampledClip};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_image_file")]
pub mod draw;
pub mod skeleton;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

mod report;
pub use self::report::{MetricDisplay, Report, ReportError, ReportOutput};

#[cfg(feature = "save_image_file")]
use self::draw::Draw;

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("分析报告错误: {0}")]
  ReportError(#[from] ReportError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  ReportOutput(ReportOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      ReportOutput::SCHEME => {
        let output = ReportOutput::from_url(url)?;
        Ok(OutputWrapper::ReportOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

#[cfg(feature = "save_image_file")]
impl OutputWrapper {
  /// 设置叠加图画布尺寸与绘制样式，对报告输出无影响
  pub fn with_overlay(self, surface: Resolution, draw: Draw) -> Self {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_overlay(surface, draw))
      }
      other => other,
    }
  }
}

impl Render<SampledClip, AnalysisResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, clip: &SampledClip, result: &AnalysisResult) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(clip, result)
        .map_err(OutputError::from),
      OutputWrapper::ReportOutput(output) => output
        .render_result(clip, result)
        .map_err(OutputError::from),
    }
  }
}
