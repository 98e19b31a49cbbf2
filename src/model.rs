// 该文件是 Toulan （投篮） 项目的一部分。
// src/model.rs - 姿态估计模型
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

use crate::{FromUrl, FromUrlWithScheme, frame::CapturedFrame, pose::PoseEstimate};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("姿态回放错误: {0}")]
  PoseReplayError(#[from] PoseReplayError),
  #[error("姿态估计失败: {0}")]
  InferenceError(String),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 姿态估计器：一次接收一帧，返回一个姿态
///
/// 采样器在阻塞线程池中调用 `infer`，因此需要 `Send + Sync`。
pub trait PoseModel:
  Model<Input = CapturedFrame, Output = PoseEstimate, Error = ModelError> + Send + Sync
{
}

impl<T> PoseModel for T where
  T: Model<Input = CapturedFrame, Output = PoseEstimate, Error = ModelError> + Send + Sync
{
}

mod replay;
pub use self::replay::{PoseReplay, PoseReplayError};

/// 按 URL 方案选择的姿态估计器
pub enum ModelWrapper {
  PoseReplay(PoseReplay),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      PoseReplay::SCHEME => Ok(ModelWrapper::PoseReplay(PoseReplay::from_url(url)?)),
      _ => Err(ModelError::SchemeMismatch),
    }
  }
}

impl Model for ModelWrapper {
  type Input = CapturedFrame;
  type Output = PoseEstimate;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      ModelWrapper::PoseReplay(model) => model.infer(input),
    }
  }
}
