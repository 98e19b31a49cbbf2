// 该文件是 Toulan （投篮） 项目的一部分。
// src/input/upload.rs - 上传文件校验
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

use std::path::Path;

use thiserror::Error;

/// 上传大小上限：50MB
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// 超过该时长的片段会给出提示
pub const ADVISORY_DURATION_SECS: f64 = 15.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
  #[error("不是视频文件: {0}")]
  NotVideo(String),
  #[error("文件大小 {size} 字节超过上限 {limit} 字节")]
  TooLarge { size: u64, limit: u64 },
}

/// 上传文件的元信息
#[derive(Debug, Clone, PartialEq)]
pub struct UploadMeta {
  pub name: String,
  pub mime: String,
  pub size: u64,
}

impl UploadMeta {
  pub fn new(name: impl Into<String>, mime: impl Into<String>, size: u64) -> Self {
    Self {
      name: name.into(),
      mime: mime.into(),
      size,
    }
  }

  /// 从本地文件读取大小，并按扩展名推断 MIME 类型
  pub fn for_file(path: &Path) -> std::io::Result<Self> {
    let size = std::fs::metadata(path)?.len();
    let name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    let mime = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(mime_for_extension)
      .unwrap_or(OCTET_STREAM);
    Ok(Self::new(name, mime, size))
  }
}

const OCTET_STREAM: &str = "application/octet-stream";

pub fn mime_for_extension(ext: &str) -> &'static str {
  match ext.to_lowercase().as_str() {
    "mp4" => "video/mp4",
    "m4v" => "video/x-m4v",
    "mov" => "video/quicktime",
    "webm" => "video/webm",
    "mkv" => "video/x-matroska",
    "avi" => "video/x-msvideo",
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    _ => OCTET_STREAM,
  }
}

/// 非阻断性提示
#[derive(Debug, Clone, PartialEq)]
pub enum Advisory {
  LongClip { duration: f64, limit: f64 },
}

impl Advisory {
  pub fn message(&self) -> String {
    match self {
      Advisory::LongClip { limit, .. } => format!(
        "Warning: Videos longer than {} seconds may result in slower analysis.",
        limit
      ),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadLimits {
  pub max_bytes: u64,
  pub advisory_duration: f64,
}

impl Default for UploadLimits {
  fn default() -> Self {
    Self {
      max_bytes: MAX_UPLOAD_BYTES,
      advisory_duration: ADVISORY_DURATION_SECS,
    }
  }
}

impl UploadLimits {
  pub fn validate(&self, meta: &UploadMeta) -> Result<(), UploadError> {
    if !meta.mime.starts_with("video/") {
      return Err(UploadError::NotVideo(meta.mime.clone()));
    }
    if meta.size > self.max_bytes {
      return Err(UploadError::TooLarge {
        size: meta.size,
        limit: self.max_bytes,
      });
    }
    Ok(())
  }

  pub fn advisories(&self, duration: f64) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    if duration > self.advisory_duration {
      advisories.push(Advisory::LongClip {
        duration,
        limit: self.advisory_duration,
      });
    }
    advisories
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_non_video_mime() {
    let limits = UploadLimits::default();
    let meta = UploadMeta::new("shot.png", "image/png", 1024);
    assert_eq!(
      limits.validate(&meta),
      Err(UploadError::NotVideo("image/png".to_string()))
    );
  }

  #[test]
  fn size_limit_is_inclusive() {
    let limits = UploadLimits::default();
    let at_limit = UploadMeta::new("shot.mp4", "video/mp4", MAX_UPLOAD_BYTES);
    let over = UploadMeta::new("shot.mp4", "video/mp4", MAX_UPLOAD_BYTES + 1);
    assert!(limits.validate(&at_limit).is_ok());
    assert!(matches!(
      limits.validate(&over),
      Err(UploadError::TooLarge { .. })
    ));
  }

  #[test]
  fn long_clips_are_flagged_but_not_blocked() {
    let limits = UploadLimits::default();
    assert!(limits.advisories(15.0).is_empty());
    assert_eq!(limits.advisories(15.5).len(), 1);
  }

  #[test]
  fn mime_from_extension() {
    assert_eq!(mime_for_extension("MOV"), "video/quicktime");
    assert_eq!(mime_for_extension("txt"), "application/octet-stream");
  }
}
