// 该文件是 Toulan （投篮） 项目的一部分。
// src/output/draw.rs - 骨架叠加层光栅化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut, text_size};
use thiserror::Error;
use tracing::{debug, info};

use crate::output::skeleton::{Label, Marker, RenderConfig, Segment, SkeletonOverlay};

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法加载字体文件: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 将 [`SkeletonOverlay`] 绘制到透明画布上
///
/// 没有字体时跳过关节标签。
pub struct Draw {
  config: RenderConfig,
  font: Option<FontVec>,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(RenderConfig::default())
  }
}

impl Draw {
  pub fn new(config: RenderConfig) -> Self {
    Self { config, font: None }
  }

  pub fn with_font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec, DrawError> {
    let path = path.as_ref();
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    Ok(FontVec::try_from_vec(data)?)
  }

  pub fn config(&self) -> &RenderConfig {
    &self.config
  }

  pub fn draw_overlay(&self, overlay: &SkeletonOverlay) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(
      overlay.surface.width,
      overlay.surface.height,
      Rgba([0, 0, 0, 0]),
    );

    for segment in &overlay.segments {
      self.draw_segment(&mut image, segment);
    }
    for marker in &overlay.markers {
      self.draw_marker(&mut image, marker);
    }
    match &self.font {
      Some(font) => {
        for label in &overlay.labels {
          self.draw_label(&mut image, label, font);
        }
      }
      None if !overlay.labels.is_empty() => debug!("未加载字体，跳过 {} 个标签", overlay.labels.len()),
      None => {}
    }

    image
  }

  // 沿法线方向平移若干次来加粗线段
  fn draw_segment(&self, image: &mut RgbaImage, segment: &Segment) {
    let (dx, dy) = (segment.end.x - segment.start.x, segment.end.y - segment.start.y);
    let length = dx.hypot(dy);
    let (nx, ny) = if length > f32::EPSILON {
      (-dy / length, dx / length)
    } else {
      (0.0, 0.0)
    };

    let half = (self.config.line_width.max(1) as i32 - 1) / 2;
    let extra = (self.config.line_width.max(1) as i32 - 1) % 2;
    for thickness in -half..=(half + extra) {
      let offset = thickness as f32;
      draw_line_segment_mut(
        image,
        (segment.start.x + nx * offset, segment.start.y + ny * offset),
        (segment.end.x + nx * offset, segment.end.y + ny * offset),
        self.config.line_color,
      );
    }
  }

  fn draw_marker(&self, image: &mut RgbaImage, marker: &Marker) {
    draw_filled_circle_mut(
      image,
      (marker.center.x.round() as i32, marker.center.y.round() as i32),
      self.config.marker_radius,
      marker.color,
    );
  }

  fn draw_label(&self, image: &mut RgbaImage, label: &Label, font: &FontVec) {
    let scale = PxScale::from(self.config.label_size);
    let (width, height) = text_size(scale, font, &label.text);
    let x = label.anchor.x.round() as i32 - width as i32 / 2;
    let y = label.anchor.y.round() as i32 - height as i32;
    draw_text_mut(image, self.config.label_color, x, y, scale, font, &label.text);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::Resolution, pose::{BodyPart, Position}};

  fn overlay() -> SkeletonOverlay {
    SkeletonOverlay {
      surface: Resolution::new(100, 80),
      time: 0.0,
      segments: vec![Segment {
        from: BodyPart::LeftShoulder,
        to: BodyPart::RightShoulder,
        start: Position::new(10.0, 40.0),
        end: Position::new(90.0, 40.0),
      }],
      markers: vec![Marker {
        part: BodyPart::LeftWrist,
        center: Position::new(50.0, 10.0),
        color: RenderConfig::default().extremity_color,
      }],
      labels: vec![Label {
        text: "LWrist".to_string(),
        anchor: Position::new(50.0, 0.0),
      }],
    }
  }

  #[test]
  fn draws_on_transparent_surface() {
    let draw = Draw::default();
    let image = draw.draw_overlay(&overlay());
    let config = draw.config();

    assert_eq!(image.dimensions(), (100, 80));
    assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    assert_eq!(image.get_pixel(50, 40), &config.line_color);
    // 线宽 3
    assert_eq!(image.get_pixel(50, 39), &config.line_color);
    assert_eq!(image.get_pixel(50, 41), &config.line_color);
    assert_eq!(image.get_pixel(50, 43), &Rgba([0, 0, 0, 0]));
    assert_eq!(image.get_pixel(50, 10), &config.extremity_color);
    assert_eq!(image.get_pixel(54, 10), &config.extremity_color);
  }

  #[test]
  fn missing_font_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      Draw::load_font(dir.path().join("missing.ttf")),
      Err(DrawError::IoError(_))
    ));
  }

  #[test]
  fn invalid_font_data_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"not a font").unwrap();
    assert!(matches!(Draw::load_font(&path), Err(DrawError::InvalidFont(_))));
  }
}
