// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/filter.rs - 检测结果过滤
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

use tracing::debug;

use crate::model::DetectResult;

/// 默认置信度阈值
pub const SCORE_THRESHOLD: f32 = 0.3;

/// 人脸区域，像素坐标
///
/// 不变式: left <= right < 帧宽, top <= bottom < 帧高。
/// 过滤器只产出满足这个约束的区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
  pub left: u32,
  pub top: u32,
  pub right: u32,
  pub bottom: u32,
}

impl FaceBox {
  pub fn width(&self) -> u32 {
    self.right - self.left
  }

  pub fn height(&self) -> u32 {
    self.bottom - self.top
  }

  /// 宽或高为 0 的区域裁剪不出有效图像
  pub fn is_degenerate(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }
}

/// 逐帧筛选检测记录，无状态
#[derive(Debug, Clone)]
pub struct DetectionFilter {
  score_threshold: f32,
}

impl Default for DetectionFilter {
  fn default() -> Self {
    Self {
      score_threshold: SCORE_THRESHOLD,
    }
  }
}

impl DetectionFilter {
  pub fn with_threshold(score_threshold: f32) -> Self {
    Self { score_threshold }
  }

  /// 在一帧的检测记录里挑出人脸区域。
  ///
  /// 置信度低于阈值的记录被丢弃，其余换算成像素坐标并裁剪到帧边界，
  /// 只保留置信度最高的一个。同分时保留先出现的。
  /// 本帧没有记录通过时返回 None，上一帧的结果不会留到下一帧。
  pub fn select(&self, result: &DetectResult, width: u32, height: u32) -> Option<FaceBox> {
    let mut best: Option<(f32, FaceBox)> = None;

    for item in result.items.iter() {
      if item.score < self.score_threshold {
        continue;
      }

      let Some(bbox) = Self::to_pixel_box(&item.bbox, width, height) else {
        debug!("检测框坐标颠倒，丢弃: {:?}", item.bbox);
        continue;
      };

      match best {
        Some((score, _)) if item.score <= score => {}
        _ => best = Some((item.score, bbox)),
      }
    }

    best.map(|(_, bbox)| bbox)
  }

  /// 归一化坐标换算成像素坐标，逐分量裁剪到 [0, 宽-1] 与 [0, 高-1]。
  /// 裁剪后左右或上下颠倒的框返回 None。
  fn to_pixel_box(bbox: &[f32; 4], width: u32, height: u32) -> Option<FaceBox> {
    let clamp_x = |v: f32| (v * width as f32).clamp(0.0, width as f32 - 1.0) as u32;
    let clamp_y = |v: f32| (v * height as f32).clamp(0.0, height as f32 - 1.0) as u32;

    let left = clamp_x(bbox[0]);
    let top = clamp_y(bbox[1]);
    let right = clamp_x(bbox[2]);
    let bottom = clamp_y(bbox[3]);

    (left <= right && top <= bottom).then_some(FaceBox {
      left,
      top,
      right,
      bottom,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DetectItem, DetectResult};

  fn result_of(items: Vec<DetectItem>) -> DetectResult {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }

  fn item(score: f32, bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      class_id: 1,
      score,
      bbox,
    }
  }

  #[test]
  fn low_confidence_records_are_discarded() {
    let filter = DetectionFilter::default();
    let result = result_of(vec![item(0.29, [0.1, 0.1, 0.9, 0.9])]);

    assert_eq!(filter.select(&result, 640, 480), None);
  }

  #[test]
  fn threshold_is_inclusive() {
    let filter = DetectionFilter::default();
    let result = result_of(vec![item(0.3, [0.1, 0.1, 0.4, 0.4])]);

    assert!(filter.select(&result, 640, 480).is_some());
  }

  #[test]
  fn passing_record_is_converted_to_pixels() {
    let filter = DetectionFilter::default();
    let result = result_of(vec![
      item(0.2, [0.0, 0.0, 0.9, 0.9]),
      item(0.5, [0.1, 0.1, 0.4, 0.4]),
    ]);

    let bbox = filter.select(&result, 640, 480).unwrap();
    assert_eq!(bbox.left, 64);
    assert_eq!(bbox.top, 48);
    assert_eq!(bbox.right, 256);
    assert_eq!(bbox.bottom, 192);
  }

  #[test]
  fn highest_confidence_wins() {
    let filter = DetectionFilter::default();
    let result = result_of(vec![
      item(0.4, [0.0, 0.0, 0.1, 0.1]),
      item(0.9, [0.2, 0.2, 0.3, 0.3]),
      item(0.6, [0.5, 0.5, 0.6, 0.6]),
    ]);

    let bbox = filter.select(&result, 1000, 1000).unwrap();
    assert_eq!(bbox.left, 200);
    assert_eq!(bbox.top, 200);
  }

  #[test]
  fn boxes_are_clamped_to_frame_bounds() {
    let filter = DetectionFilter::default();
    let result = result_of(vec![item(0.8, [-0.2, -0.1, 1.2, 1.5])]);

    let bbox = filter.select(&result, 640, 480).unwrap();
    assert_eq!(bbox.left, 0);
    assert_eq!(bbox.top, 0);
    assert_eq!(bbox.right, 639);
    assert_eq!(bbox.bottom, 479);
    assert!(bbox.right < 640 && bbox.bottom < 480);
  }

  #[test]
  fn inverted_boxes_are_dropped() {
    let filter = DetectionFilter::default();
    let result = result_of(vec![item(0.8, [0.8, 0.1, 0.2, 0.4])]);

    assert_eq!(filter.select(&result, 640, 480), None);
  }

  #[test]
  fn empty_result_selects_nothing() {
    let filter = DetectionFilter::default();
    let result = result_of(vec![]);

    assert_eq!(filter.select(&result, 640, 480), None);
  }

  #[test]
  fn selection_does_not_persist_across_frames() {
    let filter = DetectionFilter::default();
    let with_face = result_of(vec![item(0.9, [0.1, 0.1, 0.4, 0.4])]);
    let without_face = result_of(vec![]);

    assert!(filter.select(&with_face, 640, 480).is_some());
    assert_eq!(filter.select(&without_face, 640, 480), None);
  }
}
