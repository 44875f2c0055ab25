// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/frame.rs - 摄像头帧定义
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

/// 单帧图像
///
/// 像素始终为交错排布的 RGB。裁剪与保存直接使用这里的原始像素，
/// 屏幕反馈用的标注在显示副本上进行。
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 像素
  pub image: RgbImage,
  /// 帧序号，从 0 开始
  pub index: u64,
  /// 从打开输入源起算的时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}
