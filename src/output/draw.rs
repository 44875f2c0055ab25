// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/output/draw.rs - 人脸框绘制
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

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::filter::FaceBox;

/// 反馈框颜色（绿色）
const BOX_COLOR: [u8; 3] = [0, 255, 0];
/// 反馈框线宽（像素）
const BOX_THICKNESS: u32 = 3;

/// 在帧的显示副本上画出接受的人脸框
///
/// 只服务屏幕反馈。检测输入和抓拍输出都拿不到画过框的像素。
#[derive(Debug, Clone)]
pub struct Draw {
  color: Rgb<u8>,
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: Rgb(BOX_COLOR),
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  /// 返回画好人脸框的显示副本，原帧保持不变
  pub fn annotate(&self, image: &RgbImage, bbox: Option<&FaceBox>) -> RgbImage {
    let mut display = image.clone();
    if let Some(bbox) = bbox {
      self.draw_bbox(&mut display, bbox);
    }
    display
  }

  /// 绘制空心矩形，线宽靠逐级内缩的嵌套矩形实现
  pub fn draw_bbox(&self, image: &mut RgbImage, bbox: &FaceBox) {
    if bbox.is_degenerate() {
      return;
    }

    for inset in 0..self.thickness {
      let shrink = inset * 2;
      if bbox.width() <= shrink || bbox.height() <= shrink {
        break;
      }

      let rect = Rect::at((bbox.left + inset) as i32, (bbox.top + inset) as i32)
        .of_size(bbox.width() - shrink, bbox.height() - shrink);
      draw_hollow_rect_mut(image, rect, self.color);
    }
  }
}
