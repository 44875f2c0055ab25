// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/crop.rs - 人脸裁剪
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
use image::imageops;
use thiserror::Error;

use crate::filter::FaceBox;

#[derive(Error, Debug)]
pub enum CropError {
  #[error("无效的人脸区域: {width}x{height}")]
  InvalidBoundingBox { width: u32, height: u32 },
}

/// 以区域左上角为锚点裁剪人脸，输出尺寸为 (right-left) x (bottom-top)。
///
/// 像素从源图像逐一复制，不经过有损编码。
/// 区域退化（宽或高为 0）时报错，而不是悄悄生成空图像。
pub fn crop_face(image: &RgbImage, bbox: &FaceBox) -> Result<RgbImage, CropError> {
  let (width, height) = (bbox.width(), bbox.height());
  if bbox.is_degenerate() {
    return Err(CropError::InvalidBoundingBox { width, height });
  }

  Ok(imageops::crop_imm(image, bbox.left, bbox.top, width, height).to_image())
}
