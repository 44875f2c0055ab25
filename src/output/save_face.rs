// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/output/save_face.rs - 保存人脸抓拍
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

use std::path::PathBuf;

use chrono::{Local, Timelike};
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tracing::warn;

/// JPEG 编码质量，保最高画质
const JPEG_QUALITY: u8 = 100;

#[derive(Error, Debug)]
pub enum SaveFaceError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  EncodeError(#[from] image::ImageError),
}

/// 一次成功抓拍的结果，写盘之后不再变化
#[derive(Debug, Clone)]
pub struct SavedFace {
  pub path: PathBuf,
  pub hour: u32,
  pub minute: u32,
  pub second: u32,
}

/// 人脸抓拍的落盘通道，文件按保存时刻命名
pub struct FaceSaver {
  directory: PathBuf,
}

impl FaceSaver {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
    }
  }

  /// 把裁出的人脸写成 `<时>:<分>:<秒>.jpg`，时间分量不补零。
  /// 同一秒内的两次保存同名，后写的直接覆盖先写的，不提示也不改名。
  pub fn save(&self, face: &RgbImage) -> Result<SavedFace, SaveFaceError> {
    if !self.directory.exists() {
      std::fs::create_dir_all(&self.directory)?;
    }

    let now = Local::now();
    let (hour, minute, second) = (now.hour(), now.minute(), now.second());
    let path = self.directory.join(format!("{}:{}:{}.jpg", hour, minute, second));

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(face)?;
    std::fs::write(&path, encoded)?;

    warn!("保存抓拍到文件: {}", path.display());

    Ok(SavedFace {
      path,
      hour,
      minute,
      second,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn filename_is_wall_clock_without_padding() {
    let dir = tempfile::tempdir().unwrap();
    let saver = FaceSaver::new(dir.path());
    let face = RgbImage::from_pixel(32, 32, Rgb([200, 30, 30]));

    let saved = saver.save(&face).unwrap();

    let expected = format!("{}:{}:{}.jpg", saved.hour, saved.minute, saved.second);
    assert_eq!(
      saved.path.file_name().unwrap().to_str().unwrap(),
      expected
    );
    assert!(saved.path.exists());
  }

  #[test]
  fn saved_file_decodes_with_crop_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let saver = FaceSaver::new(dir.path());
    let face = RgbImage::from_pixel(100, 64, Rgb([10, 120, 10]));

    let saved = saver.save(&face).unwrap();
    let decoded = image::open(&saved.path).unwrap().to_rgb8();

    assert_eq!(decoded.width(), 100);
    assert_eq!(decoded.height(), 64);
  }

  #[test]
  fn target_directory_is_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("faces").join("today");
    let saver = FaceSaver::new(&nested);
    let face = RgbImage::from_pixel(8, 8, Rgb([1, 1, 1]));

    let saved = saver.save(&face).unwrap();
    assert!(saved.path.starts_with(&nested));
    assert!(saved.path.exists());
  }

  #[test]
  fn unwritable_directory_reports_io_error() {
    let saver = FaceSaver::new("/proc/lianpu-not-allowed");
    let face = RgbImage::from_pixel(8, 8, Rgb([1, 1, 1]));

    assert!(matches!(
      saver.save(&face),
      Err(SaveFaceError::IoError(_))
    ));
  }
}
