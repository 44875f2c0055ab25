// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use crate::{FromUrl, frame::Frame};

mod v4l2_source;
pub use self::v4l2_source::V4l2Source;

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::ImageFileInput;

/// 输入源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
  /// V4L2 摄像头
  V4l2,
  /// 图片文件
  Image,
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("摄像头不可用: {device}: {reason}")]
  DeviceUnavailable { device: String, reason: String },
  #[error("视频采集错误: {0}")]
  CaptureError(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 帧来源
///
/// 迭代返回 None 表示视频流正常结束，不是错误；
/// 流中途的读取失败以 Err 返回，由任务决定是否终止。
pub trait FrameSource: Iterator<Item = Result<Frame, InputError>> {
  /// 输入源类型
  fn kind(&self) -> SourceKind;

  /// 帧宽度
  fn width(&self) -> u32;

  /// 帧高度
  fn height(&self) -> u32;

  /// 帧率（如果适用）
  fn fps(&self) -> Option<f64>;
}

pub enum InputWrapper {
  V4l2(V4l2Source),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4l2Source::SCHEME {
        let input = V4l2Source::from_url(url)?;
        return Ok(InputWrapper::V4l2(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::V4l2(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
    }
  }
}

impl FrameSource for InputWrapper {
  fn kind(&self) -> SourceKind {
    match self {
      InputWrapper::V4l2(input) => input.kind(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.kind(),
    }
  }

  fn width(&self) -> u32 {
    match self {
      InputWrapper::V4l2(input) => input.width(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.width(),
    }
  }

  fn height(&self) -> u32 {
    match self {
      InputWrapper::V4l2(input) => input.height(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.height(),
    }
  }

  fn fps(&self) -> Option<f64> {
    match self {
      InputWrapper::V4l2(input) => input.fps(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.fps(),
    }
  }
}
