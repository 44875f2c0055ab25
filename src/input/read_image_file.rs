// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/input/read_image_file.rs - 图片文件输入源
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

use image::{ImageReader, RgbImage};
use tracing::info;
use url::Url;

use super::{FrameSource, InputError, SourceKind};
use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

/// 图片文件输入源，产出一帧后视频流即结束
///
/// 调试与离线回归用，URL 形如 `image:///path/to/picture.png`。
pub struct ImageFileInput {
  image: Option<RgbImage>,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InputError::SchemeMismatch);
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| InputError::CaptureError(format!("无法解码图片路径: {}", e)))?
      .into_owned();

    Self::open(&path)
  }
}

impl ImageFileInput {
  pub fn open(path: &str) -> Result<Self, InputError> {
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!("图片已加载: {} ({}x{})", path, image.width(), image.height());

    Ok(Self {
      width: image.width(),
      height: image.height(),
      image: Some(image),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take().map(|image| Ok(Frame::new(image, 0, 0)))
  }
}

impl FrameSource for ImageFileInput {
  fn kind(&self) -> SourceKind {
    SourceKind::Image
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn sample_file(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("sample.png");
    RgbImage::from_pixel(16, 12, Rgb([1, 2, 3]))
      .save(&path)
      .unwrap();
    path.display().to_string()
  }

  #[test]
  fn yields_one_frame_then_ends() {
    let dir = tempfile::tempdir().unwrap();
    let mut input = ImageFileInput::open(&sample_file(&dir)).unwrap();

    let frame = input.next().unwrap().unwrap();
    assert_eq!(frame.index, 0);
    assert_eq!(frame.width(), 16);
    assert_eq!(frame.height(), 12);

    assert!(input.next().is_none());
    assert!(input.next().is_none());
  }

  #[test]
  fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.png");

    assert!(ImageFileInput::open(&path.display().to_string()).is_err());
  }

  #[test]
  fn percent_encoded_paths_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("with space.png");
    RgbImage::new(4, 4).save(&path).unwrap();

    let encoded = format!("image://{}/with%20space.png", dir.path().display());
    let url = Url::parse(&encoded).unwrap();

    let input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.width(), 4);
  }
}
