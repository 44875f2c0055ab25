// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
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

use std::pin::Pin;
use std::time::Instant;

use image::RgbImage;
use tracing::{info, warn};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::{FrameSource, InputError, SourceKind};
use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

/// 默认设备节点
const DEFAULT_DEVICE: &str = "/dev/video0";
/// 默认采集尺寸
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
/// 设备拔出时驱动返回的 errno
const ENXIO: i32 = 6;
const ENODEV: i32 = 19;

/// V4L2 摄像头输入源
///
/// 由于 v4l 库的 Stream 需要引用 Device，我们使用 Box<Device> 来保证
/// Device 的内存地址稳定，从而可以安全地创建引用它的 Stream。
///
/// URL 形如 `v4l2:///dev/video0?width=640&height=480`。
pub struct V4l2Source {
  /// V4L2 设备（使用 Pin<Box> 固定内存位置）
  device: Pin<Box<Device>>,
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  /// 设备节点路径
  device_path: String,
  /// 帧索引
  frame_index: u64,
  /// 视频宽度
  width: u32,
  /// 视频高度
  height: u32,
  /// 设备已断开，视频流到此为止
  ended: bool,
  /// 开始时间
  start_time: Instant,
}

impl FromUrlWithScheme for V4l2Source {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Source {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InputError::SchemeMismatch);
    }

    let device_path = if url.path().is_empty() {
      DEFAULT_DEVICE.to_string()
    } else {
      urlencoding::decode(url.path())
        .map_err(|e| InputError::DeviceUnavailable {
          device: url.path().to_string(),
          reason: e.to_string(),
        })?
        .into_owned()
    };

    let mut width = DEFAULT_WIDTH;
    let mut height = DEFAULT_HEIGHT;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "width" => {
          if let Ok(value) = value.parse() {
            width = value;
          }
        }
        "height" => {
          if let Ok(value) = value.parse() {
            height = value;
          }
        }
        _ => {}
      }
    }

    Self::open(&device_path, width, height)
  }
}

impl V4l2Source {
  /// 打开摄像头设备并协商采集格式。
  /// 打开失败对流水线是致命的，直接报告给调用者。
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, InputError> {
    let device =
      Box::pin(
        Device::with_path(device_path).map_err(|e| InputError::DeviceUnavailable {
          device: device_path.to_string(),
          reason: e.to_string(),
        })?,
      );

    // 设置视频格式
    let mut format = device.format().map_err(|e| InputError::DeviceUnavailable {
      device: device_path.to_string(),
      reason: e.to_string(),
    })?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device
      .set_format(&format)
      .map_err(|e| InputError::DeviceUnavailable {
        device: device_path.to_string(),
        reason: e.to_string(),
      })?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(InputError::DeviceUnavailable {
        device: device_path.to_string(),
        reason: format!("设备不支持 YUYV，协商结果为 {}", format.fourcc),
      });
    }
    if format.width != width || format.height != height {
      warn!(
        "设备调整了采集尺寸: {}x{} -> {}x{}",
        width, height, format.width, format.height
      );
    }
    info!(
      "摄像头已打开: {} ({}x{})",
      device_path, format.width, format.height
    );

    let mut source = Self {
      device,
      stream: None,
      device_path: device_path.to_string(),
      frame_index: 0,
      width: format.width,
      height: format.height,
      ended: false,
      start_time: Instant::now(),
    };

    // 创建捕获流
    // SAFETY: device 被 Pin<Box> 固定，不会移动，所以引用始终有效
    // Stream 的生命周期通过 source 的 Drop 来管理
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      // 将设备引用的生命周期延长到 'static
      // 这是安全的，因为:
      // 1. device 被 Pin<Box> 固定在堆上，不会移动
      // 2. stream 存储在同一个结构体中，会在 device 之前被 drop
      // 3. Drop 顺序：stream (Option::take) -> device
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, 4).map_err(|e| {
        InputError::DeviceUnavailable {
          device: device_path.to_string(),
          reason: format!("无法创建捕获流: {}", e),
        }
      })?
    };

    source.stream = Some(stream);
    Ok(source)
  }

  /// 设备拔出或驱动关闭节点时的错误，视为视频流结束
  fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(e.raw_os_error(), Some(ENODEV) | Some(ENXIO))
      || matches!(
        e.kind(),
        std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe
      )
  }

  /// 将 YUYV 格式转换为 RGB
  fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);

    for chunk in yuyv.chunks(4) {
      if chunk.len() < 4 {
        break;
      }

      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;

      // 第一个像素
      let r = (y0 + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y0 - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y0 + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);

      // 第二个像素
      let r = (y1 + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y1 - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y1 + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }

    rgb
  }
}

impl Drop for V4l2Source {
  fn drop(&mut self) {
    // 确保 stream 在 device 之前被 drop
    self.stream.take();
  }
}

impl Iterator for V4l2Source {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.ended {
      return None;
    }
    let stream = self.stream.as_mut()?;

    match stream.next() {
      Ok((buffer, _meta)) => {
        let rgb_data = Self::yuyv_to_rgb(buffer, self.width, self.height);

        let image = match RgbImage::from_raw(self.width, self.height, rgb_data) {
          Some(image) => image,
          None => {
            return Some(Err(InputError::CaptureError(
              "采集缓冲区大小与采集尺寸不匹配".to_string(),
            )));
          }
        };

        let timestamp_ms = self.start_time.elapsed().as_millis() as u64;
        let frame = Frame::new(image, self.frame_index, timestamp_ms);

        self.frame_index += 1;
        Some(Ok(frame))
      }
      Err(e) if Self::is_disconnect(&e) => {
        warn!("摄像头已断开: {}", self.device_path);
        self.ended = true;
        self.stream.take();
        None
      }
      Err(e) => Some(Err(InputError::CaptureError(format!("无法捕获帧: {}", e)))),
    }
  }
}

impl FrameSource for V4l2Source {
  fn kind(&self) -> SourceKind {
    SourceKind::V4l2
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    Some(30.0) // V4L2 默认帧率
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_must_use_v4l2_scheme() {
    let url = Url::parse("http:///dev/video0").unwrap();
    assert!(matches!(
      V4l2Source::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }

  #[test]
  fn disconnect_errors_end_the_stream() {
    let gone = std::io::Error::from_raw_os_error(ENODEV);
    assert!(V4l2Source::is_disconnect(&gone));

    let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
    assert!(V4l2Source::is_disconnect(&eof));

    let busy = std::io::Error::from_raw_os_error(16);
    assert!(!V4l2Source::is_disconnect(&busy));
  }

  #[test]
  fn yuyv_gray_converts_to_gray() {
    // Y=128 U=V=128 是中性灰
    let yuyv = [128u8, 128, 128, 128];
    let rgb = V4l2Source::yuyv_to_rgb(&yuyv, 2, 1);

    assert_eq!(rgb.len(), 6);
    for value in rgb {
      assert!((127..=129).contains(&value));
    }
  }

  #[test]
  fn yuyv_conversion_covers_every_pixel_pair() {
    let yuyv = vec![0u8; 12];
    let rgb = V4l2Source::yuyv_to_rgb(&yuyv, 6, 1);

    assert_eq!(rgb.len(), 6 * 3);
  }
}
