// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use thiserror::Error;

use crate::{
  FromUrl, FromUrlWithScheme,
  filter::FaceBox,
  frame::Frame,
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 预览输出，把画了人脸框的帧写进按日期分层的目录
///
/// 默认只记录有人脸框的帧；`?always` 连没有框的帧也记录；
/// `?record` 额外写一个同名 JSON，记下框的几何。
/// URL 形如 `folder:///var/cache/preview?always&record`。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counters: Arc<Mutex<u16>>,
  always: bool,
  record: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let record = uri.query_pairs().any(|(k, _)| k == "record");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: Draw::default(),
      frame_counters: Arc::new(Mutex::new(0)),
      always,
      record,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self.frame_counters.lock().unwrap();
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn frame_path(&self) -> Result<PathBuf, std::io::Error> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<Frame, Option<FaceBox>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &Option<FaceBox>) -> Result<(), Self::Error> {
    if !self.always && result.is_none() {
      return Ok(());
    }

    let path = self.frame_path()?;
    let display = self.draw.annotate(&frame.image, result.as_ref());
    display.save(&path)?;

    if self.record {
      let geometry = match result {
        Some(bbox) => serde_json::json!({
          "frame": frame.index,
          "box": [bbox.left, bbox.top, bbox.right, bbox.bottom],
        }),
        None => serde_json::json!({
          "frame": frame.index,
          "box": null,
        }),
      };
      std::fs::write(path.with_extension("json"), geometry.to_string())?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use url::Url;

  fn collect_files(root: &std::path::Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files
  }

  fn frame() -> Frame {
    Frame::new(RgbImage::new(64, 48), 3, 0)
  }

  fn bbox() -> Option<FaceBox> {
    Some(FaceBox {
      left: 4,
      top: 4,
      right: 32,
      bottom: 32,
    })
  }

  #[test]
  fn url_flags_are_parsed() {
    let uri = Url::parse("folder:///tmp/preview?always&record").unwrap();
    let output = DirectoryRecordOutput::from_url(&uri).unwrap();

    assert!(output.always);
    assert!(output.record);
    assert_eq!(output.directory, PathBuf::from("/tmp/preview"));
  }

  #[test]
  fn frames_with_faces_are_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let uri = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&uri).unwrap();

    output.render_result(&frame(), &bbox()).unwrap();

    let files = collect_files(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension().unwrap(), "png");
  }

  #[test]
  fn faceless_frames_are_skipped_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let uri = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&uri).unwrap();

    output.render_result(&frame(), &None).unwrap();

    assert!(collect_files(dir.path()).is_empty());
  }

  #[test]
  fn always_records_faceless_frames_too() {
    let dir = tempfile::tempdir().unwrap();
    let uri = Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&uri).unwrap();

    output.render_result(&frame(), &None).unwrap();

    assert_eq!(collect_files(dir.path()).len(), 1);
  }

  #[test]
  fn record_writes_geometry_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let uri = Url::parse(&format!("folder://{}?record", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&uri).unwrap();

    output.render_result(&frame(), &bbox()).unwrap();

    let mut files = collect_files(dir.path());
    files.sort();
    assert_eq!(files.len(), 2);

    let json = files
      .iter()
      .find(|p| p.extension().unwrap() == "json")
      .unwrap();
    let text = std::fs::read_to_string(json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["frame"], 3);
    assert_eq!(value["box"][0], 4);
    assert_eq!(value["box"][3], 32);
  }
}
