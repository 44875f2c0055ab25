// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/bin/snap_continueshot.rs - 连续抓拍程序
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use lianpu::{
  FromUrl,
  filter::DetectionFilter,
  output::FaceSaver,
  task::{ContinuousSnapTask, Task},
  trigger::Trigger,
};
use tracing::info;

/// Lianpu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 抓拍保存目录
  #[arg(long, value_name = "DIR")]
  pub face_dir: PathBuf,
  /// 预览输出路径
  #[arg(long, value_name = "PREVIEW")]
  pub preview: Option<Url>,
  /// 置信度阈值
  #[arg(long, value_name = "SCORE")]
  pub score: Option<f32>,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("抓拍保存目录: {}", args.face_dir.display());

  let input = lianpu::input::InputWrapper::from_url(&args.input)?;
  let model = lianpu::model::SsdFaceBuilder::from_url(&args.model)?.build()?;
  let preview = args
    .preview
    .as_ref()
    .map(lianpu::output::OutputWrapper::from_url)
    .transpose()?;

  let mut task = ContinuousSnapTask::new(Trigger::from_stdin(), FaceSaver::new(&args.face_dir))
    .with_frame_number(args.frame_number);
  if let Some(score) = args.score {
    task = task.with_filter(DetectionFilter::with_threshold(score));
  }

  let captured = task.run_task(input, model, preview)?;
  info!("连续抓拍结束，共保存 {} 张人脸", captured);

  Ok(())
}
