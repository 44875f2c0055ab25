// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/task.rs - 抓拍任务
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

use std::{thread, time::Duration};

use tracing::{debug, info, warn};

use crate::{
  crop::{CropError, crop_face},
  filter::{DetectionFilter, FaceBox},
  frame::Frame,
  input::InputError,
  model::{DetectResult, Model},
  output::{FaceSaver, Render, SavedFace},
  trigger::{CaptureState, Trigger},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  type Outcome;

  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Outcome, Self::Error>;
}

/// 抓拍：从未标注的原始帧裁剪人脸并写盘。
/// 本帧没有可用区域时按无效区域拒绝，绝不落一张空图。
fn capture(
  saver: &FaceSaver,
  frame: &Frame,
  bbox: Option<&FaceBox>,
) -> anyhow::Result<SavedFace> {
  let Some(bbox) = bbox else {
    return Err(
      CropError::InvalidBoundingBox {
        width: 0,
        height: 0,
      }
      .into(),
    );
  };

  let face = crop_face(&frame.image, bbox)?;
  Ok(saver.save(&face)?)
}

/// 单发抓拍任务
///
/// 逐帧推理并等待预约，完成一次抓拍后带着保存结果退出。
/// 视频流先结束则返回 None。
pub struct SnapTask {
  trigger: Trigger,
  saver: FaceSaver,
  filter: DetectionFilter,
}

impl SnapTask {
  pub fn new(trigger: Trigger, saver: FaceSaver) -> Self {
    Self {
      trigger,
      saver,
      filter: DetectionFilter::default(),
    }
  }

  pub fn with_filter(mut self, filter: DetectionFilter) -> Self {
    self.filter = filter;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<Frame, InputError>>,
  M: Model<Input = Frame, Output = DetectResult, Error = ME>,
  O: Render<Frame, Option<FaceBox>, Error = RE>,
> Task<I, M, O> for SnapTask
{
  type Error = anyhow::Error;
  type Outcome = Option<SavedFace>;

  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Outcome, Self::Error> {
    info!("开始任务...");
    let mut now = std::time::Instant::now();

    for frame in input {
      let frame = frame?;
      let result = model.infer(&frame)?;
      let bbox = self.filter.select(&result, frame.width(), frame.height());
      let elapsed_a = now.elapsed();

      let mut state = CaptureState::Idle;
      if self.trigger.consume() {
        debug!("收到抓拍预约");
        state = CaptureState::Armed;
      }

      let mut saved = None;
      if state == CaptureState::Armed {
        match capture(&self.saver, &frame, bbox.as_ref()) {
          Ok(face) => {
            state = CaptureState::Completed;
            saved = Some(face);
          }
          Err(e) => {
            warn!("抓拍失败，回到等待: {}", e);
            state = CaptureState::Idle;
          }
        }
      }

      output.render_result(&frame, &bbox)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      debug!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      if state == CaptureState::Completed
        && let Some(saved) = saved
      {
        info!("抓拍完成: {}", saved.path.display());
        return Ok(Some(saved));
      }
    }

    info!("视频流结束，没有抓拍");
    Ok(None)
  }
}

/// 连续抓拍任务
///
/// 一直运行到视频流结束或收到中断，每次预约完成一次抓拍，
/// 返回抓拍成功的次数。
pub struct ContinuousSnapTask {
  trigger: Trigger,
  saver: FaceSaver,
  filter: DetectionFilter,
  frame_number: Option<usize>,
}

impl ContinuousSnapTask {
  pub fn new(trigger: Trigger, saver: FaceSaver) -> Self {
    Self {
      trigger,
      saver,
      filter: DetectionFilter::default(),
      frame_number: None,
    }
  }

  pub fn with_filter(mut self, filter: DetectionFilter) -> Self {
    self.filter = filter;
    self
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<Frame, InputError>>,
  M: Model<Input = Frame, Output = DetectResult, Error = ME>,
  O: Render<Frame, Option<FaceBox>, Error = RE>,
> Task<I, M, O> for ContinuousSnapTask
{
  type Error = anyhow::Error;
  type Outcome = usize;

  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Outcome, Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    let handler = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = handler {
      // 同进程里第二个任务装不上处理器，降级继续跑
      warn!("无法设置 Ctrl-C 处理器: {}", e);
    }

    let mut captured = 0usize;
    let mut frame_index = 0;
    let mut now = std::time::Instant::now();
    for frame in input {
      let frame = frame?;
      frame_index = (frame_index + 1) % usize::MAX;
      debug!("处理第 {} 帧图像", frame_index);

      let result = model.infer(&frame)?;
      let bbox = self.filter.select(&result, frame.width(), frame.height());
      let elapsed_a = now.elapsed();

      let mut state = CaptureState::Idle;
      if self.trigger.consume() {
        debug!("收到抓拍预约");
        state = CaptureState::Armed;
      }

      if state == CaptureState::Armed {
        match capture(&self.saver, &frame, bbox.as_ref()) {
          Ok(saved) => {
            state = CaptureState::Completed;
            captured += 1;
            info!("抓拍完成: {}", saved.path.display());
          }
          Err(e) => {
            warn!("抓拍失败，回到等待: {}", e);
            state = CaptureState::Idle;
          }
        }
      }

      output.render_result(&frame, &bbox)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      debug!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      if state == CaptureState::Completed {
        debug!("状态机回到等待，接受下一次预约");
      }

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共抓拍 {} 次", captured);
    Ok(captured)
  }
}
