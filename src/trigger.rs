// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/trigger.rs - 抓拍触发
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

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{info, warn};

/// 抓拍状态机的状态，由任务循环逐帧驱动
///
/// Idle 等待预约；观察到触发信号的那一帧进入 Armed 并尝试抓拍；
/// 抓拍写盘成功进入 Completed，失败回到 Idle 等待重新预约。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
  #[default]
  Idle,
  Armed,
  Completed,
}

/// 触发信号的消费端，任务循环每帧轮询一次
#[derive(Debug)]
pub struct Trigger {
  armed: Arc<AtomicBool>,
}

/// 触发信号的设置端，可克隆后交给任意线程持有
#[derive(Debug, Clone)]
pub struct TriggerHandle {
  armed: Arc<AtomicBool>,
}

impl TriggerHandle {
  /// 预约一次抓拍。信号被消费前重复预约与预约一次等价。
  pub fn arm(&self) {
    self.armed.store(true, Ordering::Release);
  }
}

impl Trigger {
  /// 创建一对（设置端，消费端）
  pub fn pair() -> (TriggerHandle, Trigger) {
    let armed = Arc::new(AtomicBool::new(false));
    (
      TriggerHandle {
        armed: armed.clone(),
      },
      Trigger { armed },
    )
  }

  /// 从标准输入创建触发器，每读到一行预约一次抓拍
  pub fn from_stdin() -> Trigger {
    let (handle, trigger) = Trigger::pair();

    thread::spawn(move || {
      info!("回车键预约一次抓拍");
      let stdin = std::io::stdin();
      for line in stdin.lock().lines() {
        if line.is_err() {
          break;
        }
        handle.arm();
      }
      warn!("标准输入已关闭，不再接受抓拍预约");
    });

    trigger
  }

  /// 消费一次触发信号。
  ///
  /// 返回 true 表示本帧应当抓拍，同时清掉信号。
  /// 一次预约最多换来一次 true，直到重新预约为止后续都是 false。
  pub fn consume(&self) -> bool {
    self.armed.swap(false, Ordering::AcqRel)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn consume_clears_the_signal() {
    let (handle, trigger) = Trigger::pair();

    handle.arm();
    assert!(trigger.consume());
    assert!(!trigger.consume());
  }

  #[test]
  fn arming_twice_is_one_reservation() {
    let (handle, trigger) = Trigger::pair();

    handle.arm();
    handle.arm();
    assert!(trigger.consume());
    assert!(!trigger.consume());
  }

  #[test]
  fn rearming_after_consume_fires_again() {
    let (handle, trigger) = Trigger::pair();

    handle.arm();
    assert!(trigger.consume());
    handle.arm();
    assert!(trigger.consume());
  }

  #[test]
  fn unarmed_trigger_stays_silent() {
    let (_handle, trigger) = Trigger::pair();
    assert!(!trigger.consume());
  }

  #[test]
  fn handles_are_cloneable() {
    let (handle, trigger) = Trigger::pair();
    let other = handle.clone();

    other.arm();
    assert!(trigger.consume());
  }
}
