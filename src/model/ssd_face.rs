// 该文件是 Lianpu （脸谱） 项目的一部分。
// src/model/ssd_face.rs - SSD 人脸检测模型
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
use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::{debug, error, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectItem, DetectResult, Model},
};

const SSD_NUM_OUTPUTS: usize = 1;
/// 模型输入尺寸，宽 128 高 96
const SSD_INPUT_W: u32 = 128;
const SSD_INPUT_H: u32 = 96;
/// 各通道均值，BGR 顺序，第四个分量未使用
const SSD_MEAN: [f32; 4] = [104.0, 177.0, 123.0, 0.0];
/// 每条检测记录的浮点数个数:
/// [object_id, class_id, confidence, x_min, y_min, x_max, y_max]
const SSD_FIELDS: usize = 7;

type SsdPlan = TypedSimplePlan<TypedModel>;

pub struct SsdFace {
  plan: SsdPlan,
}

#[derive(Error, Debug)]
pub enum SsdFaceError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(anyhow::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理错误: {0}")]
  InferenceError(anyhow::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl SsdFaceError {
  pub fn invalid(msg: &str, e: anyhow::Error) -> Self {
    SsdFaceError::ModelInvalid(format!("{}: {}", msg, e))
  }
}

pub struct SsdFaceBuilder {
  model_path: String,
}

impl FromUrlWithScheme for SsdFaceBuilder {
  const SCHEME: &'static str = "ssd";
}

impl FromUrl for SsdFaceBuilder {
  type Error = SsdFaceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SsdFaceError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let model_path = urlencoding::decode(url.path())
      .map_err(|e| SsdFaceError::ModelPathError(e.to_string()))?
      .into_owned();

    Ok(SsdFaceBuilder { model_path })
  }
}

impl SsdFaceBuilder {
  pub fn build(self) -> Result<SsdFace, SsdFaceError> {
    info!("加载模型文件: {}", self.model_path);
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(SsdFaceError::ModelLoadError)?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(
          f32::datum_type(),
          tvec!(1, 3, SSD_INPUT_H as usize, SSD_INPUT_W as usize),
        ),
      )
      .map_err(|e| SsdFaceError::invalid("无法设置输入形状", e))?
      .into_optimized()
      .map_err(|e| SsdFaceError::invalid("无法优化模型", e))?
      .into_runnable()
      .map_err(|e| SsdFaceError::invalid("无法生成执行计划", e))?;
    info!("模型加载完成");

    let num_outputs = plan.model().outputs.len();
    if num_outputs != SSD_NUM_OUTPUTS {
      error!(
        "预期模型输出数量为 {}, 实际为 {}",
        SSD_NUM_OUTPUTS, num_outputs
      );
      return Err(SsdFaceError::ModelInvalid(format!(
        "预期模型输出数量为 {}, 实际为 {}",
        SSD_NUM_OUTPUTS, num_outputs
      )));
    }
    debug!("模型输出数量: {}", num_outputs);

    Ok(SsdFace { plan })
  }
}

/// 把帧缩放到模型输入尺寸，换成 BGR 通道顺序并减去各通道均值。
/// 不做归一化，模型吃的就是减完均值的原始幅值。
fn build_input(image: &RgbImage) -> Tensor {
  let resized = imageops::resize(image, SSD_INPUT_W, SSD_INPUT_H, FilterType::Triangle);

  tract_ndarray::Array4::from_shape_fn(
    (1, 3, SSD_INPUT_H as usize, SSD_INPUT_W as usize),
    |(_, channel, y, x)| {
      let pixel = resized.get_pixel(x as u32, y as u32);
      pixel[2 - channel] as f32 - SSD_MEAN[channel]
    },
  )
  .into()
}

/// 解码 SSD 的 detection_out 张量。
///
/// 张量是若干条 7 个浮点数的记录:
/// [object_id, class_id, confidence, x_min, y_min, x_max, y_max]，
/// 后四个是相对帧宽高的归一化坐标。
/// 置信度过滤是过滤器的职责，这里把所有记录原样保留。
fn decode_detections(rows: &[f32]) -> DetectResult {
  let mut items = Vec::with_capacity(rows.len() / SSD_FIELDS);

  for row in rows.chunks_exact(SSD_FIELDS) {
    items.push(DetectItem {
      class_id: row[1] as u32,
      score: row[2],
      bbox: [row[3], row[4], row[5], row[6]],
    });
  }

  debug!("检测到 {} 条记录", items.len());

  DetectResult {
    items: items.into_boxed_slice(),
  }
}

impl Model for SsdFace {
  type Input = Frame;
  type Output = DetectResult;
  type Error = SsdFaceError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    // 设置输入
    debug!("设置模型输入");
    let tensor = build_input(&input.image);

    // 执行推理
    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(SsdFaceError::InferenceError)?;

    // 获取输出
    debug!("获取模型输出");
    let rows = outputs
      .first()
      .ok_or_else(|| SsdFaceError::ModelInvalid("模型没有输出张量".to_string()))?
      .as_slice::<f32>()
      .map_err(|e| SsdFaceError::invalid("无法读取输出张量", e))?;

    Ok(decode_detections(rows))
  }
}
