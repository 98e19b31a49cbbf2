// 该文件是 Toulan （投篮） 项目的一部分。
// src/task.rs - 分析任务
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

use std::{future::Future, sync::Arc};

use tracing::{error, info, warn};

use crate::{
  analysis::{AnalysisResult, Metric},
  input::VideoSource,
  model::PoseModel,
  output::Render,
  sampler::SampledClip,
  session::{Session, SessionConfig},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> impl Future<Output = Result<(), Self::Error>>;
}

/// 一次性分析：加载 → 采样 → 分析 → 输出
#[derive(Debug, Default)]
pub struct ShotAnalysisTask {
  config: SessionConfig,
  interruptible: bool,
}

impl ShotAnalysisTask {
  pub fn new(config: SessionConfig) -> Self {
    Self {
      config,
      interruptible: false,
    }
  }

  /// 收到 Ctrl-C 时取消采样，进程内只能启用一次
  pub fn interruptible(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }
}

fn log_result(result: &AnalysisResult) {
  info!("总分: {}% - {}", result.overall_score, result.description());
  for metric in Metric::ALL {
    let m = result.metric(metric);
    info!(
      "{}: {} (得分 {:.0}) {}",
      metric.label(),
      m.display_value(metric),
      m.score,
      m.feedback
    );
  }
  for (i, tip) in result.tips.iter().enumerate() {
    info!("建议 {}: {}", i + 1, tip);
  }
}

impl<I, M, O, RE> Task<I, M, Vec<O>> for ShotAnalysisTask
where
  I: VideoSource + 'static,
  M: PoseModel + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<SampledClip, AnalysisResult, Error = RE>,
{
  type Error = anyhow::Error;

  async fn run_task(self, input: I, model: M, outputs: Vec<O>) -> Result<(), Self::Error> {
    info!("开始任务...");
    let mut session = Session::new(self.config);
    session.attach_estimator(Arc::new(model));
    session.load_video(Box::new(input)).inspect_err(|e| error!("{}", e.user_message()))?;

    let job = session
      .begin_analysis()?
      .ok_or_else(|| anyhow::anyhow!("分析已在进行"))?;
    if self.interruptible {
      let cancel = job.cancel_flag();
      ctrlc::set_handler(move || {
        warn!("收到中断信号，取消分析...");
        cancel.cancel();
      })?;
    }

    let now = std::time::Instant::now();
    let mut last = None;
    let outcome = job
      .run(&mut |percent: u8| {
        if last != Some(percent) {
          info!("采样进度: {}%", percent);
          last = Some(percent);
        }
      })
      .await;
    info!("采样结束，耗时: {:.2?}", now.elapsed());

    let completed = session
      .complete_analysis(outcome)
      .inspect_err(|e| error!("{}", e.user_message()))?
      .is_some();
    if !completed {
      anyhow::bail!("分析结果已被丢弃");
    }

    let (Some(clip), Some(result)) = (session.clip(), session.result()) else {
      anyhow::bail!("会话中没有分析结果");
    };
    log_result(result);

    for output in &outputs {
      output.render_result(clip, result)?;
    }
    info!("任务完成，退出");
    Ok(())
  }
}
