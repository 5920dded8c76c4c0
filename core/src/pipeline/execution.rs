// core/src/pipeline/execution.rs

//! `Pipeline::run()`: walks the steps in order and runs each hook phase.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::error::FlowError;
use crate::pipeline::definition::{Phase, Pipeline};
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// The first handler error aborts the run and is returned as is; a handler
  /// returning `Stop` ends the run with [`PipelineResult::Stopped`].
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(context_type = %std::any::type_name::<TData>(), num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = span!(Level::INFO, "pipeline_step", step_name, step_index = step_idx);

      if step_def.should_skip(&ctx_data) {
        event!(parent: &step_span, Level::DEBUG, "Step skipped by its skip condition.");
        continue;
      }

      if !self.has_any_handler(step_name) {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "Non-optional step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      for phase in Phase::ALL {
        let stopped = self
          .run_phase(step_name, phase, &ctx_data)
          .instrument(step_span.clone())
          .await?;
        if stopped {
          event!(parent: &step_span, Level::INFO, phase = phase.label(), "Pipeline stopped by a handler.");
          return Ok(PipelineResult::Stopped);
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  /// Returns `Ok(true)` when a handler asked to stop.
  async fn run_phase(&self, step_name: &str, phase: Phase, ctx_data: &ContextData<TData>) -> Result<bool, Err> {
    for handler_fn in self.handlers_for(step_name, phase) {
      match handler_fn(ctx_data.clone()).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => return Ok(true),
        Err(e) => {
          event!(Level::WARN, error = %e, phase = phase.label(), "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(false)
  }
}
