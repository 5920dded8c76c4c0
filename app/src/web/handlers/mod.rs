// app/src/web/handlers/mod.rs

pub mod auth_handlers;
pub mod card_handlers;
pub mod cart_handlers;
pub mod checkout_handlers;
pub mod product_handlers;
pub mod user_handlers;

use crate::errors::AppError;
use crate::state::AppState;
use cardshop_flow::{ContextData, PipelineResult};
use tracing::warn;

/// Runs the pipeline registered for `TData` and hands the context back on
/// completion. None of the pipelines stop early on success, so `Stopped`
/// is reported as an internal error.
pub(crate) async fn run_flow<TData>(app_state: &AppState, ctx_data: ContextData<TData>) -> Result<ContextData<TData>, AppError>
where
  TData: Send + Sync + 'static,
{
  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => Ok(ctx_data),
    PipelineResult::Stopped => {
      warn!(
        context_type = std::any::type_name::<TData>(),
        "Pipeline was stopped by a handler."
      );
      Err(AppError::Internal("operation was halted".to_string()))
    }
  }
}

/// Reads a value the pipeline was expected to fill in.
pub(crate) fn produced<TData, R>(
  ctx_data: &ContextData<TData>,
  what: &'static str,
  f: impl FnOnce(&TData) -> Option<R>,
) -> Result<R, AppError>
where
  TData: Send + Sync + 'static,
{
  ctx_data.with(f).ok_or_else(|| {
    warn!(what, "Pipeline completed without producing a value.");
    AppError::Internal(format!("{} missing after completion", what))
  })
}
