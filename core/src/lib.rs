// core/src/lib.rs

//! cardshop-flow: async, type-safe step pipelines.
//!
//!  - Named steps with before/on/after hooks.
//!  - Asynchronous handlers over a shared `ContextData<T>`.
//!  - Early stop, optional steps and per-step skip conditions.
//!  - A type-keyed registry that dispatches on the context type.
//!
//! ```text
//! 1. Define a context struct `MyCtx` for one operation.
//! 2. Build a `Pipeline<MyCtx, MyErr>` with its ordered steps.
//! 3. Attach handlers with `before_root`, `on_root`, `after_root`.
//! 4. Register it in a `Registry<MyErr>`.
//! 5. `registry.run(ContextData::new(ctx)).await`.
//! ```

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context::{Handler, HandlerFuture};
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{skip_when, SkipCondition, StepDef};

pub use crate::pipeline::definition::{Phase, Pipeline};

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::Registry;
