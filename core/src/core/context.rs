// core/src/core/context.rs

//! The boxed handler type stored for every hook of every step.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// Future returned by a stored handler.
pub type HandlerFuture<Err> = Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>;

/// An async step handler.
///
/// A handler receives a clone of the run's [`ContextData`], reads its inputs
/// under short locks, does its I/O, writes its results back and tells the run
/// whether to go on. Lock guards must never be held across an `.await`.
pub type Handler<TData, Err> = Box<dyn Fn(ContextData<TData>) -> HandlerFuture<Err> + Send + Sync>;
