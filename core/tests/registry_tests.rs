// tests/registry_tests.rs
mod common;

use cardshop_flow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult, Registry};
use common::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextAlpha {
  val: String,
}
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextBeta {
  num: i32,
}

#[tokio::test]
async fn test_registry_run_correct_pipeline() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  let mut p_alpha = Pipeline::<RegistryContextAlpha, TestError>::new(&[("alpha_task", false, None)]);
  p_alpha.on_root("alpha_task", |ctx: ContextData<RegistryContextAlpha>| async move {
    ctx.write().val = "alpha_processed".to_string();
    Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
  });
  registry.register_pipeline(p_alpha);

  let mut p_beta = Pipeline::<RegistryContextBeta, TestError>::new(&[("beta_task", false, None)]);
  p_beta.on_root("beta_task", |ctx: ContextData<RegistryContextBeta>| async move {
    ctx.write().num = 100;
    Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
  });
  registry.register_pipeline(p_beta);

  assert!(registry.is_registered::<RegistryContextAlpha>());
  assert!(registry.is_registered::<RegistryContextBeta>());

  let ctx_alpha = ContextData::new(RegistryContextAlpha::default());
  let res_alpha = registry.run(ctx_alpha.clone()).await;
  assert_eq!(res_alpha.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx_alpha.read().val, "alpha_processed");

  let ctx_beta = ContextData::new(RegistryContextBeta::default());
  let res_beta = registry.run(ctx_beta.clone()).await;
  assert_eq!(res_beta.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx_beta.read().num, 100);
}

#[tokio::test]
async fn test_registry_pipeline_not_found() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  #[derive(Clone, Debug, Default)]
  struct UnregisteredContext;

  let result = registry.run(ContextData::new(UnregisteredContext)).await;

  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("NotRegistered"));
      assert!(s.contains("UnregisteredContext"));
    }
    other => panic!("Expected FlowError::NotRegistered, got {:?}", other),
  }
}

#[tokio::test]
async fn test_registry_pipeline_itself_errors() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  let mut p_alpha = Pipeline::<RegistryContextAlpha, TestError>::new(&[("alpha_fail", false, None)]);
  p_alpha.on_root("alpha_fail", |_ctx: ContextData<RegistryContextAlpha>| async move {
    Err::<PipelineControl, _>(TestError::Handler("Alpha pipeline failed".to_string()))
  });
  registry.register_pipeline(p_alpha);

  let res_alpha = registry.run(ContextData::new(RegistryContextAlpha::default())).await;
  assert_eq!(
    res_alpha.unwrap_err(),
    TestError::Handler("Alpha pipeline failed".to_string())
  );
}

#[tokio::test]
async fn test_registry_re_registration_replaces_pipeline() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  let mut first = Pipeline::<RegistryContextBeta, TestError>::new(&[("task", false, None)]);
  first.on_root("task", |ctx: ContextData<RegistryContextBeta>| async move {
    ctx.write().num = 1;
    Ok::<_, TestError>(PipelineControl::Continue)
  });
  registry.register_pipeline(first);

  let mut second = Pipeline::<RegistryContextBeta, TestError>::new(&[("task", false, None)]);
  second.on_root("task", |ctx: ContextData<RegistryContextBeta>| async move {
    ctx.write().num = 2;
    Ok::<_, TestError>(PipelineControl::Continue)
  });
  registry.register_pipeline(second);

  let ctx = ContextData::new(RegistryContextBeta::default());
  registry.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().num, 2);
}

#[tokio::test]
async fn test_registry_with_flow_error_default() {
  setup_tracing();
  let registry: Registry = Registry::new();

  #[derive(Clone, Debug, Default)]
  struct SimpleCtx {
    count: i32,
  }

  let mut pipeline = Pipeline::<SimpleCtx, FlowError>::new(&[("task", false, None)]);
  pipeline.on_root("task", |ctx: ContextData<SimpleCtx>| async move {
    ctx.write().count = 1;
    Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
  });
  registry.register_pipeline(pipeline);

  let ctx = ContextData::new(SimpleCtx::default());
  registry.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().count, 1);
}
