// tests/error_handling_tests.rs
mod common;
use cardshop_flow::{ContextData, FlowError, Pipeline, PipelineControl};
use common::*;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_pipeline_run_catches_handler_missing() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[("missing", false, None)]);
  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  match result.unwrap_err() {
    TestError::Flow(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("Expected TestError::Flow(HandlerMissing), got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_pipeline_with_flow_error_type() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, FlowError>::new(&[("task", false, None)]);

  pipeline.on_root("task", |ctx: ContextData<TestContext>| async move {
    ctx.write().counter = 1;
    Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
  });

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().counter, 1);

  let mut failing_pipeline = Pipeline::<TestContext, FlowError>::new(&[("fail_task", false, None)]);
  failing_pipeline.on_root("fail_task", |_ctx| async move {
    Err::<PipelineControl, _>(FlowError::Internal("Intentional flow error".to_string()))
  });
  let fail_result = failing_pipeline.run(ContextData::new(TestContext::default())).await;
  match fail_result.unwrap_err() {
    FlowError::Internal(s) => assert_eq!(s, "Intentional flow error"),
    other => panic!("Expected FlowError::Internal, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_anyhow_errors_become_handler_errors() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, FlowError>::new(&[("task", false, None)]);
  pipeline.on_root("task", |_ctx| async move {
    Err::<PipelineControl, FlowError>(anyhow::anyhow!("downstream unavailable").into())
  });

  let err = pipeline.run(ContextData::new(TestContext::default())).await.unwrap_err();
  assert!(matches!(err, FlowError::HandlerError { .. }));
  assert!(err.to_string().contains("downstream unavailable"));
}
