// tests/card_tests.rs
mod common;

use cardshop::errors::AppError;
use cardshop::pipelines::contexts::{ChangeCardPasswordCtxData, CreateCardCtxData, DeleteCardCtxData, DepositCtxData};
use cardshop::state::AppState;
use cardshop_flow::ContextData;
use common::{test_env, CARD_PASSWORD, USER_PASSWORD};
use uuid::Uuid;

fn create_ctx(state: &AppState, user_id: Uuid, user_password: &str, card_password: &str, repeat: &str) -> ContextData<CreateCardCtxData> {
  ContextData::new(CreateCardCtxData {
    app_state: state.clone(),
    user_id,
    user_password: user_password.to_string(),
    card_password: card_password.to_string(),
    repeat_card_password: repeat.to_string(),
    card: None,
  })
}

async fn deposit(state: &AppState, user_id: Uuid, card_password: &str, amount_cents: i64) -> Result<i64, AppError> {
  let ctx = ContextData::new(DepositCtxData {
    app_state: state.clone(),
    user_id,
    card_password: card_password.to_string(),
    amount_cents,
    card: None,
    new_balance_cents: None,
  });
  state.flows.run(ctx.clone()).await?;
  Ok(ctx.with(|d| d.new_balance_cents).expect("balance set"))
}

#[tokio::test]
async fn create_card_starts_at_zero_and_is_unique_per_user() {
  let env = test_env();
  let user = env.user("card@example.com").await;

  let ctx = create_ctx(&env.state, user.id, USER_PASSWORD, CARD_PASSWORD, CARD_PASSWORD);
  env.state.flows.run(ctx.clone()).await.unwrap();
  let card = ctx.with(|d| d.card.clone()).expect("card created");
  assert_eq!(card.balance_cents, 0);
  assert_eq!(card.number.len(), 16);
  assert!(card.number.chars().all(|c| c.is_ascii_digit()));

  let again = create_ctx(&env.state, user.id, USER_PASSWORD, CARD_PASSWORD, CARD_PASSWORD);
  let err = env.state.flows.run(again).await.unwrap_err();
  assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn create_card_checks_passwords() {
  let env = test_env();
  let user = env.user("checks@example.com").await;

  let mismatch = create_ctx(&env.state, user.id, USER_PASSWORD, CARD_PASSWORD, "Other#pass1");
  assert!(matches!(env.state.flows.run(mismatch).await, Err(AppError::Validation(_))));

  let wrong_login = create_ctx(&env.state, user.id, "Wrong#pass1", CARD_PASSWORD, CARD_PASSWORD);
  assert!(matches!(env.state.flows.run(wrong_login).await, Err(AppError::InvalidCredential)));

  let too_short = create_ctx(&env.state, user.id, USER_PASSWORD, "short", "short");
  assert!(matches!(env.state.flows.run(too_short).await, Err(AppError::Validation(_))));

  assert!(env.state.store.find_card_by_user(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn deposit_adds_to_balance() {
  let env = test_env();
  let user = env.user("deposit@example.com").await;
  env.card(user.id, 0).await;

  assert_eq!(deposit(&env.state, user.id, CARD_PASSWORD, 2_500).await.unwrap(), 2_500);
  assert_eq!(deposit(&env.state, user.id, CARD_PASSWORD, 500).await.unwrap(), 3_000);
  assert_eq!(env.balance(user.id).await, 3_000);
}

#[tokio::test]
async fn deposit_rejects_bad_amounts_and_passwords() {
  let env = test_env();
  let user = env.user("reject@example.com").await;
  env.card(user.id, 100).await;

  for amount in [0, -5, 1_000_001] {
    let err = deposit(&env.state, user.id, CARD_PASSWORD, amount).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)), "amount {amount}");
  }
  let err = deposit(&env.state, user.id, "Wrong#pass1", 10).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidCredential));
  assert_eq!(env.balance(user.id).await, 100);
}

#[tokio::test]
async fn deposit_without_card_is_not_found() {
  let env = test_env();
  let user = env.user("nocard@example.com").await;
  let err = deposit(&env.state, user.id, CARD_PASSWORD, 10).await.unwrap_err();
  assert!(matches!(err, AppError::NotFound("card")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deposits_are_all_applied() {
  let env = test_env();
  let user = env.user("concurrent@example.com").await;
  env.card(user.id, 1_000).await;

  let handles: Vec<_> = (0..16)
    .map(|_| {
      let state = env.state.clone();
      let user_id = user.id;
      tokio::spawn(async move { deposit(&state, user_id, CARD_PASSWORD, 250).await })
    })
    .collect();
  for result in futures_util::future::join_all(handles).await {
    result.expect("task panicked").expect("deposit failed");
  }

  assert_eq!(env.balance(user.id).await, 1_000 + 16 * 250);
}

#[tokio::test]
async fn change_password_replaces_the_old_one() {
  let env = test_env();
  let user = env.user("rotate@example.com").await;
  env.card(user.id, 0).await;
  let new_password = "New#pass22";

  let change = |old: &str, new: &str, repeat: &str| {
    ContextData::new(ChangeCardPasswordCtxData {
      app_state: env.state.clone(),
      user_id: user.id,
      old_card_password: old.to_string(),
      new_card_password: new.to_string(),
      repeat_new_card_password: repeat.to_string(),
      card: None,
    })
  };

  let err = env.state.flows.run(change("Wrong#pass1", new_password, new_password)).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidCredential));
  let err = env.state.flows.run(change(CARD_PASSWORD, new_password, "Typo#pass22")).await.unwrap_err();
  assert!(matches!(err, AppError::Validation(_)));

  env.state.flows.run(change(CARD_PASSWORD, new_password, new_password)).await.unwrap();
  assert!(matches!(
    deposit(&env.state, user.id, CARD_PASSWORD, 10).await,
    Err(AppError::InvalidCredential)
  ));
  assert_eq!(deposit(&env.state, user.id, new_password, 10).await.unwrap(), 10);
}

#[tokio::test]
async fn delete_card_needs_the_card_password() {
  let env = test_env();
  let user = env.user("delete@example.com").await;
  env.card(user.id, 700).await;

  let delete = |password: &str| {
    ContextData::new(DeleteCardCtxData {
      app_state: env.state.clone(),
      user_id: user.id,
      card_password: password.to_string(),
      card: None,
    })
  };

  let err = env.state.flows.run(delete("Wrong#pass1")).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidCredential));
  assert!(env.state.store.find_card_by_user(user.id).await.unwrap().is_some());

  env.state.flows.run(delete(CARD_PASSWORD)).await.unwrap();
  assert!(env.state.store.find_card_by_user(user.id).await.unwrap().is_none());

  let err = env.state.flows.run(delete(CARD_PASSWORD)).await.unwrap_err();
  assert!(matches!(err, AppError::NotFound("card")));
}
