// app/src/pipelines/account_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::NewUser;
use crate::pipelines::common_steps::{self, account_update_missed};
use crate::pipelines::contexts::{
  ChangeUserNameCtxData, ChangeUserPasswordCtxData, DeleteUserCtxData, SigninCtxData, SignupCtxData,
};
use crate::services::validation;
use cardshop_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{event, info, instrument, warn, Level};

pub fn register_signup_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<SignupCtxData, AppError>::new(&[
    ("validate_signup_input", false, None),
    ("check_existing_email", false, None),
    ("hash_password", false, None),
    ("create_user", false, None),
  ]);

  p.on_root("validate_signup_input", validate_signup_input);
  p.on_root("check_existing_email", check_existing_email);

  p.on_root("hash_password", |ctx_data: ContextData<SignupCtxData>| async move {
    let (credentials, password) = ctx_data.with(|d| (d.app_state.credentials.clone(), d.password.clone()));
    let hash = credentials.hash(password).await?;
    ctx_data.update(|d| d.password_hash = Some(hash));
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("create_user", |ctx_data: ContextData<SignupCtxData>| async move {
    let (store, new_user) = ctx_data.with(|d| {
      (
        d.app_state.store.clone(),
        d.password_hash.clone().map(|password_hash| NewUser {
          email: d.email.clone(),
          name: d.name.clone(),
          password_hash,
        }),
      )
    });
    let new_user = new_user.ok_or_else(|| AppError::Internal("create_user ran without a password hash".to_string()))?;

    let user = store.insert_user(new_user).await?;
    info!(user_id = %user.id, "User created.");
    ctx_data.update(|d| d.created_user = Some(user));
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  registry.register_pipeline(p);
  info!("Sign-up pipeline registered.");
}

#[instrument(name = "signup::validate_input", skip(ctx_data), err)]
async fn validate_signup_input(ctx_data: ContextData<SignupCtxData>) -> AppResult<PipelineControl> {
  let email = ctx_data.update(|d| {
    d.email = d.email.trim().to_lowercase();
    d.name = d.name.trim().to_string();
    d.email.clone()
  });
  event!(Level::DEBUG, email = %email, "Validating sign-up input.");

  ctx_data.with(|d| {
    validation::email(&d.email)?;
    validation::display_name(&d.name)?;
    validation::password("password", &d.password)?;
    validation::passwords_match(&d.password, &d.repeat_password)
  })?;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "signup::check_existing_email", skip(ctx_data), err)]
async fn check_existing_email(ctx_data: ContextData<SignupCtxData>) -> AppResult<PipelineControl> {
  let (store, email) = ctx_data.with(|d| (d.app_state.store.clone(), d.email.clone()));

  if store.find_user_by_email(&email).await?.is_some() {
    warn!(email = %email, "Sign-up with an already registered email.");
    return Err(AppError::Conflict("This email is already registered".to_string()));
  }
  Ok(PipelineControl::Continue)
}

pub fn register_signin_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<SigninCtxData, AppError>::new(&[
    ("load_user", false, None),
    ("verify_password", false, None),
    ("issue_session_token", false, None),
  ]);

  // Unknown email and wrong password both end in `InvalidCredential`.
  p.on_root("load_user", |ctx_data: ContextData<SigninCtxData>| async move {
    let (store, email) = ctx_data.update(|d| {
      d.email = d.email.trim().to_lowercase();
      (d.app_state.store.clone(), d.email.clone())
    });

    match store.find_user_by_email(&email).await? {
      Some(user) => {
        ctx_data.update(|d| d.user = Some(user));
        Ok::<_, AppError>(PipelineControl::Continue)
      }
      None => {
        event!(Level::DEBUG, email = %email, "Sign-in for unknown email.");
        Err(AppError::InvalidCredential)
      }
    }
  });

  p.on_root("verify_password", |ctx_data: ContextData<SigninCtxData>| async move {
    let (credentials, stored_hash, password) = ctx_data.with(|d| {
      (
        d.app_state.credentials.clone(),
        d.user.as_ref().map(|u| u.password_hash.clone()),
        d.password.clone(),
      )
    });
    let stored_hash = stored_hash.ok_or_else(|| AppError::Internal("verify_password ran before load_user".to_string()))?;

    credentials.require_match(stored_hash, password).await?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("issue_session_token", |ctx_data: ContextData<SigninCtxData>| async move {
    ctx_data.update(|d| {
      let user_id = d
        .user
        .as_ref()
        .map(|u| u.id)
        .ok_or_else(|| AppError::Internal("issue_session_token ran before load_user".to_string()))?;
      d.session_token = Some(d.app_state.sessions.issue(user_id)?);
      info!(%user_id, "Session issued.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  registry.register_pipeline(p);
  info!("Sign-in pipeline registered.");
}

pub fn register_change_user_password_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<ChangeUserPasswordCtxData, AppError>::new(&[
    ("ensure_own_account", false, None),
    ("validate_new_password", false, None),
    ("load_account", false, None),
    ("verify_account_password", false, None),
    ("replace_password", false, None),
  ]);

  p.on_root("ensure_own_account", common_steps::ensure_own_account::<ChangeUserPasswordCtxData>);

  p.on_root("validate_new_password", |ctx_data: ContextData<ChangeUserPasswordCtxData>| async move {
    ctx_data.with(|d| {
      validation::password("new_password", &d.new_password)?;
      validation::passwords_match(&d.new_password, &d.repeat_new_password)
    })?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("load_account", common_steps::load_account::<ChangeUserPasswordCtxData>);
  p.on_root(
    "verify_account_password",
    common_steps::verify_account_password::<ChangeUserPasswordCtxData>,
  );

  p.on_root("replace_password", |ctx_data: ContextData<ChangeUserPasswordCtxData>| async move {
    let (store, credentials, user_id, current_hash, new_password) = ctx_data.with(|d| {
      (
        d.app_state.store.clone(),
        d.app_state.credentials.clone(),
        d.user_id,
        d.user.as_ref().map(|u| u.password_hash.clone()),
        d.new_password.clone(),
      )
    });
    let current_hash =
      current_hash.ok_or_else(|| AppError::Internal("replace_password ran before load_account".to_string()))?;

    let new_hash = credentials.hash(new_password).await?;
    if store.replace_user_password(user_id, &current_hash, &new_hash).await? {
      info!(%user_id, "Login password changed.");
      Ok::<_, AppError>(PipelineControl::Continue)
    } else {
      Err(account_update_missed(store.as_ref(), user_id).await)
    }
  });

  registry.register_pipeline(p);
  info!("Change-user-password pipeline registered.");
}

pub fn register_change_user_name_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<ChangeUserNameCtxData, AppError>::new(&[
    ("ensure_own_account", false, None),
    ("validate_new_name", false, None),
    ("load_account", false, None),
    ("verify_account_password", false, None),
    ("rename", false, None),
  ]);

  p.on_root("ensure_own_account", common_steps::ensure_own_account::<ChangeUserNameCtxData>);

  p.on_root("validate_new_name", |ctx_data: ContextData<ChangeUserNameCtxData>| async move {
    ctx_data.update(|d| {
      d.new_name = d.new_name.trim().to_string();
      validation::display_name(&d.new_name)
    })?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("load_account", common_steps::load_account::<ChangeUserNameCtxData>);
  p.on_root(
    "verify_account_password",
    common_steps::verify_account_password::<ChangeUserNameCtxData>,
  );

  p.on_root("rename", |ctx_data: ContextData<ChangeUserNameCtxData>| async move {
    let (store, user_id, current_hash, new_name) = ctx_data.with(|d| {
      (
        d.app_state.store.clone(),
        d.user_id,
        d.user.as_ref().map(|u| u.password_hash.clone()),
        d.new_name.clone(),
      )
    });
    let current_hash = current_hash.ok_or_else(|| AppError::Internal("rename ran before load_account".to_string()))?;

    match store.rename_user(user_id, &current_hash, &new_name).await? {
      Some(user) => {
        info!(%user_id, "User renamed.");
        ctx_data.update(|d| d.renamed_user = Some(user));
        Ok::<_, AppError>(PipelineControl::Continue)
      }
      None => Err(account_update_missed(store.as_ref(), user_id).await),
    }
  });

  registry.register_pipeline(p);
  info!("Change-user-name pipeline registered.");
}

pub fn register_delete_user_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<DeleteUserCtxData, AppError>::new(&[
    ("ensure_own_account", false, None),
    ("load_account", false, None),
    ("verify_account_password", false, None),
    ("delete_account", false, None),
  ]);

  p.on_root("ensure_own_account", common_steps::ensure_own_account::<DeleteUserCtxData>);
  p.on_root("load_account", common_steps::load_account::<DeleteUserCtxData>);
  p.on_root("verify_account_password", common_steps::verify_account_password::<DeleteUserCtxData>);

  // Card, cart and cart items are removed with the user row.
  p.on_root("delete_account", |ctx_data: ContextData<DeleteUserCtxData>| async move {
    let (store, user_id, current_hash) = ctx_data.with(|d| {
      (
        d.app_state.store.clone(),
        d.user_id,
        d.user.as_ref().map(|u| u.password_hash.clone()),
      )
    });
    let current_hash =
      current_hash.ok_or_else(|| AppError::Internal("delete_account ran before load_account".to_string()))?;

    if store.delete_user(user_id, &current_hash).await? {
      info!(%user_id, "User deleted.");
      Ok::<_, AppError>(PipelineControl::Continue)
    } else {
      Err(account_update_missed(store.as_ref(), user_id).await)
    }
  });

  registry.register_pipeline(p);
  info!("Delete-user pipeline registered.");
}
