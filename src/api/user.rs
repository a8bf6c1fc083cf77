//! User API handlers
//!
//! Every handler follows the same lifecycle: acquire a resource scope,
//! authorize when the operation requires it, decode the payload, call the
//! user domain, translate a domain error once, emit. The scope is dropped
//! on every return path, releasing the handle.

use crate::api::error::{ApiError, Diagnostic, Translate};
use crate::api::response::Emit;
use crate::context::RequestContext;
use crate::domain::{NewUser, Token, UpdateUser, User};
use crate::policy;
use crate::repository::ResourceScope;
use crate::service::UserDomain;
use crate::state::HasServices;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use axum_extra::{
    headers::{authorization::Basic, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};
use std::future::Future;

const LIST: &str = "user.list";
const RETRIEVE: &str = "user.retrieve";
const CREATE: &str = "user.create";
const UPDATE: &str = "user.update";
const DELETE: &str = "user.delete";
const TOKEN: &str = "user.token";

/// Run a domain call, short-circuiting if the request is cancelled first.
async fn call_domain<T, F>(
    ctx: &RequestContext,
    diagnostic: Diagnostic,
    call: F,
) -> Result<T, ApiError>
where
    F: Future<Output = crate::error::Result<T>>,
{
    tokio::select! {
        result = call => result.translate(diagnostic),
        _ = ctx.cancelled() => Err(ApiError::cancelled(diagnostic)),
    }
}

/// List users
#[tracing::instrument(name = "handlers.user.list", skip_all, fields(trace_id = %ctx.trace_id()))]
pub async fn list<S: HasServices>(
    State(state): State<S>,
    ctx: RequestContext,
) -> Result<Emit<Vec<User>>, ApiError> {
    let mut scope = ResourceScope::acquire(state.pool(), &ctx, LIST).await?;

    let users = call_domain(
        &ctx,
        Diagnostic::new(LIST),
        state.users().list(scope.handle()),
    )
    .await?;

    Ok(Emit::Ok(users))
}

/// Get user by ID. Callers may read themselves; admins may read anyone.
#[tracing::instrument(name = "handlers.user.retrieve", skip_all, fields(trace_id = %ctx.trace_id()))]
pub async fn retrieve<S: HasServices>(
    State(state): State<S>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Emit<User>, ApiError> {
    let mut scope = ResourceScope::acquire(state.pool(), &ctx, RETRIEVE).await?;

    policy::authorize_self_or_admin(ctx.claims(), &id)
        .map_err(|denial| ApiError::denied(denial, Diagnostic::new(RETRIEVE).with_target(&id)))?;

    let user = call_domain(
        &ctx,
        Diagnostic::new(RETRIEVE).with_target(&id),
        state.users().retrieve(scope.handle(), &id),
    )
    .await?;

    Ok(Emit::Ok(user))
}

/// Create user
#[tracing::instrument(name = "handlers.user.create", skip_all, fields(trace_id = %ctx.trace_id()))]
pub async fn create<S: HasServices>(
    State(state): State<S>,
    ctx: RequestContext,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<Emit<User>, ApiError> {
    let mut scope = ResourceScope::acquire(state.pool(), &ctx, CREATE).await?;

    let Json(new_user) =
        payload.map_err(|rejection| ApiError::bad_request(Diagnostic::new(CREATE), rejection.body_text()))?;

    let user = call_domain(
        &ctx,
        Diagnostic::new(CREATE),
        state.users().create(scope.handle(), &new_user, ctx.now()),
    )
    .await?;

    Ok(Emit::Created(user))
}

/// Update user. Only fields present in the payload are applied.
#[tracing::instrument(name = "handlers.user.update", skip_all, fields(trace_id = %ctx.trace_id()))]
pub async fn update<S: HasServices>(
    State(state): State<S>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Emit<()>, ApiError> {
    let mut scope = ResourceScope::acquire(state.pool(), &ctx, UPDATE).await?;

    let Json(upd) = payload.map_err(|rejection| {
        ApiError::bad_request(Diagnostic::new(UPDATE).with_target(&id), rejection.body_text())
    })?;

    call_domain(
        &ctx,
        Diagnostic::new(UPDATE).with_target(&id),
        state.users().update(scope.handle(), &id, &upd, ctx.now()),
    )
    .await?;

    Ok(Emit::NoContent)
}

/// Delete user
#[tracing::instrument(name = "handlers.user.delete", skip_all, fields(trace_id = %ctx.trace_id()))]
pub async fn delete<S: HasServices>(
    State(state): State<S>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Emit<()>, ApiError> {
    let mut scope = ResourceScope::acquire(state.pool(), &ctx, DELETE).await?;

    call_domain(
        &ctx,
        Diagnostic::new(DELETE).with_target(&id),
        state.users().delete(scope.handle(), &id),
    )
    .await?;

    Ok(Emit::NoContent)
}

/// Exchange an email/password pair, sent with Basic auth, for a token.
#[tracing::instrument(name = "handlers.user.token", skip_all, fields(trace_id = %ctx.trace_id()))]
pub async fn token<S: HasServices>(
    State(state): State<S>,
    ctx: RequestContext,
    credentials: Result<TypedHeader<Authorization<Basic>>, TypedHeaderRejection>,
) -> Result<Emit<Token>, ApiError> {
    let mut scope = ResourceScope::acquire(state.pool(), &ctx, TOKEN).await?;

    let TypedHeader(Authorization(basic)) =
        credentials.map_err(|_| ApiError::unauthenticated(Diagnostic::new(TOKEN)))?;

    let token = call_domain(
        &ctx,
        Diagnostic::new(TOKEN),
        state.users().authenticate(
            scope.handle(),
            state.jwt_manager(),
            ctx.now(),
            basic.username(),
            basic.password(),
        ),
    )
    .await?;

    Ok(Emit::Ok(token))
}
