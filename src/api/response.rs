//! Success responses.
//!
//! A handler returns exactly one `Emit` value, so a response is written
//! once per request by construction.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A successful result paired with its status.
#[derive(Debug)]
pub enum Emit<T> {
    /// 200 with a JSON body
    Ok(T),
    /// 201 with a JSON body
    Created(T),
    /// 204 with an empty body
    NoContent,
}

impl<T> Emit<T> {
    pub fn status(&self) -> StatusCode {
        match self {
            Emit::Ok(_) => StatusCode::OK,
            Emit::Created(_) => StatusCode::CREATED,
            Emit::NoContent => StatusCode::NO_CONTENT,
        }
    }
}

impl<T: Serialize> IntoResponse for Emit<T> {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Emit::Ok(body) | Emit::Created(body) => (status, Json(body)).into_response(),
            Emit::NoContent => status.into_response(),
        }
    }
}
