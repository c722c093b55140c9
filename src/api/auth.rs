//! Caller identity from gateway-injected headers.
//!
//! Authentication happens upstream. The gateway forwards the user id and role
//! in `X-User-Id` and `X-User-Role`; requests lacking either are rejected
//! with 401 before reaching a handler.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    api::error::Unauthorized,
    core::principal::{Principal, Role},
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, Unauthorized> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| Unauthorized(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| Unauthorized(format!("{name} header is not valid text")))
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)?
            .trim()
            .parse::<i64>()
            .map_err(|_| Unauthorized(format!("{USER_ID_HEADER} must be an integer")))?;
        let role = header(parts, USER_ROLE_HEADER)?
            .trim()
            .parse::<Role>()
            .map_err(|e| Unauthorized(e.to_string()))?;
        Ok(Self::new(id, role))
    }
}
