//! Caller identity forwarded by the upstream identity provider.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{Requester, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reads the caller from `X-User-Id` / `X-User-Role`.
///
/// A missing role means `customer`; an unknown one is rejected.
fn requester(headers: &HeaderMap) -> Result<Option<Requester>, ApiError> {
    let Some(user_id) = header(headers, USER_ID_HEADER) else {
        return Ok(None);
    };
    let role = match header(headers, USER_ROLE_HEADER) {
        Some(role) => role.parse::<Role>().map_err(|_| ApiError::Unauthenticated)?,
        None => Role::default(),
    };
    Ok(Some(Requester::new(user_id, role)))
}

/// An authenticated caller. Rejects with 401 when no identity is present.
#[derive(Debug, Clone)]
pub struct Caller(pub Requester);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        requester(&parts.headers)?
            .map(Caller)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// A caller who may be anonymous.
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<Requester>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        requester(&parts.headers).map(MaybeCaller)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn anonymous_without_user_id() {
        assert!(requester(&headers(&[])).unwrap().is_none());
        assert!(
            requester(&headers(&[(USER_ROLE_HEADER, "admin")]))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn role_defaults_to_customer() {
        let caller = requester(&headers(&[(USER_ID_HEADER, "u-1")]))
            .unwrap()
            .unwrap();
        assert_eq!(caller.user_id.as_str(), "u-1");
        assert!(!caller.is_admin());
    }

    #[test]
    fn admin_role_is_read() {
        let caller = requester(&headers(&[(USER_ID_HEADER, "root"), (USER_ROLE_HEADER, "Admin")]))
            .unwrap()
            .unwrap();
        assert!(caller.is_admin());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = requester(&headers(&[(USER_ID_HEADER, "u-1"), (USER_ROLE_HEADER, "root")]))
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }
}
