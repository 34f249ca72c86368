use crate::models::Visitor;
use crate::services::auth;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Deserialize)]
struct TokenQuery {
    oauth_token: Option<String>,
}

/// The visitor behind a request. Anonymous requests are guests; a token that
/// does not resolve is rejected with 401.
pub struct CurrentVisitor(pub Visitor);

impl FromRequestParts<Arc<AppState>> for CurrentVisitor {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let state = state.clone();
        let header_token = parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().to_string());
        let query_token = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.oauth_token)
            .filter(|t| !t.is_empty());

        Box::pin(async move {
            let token = header_token.or(query_token);
            let visitor = auth::resolve_visitor(&state.db, token.as_deref())?
                .ok_or_else(|| ApiError::Unauthorized("Invalid or unknown access token.".to_string()))?;
            Ok(CurrentVisitor(visitor))
        })
    }
}
