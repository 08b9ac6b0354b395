//! Gateway routes, mounted under the gateway base path.

mod email;
mod params;

pub use params::{LoginQuery, MergeParams, Params, StartEmailParams, TokenParams};

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use authgate_core::ProviderKind;

use crate::auth::{CallbackParams, LoginOutcome, authenticate, complete_login};
use crate::error::AuthError;
use crate::pages::{self, ClientProps, CommonProps, LoginPageProps, LoginProviders, ProviderProps};
use crate::server::GatewayState;
use crate::session::{CurrentSession, Session, with_cookie};

/// Build the gateway router for the configured providers.
pub fn gateway_routes(state: &GatewayState) -> Router<Arc<GatewayState>> {
    let mut router = Router::new()
        .route("/login", get(login_page))
        .route("/client-config", get(client_config))
        .route("/me", get(me))
        .route("/health", get(health_handler));

    for kind in state.providers.kinds() {
        router = router.route(
            &format!("/oauth2-result-{kind}"),
            get(oauth_result).post(oauth_result).layer(Extension(kind)),
        );
    }

    if state.email.is_some() {
        router = router
            .route("/start-auth-email", post(email::start_auth_email))
            .route(
                "/auth-token",
                get(email::consume_email_token).post(email::consume_email_token),
            );
    }

    router.fallback(not_found)
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    let location = HeaderValue::try_from(location).unwrap_or(HeaderValue::from_static("/"));
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

fn client_props(
    state: &GatewayState,
    headers: &HeaderMap,
    session: &mut Session,
    query: LoginQuery,
) -> Result<ClientProps, AuthError> {
    let app_url = state.require_app_url(headers)?.to_string();
    let auth_state = session.ensure_auth_state().to_string();

    let oauth: BTreeMap<String, ProviderProps> = state
        .providers
        .web_login_providers()
        .into_iter()
        .map(|provider| {
            let kind = provider.kind();
            let redirect_uri = state.redirect_uri(&app_url, kind);
            (
                kind.to_string(),
                ProviderProps {
                    request: provider.describe_authorization_request(&redirect_uri),
                    auth_state: auth_state.clone(),
                },
            )
        })
        .collect();

    Ok(ClientProps {
        common_props: CommonProps {
            app_url: Some(app_url),
            app_title: state.config.app_title.clone(),
            app_gateway_relative_uri: state.config.app_gateway_relative_uri.clone(),
            support_link: state.config.support_link.clone(),
        },
        login_page_props: LoginPageProps {
            providers: LoginProviders {
                email: state.email.is_some(),
                phone: false,
                oauth,
            },
            step: query.step,
            entered_email: query.entered_email,
            original_url: query.original_url.or_else(|| session.original_url.clone()),
        },
    })
}

async fn login_page(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    CurrentSession { handle, mut session }: CurrentSession,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AuthError> {
    let props = client_props(&state, &headers, &mut session, query)?;
    let cookie = state.save_session(&handle, session).await?;
    Ok(with_cookie(cookie, Html(pages::login_page(&props))))
}

async fn client_config(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    CurrentSession { handle, mut session }: CurrentSession,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AuthError> {
    let props = client_props(&state, &headers, &mut session, query)?;
    let cookie = state.save_session(&handle, session).await?;
    Ok(with_cookie(cookie, Json(props)))
}

async fn me(CurrentSession { session, .. }: CurrentSession) -> Json<serde_json::Value> {
    Json(
        session
            .authenticated_user
            .and_then(|user| serde_json::to_value(user).ok())
            .unwrap_or_else(|| serde_json::json!({})),
    )
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn not_found() -> AuthError {
    AuthError::NotFound
}

async fn oauth_result(
    State(state): State<Arc<GatewayState>>,
    Extension(kind): Extension<ProviderKind>,
    headers: HeaderMap,
    CurrentSession { handle, session }: CurrentSession,
    Params(params): Params<CallbackParams>,
) -> Result<Response, AuthError> {
    let provider = state.providers.get(kind).ok_or(AuthError::NotFound)?;
    let app_url = state.require_app_url(&headers)?;
    let redirect_uri = state.redirect_uri(app_url, kind);

    let identity = authenticate(provider.as_ref(), &session, &params, &redirect_uri).await?;

    match complete_login(session, identity, &state.authorizer, None) {
        (LoginOutcome::Denied, _) => Err(AuthError::Unauthorized),
        (LoginOutcome::Redirect(target), session) => {
            let cookie = state.rotate_session(handle, session).await?;
            Ok(with_cookie(cookie, found(&target)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found() {
        let response = found("/dashboard?x=1");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/dashboard?x=1");
    }

    #[test]
    fn test_found_rejects_invalid_header() {
        let response = found("/bad\nheader");
        assert_eq!(response.headers()[LOCATION], "/");
    }
}
