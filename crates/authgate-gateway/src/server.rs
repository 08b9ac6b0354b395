//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, HeaderValue};
use tower_http::trace::TraceLayer;

use authgate_core::{Authorizer, Config, ProviderKind};
use authgate_providers::{EmailProvider, OAuthProvider, ProviderRegistry};

use crate::GatewayError;
use crate::app_url::AppUrl;
use crate::error::{AuthError, localize_error_pages};
use crate::gate::session_gate;
use crate::middleware::EmailRateLimiter;
use crate::routes::gateway_routes;
use crate::session::{
    CurrentSession, MemorySessionStore, Session, SessionError, SessionHandle, SessionStore,
    extract_session_id, session_cookie,
};
use crate::upstream::{UpstreamTarget, forward};

/// How often expired in-memory sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Gateway state shared across handlers.
pub struct GatewayState {
    /// Effective configuration.
    pub config: Config,
    /// Public application URL.
    pub app_url: AppUrl,
    /// Allow-list.
    pub authorizer: Authorizer,
    /// Configured OAuth providers.
    pub providers: ProviderRegistry,
    /// E-mail magic-link provider, if enabled.
    pub email: Option<EmailProvider>,
    /// Session storage.
    pub sessions: Arc<dyn SessionStore>,
    /// Login e-mail limiter.
    pub email_limiter: EmailRateLimiter,
    /// Where authenticated requests go.
    pub upstream: UpstreamTarget,
}

impl GatewayState {
    /// Load the caller's session, or start an empty one.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn load_session(&self, headers: &HeaderMap) -> Result<CurrentSession, SessionError> {
        if let Some(id) = extract_session_id(headers, &self.config.session.cookie_name) {
            if let Some(session) = self.sessions.load(&id).await? {
                return Ok(CurrentSession {
                    handle: SessionHandle { id, fresh: false },
                    session,
                });
            }
        }
        Ok(CurrentSession {
            handle: SessionHandle::fresh(),
            session: Session::default(),
        })
    }

    /// Persist a session. Returns the cookie to set when the client does not
    /// have it yet.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn save_session(
        &self,
        handle: &SessionHandle,
        session: Session,
    ) -> Result<Option<HeaderValue>, AuthError> {
        self.sessions.save(&handle.id, session).await?;
        Ok(if handle.fresh {
            Some(self.cookie_for(handle)?)
        } else {
            None
        })
    }

    /// Persist a session under a new id and drop the old one.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn rotate_session(
        &self,
        handle: SessionHandle,
        session: Session,
    ) -> Result<Option<HeaderValue>, AuthError> {
        if !handle.fresh {
            self.sessions.remove(&handle.id).await?;
        }
        self.save_session(&SessionHandle::fresh(), session).await
    }

    /// Session cookie for `handle` with a full `Max-Age`.
    pub(crate) fn cookie_for(&self, handle: &SessionHandle) -> Result<HeaderValue, AuthError> {
        let cookie = session_cookie(
            &self.config.session.cookie_name,
            &handle.id,
            self.config.session.ttl_secs,
            self.app_url.is_https(),
        );
        HeaderValue::from_str(&cookie).map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Public application URL for this request.
    ///
    /// # Errors
    ///
    /// Returns error if no URL is configured and derivation is disabled.
    pub fn require_app_url(&self, headers: &HeaderMap) -> Result<&str, AuthError> {
        self.app_url
            .resolve(headers)
            .ok_or_else(|| AuthError::Internal("application URL is unknown".to_string()))
    }

    /// OAuth callback URL for a provider.
    #[must_use]
    pub fn redirect_uri(&self, app_url: &str, kind: ProviderKind) -> String {
        format!(
            "{app_url}{}/oauth2-result-{kind}",
            self.config.app_gateway_relative_uri
        )
    }
}

/// Gateway server.
pub struct Gateway {
    state: Arc<GatewayState>,
    sweeper: Option<Arc<MemorySessionStore>>,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: Config,
    providers: Option<ProviderRegistry>,
    extra_providers: Vec<Arc<dyn OAuthProvider>>,
    email: Option<EmailProvider>,
    email_configured: bool,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            providers: None,
            extra_providers: Vec::new(),
            email: None,
            email_configured: false,
            sessions: None,
        }
    }

    /// Set gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use this registry instead of building one from config.
    #[must_use]
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.providers = Some(registry);
        self
    }

    /// Register an additional provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.extra_providers.push(provider);
        self
    }

    /// Use this e-mail provider instead of building one from config.
    #[must_use]
    pub fn with_email_provider(mut self, provider: EmailProvider) -> Self {
        self.email = Some(provider);
        self.email_configured = true;
        self
    }

    /// Set the session store.
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the e-mail relay
    /// cannot be set up.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        self.config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let mut providers = self
            .providers
            .unwrap_or_else(|| ProviderRegistry::from_config(&self.config));
        for provider in self.extra_providers {
            providers.register(provider);
        }

        let email = if self.email_configured {
            self.email
        } else {
            EmailProvider::from_config(&self.config)
                .map_err(|e| GatewayError::Config(format!("E-mail setup failed: {e}")))?
        };

        let (sessions, sweeper): (Arc<dyn SessionStore>, _) = match self.sessions {
            Some(store) => (store, None),
            None => {
                let store = Arc::new(MemorySessionStore::new(Duration::from_secs(
                    self.config.session.ttl_secs,
                )));
                (store.clone(), Some(store))
            }
        };

        if self.config.app_url.is_none() && self.config.derive_app_url_from_headers {
            tracing::warn!(
                "appUrl is not set, it will be taken from the first login request's headers; \
                 set appUrl explicitly for production"
            );
        }

        let authorizer = Authorizer::new(self.config.allowed_users.iter().cloned());
        if authorizer.is_empty() {
            tracing::warn!("allowedUsers is empty, every login will be denied");
        }

        let state = GatewayState {
            app_url: AppUrl::from_config(&self.config),
            authorizer,
            providers,
            email,
            sessions,
            email_limiter: EmailRateLimiter::new(self.config.email_rate_limit_per_minute),
            upstream: UpstreamTarget::new(&self.config.upstream()),
            config: self.config,
        };

        Ok(Gateway {
            state: Arc::new(state),
            sweeper,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Create a gateway from config alone.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        GatewayBuilder::new().with_config(config).build()
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// The full application router.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = self.state.clone();
        let base = state.config.app_gateway_relative_uri.clone();

        Router::new()
            .nest(&base, gateway_routes(&state))
            .fallback(forward)
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                session_gate,
            ))
            .layer(axum::middleware::map_response_with_state(
                state.clone(),
                localize_error_pages,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the gateway until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to start.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let server = &self.state.config.server;
        let addr = tokio::net::lookup_host((server.host.as_str(), server.port))
            .await?
            .next()
            .ok_or_else(|| {
                GatewayError::Config(format!("Cannot resolve {}:{}", server.host, server.port))
            })?;

        if let Some(store) = &self.sweeper {
            let store = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
                loop {
                    interval.tick().await;
                    let removed = store.purge_expired().await;
                    if removed > 0 {
                        tracing::debug!(removed, "expired sessions purged");
                    }
                }
            });
        }

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local: SocketAddr = listener.local_addr()?;
        tracing::info!("Auth gateway listening on http://{}", local);
        if let Some(url) = self.state.app_url.get() {
            tracing::info!(app_url = %url, "public application URL");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
