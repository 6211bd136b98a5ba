/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use associa_api::{app::{build_router, AppState}, config::Config};
/// use associa_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// let pool = create_pool(config.database.pool_config()).await?;
/// let state = AppState::postgres(pool, config)?;
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    middleware::security::SecurityHeadersLayer,
    payments::{self, PaymentProcessor},
};
use associa_shared::{
    auth::{
        jwt,
        middleware::{extract_token, AuthContext, AuthError},
    },
    membership::{
        repository::{
            CertificateRepository, CredentialRepository, EventRepository, MemberRepository,
            PaymentLedger,
        },
        MembershipService, Repositories,
    },
    storage::{ArtifactStore, LocalArtifactStore},
};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool, used directly by the catalog routes
    pub db: PgPool,

    pub config: Arc<Config>,

    pub members: Arc<dyn MemberRepository>,
    pub payments: Arc<dyn PaymentLedger>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
    pub events: Arc<dyn EventRepository>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub processor: Arc<dyn PaymentProcessor>,

    /// Subscription core over the same repositories
    pub membership: MembershipService,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: Config,
        repositories: Repositories,
        artifacts: Arc<dyn ArtifactStore>,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        let membership = MembershipService::new(
            repositories.clone(),
            artifacts.clone(),
            config.session.credential_secret(),
        );

        Self {
            db,
            config: Arc::new(config),
            members: repositories.members,
            payments: repositories.payments,
            credentials: repositories.credentials,
            certificates: repositories.certificates,
            events: repositories.events,
            artifacts,
            processor,
            membership,
        }
    }

    /// Production wiring: PostgreSQL repositories, local artifact directory
    /// and the configured payment processor
    pub fn postgres(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let repositories = Repositories::postgres(db.clone());
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(
            &config.storage.path,
            config.storage.max_upload_bytes,
        ));
        let processor = payments::from_config(&config.payment)?;

        Ok(Self::new(db, config, repositories, artifacts, processor))
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.session.jwt_secret
    }

    /// Whether cookies carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.api.production
    }
}

/// Resolves the session of a request
///
/// The role is read from the stored member rather than the token, so a
/// demotion takes effect on the next request.
pub async fn load_session(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::MissingCredentials)?;

    let claims = jwt::validate_token(&token, state.jwt_secret())
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let member = state
        .members
        .find_by_id(claims.sub)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .ok_or(AuthError::UnknownMember)?;

    Ok(AuthContext::from_member(&member))
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /api/health                          public
/// /api/register, /api/login, /logout   public
/// /api/validate/:credentialId          public
/// /api/payments/webhook                public, signed
/// /api/...                             session required
/// /dashboard, /profile, ... /admin/*   access gate, 303 redirects
/// /payment-required                    renewal interstitial
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/validate/:credential_id", get(routes::credentials::validate))
        .route("/payments/webhook", post(routes::payments::webhook))
        .route("/access/*view", get(routes::views::access));

    let protected_routes = Router::new()
        .route("/user", get(routes::auth::me))
        // Payments
        .route(
            "/payments",
            get(routes::payments::list).post(routes::payments::create),
        )
        .route("/payments/status/:user_id", get(routes::payments::status))
        .route("/payments/update-method", post(routes::payments::update_method))
        .route("/payments/:id/status", put(routes::payments::update_status))
        // E-books
        .route(
            "/ebooks",
            get(routes::ebooks::list).post(routes::ebooks::create),
        )
        .route(
            "/ebooks/:id",
            get(routes::ebooks::get)
                .put(routes::ebooks::update)
                .delete(routes::ebooks::delete),
        )
        .route("/ebooks/:id/download", get(routes::ebooks::download))
        .route(
            "/ebooks/:id/file",
            put(routes::ebooks::upload)
                .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes)),
        )
        // Events
        .route(
            "/events",
            get(routes::events::list).post(routes::events::create),
        )
        .route(
            "/events/:id",
            get(routes::events::get)
                .put(routes::events::update)
                .delete(routes::events::delete),
        )
        .route(
            "/events/:id/register",
            post(routes::events::register).delete(routes::events::unregister),
        )
        .route("/events/:id/registrations", get(routes::events::registrations))
        .route("/events/:id/attendance", put(routes::events::attendance))
        .route("/events/:id/certificate", post(routes::events::certificate))
        // Benefits
        .route(
            "/benefits",
            get(routes::benefits::list).post(routes::benefits::create),
        )
        .route(
            "/benefits/:id",
            get(routes::benefits::get)
                .put(routes::benefits::update)
                .delete(routes::benefits::delete),
        )
        // Members
        .route("/users", get(routes::users::list))
        .route(
            "/users/:id",
            get(routes::users::get)
                .put(routes::users::update)
                .delete(routes::users::delete),
        )
        .route("/users/:id/cancel", post(routes::users::cancel))
        .route("/users/:id/eligibility", get(routes::users::eligibility))
        // Certificates and credentials
        .route("/certificates/eligibility", get(routes::certificates::eligibility))
        .route(
            "/certificates",
            get(routes::certificates::list).post(routes::certificates::issue),
        )
        .route("/certificates/:id/download", get(routes::certificates::download))
        .route("/credentials/me", get(routes::credentials::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let view_routes = Router::new()
        .route("/dashboard", get(routes::views::page))
        .route("/profile", get(routes::views::page))
        .route("/ebooks", get(routes::views::page))
        .route("/events", get(routes::views::page))
        .route("/benefits", get(routes::views::page))
        .route("/certificates", get(routes::views::page))
        .route("/credential", get(routes::views::page))
        .route("/admin", get(routes::views::page))
        .route("/admin/*section", get(routes::views::page))
        .route("/payment-required", get(routes::views::payment_required));

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .merge(view_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Session middleware for `/api` routes
///
/// Resolves the session token (bearer header or cookie) and inserts the
/// [`AuthContext`] into the request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let auth = load_session(&state, req.headers())
        .await
        .map_err(ApiError::from)?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}
