use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

pub mod handlers;

use handlers::{
    auth::{self, AuthState, MemoryUserStore, PgUserStore, TokenCodec, UserStore},
    collections::{self, MemoryRecordStore, PgRecordStore, RecordStore},
    health,
};

/// Build the application router over the given stores.
///
/// Kept separate from [`new`] so integration tests can drive the router
/// directly with in-memory stores.
#[must_use]
pub fn router(auth_state: Arc<AuthState>, records: Arc<dyn RecordStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health))
        .route("/signup", post(auth::register))
        .route("/signin", post(auth::login))
        .route("/users", get(auth::users))
        .route("/secret", get(auth::secret))
        .route(
            "/api/v2/:collection",
            get(collections::list).post(collections::create),
        )
        .route(
            "/api/v2/:collection/:id",
            get(collections::get_one)
                .put(collections::update)
                .patch(collections::update)
                .delete(collections::delete),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(records)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    let codec = TokenCodec::new(globals.secret.clone(), globals.token_ttl);

    let (users, records): (Arc<dyn UserStore>, Arc<dyn RecordStore>) = if dsn == "memory" {
        info!("Using in-memory stores, state is lost on restart");

        (
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryRecordStore::new()),
        )
    } else {
        Url::parse(&dsn).context("Invalid database DSN")?;

        // Connect to database
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(&dsn)
            .await
            .context("Failed to connect to database")?;

        PgUserStore::ensure_schema(&pool)
            .await
            .context("Failed to prepare users table")?;
        PgRecordStore::ensure_schema(&pool)
            .await
            .context("Failed to prepare records table")?;

        (
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgRecordStore::new(pool)),
        )
    };

    let auth_state = Arc::new(AuthState::new(users, codec));
    let app = router(auth_state, records);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
