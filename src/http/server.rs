//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every handler
//! - Wire up middleware (request ID, tracing, in-flight tracking, panic
//!   recovery, rate limiting, authentication, timeouts)
//! - Run the rate limit janitor alongside the server
//! - Serve until the shutdown coordinator has drained

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::data::FoodStore;
use crate::http::foods::{
    create_food, delete_food, list_foods, method_not_allowed, not_found, show_food, update_food,
};
use crate::http::healthcheck::healthcheck;
use crate::http::middleware::{authenticate, recover_panics};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::{ShutdownCoordinator, ShutdownError};
use crate::net::{track_in_flight, InFlightTracker};
use crate::security::identity::IdentityResolver;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub foods: Arc<dyn FoodStore>,
}

/// HTTP server for the foods API.
pub struct ApiServer {
    router: Router,
    config: Arc<ApiConfig>,
    limiter: Option<Arc<RateLimiter>>,
    coordinator: ShutdownCoordinator,
}

impl ApiServer {
    /// `store` backs both the food routes and token verification.
    pub fn new<S>(config: ApiConfig, store: Arc<S>, coordinator: ShutdownCoordinator) -> Self
    where
        S: FoodStore + IdentityResolver + 'static,
    {
        let config = Arc::new(config);
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        let state = AppState {
            config: Arc::clone(&config),
            foods: store.clone(),
        };
        let router = Self::build_router(
            &config,
            state,
            store,
            limiter.clone(),
            coordinator.in_flight().clone(),
        );

        Self {
            router,
            config,
            limiter,
            coordinator,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ApiConfig,
        state: AppState,
        identities: Arc<dyn IdentityResolver>,
        limiter: Option<Arc<RateLimiter>>,
        in_flight: InFlightTracker,
    ) -> Router {
        let router = Router::new()
            .route(
                "/v1/healthcheck",
                get(healthcheck).fallback(method_not_allowed),
            )
            .route(
                "/v1/foods",
                get(list_foods)
                    .post(create_food)
                    .fallback(method_not_allowed),
            )
            .route(
                "/v1/foods/{id}",
                get(show_food)
                    .patch(update_food)
                    .delete(delete_food)
                    .fallback(method_not_allowed),
            )
            .fallback(not_found)
            .with_state(state)
            .layer(TimeoutLayer::new(config.timeouts.request()))
            .layer(middleware::from_fn_with_state(identities, authenticate));

        let router = match limiter {
            Some(limiter) => {
                router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            }
            None => router,
        };

        router
            .layer(middleware::from_fn(recover_panics))
            .layer(middleware::from_fn_with_state(in_flight, track_in_flight))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(&X_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), UuidRequestId))
    }

    /// The fully layered router, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until shutdown completes.
    pub async fn run(self, listener: TcpListener) -> Result<(), ShutdownError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, env = %self.config.env, "HTTP server starting");
        }

        let janitor = self.limiter.as_ref().map(|limiter| {
            limiter.spawn_janitor(
                self.config.rate_limit.cleanup_interval(),
                self.coordinator.draining(),
            )
        });

        let result = self.coordinator.serve(listener, self.router).await;

        if let Some(janitor) = janitor {
            janitor.abort();
        }
        result
    }
}
