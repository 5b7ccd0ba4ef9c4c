pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::Config;
use crate::identity::require_auth;
use crate::state::AppState;
use crate::{ai, auth, certificate, cv, education, job, portfolio, users};

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/portfolio/public/:slug",
            get(portfolio::handlers::handle_public),
        );

    let protected = Router::new()
        // Auth & profile
        .route("/api/v1/auth/signup", post(auth::handlers::handle_signup))
        .route("/api/v1/auth/signin", post(auth::handlers::handle_signin))
        .route(
            "/api/v1/users/me",
            get(users::handlers::handle_get_me).patch(users::handlers::handle_update_me),
        )
        // Education
        .route("/api/v1/education", get(education::handlers::handle_list))
        .route("/api/v1/education/add", post(education::handlers::handle_add))
        .route(
            "/api/v1/education/:id",
            patch(education::handlers::handle_update).delete(education::handlers::handle_delete),
        )
        // Certificates
        .route("/api/v1/certificate", get(certificate::handlers::handle_list))
        .route("/api/v1/certificate/add", post(certificate::handlers::handle_add))
        .route(
            "/api/v1/certificate/:id",
            patch(certificate::handlers::handle_update)
                .delete(certificate::handlers::handle_delete),
        )
        // CVs
        .route("/api/v1/cv/create", post(cv::handlers::handle_create))
        .route("/api/v1/cv/list", get(cv::handlers::handle_list))
        .route("/api/v1/cv/autosave", post(cv::handlers::handle_autosave))
        .route("/api/v1/cv/save", post(cv::handlers::handle_save))
        .route("/api/v1/cv/generate", post(cv::handlers::handle_generate))
        .route("/api/v1/cv/render", post(cv::handlers::handle_render))
        .route(
            "/api/v1/cv/:id",
            get(cv::handlers::handle_get)
                .patch(cv::handlers::handle_update)
                .delete(cv::handlers::handle_delete),
        )
        .route("/api/v1/cv/:id/versions", get(cv::handlers::handle_versions))
        .route(
            "/api/v1/cv/:id/versions/:number",
            get(cv::handlers::handle_version),
        )
        // Portfolios
        .route("/api/v1/portfolio/create", post(portfolio::handlers::handle_create))
        .route("/api/v1/portfolio/list", get(portfolio::handlers::handle_list))
        .route("/api/v1/portfolio/update", patch(portfolio::handlers::handle_update))
        .route(
            "/api/v1/portfolio/autosave",
            post(portfolio::handlers::handle_autosave),
        )
        .route(
            "/api/v1/portfolio/:id",
            get(portfolio::handlers::handle_get).delete(portfolio::handlers::handle_delete),
        )
        .route(
            "/api/v1/portfolio/:id/publish",
            post(portfolio::handlers::handle_publish),
        )
        .route(
            "/api/v1/portfolio/:id/unpublish",
            post(portfolio::handlers::handle_unpublish),
        )
        // AI
        .route("/api/v1/ai/optimize", post(ai::handlers::handle_optimize))
        .route("/api/v1/ai/analyze", post(ai::handlers::handle_analyze))
        // Jobs
        .route("/api/v1/jobs/search", get(job::handlers::handle_search))
        .route("/api/v1/jobs/suggested", get(job::handlers::handle_suggested))
        .route("/api/v1/jobs/history", get(job::handlers::handle_history))
        .route("/api/v1/jobs/apply", post(job::handlers::handle_apply))
        .route("/api/v1/jobs/:id/similar", get(job::handlers::handle_similar))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let max_body = state.config.max_body_bytes;
    let cors = cors_layer(&state.config);

    public
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true);

    match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(
                "FRONTEND_URL '{}' is not a valid origin; cross-origin requests will be refused",
                config.frontend_url
            );
            layer
        }
    }
}
