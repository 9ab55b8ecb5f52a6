//! Route table

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tram_core::Config;

use crate::auth::require_remote_user;
use crate::handlers;
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let body_limit = config.max_upload_size_bytes() + MULTIPART_OVERHEAD_BYTES;

    let protected = protected_routes().layer(axum::middleware::from_fn(require_remote_user));

    crate::error::set_error_details_visible(!config.is_production());

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .merge(protected)
        .layer(ConcurrencyLimitLayer::new(config.http_concurrency_limit().max(1)))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Everything that needs a caller identity.
fn protected_routes() -> Router<Arc<AppState>> {
    use handlers::{attack, documents, jobs, mappings, ml, reports, sentences, upload};

    Router::new()
        .route(
            "/upload",
            post(upload::upload).fallback(upload::method_not_allowed),
        )
        .route("/docs/{id}", get(documents::download_document))
        .route("/ml", get(ml::ml_home))
        .route("/ml/techniques/{attack_id}", get(ml::technique_sentences))
        .route("/ml/models/{model_key}", get(ml::model_detail))
        .route("/analyze/{report_id}", get(ml::analyze))
        .route("/api/attack", get(attack::list_attack_objects))
        .route("/api/attack/{id}", get(attack::get_attack_object))
        .route("/api/jobs", get(jobs::list_jobs))
        .route(
            "/api/jobs/{id}",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/api/reports", get(reports::list_reports))
        .route(
            "/api/reports/{id}",
            get(reports::get_report).delete(reports::delete_report),
        )
        .route("/api/reports/{id}/json", get(reports::export_json))
        .route("/api/reports/{id}/docx", get(reports::export_docx))
        .route("/api/sentences", get(sentences::list_sentences))
        .route(
            "/api/sentences/{id}",
            get(sentences::get_sentence).patch(sentences::update_sentence),
        )
        .route(
            "/api/mappings",
            get(mappings::list_mappings).post(mappings::create_mapping),
        )
        .route(
            "/api/mappings/{id}",
            get(mappings::get_mapping)
                .patch(mappings::update_mapping)
                .delete(mappings::delete_mapping),
        )
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
