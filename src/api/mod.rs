mod handlers;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::db::Database;

/// Router with permissive CORS, for local use and tests.
pub fn create_router(db: Database) -> Router {
    build_router(db, CorsLayer::permissive())
}

pub fn create_router_with_settings(db: Database, settings: &Settings) -> Router {
    build_router(db, cors_layer(settings.cors_origins.as_deref()))
}

fn build_router(db: Database, cors: CorsLayer) -> Router {
    let api = Router::new()
        // Programs
        .route("/programs", get(handlers::list_programs))
        .route("/programs", post(handlers::create_program))
        .route("/programs/{id}", get(handlers::get_program))
        // Field catalog
        .route("/programs/{id}/fields", get(handlers::list_program_fields))
        .route("/programs/{id}/flex-attributes", post(handlers::create_flex_attribute))
        .route("/programs/{id}/periodic-fields", post(handlers::create_periodic_field))
        // Population
        .route("/programs/{id}/households", get(handlers::list_households))
        .route("/programs/{id}/households", post(handlers::create_household))
        .route("/households/{id}", get(handlers::get_household))
        .route("/households/{id}/withdraw", post(handlers::withdraw_household))
        .route("/individuals/{id}/withdraw", post(handlers::withdraw_individual))
        .route("/individuals/{id}/periodic-data", post(handlers::record_periodic_value))
        // Targeting
        .route("/programs/{id}/targeting/validate", post(handlers::validate_targeting))
        .route("/programs/{id}/targeting/preview", post(handlers::preview_targeting))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(db)
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
