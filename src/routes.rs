// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    handlers::{admin, course, forms, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the application router.
///
/// * Mounts only the features enabled in the configuration.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let features = state.config.features;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let mut app = Router::new();

    if features.quiz_answers || features.essay_answers {
        let mut quiz_routes = Router::new();
        if features.quiz_answers {
            quiz_routes = quiz_routes.route("/answer", get(quiz::quiz_answer));
        }
        if features.essay_answers {
            quiz_routes = quiz_routes.route("/essay", get(quiz::essay_answer));
        }
        app = app.nest("/api/quiz", quiz_routes);
    }

    if features.course_summary {
        let course_routes = Router::new().route("/summary", get(course::course_summary));
        app = app.nest("/api/course", course_routes);
    }

    if features.otter_forms {
        let form_routes = Router::new()
            .route("/save", post(forms::save_form))
            .route("/field", get(forms::form_field))
            .route("/latest", get(forms::form_all_latest))
            .route("/page", get(forms::form_field_on_page))
            .route("/dump", get(forms::form_dump));
        app = app.nest("/api/forms", form_routes);
    }

    if features.quiz_stats {
        let admin_routes = Router::new()
            .route("/quiz-stats", get(admin::quiz_stats))
            // Auth runs first, then the admin check
            .layer(middleware::from_fn(admin_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
        app = app.nest("/api/admin", admin_routes);
    }

    app.fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
