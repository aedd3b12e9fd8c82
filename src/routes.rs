// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    handlers::{
        admin, analytics, auth, blog, content, course, exam, mentorship, notification, payment,
        profile, quiz, study_team, task,
    },
    state::AppState,
    utils::{
        jwt::{auth_middleware, require_roles},
        role::{ADMIN_ROLES, MENTOR_ROLES, Role, STAFF_ROLES},
    },
};

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Public routes need no token.
/// * Protected routes sit behind `auth_middleware`.
/// * Admin routes add `require_roles` with the role set of each area.
/// * Trace and CORS layers wrap everything.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Runs auth first, then the role check.
    let gated = |router: Router<AppState>, roles: &'static [Role]| {
        router
            .route_layer(middleware::from_fn_with_state(roles, require_roles))
            .route_layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
    };

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/exams", get(exam::list_exams))
        .route("/exams/{id}", get(exam::get_exam))
        .route("/exams/{id}/leaderboard", get(exam::get_leaderboard))
        .route("/quizzes", get(quiz::list_quizzes))
        .route("/quizzes/practice", get(quiz::practice))
        .route("/quizzes/{id}", get(quiz::get_quiz))
        .route("/quizzes/{id}/leaderboard", get(quiz::get_leaderboard))
        .route("/courses", get(course::list_courses))
        .route("/courses/{id}", get(course::get_course))
        .route("/blog", get(blog::list_posts))
        .route("/blog/{slug}", get(blog::get_post))
        .route("/content/current-affairs", get(content::list_current_affairs))
        .route("/content/current-affairs/{id}", get(content::get_current_affair))
        .route("/content/downloads", get(content::list_downloads))
        .route("/content/downloads/{id}", get(content::fetch_download))
        .route("/payments/plans", get(payment::list_plans));

    let protected_routes = Router::new()
        .route("/profile/me", get(profile::get_me).put(profile::update_me))
        .route("/profile/password", put(profile::change_password))
        .route("/profile/enrollments", get(profile::my_enrollments))
        .route("/profile/attempts", get(profile::my_attempts))
        .route("/profile/analytics", get(analytics::personal))
        .route("/exams/{id}/attempts", post(exam::start_attempt))
        .route("/attempts/{id}", get(exam::get_attempt))
        .route("/attempts/{id}/submit", post(exam::submit_attempt))
        .route("/quizzes/{id}/submit", post(quiz::submit_quiz))
        .route("/courses/{id}/enroll", post(course::enroll))
        .route("/courses/{id}/progress", put(course::update_progress))
        .route("/notifications", get(notification::list_notifications))
        .route("/notifications/unread-count", get(notification::unread_count))
        .route("/notifications/read-all", put(notification::mark_all_read))
        .route("/notifications/{id}", delete(notification::delete_notification))
        .route("/notifications/{id}/read", put(notification::mark_read))
        .route("/payments/checkout", post(payment::checkout))
        .route("/payments/history", get(payment::payment_history))
        .route("/payments/subscription", get(payment::current_subscription))
        .route("/payments/{id}/confirm", post(payment::confirm))
        .route("/teams", get(study_team::list_teams).post(study_team::create_team))
        .route("/teams/{id}", get(study_team::get_team).delete(study_team::delete_team))
        .route("/teams/{id}/join", post(study_team::join_team))
        .route("/teams/{id}/leave", post(study_team::leave_team))
        .route("/mentorship/mentors", get(mentorship::list_mentors))
        .route(
            "/mentorship/sessions",
            get(mentorship::list_sessions).post(mentorship::book_session),
        )
        .route("/mentorship/sessions/{id}/status", put(mentorship::update_session_status))
        .route("/tasks", get(task::list_tasks).post(task::create_task))
        .route("/tasks/{id}", put(task::update_task).delete(task::delete_task))
        .route_layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    let admin_routes = gated(
        Router::new()
            .route("/users", get(admin::list_users).post(admin::create_user))
            .route(
                "/users/{id}",
                get(admin::get_user).put(admin::update_user).delete(admin::delete_user),
            )
            .route("/exams", get(exam::admin_list_exams).post(exam::create_exam))
            .route("/exams/{id}", put(exam::update_exam).delete(exam::delete_exam))
            .route("/exams/{id}/sections", post(exam::add_section))
            .route(
                "/exams/{id}/questions",
                get(exam::list_questions).post(exam::add_question),
            )
            .route(
                "/exams/{id}/questions/{question_id}",
                delete(exam::delete_question),
            )
            .route("/notifications/broadcast", post(notification::broadcast))
            .route("/plans", post(payment::create_plan))
            .route("/plans/{id}", put(payment::update_plan))
            .route("/analytics/overview", get(analytics::overview)),
        ADMIN_ROLES,
    );

    let mentor_routes = gated(
        Router::new()
            .route("/quizzes", post(quiz::create_quiz))
            .route("/quizzes/{id}", delete(quiz::delete_quiz))
            .route("/quizzes/{id}/questions", post(quiz::add_question)),
        MENTOR_ROLES,
    );

    let staff_routes = gated(
        Router::new()
            .route("/courses", post(course::create_course))
            .route("/courses/{id}", put(course::update_course).delete(course::delete_course))
            .route("/blog", post(blog::create_post))
            .route("/blog/{id}", put(blog::update_post).delete(blog::delete_post))
            .route("/current-affairs", post(content::create_current_affair))
            .route(
                "/current-affairs/{id}",
                delete(content::delete_current_affair),
            )
            .route("/downloads", post(content::create_download))
            .route("/downloads/{id}", delete(content::delete_download)),
        STAFF_ROLES,
    );

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest(
            "/admin",
            Router::new().merge(admin_routes).merge(mentor_routes).merge(staff_routes),
        );

    let router = Router::new().nest("/api", api);

    // Serve the built frontend when configured; unknown paths fall back to index.html.
    let router = match &state.config.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).not_found_service(ServeFile::new(format!("{dir}/index.html"))),
        ),
        None => router.fallback(not_found),
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}
