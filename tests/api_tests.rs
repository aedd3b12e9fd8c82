// tests/api_tests.rs
//
// Routing, authentication and validation checks. None of these requests reach
// the database, so they run without DATABASE_URL.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{offline_state, spawn_offline_app, token_for};
use prepsmart::{routes, utils::role::Role};
use serde_json::{Value, json};
use tower::ServiceExt;

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn health_check_works() {
    let app = spawn_offline_app().await;

    let response = app.client.get(app.url("/api/health")).send().await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "name": "A",
            "email": "not-an-email",
            "password": "short"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn login_requires_credentials() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "", "password": "" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn protected_route_requires_token() {
    let app = spawn_offline_app().await;

    for path in ["/api/profile/me", "/api/notifications", "/api/tasks", "/api/admin/users"] {
        let response = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 401, "{path}");
    }
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .get(app.url("/api/profile/me"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let app = spawn_offline_app().await;
    let forged = prepsmart::utils::jwt::sign_jwt(1, Role::Owner, "someone-elses-secret", 600).unwrap();

    let response = app
        .client
        .get(app.url("/api/admin/users"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn role_gates_admin_areas() {
    let app = spawn_offline_app().await;
    let cases = [
        (Role::Student, "/api/admin/users"),
        (Role::Mentor, "/api/admin/users"),
        (Role::Employee, "/api/admin/analytics/overview"),
        (Role::Student, "/api/admin/exams"),
    ];

    for (role, path) in cases {
        let response = app
            .client
            .get(app.url(path))
            .bearer_auth(token_for(42, role))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 403, "{role} on {path}");
    }

    let response = app
        .client
        .post(app.url("/api/admin/quizzes"))
        .bearer_auth(token_for(42, Role::Employee))
        .json(&json!({ "title": "Polity", "topic": "polity" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .post(app.url("/api/admin/blog"))
        .bearer_auth(token_for(42, Role::Mentor))
        .json(&json!({ "title": "Hello", "content": "<p>x</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_question_shape_is_checked_before_storage() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .post(app.url("/api/admin/exams/1/questions"))
        .bearer_auth(token_for(1, Role::Admin))
        .json(&json!({
            "section_id": 1,
            "type": "single",
            "content": "Capital of India?",
            "options": ["Delhi", "Mumbai"],
            "correct_answers": ["Kolkata"],
            "marks": 2.0
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Every correct answer must be one of the options");
}

#[tokio::test]
async fn broadcast_validates_payload() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .post(app.url("/api/admin/notifications/broadcast"))
        .bearer_auth(token_for(1, Role::SuperAdmin))
        .json(&json!({ "title": "", "message": "Hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn students_cannot_assign_tasks_to_others() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .post(app.url("/api/tasks"))
        .bearer_auth(token_for(5, Role::Student))
        .json(&json!({ "title": "Revise polity", "assignee_id": 6 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn sessions_must_be_booked_in_the_future() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .post(app.url("/api/mentorship/sessions"))
        .bearer_auth(token_for(5, Role::Student))
        .json(&json!({
            "mentor_id": 9,
            "topic": "Essay strategy",
            "scheduled_at": "2020-01-01T10:00:00Z"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn empty_quiz_submission_is_rejected() {
    let app = spawn_offline_app().await;

    let response = app
        .client
        .post(app.url("/api/quizzes/1/submit"))
        .bearer_auth(token_for(5, Role::Student))
        .json(&json!({ "answers": {} }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = routes::create_router(offline_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/auth/login")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn cors_rejects_unknown_origin() {
    let app = routes::create_router(offline_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/auth/login")
                .header(header::ORIGIN, "http://evil.test")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
