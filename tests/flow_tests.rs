// tests/flow_tests.rs
//
// End-to-end flows against a real database.
// Run with `DATABASE_URL=... cargo test -- --ignored`.

mod common;

use common::{TestApp, create_user, spawn_app, unique_email};
use prepsmart::utils::{gateway::SandboxGateway, role::Role};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn register_login_and_profile() {
    let app = spawn_app().await;
    let email = unique_email("aspirant");

    // Act: Register
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "name": "Asha Verma", "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["role"], "student");
    assert!(user.get("password").is_none());

    // Duplicate email
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "name": "Asha Again", "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Wrong password
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let response = app
        .client
        .get(app.url("/api/profile/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["email"], email.as_str());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn blog_views_increase_on_every_read() {
    let app = spawn_app().await;
    let (_, staff_token) = create_user(&app.pool, Role::Employee).await;
    let title = format!("Monsoon session recap {}", uuid::Uuid::new_v4().simple());

    let response = app
        .client
        .post(app.url("/api/admin/blog"))
        .bearer_auth(&staff_token)
        .json(&json!({
            "title": title,
            "content": "<p>Bills passed</p><script>alert(1)</script>",
            "tags": ["polity"],
            "is_published": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let post: Value = response.json().await.unwrap();
    let slug = post["slug"].as_str().unwrap().to_string();
    assert!(!post["content"].as_str().unwrap().contains("<script>"));

    let mut last_views = 0;
    for _ in 0..2 {
        let post: Value = app
            .client
            .get(app.url(&format!("/api/blog/{slug}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let views = post["views"].as_i64().unwrap();
        assert!(views > last_views);
        last_views = views;
    }
    assert_eq!(last_views, 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn mark_all_read_only_touches_the_caller() {
    let app = spawn_app().await;
    let (alice, alice_token) = create_user(&app.pool, Role::Student).await;
    let (bob, bob_token) = create_user(&app.pool, Role::Student).await;

    for user_id in [alice, alice, bob] {
        sqlx::query("INSERT INTO notifications (user_id, title, message, kind) VALUES ($1, 'Hello', 'Welcome', 'system')")
            .bind(user_id)
            .execute(&app.pool)
            .await
            .unwrap();
    }

    let response = app
        .client
        .put(app.url("/api/notifications/read-all"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["updated"], 2);

    let body: Value = app
        .client
        .get(app.url("/api/notifications/unread-count"))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["unread"], 1);
}

/// Creates a published exam with one section and two single-choice questions
/// keyed "B". Returns the exam id and question ids.
async fn create_exam(app: &TestApp, admin_token: &str) -> (i64, Vec<i64>) {
    let exam: Value = app
        .client
        .post(app.url("/api/admin/exams"))
        .bearer_auth(admin_token)
        .json(&json!({
            "title": "Prelims Mock 1",
            "category": "upsc",
            "duration_minutes": 30,
            "is_published": true
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let exam_id = exam["id"].as_i64().unwrap();

    let section: Value = app
        .client
        .post(app.url(&format!("/api/admin/exams/{exam_id}/sections")))
        .bearer_auth(admin_token)
        .json(&json!({ "title": "General Studies" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let section_id = section["id"].as_i64().unwrap();

    let mut question_ids = Vec::new();
    for content in ["Capital of India?", "Largest state by area?"] {
        let response = app
            .client
            .post(app.url(&format!("/api/admin/exams/{exam_id}/questions")))
            .bearer_auth(admin_token)
            .json(&json!({
                "section_id": section_id,
                "type": "single",
                "content": content,
                "options": ["A", "B ", "C", "D"],
                "correct_answers": ["B"],
                "marks": 4.0,
                "negative_marks": 1.0
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let question: Value = response.json().await.unwrap();
        assert_eq!(question["options"][1], "B");
        question_ids.push(question["id"].as_i64().unwrap());
    }

    (exam_id, question_ids)
}

async fn start_attempt(app: &TestApp, exam_id: i64, token: &str) -> i64 {
    let response = app
        .client
        .post(app.url(&format!("/api/exams/{exam_id}/attempts")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let started: Value = response.json().await.unwrap();
    assert_eq!(started["language"], "en");
    assert!(started["exam"]["sections"][0]["questions"][0].get("correct_answers").is_none());
    started["attempt_id"].as_i64().unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn exam_attempt_is_scored_once() {
    let app = spawn_app().await;
    let (_, admin_token) = create_user(&app.pool, Role::Admin).await;
    let (student_id, student_token) = create_user(&app.pool, Role::Student).await;
    let (exam_id, question_ids) = create_exam(&app, &admin_token).await;

    // Act: start an attempt
    let attempt_id = start_attempt(&app, exam_id, &student_token).await;

    let submission = json!({
        "answers": {
            question_ids[0].to_string(): "B",
            question_ids[1].to_string(): "A"
        }
    });

    let response = app
        .client
        .post(app.url(&format!("/api/attempts/{attempt_id}/submit")))
        .bearer_auth(&student_token)
        .json(&submission)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["correct"], 1);
    assert_eq!(body["result"]["incorrect"], 1);
    assert_eq!(body["result"]["score"], 3.0);
    assert_eq!(body["is_late"], false);

    // Assert: a second submit is rejected
    let response = app
        .client
        .post(app.url(&format!("/api/attempts/{attempt_id}/submit")))
        .bearer_auth(&student_token)
        .json(&submission)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let leaderboard: Value = app
        .client
        .get(app.url(&format!("/api/exams/{exam_id}/leaderboard")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leaderboard[0]["user_id"], student_id);
    assert_eq!(leaderboard[0]["rank"], 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn attempts_belong_to_their_owner() {
    let app = spawn_app().await;
    let (_, admin_token) = create_user(&app.pool, Role::Admin).await;
    let (_, student_token) = create_user(&app.pool, Role::Student).await;
    let (_, other_token) = create_user(&app.pool, Role::Student).await;
    let (exam_id, question_ids) = create_exam(&app, &admin_token).await;
    let attempt_id = start_attempt(&app, exam_id, &student_token).await;

    let response = app
        .client
        .get(app.url(&format!("/api/attempts/{attempt_id}")))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .post(app.url(&format!("/api/attempts/{attempt_id}/submit")))
        .bearer_auth(&other_token)
        .json(&json!({ "answers": { question_ids[0].to_string(): "B" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // The attempt is untouched
    let attempt: Value = app
        .client
        .get(app.url(&format!("/api/attempts/{attempt_id}")))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["status"], "in_progress");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn submission_past_grace_is_scored_and_flagged_late() {
    let app = spawn_app().await;
    let (_, admin_token) = create_user(&app.pool, Role::Admin).await;
    let (_, student_token) = create_user(&app.pool, Role::Student).await;
    let (exam_id, question_ids) = create_exam(&app, &admin_token).await;
    let attempt_id = start_attempt(&app, exam_id, &student_token).await;

    // Arrange: the attempt started 40 minutes ago, so its deadline passed 10 minutes ago
    sqlx::query(
        "UPDATE exam_attempts
         SET started_at = NOW() - INTERVAL '40 minutes', deadline = NOW() - INTERVAL '10 minutes'
         WHERE id = $1",
    )
    .bind(attempt_id)
    .execute(&app.pool)
    .await
    .unwrap();

    // Answers to a question deleted mid-attempt are ignored
    let response = app
        .client
        .delete(app.url(&format!("/api/admin/exams/{exam_id}/questions/{}", question_ids[1])))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = app
        .client
        .post(app.url(&format!("/api/attempts/{attempt_id}/submit")))
        .bearer_auth(&student_token)
        .json(&json!({
            "answers": {
                question_ids[0].to_string(): "B ",
                question_ids[1].to_string(): "B"
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["is_late"], true);
    assert_eq!(body["timed_out"], true);
    assert_eq!(body["result"]["correct"], 1);
    assert_eq!(body["result"]["total_questions"], 1);
    assert_eq!(body["result"]["time_taken_secs"], 1800);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn payment_confirmation_grants_subscription_once() {
    let app = spawn_app().await;
    let (_, admin_token) = create_user(&app.pool, Role::Owner).await;
    let (_, student_token) = create_user(&app.pool, Role::Student).await;
    let (_, other_token) = create_user(&app.pool, Role::Student).await;

    let plan: Value = app
        .client
        .post(app.url("/api/admin/plans"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "name": format!("Quarterly {}", uuid::Uuid::new_v4().simple()),
            "price_cents": 49900,
            "duration_days": 90,
            "features": ["All mocks", "Mentor sessions"]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = app
        .client
        .post(app.url("/api/payments/checkout"))
        .bearer_auth(&student_token)
        .json(&json!({ "plan_id": plan["id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let order: Value = response.json().await.unwrap();
    let payment_id = order["payment_id"].as_i64().unwrap();
    let order_ref = order["order_ref"].as_str().unwrap();
    let confirmation = json!({
        "provider_ref": "pay_123",
        "signature": SandboxGateway::expected_signature(order_ref, "pay_123")
    });

    // Someone else's payment is invisible
    let response = app
        .client
        .post(app.url(&format!("/api/payments/{payment_id}/confirm")))
        .bearer_auth(&other_token)
        .json(&confirmation)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .client
        .post(app.url(&format!("/api/payments/{payment_id}/confirm")))
        .bearer_auth(&student_token)
        .json(&confirmation)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["payment"]["status"], "succeeded");

    let response = app
        .client
        .post(app.url(&format!("/api/payments/{payment_id}/confirm")))
        .bearer_auth(&student_token)
        .json(&confirmation)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let body: Value = app
        .client
        .get(app.url("/api/payments/subscription"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["active"], true);
}

async fn checkout(app: &TestApp, token: &str, plan_id: i64) -> (i64, Value) {
    let order: Value = app
        .client
        .post(app.url("/api/payments/checkout"))
        .bearer_auth(token)
        .json(&json!({ "plan_id": plan_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let order_ref = order["order_ref"].as_str().unwrap();
    let provider_ref = format!("pay_{}", uuid::Uuid::new_v4().simple());
    let confirmation = json!({
        "signature": SandboxGateway::expected_signature(order_ref, &provider_ref),
        "provider_ref": provider_ref
    });
    (order["payment_id"].as_i64().unwrap(), confirmation)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_confirmations_stack_subscriptions() {
    let app = spawn_app().await;
    let (_, admin_token) = create_user(&app.pool, Role::Owner).await;
    let (student_id, student_token) = create_user(&app.pool, Role::Student).await;

    let plan: Value = app
        .client
        .post(app.url("/api/admin/plans"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "name": format!("Monthly {}", uuid::Uuid::new_v4().simple()),
            "price_cents": 19900,
            "duration_days": 30
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let plan_id = plan["id"].as_i64().unwrap();

    let (first_id, first) = checkout(&app, &student_token, plan_id).await;
    let (second_id, second) = checkout(&app, &student_token, plan_id).await;

    // Act: confirm both payments at once
    let confirm = |payment_id: i64, body: Value| {
        app.client
            .post(app.url(&format!("/api/payments/{payment_id}/confirm")))
            .bearer_auth(&student_token)
            .json(&body)
            .send()
    };
    let (a, b) = tokio::join!(confirm(first_id, first), confirm(second_id, second));
    assert_eq!(a.unwrap().status().as_u16(), 200);
    assert_eq!(b.unwrap().status().as_u16(), 200);

    // Assert: the second window starts where the first one ends
    let windows: Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT starts_at, ends_at FROM subscriptions WHERE user_id = $1 ORDER BY starts_at",
    )
    .bind(student_id)
    .fetch_all(&app.pool)
    .await
    .unwrap();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[1].0, windows[0].1);
    assert_eq!((windows[1].1 - windows[0].0).num_days(), 60);
}
