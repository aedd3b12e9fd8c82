// src/handlers/payment.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::notification::notify_user,
    models::{
        pagination::{PageQuery, Paginated},
        payment::{
            CheckoutRequest, CheckoutResponse, ConfirmPaymentRequest, ConfirmPaymentResponse,
            CreatePlanRequest, PAYMENT_COLUMNS, PAYMENT_FAILED, PAYMENT_PENDING, PAYMENT_SUCCEEDED,
            PLAN_COLUMNS, Payment, Plan, SUBSCRIPTION_COLUMNS, Subscription, UpdatePlanRequest,
            subscription_window,
        },
    },
    utils::{gateway::PaymentGateway, jwt::AuthUser},
};

const DEFAULT_CURRENCY: &str = "INR";

/// Active plans, cheapest first.
pub async fn list_plans(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let plans = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans WHERE is_active = TRUE ORDER BY price_cents, id"
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(plans))
}

/// Opens a pending payment for a plan and returns the provider order.
pub async fn checkout(
    State(pool): State<PgPool>,
    State(gateway): State<Arc<dyn PaymentGateway>>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let plan = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1 AND is_active = TRUE"
    ))
    .bind(payload.plan_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Plan not found".to_string()))?;

    let order = gateway.create_order(plan.price_cents, &plan.currency).await?;

    let payment_id: i64 = sqlx::query_scalar(
        "INSERT INTO payments (user_id, plan_id, amount_cents, currency, status, order_ref)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(user.id)
    .bind(plan.id)
    .bind(order.amount_cents)
    .bind(&order.currency)
    .bind(PAYMENT_PENDING)
    .bind(&order.order_ref)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create payment: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(payment_id, plan_id = plan.id, user_id = user.id, "checkout started");

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            payment_id,
            order_ref: order.order_ref,
            amount_cents: order.amount_cents,
            currency: order.currency,
            provider: order.provider,
        }),
    ))
}

/// Confirms a pending payment with the provider's reference and signature.
///
/// * The payment row is locked for the whole confirmation.
/// * A verified payment is marked succeeded and grants a subscription,
///   extending any active one.
/// * A declined payment is marked failed and reported as 400.
/// * Anything but a pending payment is a 409.
pub async fn confirm(
    State(pool): State<PgPool>,
    State(gateway): State<Arc<dyn PaymentGateway>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    // Serializes confirmations per user so subscription windows stack.
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Payment not found".to_string()))?;

    if payment.user_id != user.id {
        return Err(AppError::NotFound("Payment not found".to_string()));
    }
    if payment.status != PAYMENT_PENDING {
        return Err(AppError::Conflict(format!("Payment is already {}", payment.status)));
    }

    let verified = gateway
        .verify_payment(&payment.order_ref, &payload.provider_ref, &payload.signature)
        .await?;

    if !verified {
        sqlx::query("UPDATE payments SET status = $1, provider_ref = $2 WHERE id = $3")
            .bind(PAYMENT_FAILED)
            .bind(&payload.provider_ref)
            .bind(payment.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::warn!(payment_id = payment.id, "payment declined by provider");
        return Err(AppError::BadRequest("Payment was declined".to_string()));
    }

    let now = Utc::now();
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET status = $1, provider_ref = $2, paid_at = $3 WHERE id = $4
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(PAYMENT_SUCCEEDED)
    .bind(&payload.provider_ref)
    .bind(now)
    .bind(payment.id)
    .fetch_one(&mut *tx)
    .await?;

    let (duration_days, plan_name): (i32, String) =
        sqlx::query_as("SELECT duration_days, name FROM plans WHERE id = $1")
            .bind(payment.plan_id)
            .fetch_one(&mut *tx)
            .await?;

    let current_end: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT MAX(ends_at) FROM subscriptions WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(&mut *tx)
            .await?;

    let (starts_at, ends_at) = subscription_window(now, current_end, duration_days);

    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        "INSERT INTO subscriptions (user_id, plan_id, payment_id, starts_at, ends_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {SUBSCRIPTION_COLUMNS}"
    ))
    .bind(user.id)
    .bind(payment.plan_id)
    .bind(payment.id)
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(&mut *tx)
    .await?;

    notify_user(
        &mut *tx,
        user.id,
        "Payment received",
        &format!(
            "Your {} plan is active until {}",
            plan_name,
            ends_at.format("%Y-%m-%d")
        ),
        "payment",
    )
    .await?;

    tx.commit().await?;

    tracing::info!(payment_id = payment.id, subscription_id = subscription.id, "payment confirmed");

    Ok(Json(ConfirmPaymentResponse {
        payment,
        subscription,
    }))
}

pub async fn payment_history(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;

    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(user.id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(payments, total, page)))
}

/// The subscription covering now, if any.
pub async fn current_subscription(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE user_id = $1 AND starts_at <= NOW() AND ends_at > NOW()
         ORDER BY ends_at DESC
         LIMIT 1"
    ))
    .bind(user.id)
    .fetch_optional(&pool)
    .await?;

    // Renewals bought ahead of time start later; report the furthest end date.
    let active_until: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT MAX(ends_at) FROM subscriptions WHERE user_id = $1 AND ends_at > NOW()")
            .bind(user.id)
            .fetch_one(&pool)
            .await?;

    Ok(Json(json!({
        "active": subscription.is_some(),
        "subscription": subscription,
        "active_until": active_until,
    })))
}

/// Admin only.
pub async fn create_plan(
    State(pool): State<PgPool>,
    Json(payload): Json<CreatePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let currency = payload
        .currency
        .as_deref()
        .unwrap_or(DEFAULT_CURRENCY)
        .to_uppercase();

    let plan = sqlx::query_as::<_, Plan>(&format!(
        "INSERT INTO plans (name, description, price_cents, currency, duration_days, features)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {PLAN_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.price_cents)
    .bind(&currency)
    .bind(payload.duration_days)
    .bind(SqlJson(&payload.features))
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, format!("Plan '{}' already exists", payload.name.trim())))?;

    Ok((StatusCode::CREATED, Json(plan)))
}

/// Admin only. Price changes apply to future checkouts.
pub async fn update_plan(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let plan = sqlx::query_as::<_, Plan>(&format!(
        "UPDATE plans SET
            description = COALESCE($1, description),
            price_cents = COALESCE($2, price_cents),
            features = COALESCE($3, features),
            is_active = COALESCE($4, is_active)
         WHERE id = $5
         RETURNING {PLAN_COLUMNS}"
    ))
    .bind(payload.description.as_deref())
    .bind(payload.price_cents)
    .bind(payload.features.as_ref().map(SqlJson))
    .bind(payload.is_active)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Plan not found".to_string()))?;

    Ok(Json(plan))
}
