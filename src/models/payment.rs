// src/models/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

pub const PLAN_COLUMNS: &str =
    "id, name, description, price_cents, currency, duration_days, features, is_active, created_at";

pub const PAYMENT_COLUMNS: &str =
    "id, user_id, plan_id, amount_cents, currency, status, order_ref, provider_ref, created_at, paid_at";

pub const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan_id, payment_id, starts_at, ends_at, created_at";

pub const PAYMENT_PENDING: &str = "pending";
pub const PAYMENT_SUCCEEDED: &str = "succeeded";
pub const PAYMENT_FAILED: &str = "failed";

/// Represents the 'plans' table: a purchasable subscription tier.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub duration_days: i32,
    pub features: Json<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'payments' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    /// 'pending', 'succeeded' or 'failed'.
    pub status: String,
    pub order_ref: String,
    pub provider_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Represents the 'subscriptions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub payment_id: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(range(min = 1, max = 3660))]
    pub duration_days: i32,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    pub features: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment_id: i64,
    pub order_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub provider: &'static str,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, max = 200))]
    pub provider_ref: String,
    #[validate(length(min = 1, max = 500))]
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub payment: Payment,
    pub subscription: Subscription,
}

/// New subscription window. Buying while a subscription is active extends
/// from its end instead of from now.
pub fn subscription_window(
    now: DateTime<Utc>,
    current_end: Option<DateTime<Utc>>,
    duration_days: i32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let starts_at = match current_end {
        Some(end) if end > now => end,
        _ => now,
    };
    (starts_at, starts_at + chrono::Duration::days(i64::from(duration_days)))
}
