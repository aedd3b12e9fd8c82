// src/utils/gateway.rs

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

/// Order handle returned to the client so it can complete payment with the provider.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrder {
    pub order_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub provider: &'static str,
}

/// Seam between the payments handlers and a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, amount_cents: i64, currency: &str) -> Result<GatewayOrder, AppError>;

    /// Checks the provider's confirmation for an order. `Ok(false)` means the
    /// provider reported the payment as declined.
    async fn verify_payment(
        &self,
        order_ref: &str,
        provider_ref: &str,
        signature: &str,
    ) -> Result<bool, AppError>;
}

/// Offline provider used in development and tests.
///
/// A confirmation is valid when `signature == "{order_ref}:{provider_ref}"`.
/// Provider references starting with `fail_` are reported as declined.
#[derive(Debug, Default, Clone)]
pub struct SandboxGateway;

impl SandboxGateway {
    pub fn expected_signature(order_ref: &str, provider_ref: &str) -> String {
        format!("{order_ref}:{provider_ref}")
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_order(&self, amount_cents: i64, currency: &str) -> Result<GatewayOrder, AppError> {
        if amount_cents < 0 {
            return Err(AppError::BadRequest("Amount cannot be negative".to_string()));
        }
        Ok(GatewayOrder {
            order_ref: format!("order_{}", uuid::Uuid::new_v4().simple()),
            amount_cents,
            currency: currency.to_string(),
            provider: "sandbox",
        })
    }

    async fn verify_payment(
        &self,
        order_ref: &str,
        provider_ref: &str,
        signature: &str,
    ) -> Result<bool, AppError> {
        if provider_ref.trim().is_empty() {
            return Err(AppError::BadRequest("Missing provider reference".to_string()));
        }
        if signature != Self::expected_signature(order_ref, provider_ref) {
            return Err(AppError::BadRequest("Payment signature mismatch".to_string()));
        }
        Ok(!provider_ref.starts_with("fail_"))
    }
}
