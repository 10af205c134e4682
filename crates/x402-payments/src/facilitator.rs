use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use x402_types::{PaymentPayload, PaymentRequirement, SettleResponse, VerifyResponse};

const VERIFY_MAX_RETRIES: u32 = 5;
const VERIFY_RETRY_DELAY_SECONDS: f64 = 1.0;

/// Oracle for payment verification and settlement. Implementations talk to
/// whatever facilitator service actually holds the chain state; the
/// middleware only depends on this trait.
#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(
        &self,
        payment: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> anyhow::Result<VerifyResponse>;

    async fn settle(
        &self,
        payment: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> anyhow::Result<SettleResponse>;
}

/// Verifies with exponential backoff: base delay 1s, doubling, capped at
/// five attempts — ported from `_verify_with_retry`.
pub async fn verify_with_retry(
    facilitator: &dyn Facilitator,
    payment: &PaymentPayload,
    requirement: &PaymentRequirement,
) -> anyhow::Result<VerifyResponse> {
    let mut last_err = None;
    for attempt in 1..=VERIFY_MAX_RETRIES {
        match facilitator.verify(payment, requirement).await {
            Ok(response) => return Ok(response),
            Err(err) => {
                warn!(attempt, max = VERIFY_MAX_RETRIES, %err, "facilitator verify failed");
                last_err = Some(err);
                if attempt < VERIFY_MAX_RETRIES {
                    let delay = VERIFY_RETRY_DELAY_SECONDS * 2f64.powi(attempt as i32 - 1);
                    info!(delay_seconds = delay, "retrying payment verification");
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("facilitator verify failed with no error")))
}

/// Talks to a real x402 facilitator service over HTTP.
pub struct HttpFacilitatorClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFacilitatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Facilitator for HttpFacilitatorClient {
    async fn verify(
        &self,
        payment: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> anyhow::Result<VerifyResponse> {
        let response = self
            .client
            .post(format!("{}/verify", self.base_url))
            .json(&serde_json::json!({
                "paymentPayload": payment,
                "paymentRequirements": requirement,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<VerifyResponse>()
            .await?;
        Ok(response)
    }

    async fn settle(
        &self,
        payment: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> anyhow::Result<SettleResponse> {
        let response = self
            .client
            .post(format!("{}/settle", self.base_url))
            .json(&serde_json::json!({
                "paymentPayload": payment,
                "paymentRequirements": requirement,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<SettleResponse>()
            .await?;
        Ok(response)
    }
}

/// Used when no facilitator is configured (local/dev mode). The middleware
/// checks for this case before ever calling `verify`/`settle`, so these
/// implementations only exist to give `seller-node` a type to hand the
/// middleware when payments are disabled outright.
pub struct NullFacilitator;

#[async_trait]
impl Facilitator for NullFacilitator {
    async fn verify(
        &self,
        _payment: &PaymentPayload,
        _requirement: &PaymentRequirement,
    ) -> anyhow::Result<VerifyResponse> {
        Ok(VerifyResponse {
            is_valid: true,
            invalid_reason: None,
        })
    }

    async fn settle(
        &self,
        _payment: &PaymentPayload,
        _requirement: &PaymentRequirement,
    ) -> anyhow::Result<SettleResponse> {
        Ok(SettleResponse {
            success: true,
            error_reason: None,
            rest: serde_json::json!({}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyFacilitator {
        failures_before_success: u32,
        attempts: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Facilitator for FlakyFacilitator {
        async fn verify(
            &self,
            _payment: &PaymentPayload,
            _requirement: &PaymentRequirement,
        ) -> anyhow::Result<VerifyResponse> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures_before_success {
                anyhow::bail!("facilitator unreachable");
            }
            Ok(VerifyResponse {
                is_valid: true,
                invalid_reason: None,
            })
        }

        async fn settle(
            &self,
            _payment: &PaymentPayload,
            _requirement: &PaymentRequirement,
        ) -> anyhow::Result<SettleResponse> {
            unreachable!()
        }
    }

    fn sample_payment() -> PaymentPayload {
        PaymentPayload {
            network: "base".to_string(),
            rest: serde_json::json!({}),
        }
    }

    fn sample_requirement() -> PaymentRequirement {
        PaymentRequirement {
            scheme: "exact".to_string(),
            network: "base".to_string(),
            asset: "0xabc".to_string(),
            max_amount_required: "1000".to_string(),
            resource: "http://localhost/execute".to_string(),
            description: "test".to_string(),
            mime_type: "".to_string(),
            pay_to: "0xdead".to_string(),
            max_timeout_seconds: 60,
            extra: x402_types::PaymentRequirementExtra {
                name: "USDC".to_string(),
                version: "2".to_string(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let facilitator = FlakyFacilitator {
            failures_before_success: 2,
            attempts: Arc::new(AtomicU32::new(0)),
        };
        let result = verify_with_retry(&facilitator, &sample_payment(), &sample_requirement()).await;
        assert!(result.unwrap().is_valid);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let facilitator = FlakyFacilitator {
            failures_before_success: 10,
            attempts: Arc::new(AtomicU32::new(0)),
        };
        let result = verify_with_retry(&facilitator, &sample_payment(), &sample_requirement()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn null_facilitator_always_approves() {
        let facilitator = NullFacilitator;
        let verified = facilitator
            .verify(&sample_payment(), &sample_requirement())
            .await
            .unwrap();
        assert!(verified.is_valid);
    }
}
