use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single pricing option for a monetized operation, as loaded from
/// `tool_pricing.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOption {
    pub chain_id: u64,
    pub token_address: String,
    #[serde(rename = "token_amount", alias = "token_amount_minor_units")]
    pub token_amount_minor_units: u64,
}

/// Operation id -> list of acceptable payment options.
pub type PricingConfig = HashMap<String, Vec<PaymentOption>>;

/// x402 `PaymentRequirements` object, one per accepted payment option, as
/// sent back in the `accepts` array of a 402 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    pub scheme: String,
    pub network: String,
    pub asset: String,
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u32,
    pub extra: PaymentRequirementExtra,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirementExtra {
    pub name: String,
    pub version: String,
}

/// Body of a 402 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirement>,
    pub error: String,
}

/// Opaque payment proof submitted by a Buyer in `X-PAYMENT`/`X-Payment-Proof`.
/// We only need to read `network` to select a matching requirement; the rest
/// passes through to the facilitator untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub network: String,
    #[serde(flatten)]
    pub rest: Value,
}

/// Result of a facilitator `verify` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default)]
    pub invalid_reason: Option<String>,
}

/// Result of a facilitator `settle` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default)]
    pub error_reason: Option<String>,
    #[serde(flatten)]
    pub rest: Value,
}
