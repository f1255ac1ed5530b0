// libs/appointment-cell/src/services/payment.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::models::{AppointmentError, ChargeOutcome, ChargeRequest, PaymentOrder};

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens an order the checkout widget collects against.
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentOrder, AppointmentError>;

    /// Confirms the widget's result. `Declined` is a normal outcome; `Err`
    /// means the gateway itself could not be reached or understood.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, AppointmentError>;
}

pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.razorpay_base_url.trim_end_matches('/').to_string(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
        }
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.key_id, self.key_secret);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    /// Lower-case hex HMAC-SHA256 of `order_id|payment_id`.
    pub fn sign(key_secret: &str, order_id: &str, payment_id: &str) -> Result<String, AppointmentError> {
        let digest = payment_mac(key_secret, order_id, payment_id)?.finalize().into_bytes();
        Ok(encode_hex(&digest))
    }

    fn verify(&self, request: &ChargeRequest) -> Result<bool, AppointmentError> {
        let Some(signature) = decode_hex(&request.signature) else {
            return Ok(false);
        };
        let mac = payment_mac(&self.key_secret, &request.order_id, &request.payment_id)?;
        Ok(mac.verify_slice(&signature).is_ok())
    }
}

/// The checkout widget's signature scheme, keyed by the key secret.
fn payment_mac(key_secret: &str, order_id: &str, payment_id: &str) -> Result<HmacSha256, AppointmentError> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|e| AppointmentError::ExternalCollaboratorFailure(e.to_string()))?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentOrder, AppointmentError> {
        let url = format!("{}/orders", self.base_url);
        debug!("Creating payment order of {} {} for {}", amount, currency, receipt);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await
            .map_err(|e| AppointmentError::ExternalCollaboratorFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Payment order failed ({}): {}", status, body);
            return Err(AppointmentError::ExternalCollaboratorFailure(format!(
                "payment gateway returned {}",
                status
            )));
        }

        response
            .json::<PaymentOrder>()
            .await
            .map_err(|e| AppointmentError::ExternalCollaboratorFailure(e.to_string()))
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, AppointmentError> {
        if self.verify(request)? {
            return Ok(ChargeOutcome::Succeeded {
                reference: request.payment_id.clone(),
            });
        }

        warn!("Payment signature mismatch for order {}", request.order_id);
        Ok(ChargeOutcome::Declined {
            reason: "payment signature verification failed".to_string(),
        })
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| input.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
