use aws_sdk_dynamodb::Client as DynamoClient;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::{
    http::{HeaderMap, StatusCode},
    Body, Error, Response,
};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error as ThisError;

use crate::types::SyncUserRequest;
use crate::users;

type HmacSha256 = Hmac<Sha256>;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

/// Secret prefix issued by the identity provider's webhook portal.
const SECRET_PREFIX: &str = "whsec_";

/// Accepted skew between the delivery timestamp and our clock.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, ThisError)]
pub enum VerificationError {
    #[error("webhook secret is not configured")]
    MissingSecret,
    #[error("missing one or more svix headers")]
    MissingHeaders,
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("verified payload is not a valid event envelope: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Identity events delivered by Clerk. Only `user.created` carries fields we
/// read; every other type decodes to `Other` and is ignored upstream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEvent {
    #[serde(rename = "user.created")]
    UserCreated { data: UserCreatedData },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct UserCreatedData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

impl UserCreatedData {
    /// First listed email, or empty when the provider sent none.
    pub fn primary_email(&self) -> String {
        self.email_addresses
            .first()
            .map(|e| e.email_address.clone())
            .unwrap_or_default()
    }

    /// "{first} {last}" with missing parts dropped.
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Verifies Svix-signed deliveries against a shared secret.
///
/// Constructed with the secret value itself so it can be exercised without
/// touching the process environment; the router owns env resolution.
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, VerificationError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| VerificationError::InvalidSignature)?;
        Ok(Self { key })
    }

    /// Verify a delivery and decode its event envelope.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, VerificationError> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
    ) -> Result<WebhookEvent, VerificationError> {
        let msg_id = header_str(headers, ID_HEADER)?;
        let timestamp = header_str(headers, TIMESTAMP_HEADER)?;
        let signatures = header_str(headers, SIGNATURE_HEADER)?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| VerificationError::InvalidSignature)?;
        if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(VerificationError::InvalidSignature);
        }

        // The header may carry several space-separated candidates (key
        // rotation); any matching v1 entry authenticates the delivery.
        let matched = signatures.split_whitespace().any(|part| {
            part.strip_prefix("v1,")
                .map(|candidate| self.signature_matches(msg_id, timestamp, body, candidate))
                .unwrap_or(false)
        });
        if !matched {
            return Err(VerificationError::InvalidSignature);
        }

        Ok(serde_json::from_slice(body)?)
    }

    fn signature_matches(&self, msg_id: &str, timestamp: &str, body: &[u8], candidate: &str) -> bool {
        let decoded = match general_purpose::STANDARD.decode(candidate) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC can take key of any size");
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&decoded).is_ok()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, VerificationError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(VerificationError::MissingHeaders)
}

/// POST /clerk-webhook - verify an inbound identity event and sync the user
///
/// Responses follow the delivery contract: 200 for processed or ignored
/// events, 400 for anything the verifier rejects, 500 when the secret is
/// absent or the downstream sync fails (the provider retries on non-2xx).
pub async fn handle_clerk_webhook(
    client: &DynamoClient,
    table_name: &str,
    secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let secret = match secret {
        Some(secret) => secret,
        None => {
            tracing::error!("{}", VerificationError::MissingSecret);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": "Webhook secret is not configured"}),
            );
        }
    };

    let event = match WebhookVerifier::new(secret).and_then(|v| v.verify(headers, body)) {
        Ok(event) => event,
        Err(VerificationError::MissingHeaders) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": "Missing svix headers"}),
            );
        }
        Err(err) => {
            tracing::error!("Error verifying webhook: {}", err);
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": "Webhook verification failed"}),
            );
        }
    };

    match event {
        WebhookEvent::UserCreated { data } => {
            let request = SyncUserRequest {
                clerk_id: data.id.clone(),
                name: data.full_name(),
                username: String::new(),
                email: data.primary_email(),
                phone: String::new(),
                location: String::new(),
                image: data.image_url.clone(),
                role: None,
            };

            if let Err(err) = users::sync_user_record(client, table_name, &request).await {
                tracing::error!("Error creating user {}: {}", request.clerk_id, err);
                return json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({"error": "Error creating user"}),
                );
            }

            tracing::info!("Synced user {} from webhook", request.clerk_id);
        }
        WebhookEvent::Other => {
            tracing::info!("Ignoring unhandled webhook event type");
        }
    }

    json_response(
        StatusCode::OK,
        serde_json::json!({"message": "Webhook processed successfully"}),
    )
}

fn json_response(
    status: StatusCode,
    body: serde_json::Value,
) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(body.to_string().into())
        .map_err(Box::new)?)
}
