use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::discord::CorrelationId;
use crate::dispatch::dispatch;
use crate::interaction::{Interaction, InteractionResponse};
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Check an interaction request signature: Ed25519 over the timestamp
/// header followed by the raw body.
fn verify_interaction_signature(
    public_key: &VerifyingKey,
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> bool {
    let signature_bytes = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match Signature::from_slice(&signature_bytes) {
        Ok(signature) => signature,
        Err(_) => return false,
    };

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    public_key.verify(&message, &signature).is_ok()
}

async fn verify_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)
    };
    let signature = header(SIGNATURE_HEADER)?;
    let timestamp = header(TIMESTAMP_HEADER)?;

    if !verify_interaction_signature(&state.public_key, timestamp, &bytes, signature) {
        error!("Invalid interaction signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let correlation_id = CorrelationId(Uuid::new_v4().to_string());
    let mut request = Request::from_parts(parts, axum::body::Body::from(bytes));
    request.extensions_mut().insert(correlation_id);

    Ok(next.run(request).await)
}

pub async fn interactions_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<InteractionResponse>, StatusCode> {
    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let (_parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let interaction: Interaction = serde_json::from_slice(&bytes).map_err(|e| {
        warn!("[{}] Undecodable interaction: {}", correlation_id, e);
        StatusCode::BAD_REQUEST
    })?;
    debug!(
        "[{}] Interaction {} of type {}",
        correlation_id, interaction.id, interaction.kind
    );

    Ok(Json(dispatch(&state.bot, &interaction).await))
}

pub fn interactions_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/interactions", post(interactions_handler))
        .layer(middleware::from_fn_with_state(state, verify_signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tradedesk_core::{
        Bot, ChannelId, FakePlatform, GuildSettings, RoleId, Store, StorePaths,
    };

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn app() -> Router {
        let dir = std::env::temp_dir().join(format!("tradedesk_webhook_{}", std::process::id()));
        let settings = GuildSettings {
            tickets_category: Some(ChannelId(1)),
            transcript_channel: None,
            vouch_channel: None,
            info_log_channel: None,
            ban_log_channel: None,
            middleman_role: RoleId(50),
            manager_role: RoleId(60),
            info_role: RoleId(70),
        };
        let bot = Bot::new(
            settings,
            Store::empty(StorePaths::in_dir(&dir)),
            Arc::new(FakePlatform::new()),
        );
        let state = Arc::new(AppState {
            bot: Arc::new(bot),
            public_key: signing_key().verifying_key(),
        });
        interactions_router(state.clone()).with_state(state)
    }

    fn signed_request(body: &str, key: &SigningKey) -> Request {
        let timestamp = "1700000000";
        let signature = key.sign(format!("{}{}", timestamp, body).as_bytes());
        Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, hex::encode(signature.to_bytes()))
            .header(TIMESTAMP_HEADER, timestamp)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_verify_interaction_signature() {
        let key = signing_key();
        let signature = hex::encode(key.sign(b"123{\"type\":1}").to_bytes());
        let public = key.verifying_key();

        assert!(verify_interaction_signature(&public, "123", b"{\"type\":1}", &signature));
        assert!(!verify_interaction_signature(&public, "124", b"{\"type\":1}", &signature));
        assert!(!verify_interaction_signature(&public, "123", b"{\"type\":2}", &signature));
        assert!(!verify_interaction_signature(&public, "123", b"{}", "not-hex"));
        assert!(!verify_interaction_signature(&public, "123", b"{}", "abcd"));
    }

    #[tokio::test]
    async fn test_signed_ping_gets_pong() {
        let body = r#"{"id":"1","type":1,"token":"t"}"#;
        let response = app()
            .oneshot(signed_request(body, &signing_key()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"type": 1}));
    }

    #[tokio::test]
    async fn test_wrong_key_is_unauthorized() {
        let body = r#"{"id":"1","type":1,"token":"t"}"#;
        let impostor = SigningKey::from_bytes(&[9u8; 32]);
        let response = app()
            .oneshot(signed_request(body, &impostor))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_signature_is_unauthorized() {
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .body(Body::from(r#"{"id":"1","type":1,"token":"t"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_garbage_is_bad_request() {
        let response = app()
            .oneshot(signed_request("not json", &signing_key()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signed_command_is_dispatched() {
        let body = json!({
            "id": "5",
            "type": 2,
            "token": "t",
            "channel_id": "9",
            "member": {
                "user": {"id": "3", "username": "sam", "global_name": null},
                "roles": [],
                "nick": null
            },
            "data": {"name": "faq"}
        })
        .to_string();
        let response = app()
            .oneshot(signed_request(&body, &signing_key()))
            .await
            .unwrap();
        let value = json_body(response).await;
        assert_eq!(value["type"], 4);
        assert_eq!(
            value["data"]["embeds"][0]["title"],
            "📌 Frequently Asked Questions"
        );
    }
}
