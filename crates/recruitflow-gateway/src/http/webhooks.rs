//! Webhook ingress (spec §4.3): post-call events from the voice agent and
//! inbound WhatsApp messages from the Whapi gateway. Both are POST-only and
//! CSRF-exempt — external callers cannot obtain a CSRF token.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use recruitflow_calls::{apply_call_result, bind_late_conversation_id, get_call_by_conversation_id};
use recruitflow_candidates::{get_candidate, get_position};
use recruitflow_eval::evaluate_call;
use recruitflow_matching::{extract_text, match_inbound, store_cv_file, InboundChannel, InboundCv};
use recruitflow_messaging::save_candidate_reply;
use recruitflow_state::get_application;

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

const WHAPI_MEDIA_TYPES: &[&str] = &["image", "document", "audio", "video", "sticker", "file"];

// ── Voice-agent webhook ────────────────────────────────────────────────────

/// POST /webhooks/voice-agent
pub async fn voice_agent_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cfg = &state.config.webhooks;

    match &cfg.voice_agent_secret {
        Some(secret) => {
            if let Err(reason) = verify_voice_agent_signature(&headers, &body, secret, cfg.signature_tolerance_secs) {
                return Err(auth_error(&reason));
            }
        }
        None if cfg.development_mode => {
            warn!("voice-agent webhook secret not configured — skipping signature check (development mode)");
        }
        None => {
            warn!("voice-agent webhook secret missing in production");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "server_misconfigured"})),
            ));
        }
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid JSON in voice-agent webhook body");
        (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid JSON body"})))
    })?;

    let data = payload.get("data").cloned().unwrap_or_else(|| payload.clone());

    let conversation_id = data
        .get("conversation_id")
        .or_else(|| payload.get("conversation_id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let Some(conversation_id) = conversation_id else {
        warn!(payload = %payload, "voice-agent webhook missing conversation_id");
        return Ok(Json(json!({"status": "no_conversation_id"})));
    };

    let mut conn = state.conn.lock().await;

    let call = match get_call_by_conversation_id(&conn, &conversation_id) {
        Ok(Some(call)) => call,
        Ok(None) => {
            let app_id = extract_batch_application_id(&payload, &data);
            let bound = match app_id {
                Some(app_id) => bind_late_conversation_id(&mut conn, app_id, &conversation_id).map_err(db_error)?,
                None => None,
            };
            match bound {
                Some(call) => call,
                None => {
                    warn!(conversation_id = %conversation_id, "voice-agent webhook: call not found (late-binding also failed)");
                    return Ok(Json(json!({"status": "call_not_found"})));
                }
            }
        }
        Err(e) => return Err(db_error(e)),
    };

    let (call_status, is_completed) = apply_call_result(&mut conn, &state.cache, &call, &data).map_err(db_error)?;
    info!(conversation_id = %conversation_id, status = call_status.as_str(), is_completed, "voice-agent webhook processed");

    if is_completed {
        if let Err(e) = dispatch_evaluation(&state, &mut conn, call.id).await {
            warn!(call_id = call.id, error = %e, "evaluation dispatch failed after voice-agent webhook");
        }
    }

    Ok(Json(json!({"status": "ok"})))
}

/// Header format: `t={unix},v0={hex_hmac}`, signed over `"{t}.{raw_body}"`.
fn verify_voice_agent_signature(headers: &HeaderMap, body: &Bytes, secret: &str, tolerance_secs: i64) -> Result<(), String> {
    let sig_header = headers
        .get("elevenlabs-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing ElevenLabs-Signature header".to_string())?;

    let mut timestamp_str = None;
    let mut received_sig = None;
    for part in sig_header.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            match key {
                "t" => timestamp_str = Some(value),
                "v0" => received_sig = Some(value),
                _ => {}
            }
        }
    }
    let timestamp_str = timestamp_str.ok_or_else(|| "ElevenLabs-Signature header missing t= component".to_string())?;
    let received_sig = received_sig.ok_or_else(|| "ElevenLabs-Signature header missing v0= component".to_string())?;

    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| "ElevenLabs-Signature timestamp is not an integer".to_string())?;

    let age = Utc::now().timestamp() - timestamp;
    if age.abs() > tolerance_secs {
        return Err(format!("ElevenLabs-Signature timestamp is too old (age={age}s)"));
    }

    let expected = hex::decode(received_sig).map_err(|_| "ElevenLabs-Signature v0 is not valid hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(timestamp_str.as_bytes());
    mac.update(b".");
    mac.update(body);

    mac.verify_slice(&expected).map_err(|_| "ElevenLabs-Signature HMAC mismatch".to_string())
}

fn extract_batch_application_id(payload: &Value, data: &Value) -> Option<i64> {
    for container in [data, payload] {
        if let Some(user_id) = container
            .get("conversation_initiation_client_data")
            .and_then(|c| c.get("user_id"))
        {
            if let Some(id) = user_id.as_i64() {
                return Some(id);
            }
            if let Some(id) = user_id.as_str().and_then(|s| s.parse().ok()) {
                return Some(id);
            }
        }
    }
    None
}

async fn dispatch_evaluation(state: &AppState, conn: &mut rusqlite::Connection, call_id: i64) -> anyhow::Result<()> {
    let call = recruitflow_calls::get_call(conn, call_id)?.ok_or_else(|| anyhow::anyhow!("call {call_id} vanished"))?;
    let application = get_application(conn, call.application_id)?.ok_or_else(|| anyhow::anyhow!("application not found"))?;
    let candidate = get_candidate(conn, application.candidate_id)?.ok_or_else(|| anyhow::anyhow!("candidate not found"))?;
    let position = get_position(conn, application.position_id)?.ok_or_else(|| anyhow::anyhow!("position not found"))?;

    evaluate_call(
        conn,
        &state.cache,
        state.llm_provider.as_ref(),
        &state.llm_model,
        &call,
        &candidate,
        &position,
        state.whatsapp.as_ref(),
        state.email.as_ref(),
    )
    .await?;
    Ok(())
}

// ── WhatsApp (Whapi) webhook ───────────────────────────────────────────────

/// POST /webhooks/whatsapp
pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cfg = &state.config.whapi;

    match &cfg.token {
        Some(expected) => {
            if !verify_whapi_token(&headers, expected) {
                return Err(auth_error("invalid or missing Whapi token"));
            }
        }
        None if state.config.webhooks.development_mode => {
            warn!("WhatsApp webhook token not configured — skipping check (development mode)");
        }
        None => {
            warn!("WhatsApp webhook token missing in production");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "server_misconfigured"})),
            ));
        }
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid JSON in WhatsApp webhook body");
        (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid JSON body"})))
    })?;

    let messages = payload.get("messages").and_then(Value::as_array).cloned().unwrap_or_default();
    if messages.is_empty() {
        return Ok(Json(json!({"status": "no_messages"})));
    }

    for message in &messages {
        if let Err(e) = handle_whapi_message(&state, message).await {
            warn!(error = %e, "failed to process inbound WhatsApp message");
        }
    }

    Ok(Json(json!({"status": "ok"})))
}

fn verify_whapi_token(headers: &HeaderMap, expected: &str) -> bool {
    if let Some(token) = headers.get("x-whapi-token").and_then(|v| v.to_str().ok()) {
        return constant_time_eq(token.as_bytes(), expected.as_bytes());
    }
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return constant_time_eq(token.as_bytes(), expected.as_bytes());
        }
    }
    false
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

async fn handle_whapi_message(state: &AppState, msg: &Value) -> anyhow::Result<()> {
    let msg_type = msg.get("type").and_then(Value::as_str).unwrap_or("").to_lowercase();
    if msg.get("from_me").and_then(Value::as_bool).unwrap_or(false) || msg.get("fromMe").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }

    let sender_raw = msg.get("from").and_then(Value::as_str).unwrap_or("");
    let sender = sender_raw.split('@').next().unwrap_or(sender_raw).to_string();
    let message_id = msg.get("id").and_then(Value::as_str);

    if WHAPI_MEDIA_TYPES.contains(&msg_type.as_str()) {
        let media = msg.get(&msg_type).or_else(|| msg.get("media"));
        let media_url = media
            .and_then(|m| m.get("link").or_else(|| m.get("url")))
            .and_then(Value::as_str)
            .unwrap_or("");
        let file_name = media
            .and_then(|m| m.get("file_name").or_else(|| m.get("filename")).or_else(|| m.get("name")))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("attachment.{msg_type}"));
        let caption = whapi_text(msg, &msg_type);

        if media_url.is_empty() {
            warn!(sender = %sender, msg_type = %msg_type, "WhatsApp media message has no URL, skipping");
            return Ok(());
        }
        if !media_url.starts_with("https://") {
            warn!(sender = %sender, "rejected non-HTTPS WhatsApp media URL");
            return Ok(());
        }

        let Some(content) = download_whapi_media(state, media_url).await else {
            return Ok(());
        };

        let content_text = extract_text(&file_name, &content);
        let stored_path = match store_cv_file(&state.config.storage.cv_dir, &file_name, &content).await {
            Ok(path) => path,
            Err(e) => {
                warn!(sender = %sender, error = %e, "failed to persist WhatsApp attachment to disk");
                return Ok(());
            }
        };
        let mut conn = state.conn.lock().await;
        let input = InboundCv {
            channel: InboundChannel::Whatsapp,
            sender: sender.clone(),
            file_name,
            file_path: stored_path,
            subject_or_body: if caption.is_empty() { None } else { Some(caption.as_str()) },
            content_text: content_text.as_deref(),
        };
        if let Err(e) = match_inbound(&mut conn, &state.cache, Some(state.llm_provider.as_ref()), &state.extraction_model, input).await {
            warn!(sender = %sender, error = %e, "CV matching cascade failed for WhatsApp attachment");
        }

        if !caption.is_empty() {
            if let Err(e) = save_candidate_reply(&conn, recruitflow_messaging::MessageChannel::Whatsapp, &sender, &caption, None, message_id) {
                warn!(sender = %sender, error = %e, "failed to save WhatsApp caption reply");
            }
        }
    } else if msg_type == "text" {
        let body = whapi_text(msg, &msg_type);
        if !body.is_empty() {
            let conn = state.conn.lock().await;
            if let Err(e) = save_candidate_reply(&conn, recruitflow_messaging::MessageChannel::Whatsapp, &sender, &body, None, message_id) {
                warn!(sender = %sender, error = %e, "failed to save WhatsApp text reply");
            }
        }
    }

    Ok(())
}

/// Whapi nests text under a type-specific key; captions fall back to a
/// top-level `caption`, then the type key's own `caption`, then `body`.
fn whapi_text(msg: &Value, msg_type: &str) -> String {
    if let Some(body) = msg.get("text").and_then(|t| t.get("body")).and_then(Value::as_str) {
        let body = body.trim();
        if !body.is_empty() {
            return body.to_string();
        }
    }

    let caption = msg
        .get("caption")
        .and_then(Value::as_str)
        .or_else(|| msg.get(msg_type).and_then(|t| t.get("caption")).and_then(Value::as_str))
        .unwrap_or("");
    if !caption.is_empty() {
        return caption.trim().to_string();
    }

    msg.get("body").and_then(Value::as_str).unwrap_or("").trim().to_string()
}

async fn download_whapi_media(state: &AppState, url: &str) -> Option<Vec<u8>> {
    let mut req = state.http_client.get(url);
    if let Some(token) = &state.config.whapi.token {
        req = req.bearer_auth(token);
    }
    match req.send().await {
        Ok(resp) => match resp.error_for_status() {
            Ok(resp) => resp.bytes().await.ok().map(|b| b.to_vec()),
            Err(e) => {
                warn!(error = %e, "WhatsApp media download returned error status");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "WhatsApp media download failed");
            None
        }
    }
}

// ── Error helpers ──────────────────────────────────────────────────────────

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "webhook authentication failed");
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "authentication failed", "reason": reason})))
}

fn db_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    warn!(error = %e, "webhook database error");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal error"})))
}
