//! JSON-lines control protocol
//!
//! One request object per line, tagged by `op`; one response object per line.
//! Malformed input produces an error response and never stops the loop.

use crate::service::{Governance, RequestOutcome};
use crate::types::{ChatKey, ChatType, Platform};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use tracing::debug;

/// Default number of chats returned by `top`
const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Decide {
        chat: ChatKey,
        #[serde(default, deserialize_with = "lenient_chat_type")]
        chat_type: ChatType,
    },
    Record {
        chat: ChatKey,
        #[serde(default, deserialize_with = "lenient_chat_type")]
        chat_type: ChatType,
        platform: Platform,
        success: bool,
        #[serde(default)]
        chat_name: Option<String>,
        #[serde(default, deserialize_with = "clamped_u64")]
        latency_ms: Option<u64>,
        #[serde(default, deserialize_with = "clamped_u64")]
        file_size_bytes: Option<u64>,
        #[serde(default)]
        error: Option<String>,
    },
    Performance {
        chat: ChatKey,
        platform: Platform,
        #[serde(deserialize_with = "clamped_u64")]
        latency_ms: Option<u64>,
        #[serde(default, deserialize_with = "clamped_u64")]
        file_size_bytes: Option<u64>,
        #[serde(default)]
        error: Option<String>,
    },
    Summary,
    Health,
    Top {
        #[serde(default)]
        n: Option<usize>,
    },
    Chat {
        chat: ChatKey,
    },
    Platforms,
    Storage,
    Stats,
}

/// Unknown chat types fall back to private instead of failing the request
fn lenient_chat_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ChatType, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(ChatType::parse_lenient(&raw))
}

/// Accept any JSON number; negatives clamp to 0 and fractions round
fn clamped_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(|v| if v.is_finite() && v > 0.0 { v.round() as u64 } else { 0 }))
}

/// Parse and handle one input line
#[must_use]
pub fn handle_line(governance: &Governance, line: &str) -> Value {
    match serde_json::from_str::<ControlRequest>(line) {
        Ok(request) => handle(governance, request),
        Err(e) => {
            debug!(error = %e, "Rejected control request");
            json!({ "ok": false, "error": e.to_string() })
        }
    }
}

/// Execute one request against the governance handle
#[must_use]
pub fn handle(governance: &Governance, request: ControlRequest) -> Value {
    match request {
        ControlRequest::Decide { chat, chat_type } => {
            json!({ "ok": true, "decision": governance.decide(&chat, chat_type) })
        }
        ControlRequest::Record {
            chat,
            chat_type,
            platform,
            success,
            chat_name,
            latency_ms,
            file_size_bytes,
            error,
        } => {
            let penalty = governance.report_outcome(RequestOutcome {
                chat,
                chat_type,
                platform,
                success,
                chat_name,
                latency_ms,
                file_size_bytes,
                error,
            });
            json!({ "ok": true, "penalty": penalty })
        }
        ControlRequest::Performance {
            chat,
            platform,
            latency_ms,
            file_size_bytes,
            error,
        } => {
            governance.record_performance(
                chat,
                platform,
                latency_ms.unwrap_or(0),
                file_size_bytes.unwrap_or(0),
                error,
            );
            json!({ "ok": true })
        }
        ControlRequest::Summary => {
            let summary = governance.global_summary();
            json!({ "ok": true, "uptime": summary.format_uptime(), "summary": summary })
        }
        ControlRequest::Health => json!({ "ok": true, "health": governance.health_status() }),
        ControlRequest::Top { n } => {
            json!({ "ok": true, "chats": governance.top_n(n.unwrap_or(DEFAULT_TOP)) })
        }
        ControlRequest::Chat { chat } => json!({ "ok": true, "chat": governance.chat(&chat) }),
        ControlRequest::Platforms => {
            json!({ "ok": true, "platforms": governance.platform_performance() })
        }
        ControlRequest::Storage => json!({ "ok": true, "storage": governance.storage_info() }),
        ControlRequest::Stats => {
            json!({ "ok": true, "stats": governance.governor().stats(governance.now()) })
        }
    }
}
