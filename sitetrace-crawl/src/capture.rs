//! Turns raw browser logs into bundle records.
use std::collections::BTreeMap;

use serde_json::Value;
use sitetrace_drivers::browser::intercept::JS_CALL_MARKER;
use sitetrace_drivers::browser::RawLogEntry;
use tracing::debug;

use crate::bundle::{ConsoleEntry, JsCall, RequestRecord, ResponseRecord};

const REQUEST_EVENT: &str = "Network.requestWillBeSent";
const RESPONSE_EVENT: &str = "Network.responseReceived";

/// Split performance-log entries into requests and responses, in log order.
/// Entries that are not network events or cannot be decoded are dropped.
pub fn parse_network_events(entries: &[RawLogEntry]) -> (Vec<RequestRecord>, Vec<ResponseRecord>) {
    let mut requests = Vec::new();
    let mut responses = Vec::new();

    for entry in entries {
        let envelope: Value = match serde_json::from_str(&entry.message) {
            Ok(v) => v,
            Err(e) => {
                debug!(target: "crawl.capture", error = %e, "undecodable performance entry");
                continue;
            }
        };
        let message = &envelope["message"];
        let params = &message["params"];
        match message["method"].as_str() {
            Some(REQUEST_EVENT) => {
                if let Some(req) = request_record(&params["request"]) {
                    requests.push(req);
                }
            }
            Some(RESPONSE_EVENT) => {
                if let Some(res) = response_record(&params["response"]) {
                    responses.push(res);
                }
            }
            _ => {}
        }
    }

    (requests, responses)
}

fn request_record(request: &Value) -> Option<RequestRecord> {
    Some(RequestRecord {
        url: request["url"].as_str()?.to_string(),
        method: request["method"].as_str().unwrap_or("GET").to_string(),
        headers: header_map(&request["headers"]),
        body: request["postData"].as_str().map(str::to_string),
    })
}

fn response_record(response: &Value) -> Option<ResponseRecord> {
    let status = response["status"].as_f64()?;
    Some(ResponseRecord {
        url: response["url"].as_str()?.to_string(),
        status: status.clamp(0.0, f64::from(u16::MAX)) as u16,
        headers: header_map(&response["headers"]),
    })
}

fn header_map(headers: &Value) -> BTreeMap<String, String> {
    headers
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_console_entries(entries: &[RawLogEntry]) -> Vec<ConsoleEntry> {
    entries
        .iter()
        .map(|e| ConsoleEntry {
            level: e.level.clone(),
            message: e.message.clone(),
        })
        .collect()
}

/// Decode the in-page call buffer. `None` means the buffer did not survive
/// (navigation replaced the document, or the page clobbered it).
pub fn parse_call_buffer(buffer: &Value) -> Option<Vec<JsCall>> {
    let items = buffer.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
    )
}

/// Recover call records mirrored to the console.
///
/// Chromedriver renders `console.log("JS_CALL", json)` as
/// `<source> <line:col> "JS_CALL" "<escaped json>"`.
pub fn recover_calls_from_console(entries: &[ConsoleEntry]) -> Vec<JsCall> {
    let quoted_marker = format!("\"{JS_CALL_MARKER}\"");
    entries
        .iter()
        .filter_map(|entry| {
            let start = entry.message.find(&quoted_marker)? + quoted_marker.len();
            let literal = entry.message[start..].trim();
            let json: String = serde_json::from_str(literal).ok()?;
            serde_json::from_str(&json).ok()
        })
        .collect()
}

/// Prefer whichever channel observed more calls; the console mirror wins
/// when the buffer was lost or reset by a navigation.
pub fn reconcile_calls(buffer: Option<Vec<JsCall>>, mirrored: Vec<JsCall>) -> Vec<JsCall> {
    match buffer {
        Some(calls) if calls.len() >= mirrored.len() => calls,
        _ => mirrored,
    }
}
