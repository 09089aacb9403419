use super::stream::DecodeError;
use crate::util::{env_flag, env_value};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_API_LOG_PATH: &str = "/tmp/aim-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "AIM_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "AIM_API_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    env_flag(DEBUG_PAYLOAD_ENV).unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message =
        format!("AIM_API DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n");
    emit_log_message(&message);
}

pub fn emit_frame_decode_error(error: &DecodeError) {
    let message = format!(
        "AIM_API WARN frame_decode_failed error={error}\ndata:\n{}\n",
        error.frame()
    );
    emit_log_message(&message);
}

pub fn emit_request_cancelled(request_id: u64) {
    emit_log_message(&format!(
        "AIM_API INFO request_cancelled request_id={request_id}\n"
    ));
}

pub fn emit_stale_update_dropped(request_id: u64, active_id: Option<u64>) {
    let active = active_id.map_or_else(|| "<none>".to_string(), |id| id.to_string());
    emit_log_message(&format!(
        "AIM_API DEBUG stale_update_dropped request_id={request_id} active_id={active}\n"
    ));
}

pub fn emit_command_failed(command: &str, error: &anyhow::Error) {
    emit_log_message(&format!(
        "AIM_API WARN diagnostic_command_failed command={command:?} error={error:#}\n"
    ));
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    env_value(API_LOG_PATH_ENV).or_else(|| {
        std::io::stderr()
            .is_terminal()
            .then(|| DEFAULT_API_LOG_PATH.to_string())
    })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}
