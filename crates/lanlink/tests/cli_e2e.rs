//! End-to-end exercise of `lanlink send` against a live fake backend.
//!
//! This test runs without the libtest harness: when the CLI under test
//! launches its backend, the backend it launches is this same executable,
//! re-entered with `LANLINK_FAKE_BACKEND=1`.

#![cfg_attr(not(unix), allow(unused))]

use std::process::Command;

#[cfg(unix)]
use lanlink::frame::{FrameReader, FrameWriter};
#[cfg(unix)]
use lanlink::transport::PipeEndpoint;
use serde_json::{json, Value};

#[cfg(not(unix))]
fn main() {}

#[cfg(unix)]
fn main() {
    if std::env::var("LANLINK_FAKE_BACKEND").is_ok() {
        fake_backend();
        return;
    }

    send_round_trip();
    println!("cli_e2e: ok");
}

/// Minimal protocol-conforming backend.
///
/// Dials the request channel first, then the event channel, announces
/// itself, emits one discovery event and echoes every request with an
/// `ok` status carrying the caller's identifier back.
#[cfg(unix)]
fn fake_backend() {
    let args: Vec<String> = std::env::args().collect();
    let request_path = arg_value(&args, "--request-pipe").expect("--request-pipe missing");
    let event_path = arg_value(&args, "--event-pipe").expect("--event-pipe missing");

    let request_stream = PipeEndpoint::connect(request_path).expect("request channel connect");
    let event_stream = PipeEndpoint::connect(event_path).expect("event channel connect");

    let mut requests = FrameReader::new(request_stream);
    let mut events = FrameWriter::new(event_stream);

    events
        .send_json(&json!({"feedback": "backend_started"}))
        .expect("announce startup");
    events
        .send_json(&json!({"feedback": "FoundDevice", "data": {"device_info": {"device_id": "dev-7"}}}))
        .expect("announce device");

    loop {
        let request = match requests.read_envelope() {
            Ok(value) => value,
            Err(_) => break,
        };
        let operation = request["operation"].as_str().unwrap_or_default().to_string();
        let msg_id = request["data"]["msgId"].as_u64().unwrap_or_default();

        let _ = events.send_json(&json!({
            "data": {"msgId": msg_id, "status": "ok", "operation": operation}
        }));

        if operation == "ExitApp" {
            break;
        }
    }
}

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[cfg(unix)]
fn send_round_trip() {
    let this_exe = std::env::current_exe().expect("current exe path");

    let output = Command::new(env!("CARGO_BIN_EXE_lanlink"))
        .args(["--format", "json", "--log-level", "error", "send"])
        .arg(&this_exe)
        .args([
            "--operation",
            "ConnectToDevice",
            "--data",
            r#"{"device_id":"dev-7","pin_code":"123456"}"#,
            "--connect-timeout",
            "10s",
        ])
        .env("LANLINK_FAKE_BACKEND", "1")
        .output()
        .expect("send command should run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "send failed (status {:?}): {stderr}",
        output.status.code()
    );

    let response: Value =
        serde_json::from_slice(&output.stdout).expect("send output should be one json line");
    assert_eq!(response["kind"], "response");
    assert_eq!(response["operation"], "ConnectToDevice");
    assert_eq!(response["data"]["status"], "ok");
    assert!(
        response["data"].get("msgId").is_none(),
        "correlation id must be stripped from response data"
    );
}
