use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use lanlink_proto::EventEnvelope;
use lanlink_session::ReadinessChange;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    kind: &'static str,
    feedback: &'a str,
    data: &'a Value,
}

pub fn print_event(event: &EventEnvelope, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                kind: "event",
                feedback: &event.feedback,
                data: &event.data,
            };
            println!("{}", to_json_line(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FEEDBACK", "DATA"])
                .add_row(vec![event.feedback.clone(), compact(&event.data)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("event feedback={} data={}", event.feedback, compact(&event.data));
        }
        OutputFormat::Raw => {
            println!("{}", compact(&event.data));
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    kind: &'static str,
    operation: &'a str,
    data: &'a Value,
}

pub fn print_response(operation: &str, data: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                kind: "response",
                operation,
                data,
            };
            println!("{}", to_json_line(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OPERATION", "RESPONSE"])
                .add_row(vec![operation.to_string(), compact(data)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("response operation={operation} data={}", compact(data));
        }
        OutputFormat::Raw => {
            println!("{}", compact(data));
        }
    }
}

#[derive(Serialize)]
struct ReadinessOutput<'a> {
    kind: &'static str,
    ready: bool,
    reason: Option<&'a str>,
}

pub fn print_readiness(change: &ReadinessChange, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReadinessOutput {
                kind: "readiness",
                ready: change.ready,
                reason: change.reason.as_deref(),
            };
            println!("{}", to_json_line(&out));
        }
        OutputFormat::Table | OutputFormat::Pretty => match &change.reason {
            Some(reason) => println!("readiness ready={} reason={reason}", change.ready),
            None => println!("readiness ready={}", change.ready),
        },
        OutputFormat::Raw => {
            println!("{}", change.ready);
        }
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

fn to_json_line<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
