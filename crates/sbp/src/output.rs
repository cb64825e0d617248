use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sbp::Message;
use serde::Serialize;

use crate::sequence::Report;

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
struct MessageOutput<'a> {
    event: &'static str,
    kind: &'static str,
    length: u64,
    count: usize,
    peer: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ints: Option<&'a [i32]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doubles: Option<&'a [f64]>,
    timestamp: String,
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    event: &'static str,
    peer: &'a str,
    passed: bool,
    chars: bool,
    chars_truncated: bool,
    ints: bool,
    doubles: bool,
    timestamp: String,
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    event: &'static str,
    address: &'a str,
    sockets: usize,
}

pub fn print_listening(address: &str, sockets: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ListeningOutput {
            event: "listening",
            address,
            sockets,
        }),
        _ => println!("listening on '{address}'"),
    }
}

pub fn print_message(message: &Message, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let (ints, doubles) = match message {
                Message::Int32Array(values) => (Some(values.as_slice()), None),
                Message::Float64Array(values) => (None, Some(values.as_slice())),
                _ => (None, None),
            };
            let text = match message {
                Message::Raw(bytes) | Message::Char(bytes) => Some(payload_preview(bytes)),
                _ => None,
            };
            print_json(&MessageOutput {
                event: "message",
                kind: message.kind().name(),
                length: message.byte_len(),
                count: message.len(),
                peer,
                text,
                ints,
                doubles,
                timestamp: now_unix_seconds(),
            });
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "BYTES", "PEER", "PAYLOAD"])
                .add_row(vec![
                    message.kind().name().to_string(),
                    message.byte_len().to_string(),
                    peer.to_string(),
                    message_preview(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} bytes={} peer={} payload={}",
                message.kind(),
                message.byte_len(),
                peer,
                message_preview(message)
            );
        }
        OutputFormat::Raw => match message {
            Message::Raw(bytes) | Message::Char(bytes) => print_raw(bytes),
            _ => println!("{}", message_preview(message)),
        },
    }
}

pub fn print_report(report: &Report, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ReportOutput {
            event: "doTests",
            peer,
            passed: report.passed(),
            chars: report.chars_ok,
            chars_truncated: report.chars_truncated,
            ints: report.ints_ok,
            doubles: report.doubles_ok,
            timestamp: now_unix_seconds(),
        }),
        _ if report.passed() => println!("{peer} passed tests"),
        _ => println!(
            "{peer} failed tests (chars={} ints={} doubles={})",
            report.chars_ok, report.ints_ok, report.doubles_ok
        ),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn message_preview(message: &Message) -> String {
    match message {
        Message::Raw(bytes) | Message::Char(bytes) => payload_preview(bytes),
        Message::Int32Array(values) => format!("{values:?}"),
        Message::Float64Array(values) => format!("{values:?}"),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
