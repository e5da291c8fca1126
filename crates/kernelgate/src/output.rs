use std::io::IsTerminal;

use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

const FRAME_ROLES: [&str; 6] = [
    "delimiter",
    "signature",
    "header",
    "parent_header",
    "metadata",
    "content",
];

/// Role of each frame, counting a leading routing identity if present.
pub fn frame_roles(count: usize) -> Vec<&'static str> {
    let prefix = count.saturating_sub(FRAME_ROLES.len());
    std::iter::repeat("identity")
        .take(prefix)
        .chain(FRAME_ROLES.iter().copied())
        .take(count)
        .collect()
}

pub fn frame_text(frame: &Bytes) -> String {
    match std::str::from_utf8(frame) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", frame.len()),
    }
}

pub fn print_frames(frames: &[Bytes], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let texts: Vec<String> = frames.iter().map(frame_text).collect();
            print_json(&texts);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "ROLE", "FRAME"]);
            for (index, (role, frame)) in frame_roles(frames.len()).iter().zip(frames).enumerate() {
                table.add_row(vec![index.to_string(), role.to_string(), frame_text(frame)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (role, frame) in frame_roles(frames.len()).iter().zip(frames) {
                println!("{role:>13}: {}", frame_text(frame));
            }
        }
    }
}

/// Field/value pairs rendered as a two-column table, one `key=value` line each,
/// or a JSON object.
pub fn print_record<T: Serialize>(record: &T, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (field, value) in rows {
                table.add_row(vec![field.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in rows {
                println!("{field}={value}");
            }
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}
