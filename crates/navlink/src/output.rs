use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use navlink_frame::FrameStats;
use serde::Serialize;

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

/// One decoded log record or sub-message.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedItem {
    /// Index of the frame that carried it.
    pub frame: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<u32>,
    pub id: u32,
    pub name: &'static str,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsOutput {
    pub frames: usize,
    pub items: usize,
    pub undecoded: usize,
    pub orphan_bytes: u32,
    pub missed_messages: u32,
    pub aborted_messages: u32,
    pub failed_verifications: u32,
}

impl StatsOutput {
    pub fn new(stats: FrameStats, frames: usize, items: usize, undecoded: usize) -> Self {
        Self {
            frames,
            items,
            undecoded,
            orphan_bytes: stats.orphan_bytes,
            missed_messages: stats.missed_messages,
            aborted_messages: stats.aborted_messages,
            failed_verifications: stats.failed_verifications,
        }
    }

    fn rows(&self) -> [(&'static str, String); 7] {
        [
            ("frames", self.frames.to_string()),
            ("items", self.items.to_string()),
            ("undecoded", self.undecoded.to_string()),
            ("orphan_bytes", self.orphan_bytes.to_string()),
            ("missed_messages", self.missed_messages.to_string()),
            ("aborted_messages", self.aborted_messages.to_string()),
            ("failed_verifications", self.failed_verifications.to_string()),
        ]
    }
}

pub fn print_item(item: &DecodedItem, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(item),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "SEQ", "ID", "NAME", "SIZE", "DETAIL"])
                .add_row(vec![
                    item.frame.to_string(),
                    item.sequence_id
                        .map(|seq| seq.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    format!("0x{:04X}", item.id),
                    item.name.to_string(),
                    item.size.to_string(),
                    detail(item),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} id=0x{:04X} ({}) size={} {}",
                item.frame,
                item.id,
                item.name,
                item.size,
                detail(item)
            );
        }
        OutputFormat::Raw => print_raw(&item.body),
    }
}

pub fn print_stats(stats: &StatsOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Wrapped<'a> {
                stats: &'a StatsOutput,
            }
            print_json(&Wrapped { stats });
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STAT", "VALUE"]);
            for (name, value) in stats.rows() {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = stats
                .rows()
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{}", line.join(" "));
        }
        OutputFormat::Raw => {
            tracing::info!(
                frames = stats.frames,
                aborted = stats.aborted_messages,
                orphan_bytes = stats.orphan_bytes,
                "decode finished"
            );
        }
    }
}

/// Print a single key/value result, such as a checksum or layout summary.
pub fn print_fields(fields: &[(&str, String)], json: &impl Serialize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(json),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (name, value) in fields {
                println!("{name}: {value}");
            }
        }
    }
}

pub fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn detail(item: &DecodedItem) -> String {
    if let Some(err) = &item.error {
        return format!("error: {err}");
    }
    match &item.record {
        Some(record) => record.to_string(),
        None => hex::encode(&item.body),
    }
}
