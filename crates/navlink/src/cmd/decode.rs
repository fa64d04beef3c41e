use std::fs::File;
use std::io::{self, Read};

use navlink_frame::{FrameError, FrameReader};
use navlink_protocols::onboard_logs::{self, LogRecord};
use navlink_protocols::rover_terminal::{TerminalMessage, TerminalReader};
use tracing::{debug, warn};

use crate::cmd::{DecodeArgs, Protocol};
use crate::exit::{
    frame_error, io_error, protocol_error, CliError, CliResult, DATA_INVALID, SUCCESS,
};
use crate::output::{print_item, print_stats, DecodedItem, OutputFormat, StatsOutput};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input: Box<dyn Read> = if args.path.as_os_str() == "-" {
        Box::new(io::stdin())
    } else {
        let file = File::open(&args.path)
            .map_err(|err| io_error(&format!("failed opening {}", args.path.display()), err))?;
        Box::new(file)
    };
    debug!(path = %args.path.display(), protocol = args.protocol.name(), "decoding");

    let mut emit = |item: &DecodedItem| print_item(item, format);
    let stats = match args.protocol {
        Protocol::OnboardLogs => decode_logs(input, &mut emit)?,
        Protocol::RoverTerminal => decode_terminal(input, &mut emit)?,
    };
    print_stats(&stats, format);

    if args.strict && stats.aborted_messages > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "{} frame(s) aborted ({} failed verification)",
                stats.aborted_messages, stats.failed_verifications
            ),
        ));
    }
    Ok(SUCCESS)
}

fn decode_logs<R: Read>(
    input: R,
    emit: &mut impl FnMut(&DecodedItem),
) -> CliResult<StatsOutput> {
    let mut reader = FrameReader::with_config(input, onboard_logs::config())
        .map_err(|err| frame_error("invalid log config", err))?;
    let mut frames = 0usize;
    let mut undecoded = 0usize;

    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::EndOfStream) => break,
            Err(err) => return Err(frame_error("read failed", err)),
        };

        let payload = frame.payload.as_ref();
        let id = match payload {
            [lo, hi, ..] => u32::from(u16::from_le_bytes([*lo, *hi])),
            _ => 0,
        };
        let mut item = DecodedItem {
            frame: frames,
            sequence_id: None,
            id,
            name: "unknown",
            size: payload.len(),
            record: None,
            error: None,
            body: payload.to_vec(),
        };
        match LogRecord::decode(payload) {
            Ok(record) => {
                item.name = record.name();
                item.record = serde_json::to_value(&record).ok();
            }
            Err(err) => {
                warn!(frame = frames, error = %err, "undecodable log record");
                undecoded += 1;
                item.error = Some(err.to_string());
            }
        }
        emit(&item);
        frames += 1;
    }

    Ok(StatsOutput::new(reader.stats(), frames, frames, undecoded))
}

fn decode_terminal<R: Read>(
    input: R,
    emit: &mut impl FnMut(&DecodedItem),
) -> CliResult<StatsOutput> {
    let mut reader =
        TerminalReader::new(input).map_err(|err| protocol_error("invalid link config", err))?;
    let mut frames = 0usize;
    let mut items = 0usize;
    let mut undecoded = 0usize;

    loop {
        let packet = match reader.read_packet() {
            Ok(packet) => packet,
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(protocol_error("read failed", err)),
        };

        for message in &packet.messages {
            let mut item = DecodedItem {
                frame: frames,
                sequence_id: packet.sequence_id,
                id: message.id,
                name: TerminalMessage::name(message.id).unwrap_or("unknown"),
                size: message.body.len(),
                record: None,
                error: None,
                body: message.body.to_vec(),
            };
            match message.decode() {
                Ok(decoded) => item.record = serde_json::to_value(&decoded).ok(),
                Err(err) => {
                    warn!(
                        frame = frames,
                        id = message.id,
                        error = %err,
                        "undecodable sub-message"
                    );
                    undecoded += 1;
                    item.error = Some(err.to_string());
                }
            }
            emit(&item);
            items += 1;
        }
        frames += 1;
    }

    Ok(StatsOutput::new(reader.stats(), frames, items, undecoded))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use navlink_protocols::onboard_logs::LogWriter;
    use navlink_protocols::rover_terminal::{BatteryInfo, TerminalWriter};

    use super::*;

    fn collect_logs(bytes: Vec<u8>) -> (Vec<DecodedItem>, StatsOutput) {
        let mut items = Vec::new();
        let stats = decode_logs(Cursor::new(bytes), &mut |item: &DecodedItem| {
            items.push(item.clone())
        })
        .unwrap();
        (items, stats)
    }

    #[test]
    fn decodes_log_records_and_unknown_types() {
        let mut writer = LogWriter::new(Vec::new()).unwrap();
        writer.message("gps lost").unwrap();
        let mut bytes = writer.into_inner();
        bytes.extend_from_slice(&[0xAA, 0x02, 0x00, 0x11, 0x22]);

        let (items, stats) = collect_logs(bytes);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "message_dump");
        assert_eq!(
            items[0].record.as_ref().unwrap()["text"],
            serde_json::json!("gps lost")
        );
        assert_eq!(items[1].id, 0x2211);
        assert!(items[1].error.is_some());
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.undecoded, 1);
    }

    #[test]
    fn decodes_terminal_packets_with_stats() {
        let mut writer = TerminalWriter::new(Vec::new()).unwrap();
        writer
            .push(&BatteryInfo {
                battmah: 2600,
                battcur: -350,
                battstat: 1,
            })
            .unwrap();
        writer.console_output(b"hello").unwrap();
        let mut bytes = writer.finish().unwrap();
        // second copy with a flipped bit in the battery record body
        let mut corrupted = bytes.clone();
        corrupted[8] ^= 0x01;
        bytes.extend(corrupted);

        let mut names = Vec::new();
        let stats = decode_terminal(Cursor::new(bytes), &mut |item: &DecodedItem| {
            names.push(item.name)
        })
        .unwrap();

        assert_eq!(stats.aborted_messages, 1);
        assert_eq!(stats.failed_verifications, 1);
        assert!(names.contains(&"battery_info"));
        assert!(names.contains(&"console_output"));
    }
}
