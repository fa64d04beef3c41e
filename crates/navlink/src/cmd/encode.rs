use std::fs;

use navlink_frame::FrameWriter;
use navlink_protocols::rover_terminal::TerminalWriter;
use navlink_protocols::{ids, onboard_logs};
use serde::Serialize;
use tracing::info;

use crate::cmd::{EncodeArgs, Protocol};
use crate::exit::{frame_error, io_error, protocol_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_fields, print_raw, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput<'a> {
    protocol: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u32>,
    payload_size: usize,
    frame_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    out: Option<String>,
    frame: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let frame = encode_frame(args.protocol, args.id, &payload)?;

    if let Some(path) = &args.out {
        fs::write(path, &frame)
            .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
        info!(path = %path.display(), size = frame.len(), "frame written");
    } else if matches!(format, OutputFormat::Raw) {
        print_raw(&frame);
        return Ok(SUCCESS);
    }

    let id = effective_id(args.protocol, args.id);
    let out = EncodeOutput {
        protocol: args.protocol.name(),
        id,
        payload_size: payload.len(),
        frame_size: frame.len(),
        out: args.out.as_ref().map(|path| path.display().to_string()),
        frame: hex::encode(&frame),
    };
    let mut fields = vec![
        ("protocol", out.protocol.to_string()),
        ("payload_size", out.payload_size.to_string()),
        ("frame_size", out.frame_size.to_string()),
    ];
    if let Some(id) = id {
        fields.insert(1, ("id", format!("0x{id:04X}")));
    }
    match &out.out {
        Some(path) => fields.push(("out", path.clone())),
        None => fields.push(("frame", out.frame.clone())),
    }
    print_fields(&fields, &out, format);
    Ok(SUCCESS)
}

fn effective_id(protocol: Protocol, id: Option<u32>) -> Option<u32> {
    match protocol {
        Protocol::RoverTerminal => Some(id.unwrap_or(ids::CONSOLE_OUTPUT)),
        Protocol::OnboardLogs => id,
    }
}

/// Frame `payload` for `protocol`.
///
/// Rover-terminal payloads become one sub-message (console output unless
/// `id` says otherwise). Onboard-log payloads get `id` prepended as the
/// record type when given.
fn encode_frame(protocol: Protocol, id: Option<u32>, payload: &[u8]) -> CliResult<Vec<u8>> {
    if let Some(id) = id {
        if id > u32::from(u16::MAX) {
            return Err(CliError::new(USAGE, format!("id 0x{id:X} does not fit 16 bits")));
        }
    }

    match protocol {
        Protocol::OnboardLogs => {
            let mut body = Vec::with_capacity(payload.len() + 2);
            if let Some(id) = id {
                body.extend_from_slice(&(id as u16).to_le_bytes());
            }
            body.extend_from_slice(payload);

            let mut writer = FrameWriter::with_config(Vec::new(), onboard_logs::config())
                .map_err(|err| frame_error("invalid log config", err))?;
            writer
                .send(&body)
                .map_err(|err| frame_error("encode failed", err))?;
            Ok(writer.into_inner())
        }
        Protocol::RoverTerminal => {
            let id = id.unwrap_or(ids::CONSOLE_OUTPUT);
            let mut writer = TerminalWriter::new(Vec::new())
                .map_err(|err| protocol_error("invalid link config", err))?;
            writer
                .push_raw(id, payload)
                .map_err(|err| protocol_error("encode failed", err))?;
            writer
                .finish()
                .map_err(|err| protocol_error("encode failed", err))
        }
    }
}
