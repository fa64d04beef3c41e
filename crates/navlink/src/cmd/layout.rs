use navlink_frame::{FletcherWidth, FrameMachine, VerifierKind};
use navlink_protocols::rover_terminal;
use serde::Serialize;

use crate::cmd::{LayoutArgs, Protocol};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_fields, OutputFormat};

#[derive(Debug, Serialize, PartialEq, Eq)]
struct LayoutOutput {
    protocol: &'static str,
    start_marker: Option<String>,
    stop_marker: Option<String>,
    length_bytes: usize,
    sequence_id_bytes: usize,
    verifier: String,
    alignment: usize,
    header_len: usize,
    /// Frame bytes around an empty payload.
    overhead: usize,
    max_frame_len: usize,
    max_payload_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_message_header_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_sub_message_body: Option<usize>,
}

pub fn run(args: LayoutArgs, format: OutputFormat) -> CliResult<i32> {
    let out = describe(args.protocol)?;

    let marker = |m: &Option<String>| m.clone().unwrap_or_else(|| "-".to_string());
    let mut fields = vec![
        ("protocol", out.protocol.to_string()),
        ("start_marker", marker(&out.start_marker)),
        ("stop_marker", marker(&out.stop_marker)),
        ("length_bytes", out.length_bytes.to_string()),
        ("sequence_id_bytes", out.sequence_id_bytes.to_string()),
        ("verifier", out.verifier.clone()),
        ("alignment", out.alignment.to_string()),
        ("header_len", out.header_len.to_string()),
        ("overhead", out.overhead.to_string()),
        ("max_frame_len", out.max_frame_len.to_string()),
        ("max_payload_len", out.max_payload_len.to_string()),
    ];
    if let (Some(header), Some(body)) = (out.sub_message_header_len, out.max_sub_message_body) {
        fields.push(("sub_message_header_len", header.to_string()));
        fields.push(("max_sub_message_body", body.to_string()));
    }
    print_fields(&fields, &out, format);
    Ok(SUCCESS)
}

fn describe(protocol: Protocol) -> CliResult<LayoutOutput> {
    let config = protocol.config();
    let machine =
        FrameMachine::new(config.clone()).map_err(|err| frame_error("invalid config", err))?;
    let verifier = match config.verifier {
        _ if !config.use_verification => "none".to_string(),
        VerifierKind::NoOp => "noop".to_string(),
        VerifierKind::Crc { width, polynomial } => {
            format!("crc{} (0x{polynomial:X})", width.bits())
        }
        VerifierKind::Fletcher(FletcherWidth::Bits16) => "fletcher16".to_string(),
        VerifierKind::Fletcher(FletcherWidth::Bits32) => "fletcher32".to_string(),
    };
    let sub_messages =
        matches!(protocol, Protocol::RoverTerminal).then_some(rover_terminal::LAYOUT);

    Ok(LayoutOutput {
        protocol: protocol.name(),
        start_marker: config
            .use_start_marker
            .then(|| format!("0x{:02X}", config.start_marker)),
        stop_marker: config
            .use_stop_marker
            .then(|| format!("0x{:02X}", config.stop_marker)),
        length_bytes: config.length_width.bytes(),
        sequence_id_bytes: if config.use_seq_id {
            config.seq_id_width.bytes()
        } else {
            0
        },
        verifier,
        alignment: if config.use_verification {
            machine.verifier().alignment()
        } else {
            1
        },
        header_len: machine.payload_offset(),
        overhead: machine.packet_len(0),
        max_frame_len: config.max_frame_len,
        max_payload_len: machine.max_payload_len(),
        sub_message_header_len: sub_messages.map(|layout| layout.header_len()),
        max_sub_message_body: sub_messages.map(|layout| layout.max_body_len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rover_terminal_layout() {
        let out = describe(Protocol::RoverTerminal).unwrap();
        assert_eq!(out.start_marker.as_deref(), Some("0x7F"));
        assert_eq!(out.stop_marker.as_deref(), Some("0xF7"));
        assert_eq!(out.verifier, "fletcher32");
        assert_eq!(out.alignment, 2);
        assert_eq!(out.header_len, 4);
        assert_eq!(out.max_payload_len, 503);
        assert_eq!(out.sub_message_header_len, Some(3));
        assert_eq!(out.max_sub_message_body, Some(252));
    }

    #[test]
    fn onboard_logs_layout() {
        let out = describe(Protocol::OnboardLogs).unwrap();
        assert_eq!(out.start_marker.as_deref(), Some("0xAA"));
        assert_eq!(out.stop_marker, None);
        assert_eq!(out.verifier, "none");
        assert_eq!(out.header_len, 3);
        assert_eq!(out.overhead, 3);
        assert_eq!(out.max_payload_len, 1021);
        assert_eq!(out.sub_message_header_len, None);
    }
}
