//! Rover and terminal talking over a socket pair.
//!
//! The rover thread streams channel reports and console text; the terminal
//! prints every sub-message it receives.
//!
//! Run with:
//!   cargo run --example terminal-link

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;
    use std::thread;

    use navlink::protocols::rover_terminal::{
        BatteryInfo, ChannelInfo, TerminalMessage, TerminalReader, TerminalWriter,
    };

    let (rover_end, terminal_end) = UnixStream::pair()?;

    let rover = thread::spawn(move || -> navlink::protocols::Result<()> {
        let mut writer = TerminalWriter::new(rover_end)?;
        for channel in 0..12u8 {
            writer.push(&ChannelInfo {
                channel,
                prn: u16::from(channel) + 1,
                rover_qli: 4,
                elev: 35,
                ..ChannelInfo::default()
            })?;
        }
        writer.push(&BatteryInfo {
            battmah: 2450,
            battcur: -410,
            battstat: 0,
        })?;
        writer.console_output(b"rover ready\r\n")?;
        writer.finish()?;
        Ok(())
    });

    let mut reader = TerminalReader::new(terminal_end)?;
    loop {
        let packet = match reader.read_packet() {
            Ok(packet) => packet,
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err.into()),
        };
        eprintln!(
            "packet seq={:?} with {} sub-messages",
            packet.sequence_id,
            packet.messages.len()
        );
        for message in &packet.messages {
            match message.decode()? {
                TerminalMessage::ConsoleOutput(out) => {
                    eprintln!("  console: {}", String::from_utf8_lossy(&out.text).trim_end())
                }
                other => eprintln!("  {:?}", other),
            }
        }
    }
    eprintln!("stats: {:?}", reader.stats());

    rover.join().map_err(|_| "rover thread panicked")??;
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("terminal-link needs Unix domain sockets");
}
