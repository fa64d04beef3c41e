//! Write a few onboard log records to a file and read them back.
//!
//! Run with:
//!   cargo run --example log-roundtrip
//!
//! Inspect the file with:
//!   cargo run --features cli -- decode <path> --protocol onboard-logs --format pretty

use std::fs::File;
use std::io::{BufReader, BufWriter};

use navlink::protocols::onboard_logs::{
    GnssNavDataDump, GnssPvt, GnssTimeDate, LogReader, LogRecord, LogWriter,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join(format!("navlink-log-{}.bin", std::process::id()));

    let mut writer = LogWriter::new(BufWriter::new(File::create(&path)?))?;
    writer.message("boot complete")?;
    for second in 0..3u8 {
        let mut nav = GnssNavDataDump {
            tvalid: 3,
            tow: 302_400.0 + f64::from(second),
            wn: 2310,
            utc: GnssTimeDate {
                year: 2024,
                month: 6,
                day: 1,
                hour: 12,
                min: 0,
                sec: f64::from(second),
            },
            pvt: GnssPvt {
                qli: 3,
                lat: 46.81,
                lon: -71.21,
                hellip: 52.0,
                hdop: 0.8,
                ..GnssPvt::default()
            },
            ..GnssNavDataDump::default()
        };
        nav.prn[0] = 7;
        writer.write_record(&LogRecord::GnssNavDataDump(nav))?;
    }
    writer.debug_pattern()?;
    writer.into_inner().into_inner()?;
    eprintln!("Wrote {}", path.display());

    let mut reader = LogReader::new(BufReader::new(File::open(&path)?))?;
    for record in reader.by_ref() {
        match record? {
            LogRecord::GnssNavDataDump(nav) => {
                eprintln!("nav tow={} lat={} lon={}", nav.tow, nav.pvt.lat, nav.pvt.lon)
            }
            LogRecord::DebugPattern(pattern) => eprintln!(
                "debug pattern {} bytes, {} mismatches",
                pattern.len, pattern.mismatches
            ),
            other => eprintln!("{}", other.name()),
        }
    }
    eprintln!("stats: {:?}", reader.stats());

    let _ = std::fs::remove_file(&path);
    Ok(())
}
