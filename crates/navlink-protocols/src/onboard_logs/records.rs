use bytes::{Buf, BufMut};
use navlink_frame::FrameError;
use serde::Serialize;

use crate::error::{ProtocolError, Result};
use crate::ids;

/// Receiver channels dumped per record.
pub const GNSS_CHANNELS: usize = 16;

const TYPE_LEN: usize = 2;

fn need(src: &mut impl Buf, needed: usize) -> Result<()> {
    if src.remaining() < needed {
        return Err(FrameError::Truncated {
            needed,
            available: src.remaining(),
        }
        .into());
    }
    Ok(())
}

/// Pseudorange measurement. Only `qli` is stored when `qli == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GeneralPrs {
    pub qli: u8,
    pub cwarn: u8,
    pub cn0: u8,
    pub pr: f64,
    pub pv: f64,
    pub cp: f64,
}

impl GeneralPrs {
    const FULL_LEN: usize = 27;

    fn is_valid(&self) -> bool {
        self.qli > 0
    }

    fn encoded_len(&self) -> usize {
        if self.is_valid() {
            Self::FULL_LEN
        } else {
            1
        }
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u8(self.qli);
        if self.is_valid() {
            out.put_u8(self.cwarn);
            out.put_u8(self.cn0);
            out.put_f64_le(self.pr);
            out.put_f64_le(self.pv);
            out.put_f64_le(self.cp);
        }
    }

    fn get(src: &mut impl Buf) -> Result<Self> {
        need(src, 1)?;
        let qli = src.get_u8();
        if qli == 0 {
            return Ok(Self::default());
        }
        need(src, Self::FULL_LEN - 1)?;
        Ok(Self {
            qli,
            cwarn: src.get_u8(),
            cn0: src.get_u8(),
            pr: src.get_f64_le(),
            pv: src.get_f64_le(),
            cp: src.get_f64_le(),
        })
    }
}

/// Base station measurement for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BaseMeasurement {
    pub prn: u16,
    pub prs: GeneralPrs,
    /// Only stored with a valid `prs`.
    pub locktime: u8,
    pub hcslip: i8,
}

impl BaseMeasurement {
    fn encoded_len(&self) -> usize {
        2 + self.prs.encoded_len() + if self.prs.is_valid() { 2 } else { 0 }
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u16_le(self.prn);
        self.prs.put(out);
        if self.prs.is_valid() {
            out.put_u8(self.locktime);
            out.put_i8(self.hcslip);
        }
    }

    fn get(src: &mut impl Buf) -> Result<Self> {
        need(src, 2)?;
        let prn = src.get_u16_le();
        let prs = GeneralPrs::get(src)?;
        if !prs.is_valid() {
            return Ok(Self {
                prn,
                ..Self::default()
            });
        }
        need(src, 2)?;
        Ok(Self {
            prn,
            prs,
            locktime: src.get_u8(),
            hcslip: src.get_i8(),
        })
    }
}

/// Base station position. Only `pvalid` is stored unless `pvalid == 3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BasePosition {
    pub pvalid: i8,
    /// WGS-84 ECEF in metres.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// 3D accuracy.
    pub pacc: f32,
    pub ancvalid: u8,
    /// Clock bias in metres.
    pub b: f64,
    /// Clock drift in m/s.
    pub vb: f64,
    pub und: f64,
}

impl BasePosition {
    const FULL_LEN: usize = 54;

    fn is_valid(&self) -> bool {
        self.pvalid == 3
    }

    fn encoded_len(&self) -> usize {
        if self.is_valid() {
            Self::FULL_LEN
        } else {
            1
        }
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_i8(self.pvalid);
        if self.is_valid() {
            out.put_f64_le(self.x);
            out.put_f64_le(self.y);
            out.put_f64_le(self.z);
            out.put_f32_le(self.pacc);
            out.put_u8(self.ancvalid);
            out.put_f64_le(self.b);
            out.put_f64_le(self.vb);
            out.put_f64_le(self.und);
        }
    }

    fn get(src: &mut impl Buf) -> Result<Self> {
        need(src, 1)?;
        let pvalid = src.get_i8();
        if pvalid != 3 {
            return Ok(Self {
                pvalid,
                ..Self::default()
            });
        }
        need(src, Self::FULL_LEN - 1)?;
        Ok(Self {
            pvalid,
            x: src.get_f64_le(),
            y: src.get_f64_le(),
            z: src.get_f64_le(),
            pacc: src.get_f32_le(),
            ancvalid: src.get_u8(),
            b: src.get_f64_le(),
            vb: src.get_f64_le(),
            und: src.get_f64_le(),
        })
    }
}

/// Base station data, logged at 1 Hz.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BaseDataDump {
    /// GPS time of week.
    pub tow: f64,
    pub statusok: u8,
    /// Base battery level.
    pub battery: i8,
    pub status0: i32,
    pub measurements: [BaseMeasurement; GNSS_CHANNELS],
    pub position: BasePosition,
}

impl BaseDataDump {
    const FIXED_LEN: usize = 14;

    fn encoded_len(&self) -> usize {
        Self::FIXED_LEN
            + self
                .measurements
                .iter()
                .map(BaseMeasurement::encoded_len)
                .sum::<usize>()
            + self.position.encoded_len()
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_f64_le(self.tow);
        out.put_u8(self.statusok);
        out.put_i8(self.battery);
        out.put_i32_le(self.status0);
        for measurement in &self.measurements {
            measurement.put(out);
        }
        self.position.put(out);
    }

    fn get(src: &mut impl Buf) -> Result<Self> {
        need(src, Self::FIXED_LEN)?;
        let mut dump = Self {
            tow: src.get_f64_le(),
            statusok: src.get_u8(),
            battery: src.get_i8(),
            status0: src.get_i32_le(),
            ..Self::default()
        };
        for slot in &mut dump.measurements {
            *slot = BaseMeasurement::get(src)?;
        }
        dump.position = BasePosition::get(src)?;
        Ok(dump)
    }
}

/// Raw receiver measurements, logged at 10 Hz.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GnssRawDataDump {
    pub tow: f64,
    pub prn: [u16; GNSS_CHANNELS],
    pub measurements: [GeneralPrs; GNSS_CHANNELS],
}

impl GnssRawDataDump {
    const FIXED_LEN: usize = 8 + 2 * GNSS_CHANNELS;

    fn encoded_len(&self) -> usize {
        Self::FIXED_LEN
            + self
                .measurements
                .iter()
                .map(GeneralPrs::encoded_len)
                .sum::<usize>()
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_f64_le(self.tow);
        for prn in self.prn {
            out.put_u16_le(prn);
        }
        for measurement in &self.measurements {
            measurement.put(out);
        }
    }

    fn get(src: &mut impl Buf) -> Result<Self> {
        need(src, Self::FIXED_LEN)?;
        let mut dump = Self {
            tow: src.get_f64_le(),
            ..Self::default()
        };
        for prn in &mut dump.prn {
            *prn = src.get_u16_le();
        }
        for slot in &mut dump.measurements {
            *slot = GeneralPrs::get(src)?;
        }
        Ok(dump)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GnssTimeDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: f64,
}

impl GnssTimeDate {
    const LEN: usize = 14;

    fn put(&self, out: &mut impl BufMut) {
        out.put_u16_le(self.year);
        out.put_u8(self.month);
        out.put_u8(self.day);
        out.put_u8(self.hour);
        out.put_u8(self.min);
        out.put_f64_le(self.sec);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            year: src.get_u16_le(),
            month: src.get_u8(),
            day: src.get_u8(),
            hour: src.get_u8(),
            min: src.get_u8(),
            sec: src.get_f64_le(),
        }
    }
}

/// Navigation solution: position, velocity, dilutions of precision and
/// accuracies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GnssPvt {
    pub qli: u8,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub b: f64,
    pub lat: f64,
    pub lon: f64,
    pub hellip: f64,
    pub und: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub vb: f64,
    pub vn: f64,
    pub ve: f64,
    pub vh: f64,
    pub v3d: f32,
    pub gdop: f32,
    pub pdop: f32,
    pub ndop: f32,
    pub edop: f32,
    pub hdop: f32,
    pub vdop: f32,
    pub tdop: f32,
    pub pacc: f32,
    pub hpacc: f32,
    pub vpacc: f32,
    pub vacc: f32,
    pub tacc: f32,
}

impl GnssPvt {
    const LEN: usize = 1 + 15 * 8 + 13 * 4;

    fn doubles(&self) -> [f64; 15] {
        [
            self.x, self.y, self.z, self.b, self.lat, self.lon, self.hellip, self.und, self.vx,
            self.vy, self.vz, self.vb, self.vn, self.ve, self.vh,
        ]
    }

    fn floats(&self) -> [f32; 13] {
        [
            self.v3d, self.gdop, self.pdop, self.ndop, self.edop, self.hdop, self.vdop, self.tdop,
            self.pacc, self.hpacc, self.vpacc, self.vacc, self.tacc,
        ]
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u8(self.qli);
        for v in self.doubles() {
            out.put_f64_le(v);
        }
        for v in self.floats() {
            out.put_f32_le(v);
        }
    }

    fn get(src: &mut impl Buf) -> Self {
        let qli = src.get_u8();
        let mut d = [0f64; 15];
        for v in &mut d {
            *v = src.get_f64_le();
        }
        let mut f = [0f32; 13];
        for v in &mut f {
            *v = src.get_f32_le();
        }
        let [x, y, z, b, lat, lon, hellip, und, vx, vy, vz, vb, vn, ve, vh] = d;
        let [v3d, gdop, pdop, ndop, edop, hdop, vdop, tdop, pacc, hpacc, vpacc, vacc, tacc] = f;
        Self {
            qli,
            x,
            y,
            z,
            b,
            lat,
            lon,
            hellip,
            und,
            vx,
            vy,
            vz,
            vb,
            vn,
            ve,
            vh,
            v3d,
            gdop,
            pdop,
            ndop,
            edop,
            hdop,
            vdop,
            tdop,
            pacc,
            hpacc,
            vpacc,
            vacc,
            tacc,
        }
    }
}

/// Satellite elevation and azimuth. Only `qli` is stored when `qli == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GnssSatPos {
    pub qli: u8,
    pub elev: i8,
    pub azim: i16,
}

impl GnssSatPos {
    fn encoded_len(&self) -> usize {
        if self.qli > 0 {
            4
        } else {
            1
        }
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u8(self.qli);
        if self.qli > 0 {
            out.put_i8(self.elev);
            out.put_i16_le(self.azim);
        }
    }

    fn get(src: &mut impl Buf) -> Result<Self> {
        need(src, 1)?;
        let qli = src.get_u8();
        if qli == 0 {
            return Ok(Self::default());
        }
        need(src, 3)?;
        Ok(Self {
            qli,
            elev: src.get_i8(),
            azim: src.get_i16_le(),
        })
    }
}

/// Navigation data, logged at 1 Hz.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GnssNavDataDump {
    /// 0 no time, 1 `tow` valid, 2 `wn` too, 3 `utc` too.
    pub tvalid: u8,
    pub tow: f64,
    pub wn: u16,
    pub utc: GnssTimeDate,
    pub pvt: GnssPvt,
    pub prn: [u16; GNSS_CHANNELS],
    pub satellites: [GnssSatPos; GNSS_CHANNELS],
}

impl GnssNavDataDump {
    const FIXED_LEN: usize = 1 + 8 + 2 + GnssTimeDate::LEN + GnssPvt::LEN + 2 * GNSS_CHANNELS;

    fn encoded_len(&self) -> usize {
        Self::FIXED_LEN
            + self
                .satellites
                .iter()
                .map(GnssSatPos::encoded_len)
                .sum::<usize>()
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u8(self.tvalid);
        out.put_f64_le(self.tow);
        out.put_u16_le(self.wn);
        self.utc.put(out);
        self.pvt.put(out);
        for prn in self.prn {
            out.put_u16_le(prn);
        }
        for satellite in &self.satellites {
            satellite.put(out);
        }
    }

    fn get(src: &mut impl Buf) -> Result<Self> {
        need(src, Self::FIXED_LEN)?;
        let mut dump = Self {
            tvalid: src.get_u8(),
            tow: src.get_f64_le(),
            wn: src.get_u16_le(),
            utc: GnssTimeDate::get(src),
            pvt: GnssPvt::get(src),
            ..Self::default()
        };
        for prn in &mut dump.prn {
            *prn = src.get_u16_le();
        }
        for slot in &mut dump.satellites {
            *slot = GnssSatPos::get(src)?;
        }
        Ok(dump)
    }
}

/// A warning or error string. Stored NUL-terminated and truncated to fit a
/// frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageDump {
    pub text: String,
}

/// Counting pattern filling a whole frame, used to check the log path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebugPattern {
    /// Payload length including the record type.
    pub len: usize,
    /// Bytes that differ from the expected pattern.
    pub mismatches: usize,
}

/// Any onboard log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    BaseDataDump(BaseDataDump),
    GnssRawDataDump(GnssRawDataDump),
    GnssNavDataDump(GnssNavDataDump),
    MessageDump(MessageDump),
    DebugPattern(DebugPattern),
}

impl LogRecord {
    pub fn record_type(&self) -> u16 {
        match self {
            Self::BaseDataDump(_) => ids::BASE_DATA_DUMP,
            Self::GnssRawDataDump(_) => ids::GNSS_RAW_DATA_DUMP,
            Self::GnssNavDataDump(_) => ids::GNSS_NAV_DATA_DUMP,
            Self::MessageDump(_) => ids::MESSAGE_DUMP,
            Self::DebugPattern(_) => ids::DEBUG_PATTERN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BaseDataDump(_) => "base_data_dump",
            Self::GnssRawDataDump(_) => "gnss_raw_data_dump",
            Self::GnssNavDataDump(_) => "gnss_nav_data_dump",
            Self::MessageDump(_) => "message_dump",
            Self::DebugPattern(_) => "debug_pattern",
        }
    }

    /// Payload bytes needed to encode this record into a frame whose payload
    /// holds at most `max_payload` bytes.
    ///
    /// Message dumps shrink to fit and debug patterns fill the frame.
    pub fn encoded_len(&self, max_payload: usize) -> usize {
        TYPE_LEN
            + match self {
                Self::BaseDataDump(dump) => dump.encoded_len(),
                Self::GnssRawDataDump(dump) => dump.encoded_len(),
                Self::GnssNavDataDump(dump) => dump.encoded_len(),
                Self::MessageDump(dump) => {
                    (dump.text.len() + 1).min(max_payload.saturating_sub(TYPE_LEN))
                }
                Self::DebugPattern(_) => max_payload.saturating_sub(TYPE_LEN),
            }
    }

    /// Encode into `dst`, which is the whole payload area. Returns the
    /// payload length.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len(dst.len());
        if len > dst.len() {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: dst.len(),
            }
            .into());
        }

        let mut out = &mut dst[..len];
        out.put_u16_le(self.record_type());
        match self {
            Self::BaseDataDump(dump) => dump.put(&mut out),
            Self::GnssRawDataDump(dump) => dump.put(&mut out),
            Self::GnssNavDataDump(dump) => dump.put(&mut out),
            Self::MessageDump(dump) => {
                if let Some(room) = (len - TYPE_LEN).checked_sub(1) {
                    out.put_slice(&dump.text.as_bytes()[..room]);
                    out.put_u8(0);
                }
            }
            Self::DebugPattern(_) => {
                for i in TYPE_LEN..len {
                    out.put_u8(i as u8);
                }
            }
        }
        Ok(len)
    }

    /// Decode a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut src = payload;
        need(&mut src, TYPE_LEN)?;
        let record = match src.get_u16_le() {
            ids::BASE_DATA_DUMP => Self::BaseDataDump(BaseDataDump::get(&mut src)?),
            ids::GNSS_RAW_DATA_DUMP => Self::GnssRawDataDump(GnssRawDataDump::get(&mut src)?),
            ids::GNSS_NAV_DATA_DUMP => Self::GnssNavDataDump(GnssNavDataDump::get(&mut src)?),
            ids::MESSAGE_DUMP => {
                let text = src.split(|&b| b == 0).next().unwrap_or_default();
                Self::MessageDump(MessageDump {
                    text: String::from_utf8_lossy(text).into_owned(),
                })
            }
            ids::DEBUG_PATTERN => {
                let mismatches = src
                    .iter()
                    .enumerate()
                    .filter(|&(i, &b)| b != (i + TYPE_LEN) as u8)
                    .count();
                Self::DebugPattern(DebugPattern {
                    len: payload.len(),
                    mismatches,
                })
            }
            other => return Err(ProtocolError::UnknownRecord(other)),
        };
        Ok(record)
    }
}
