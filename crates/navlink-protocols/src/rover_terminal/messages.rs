//! Rover-terminal record schemas.
//!
//! Bodies are packed little-endian with no padding. Fixed-size records
//! implement [`FixedMessage`]; console traffic is variable-size.

use bytes::{Buf, BufMut};
use navlink_frame::{ensure_len, FixedMessage, Message};
use serde::Serialize;

use crate::ids;

macro_rules! fixed_message {
    ($ty:ty, $id:expr, $len:expr) => {
        impl Message for $ty {
            const ID: u32 = $id;

            fn body_len(&self) -> usize {
                $len
            }

            fn encode_body(&self, mut dst: &mut [u8]) {
                self.put(&mut dst);
            }

            fn decode_body(src: &[u8]) -> navlink_frame::Result<Self> {
                ensure_len(src, $len)?;
                let mut src = src;
                Ok(Self::get(&mut src))
            }
        }

        impl FixedMessage for $ty {
            const BODY_LEN: usize = $len;
        }
    };
}

/// Quality of the rover's position solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionQuality {
    Invalid,
    Single1D,
    Single2D,
    Single3D,
    DiffFloat,
    DiffFixed,
}

impl SolutionQuality {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Invalid,
            1 => Self::Single1D,
            2 => Self::Single2D,
            3 => Self::Single3D,
            4 => Self::DiffFloat,
            5 => Self::DiffFixed,
            _ => return None,
        })
    }
}

/// Tracking state of one satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SatelliteQuality {
    Searching,
    Acquisition,
    BadSv,
    Tracking,
    CarrierLocked,
    HalfCycleResolved,
}

impl SatelliteQuality {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Searching,
            1 => Self::Acquisition,
            2 => Self::BadSv,
            3 => Self::Tracking,
            4 => Self::CarrierLocked,
            5 => Self::HalfCycleResolved,
            _ => return None,
        })
    }
}

/// Virtual register addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterAddress {
    /// 0 static, 1 dynamic.
    DynamicMode,
    DynamicPlatform,
    /// Any write clears.
    ClearChargerFaults,
    /// Read-only.
    SupportedChannelCount,
    /// Read-only, signed.
    MinimumRadioRssi,
    /// Read-only, signed.
    MaximumRadioRssi,
    /// Micrometres above ground.
    BaseHeight,
    BaseVerticalOffsetId,
    /// Micrometres above ground.
    RoverHeight,
    RoverVerticalOffsetId,
}

impl RegisterAddress {
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0x000 => Self::DynamicMode,
            0x001 => Self::DynamicPlatform,
            0x002 => Self::ClearChargerFaults,
            0x003 => Self::SupportedChannelCount,
            0x004 => Self::MinimumRadioRssi,
            0x005 => Self::MaximumRadioRssi,
            0x100 => Self::BaseHeight,
            0x101 => Self::BaseVerticalOffsetId,
            0x102 => Self::RoverHeight,
            0x103 => Self::RoverVerticalOffsetId,
            _ => return None,
        })
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::DynamicMode => 0x000,
            Self::DynamicPlatform => 0x001,
            Self::ClearChargerFaults => 0x002,
            Self::SupportedChannelCount => 0x003,
            Self::MinimumRadioRssi => 0x004,
            Self::MaximumRadioRssi => 0x005,
            Self::BaseHeight => 0x100,
            Self::BaseVerticalOffsetId => 0x101,
            Self::RoverHeight => 0x102,
            Self::RoverVerticalOffsetId => 0x103,
        }
    }
}

/// How the rover should answer a [`TerminalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Once,
    Update,
    Stop,
}

impl RequestType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Once,
            1 => Self::Update,
            2 => Self::Stop,
            _ => return None,
        })
    }
}

/// Baseline, its covariance and the heading. Sent at up to 10 Hz.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BaselineVector {
    /// GPS time in microseconds.
    pub time_stamp: u64,
    /// WGS-84 baseline in metres.
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// Position covariance in square metres.
    pub covar_xx: f32,
    pub covar_yy: f32,
    pub covar_zz: f32,
    pub covar_xy: f32,
    pub covar_xz: f32,
    pub covar_yz: f32,
    /// Heading in degrees, north = 0, east = 90.
    pub yaw: f32,
    pub pitch: f32,
    pub heading_valid: u8,
    pub qli: u8,
}

impl BaselineVector {
    pub fn quality(&self) -> Option<SolutionQuality> {
        SolutionQuality::from_u8(self.qli)
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.time_stamp);
        out.put_f64_le(self.dx);
        out.put_f64_le(self.dy);
        out.put_f64_le(self.dz);
        for v in [
            self.covar_xx,
            self.covar_yy,
            self.covar_zz,
            self.covar_xy,
            self.covar_xz,
            self.covar_yz,
            self.yaw,
            self.pitch,
        ] {
            out.put_f32_le(v);
        }
        out.put_u8(self.heading_valid);
        out.put_u8(self.qli);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            time_stamp: src.get_u64_le(),
            dx: src.get_f64_le(),
            dy: src.get_f64_le(),
            dz: src.get_f64_le(),
            covar_xx: src.get_f32_le(),
            covar_yy: src.get_f32_le(),
            covar_zz: src.get_f32_le(),
            covar_xy: src.get_f32_le(),
            covar_xz: src.get_f32_le(),
            covar_yz: src.get_f32_le(),
            yaw: src.get_f32_le(),
            pitch: src.get_f32_le(),
            heading_valid: src.get_u8(),
            qli: src.get_u8(),
        }
    }
}

fixed_message!(BaselineVector, ids::BASELINE_VECTOR, 66);

/// Per-satellite tracking state, one record per channel at 1 Hz.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub channel: u8,
    pub rover_qli: u8,
    pub base_qli: u8,
    /// C/N0 in dB-Hz.
    pub rover_cn0: u8,
    pub base_cn0: u8,
    /// Degrees.
    pub elev: i8,
    pub prn: u16,
    /// Degrees.
    pub azim: i16,
    pub elev_azim_valid: u8,
    pub used_in_solution: u8,
}

impl ChannelInfo {
    pub fn rover_quality(&self) -> Option<SatelliteQuality> {
        SatelliteQuality::from_u8(self.rover_qli)
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u8(self.channel);
        out.put_u8(self.rover_qli);
        out.put_u8(self.base_qli);
        out.put_u8(self.rover_cn0);
        out.put_u8(self.base_cn0);
        out.put_i8(self.elev);
        out.put_u16_le(self.prn);
        out.put_i16_le(self.azim);
        out.put_u8(self.elev_azim_valid);
        out.put_u8(self.used_in_solution);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            channel: src.get_u8(),
            rover_qli: src.get_u8(),
            base_qli: src.get_u8(),
            rover_cn0: src.get_u8(),
            base_cn0: src.get_u8(),
            elev: src.get_i8(),
            prn: src.get_u16_le(),
            azim: src.get_i16_le(),
            elev_azim_valid: src.get_u8(),
            used_in_solution: src.get_u8(),
        }
    }
}

fixed_message!(ChannelInfo, ids::CHANNEL_INFO, 12);

/// Result of a register read or write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterInfo {
    /// 0 read, 1 write.
    pub op: u8,
    pub addr: u32,
    pub value: u32,
}

impl RegisterInfo {
    pub fn register(&self) -> Option<RegisterAddress> {
        RegisterAddress::from_u32(self.addr)
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u8(self.op);
        out.put_u32_le(self.addr);
        out.put_u32_le(self.value);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            op: src.get_u8(),
            addr: src.get_u32_le(),
            value: src.get_u32_le(),
        }
    }
}

fixed_message!(RegisterInfo, ids::REGISTER_INFO, 9);

/// Health of the base radio link as seen by the rover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoverRfInfo {
    /// Average signal strength in dBm.
    pub rssi: i32,
    pub received_packets: u32,
    pub bad_packets: u32,
    pub purged_packets: u32,
}

impl RoverRfInfo {
    fn put(&self, out: &mut impl BufMut) {
        out.put_i32_le(self.rssi);
        out.put_u32_le(self.received_packets);
        out.put_u32_le(self.bad_packets);
        out.put_u32_le(self.purged_packets);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            rssi: src.get_i32_le(),
            received_packets: src.get_u32_le(),
            bad_packets: src.get_u32_le(),
            purged_packets: src.get_u32_le(),
        }
    }
}

fixed_message!(RoverRfInfo, ids::ROVER_RF_INFO, 16);

/// Accumulated reference coordinates of one antenna.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefPos {
    /// GPS time in microseconds.
    pub time_stamp: u64,
    /// WGS-84 ECEF in metres.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// 3D accuracy in metres.
    pub acc_3d: f32,
    pub qli: u8,
}

impl RefPos {
    pub const LEN: usize = 37;

    fn put(&self, out: &mut impl BufMut) {
        out.put_u64_le(self.time_stamp);
        out.put_f64_le(self.x);
        out.put_f64_le(self.y);
        out.put_f64_le(self.z);
        out.put_f32_le(self.acc_3d);
        out.put_u8(self.qli);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            time_stamp: src.get_u64_le(),
            x: src.get_f64_le(),
            y: src.get_f64_le(),
            z: src.get_f64_le(),
            acc_3d: src.get_f32_le(),
            qli: src.get_u8(),
        }
    }
}

/// Base and rover reference positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SysRefPos {
    pub base: RefPos,
    pub rover: RefPos,
}

impl SysRefPos {
    fn put(&self, out: &mut impl BufMut) {
        self.base.put(out);
        self.rover.put(out);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            base: RefPos::get(src),
            rover: RefPos::get(src),
        }
    }
}

fixed_message!(SysRefPos, ids::SYS_REF_POS, 2 * RefPos::LEN);

/// Status flags and battery levels of both units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuxiliaryInfo {
    pub base_status: u32,
    pub rover_status: u32,
    /// Percent.
    pub base_battery: u8,
    /// Percent.
    pub rover_battery: u8,
}

impl AuxiliaryInfo {
    fn put(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.base_status);
        out.put_u32_le(self.rover_status);
        out.put_u8(self.base_battery);
        out.put_u8(self.rover_battery);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            base_status: src.get_u32_le(),
            rover_status: src.get_u32_le(),
            base_battery: src.get_u8(),
            rover_battery: src.get_u8(),
        }
    }
}

fixed_message!(AuxiliaryInfo, ids::AUXILIARY_INFO, 10);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatteryInfo {
    /// Capacity in mAh.
    pub battmah: u16,
    /// Current in mA.
    pub battcur: i16,
    pub battstat: u16,
}

impl BatteryInfo {
    fn put(&self, out: &mut impl BufMut) {
        out.put_u16_le(self.battmah);
        out.put_i16_le(self.battcur);
        out.put_u16_le(self.battstat);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            battmah: src.get_u16_le(),
            battcur: src.get_i16_le(),
            battstat: src.get_u16_le(),
        }
    }
}

fixed_message!(BatteryInfo, ids::BATTERY_INFO, 6);

/// Charger fault counters and measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargerInfo {
    pub ovrvcumul: u16,
    pub ovrccumul: u16,
    pub undvcumul: u16,
    pub badvcumul: u16,
    pub vbatt: f32,
    pub vext: f32,
    pub ichrg: f32,
    pub fg_temp: f32,
    pub bksw_temp: f32,
    pub btdd_temp: f32,
}

impl ChargerInfo {
    fn put(&self, out: &mut impl BufMut) {
        for v in [self.ovrvcumul, self.ovrccumul, self.undvcumul, self.badvcumul] {
            out.put_u16_le(v);
        }
        for v in [
            self.vbatt,
            self.vext,
            self.ichrg,
            self.fg_temp,
            self.bksw_temp,
            self.btdd_temp,
        ] {
            out.put_f32_le(v);
        }
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            ovrvcumul: src.get_u16_le(),
            ovrccumul: src.get_u16_le(),
            undvcumul: src.get_u16_le(),
            badvcumul: src.get_u16_le(),
            vbatt: src.get_f32_le(),
            vext: src.get_f32_le(),
            ichrg: src.get_f32_le(),
            fg_temp: src.get_f32_le(),
            bksw_temp: src.get_f32_le(),
            btdd_temp: src.get_f32_le(),
        }
    }
}

fixed_message!(ChargerInfo, ids::CHARGER_INFO, 32);

/// Auxiliary controller health counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuxctlInfo {
    pub sysclk: u32,
    pub uptime: u32,
    pub maxcpu: u8,
    pub syscrshcnt: u16,
    pub matherrcnt: u16,
    pub addrerrcnt: u16,
    pub stkerrcnt: u16,
    pub matherrlst: u16,
    pub addrerrlst: u16,
    pub stkerrlst: u16,
    pub spierror: u16,
}

impl AuxctlInfo {
    fn put(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.sysclk);
        out.put_u32_le(self.uptime);
        out.put_u8(self.maxcpu);
        for v in [
            self.syscrshcnt,
            self.matherrcnt,
            self.addrerrcnt,
            self.stkerrcnt,
            self.matherrlst,
            self.addrerrlst,
            self.stkerrlst,
            self.spierror,
        ] {
            out.put_u16_le(v);
        }
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            sysclk: src.get_u32_le(),
            uptime: src.get_u32_le(),
            maxcpu: src.get_u8(),
            syscrshcnt: src.get_u16_le(),
            matherrcnt: src.get_u16_le(),
            addrerrcnt: src.get_u16_le(),
            stkerrcnt: src.get_u16_le(),
            matherrlst: src.get_u16_le(),
            addrerrlst: src.get_u16_le(),
            stkerrlst: src.get_u16_le(),
            spierror: src.get_u16_le(),
        }
    }
}

fixed_message!(AuxctlInfo, ids::AUXCTL_INFO, 25);

/// Terminal asks the rover for a message id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TerminalRequest {
    pub requested_id: u16,
    pub optional_arg: u32,
    /// See [`RequestType`].
    pub request_type: u8,
    pub max_update_frequency: f32,
}

impl TerminalRequest {
    pub fn kind(&self) -> Option<RequestType> {
        RequestType::from_u8(self.request_type)
    }

    fn put(&self, out: &mut impl BufMut) {
        out.put_u16_le(self.requested_id);
        out.put_u32_le(self.optional_arg);
        out.put_u8(self.request_type);
        out.put_f32_le(self.max_update_frequency);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            requested_id: src.get_u16_le(),
            optional_arg: src.get_u32_le(),
            request_type: src.get_u8(),
            max_update_frequency: src.get_f32_le(),
        }
    }
}

fixed_message!(TerminalRequest, ids::TERMINAL_REQUEST, 11);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterWrite {
    pub addr: u32,
    pub value: u32,
}

impl RegisterWrite {
    fn put(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.addr);
        out.put_u32_le(self.value);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            addr: src.get_u32_le(),
            value: src.get_u32_le(),
        }
    }
}

fixed_message!(RegisterWrite, ids::REGISTER_WRITE, 8);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterRead {
    pub addr: u32,
}

impl RegisterRead {
    fn put(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.addr);
    }

    fn get(src: &mut impl Buf) -> Self {
        Self {
            addr: src.get_u32_le(),
        }
    }
}

fixed_message!(RegisterRead, ids::REGISTER_READ, 4);

/// Output of the embedded console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleOutput {
    #[serde(serialize_with = "lossy_text")]
    pub text: Vec<u8>,
}

impl Message for ConsoleOutput {
    const ID: u32 = ids::CONSOLE_OUTPUT;

    fn body_len(&self) -> usize {
        self.text.len()
    }

    fn encode_body(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.text);
    }

    fn decode_body(src: &[u8]) -> navlink_frame::Result<Self> {
        Ok(Self { text: src.to_vec() })
    }
}

/// Input for the embedded console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleInput {
    #[serde(serialize_with = "lossy_text")]
    pub text: Vec<u8>,
}

impl Message for ConsoleInput {
    const ID: u32 = ids::CONSOLE_INPUT;

    fn body_len(&self) -> usize {
        self.text.len()
    }

    fn encode_body(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.text);
    }

    fn decode_body(src: &[u8]) -> navlink_frame::Result<Self> {
        Ok(Self { text: src.to_vec() })
    }
}

fn lossy_text<S: serde::Serializer>(text: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<M: Message + FixedMessage + PartialEq + std::fmt::Debug>(message: &M) {
        let mut body = vec![0u8; M::BODY_LEN];
        assert_eq!(message.body_len(), M::BODY_LEN);
        message.encode_body(&mut body);
        assert_eq!(&M::decode_body(&body).unwrap(), message);
    }

    #[test]
    fn test_body_sizes_match_wire_layout() {
        assert_eq!(BaselineVector::BODY_LEN, 66);
        assert_eq!(ChannelInfo::BODY_LEN, 12);
        assert_eq!(RegisterInfo::BODY_LEN, 9);
        assert_eq!(RoverRfInfo::BODY_LEN, 16);
        assert_eq!(SysRefPos::BODY_LEN, 74);
        assert_eq!(AuxiliaryInfo::BODY_LEN, 10);
        assert_eq!(BatteryInfo::BODY_LEN, 6);
        assert_eq!(ChargerInfo::BODY_LEN, 32);
        assert_eq!(AuxctlInfo::BODY_LEN, 25);
        assert_eq!(TerminalRequest::BODY_LEN, 11);
        assert_eq!(RegisterWrite::BODY_LEN, 8);
        assert_eq!(RegisterRead::BODY_LEN, 4);
    }

    #[test]
    fn test_fixed_records_roundtrip() {
        roundtrip(&BaselineVector {
            time_stamp: 1_234_567_890_123,
            dx: 12.5,
            dy: -3.25,
            dz: 0.125,
            covar_xx: 0.01,
            yaw: 271.5,
            heading_valid: 1,
            qli: 5,
            ..BaselineVector::default()
        });
        roundtrip(&ChannelInfo {
            channel: 3,
            rover_qli: 4,
            elev: -5,
            prn: 27,
            azim: -170,
            used_in_solution: 1,
            ..ChannelInfo::default()
        });
        roundtrip(&SysRefPos {
            base: RefPos {
                time_stamp: 9,
                x: 4_000_000.5,
                qli: 3,
                ..RefPos::default()
            },
            rover: RefPos {
                acc_3d: 0.02,
                qli: 4,
                ..RefPos::default()
            },
        });
        roundtrip(&AuxctlInfo {
            sysclk: 48_000_000,
            maxcpu: 87,
            spierror: 0xBEEF,
            ..AuxctlInfo::default()
        });
        roundtrip(&TerminalRequest {
            requested_id: ids::CHANNEL_INFO as u16,
            optional_arg: 7,
            request_type: 1,
            max_update_frequency: 2.5,
        });
    }

    #[test]
    fn test_register_write_layout() {
        let message = RegisterWrite {
            addr: RegisterAddress::RoverHeight.as_u32(),
            value: 1_500_000,
        };
        let mut body = [0u8; 8];
        message.encode_body(&mut body);
        assert_eq!(body, [0x02, 0x01, 0, 0, 0x60, 0xE3, 0x16, 0x00]);
    }

    #[test]
    fn test_decode_short_body_fails() {
        assert!(ChannelInfo::decode_body(&[0u8; 11]).is_err());
    }

    #[test]
    fn test_enum_lookups() {
        assert_eq!(SolutionQuality::from_u8(5), Some(SolutionQuality::DiffFixed));
        assert_eq!(SolutionQuality::from_u8(6), None);
        assert_eq!(
            SatelliteQuality::from_u8(4),
            Some(SatelliteQuality::CarrierLocked)
        );
        assert_eq!(
            RegisterAddress::from_u32(0x101),
            Some(RegisterAddress::BaseVerticalOffsetId)
        );
        assert_eq!(RequestType::from_u8(2), Some(RequestType::Stop));
    }

    #[test]
    fn test_console_text_serializes_as_string() {
        let message = ConsoleOutput {
            text: b"gps> ok".to_vec(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["text"], "gps> ok");
    }
}
