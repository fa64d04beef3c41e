//! Message ids shared by every protocol on the unit.

// rover -> terminal
pub const BASELINE_VECTOR: u32 = 0x0001;
pub const CHANNEL_INFO: u32 = 0x0002;
pub const REGISTER_INFO: u32 = 0x0003;
pub const ROVER_RF_INFO: u32 = 0x0004;
pub const SYS_REF_POS: u32 = 0x0005;
pub const AUXILIARY_INFO: u32 = 0x0006;
pub const CONSOLE_OUTPUT: u32 = 0x0007;
pub const BATTERY_INFO: u32 = 0x0008;
pub const CHARGER_INFO: u32 = 0x0009;
pub const AUXCTL_INFO: u32 = 0x000A;

// terminal -> rover
pub const TERMINAL_REQUEST: u32 = 0x0040;
pub const REGISTER_WRITE: u32 = 0x0041;
pub const REGISTER_READ: u32 = 0x0042;
pub const CONSOLE_INPUT: u32 = 0x0043;

// onboard logs
pub const BASE_DATA_DUMP: u16 = 0x0200;
pub const GNSS_RAW_DATA_DUMP: u16 = 0x0201;
pub const GNSS_NAV_DATA_DUMP: u16 = 0x0202;
pub const MESSAGE_DUMP: u16 = 0x0203;
pub const DEBUG_PATTERN: u16 = 0x02FF;
