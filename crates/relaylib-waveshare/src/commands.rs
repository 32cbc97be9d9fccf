//! Frame builders and response parsers for the relay board.
//!
//! Every request is a six-byte body followed by its CRC:
//!
//! ```text
//! <slave 0x01> <function> <p0> <p1> <p2> <p3> <crc lo> <crc hi>
//! ```
//!
//! All builders are pure: they produce byte vectors without performing any
//! I/O. The caller sends them over a transport and hands the reply bytes
//! back to the parsers here.

use bytes::{BufMut, BytesMut};
use relaylib_core::{Error, RelayAction, RelayIndex, Result};
use std::fmt;
use std::str::FromStr;

use crate::crc;

/// Slave address of the board. The board ignores multi-drop addressing, so
/// every frame carries the same value.
pub const SLAVE_ADDR: u8 = 0x01;

/// Write-coil function code (toggle and pulse).
pub const FN_WRITE_COIL: u8 = 0x05;

/// Read-register function code (firmware version).
pub const FN_READ_REGISTER: u8 = 0x03;

/// Bit set in the function code of an exception reply.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// First payload byte of a plain toggle.
const MODE_TOGGLE: u8 = 0x00;

/// First payload byte of a timed pulse.
const MODE_PULSE: u8 = 0x02;

/// Firmware version register, high byte first.
const REG_SW_VERSION: [u8; 2] = [0x80, 0x00];

/// Pulse durations are counted in ticks of this many milliseconds.
pub const PULSE_TICK_MS: u32 = 100;

/// How a pulse duration's tick count is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PulseEncoding {
    /// The decimal digits of the tick count are sent as if they were hex
    /// digits: 5 ticks go out as `0x0005`, 15 ticks as `0x0015` (which the
    /// board reads as 21). Matches the byte stream of the existing control
    /// scripts, so it is the default.
    #[default]
    DecimalAsHex,
    /// The tick count is sent as a plain big-endian integer: 15 ticks go out
    /// as `0x000F`.
    Binary,
}

impl fmt::Display for PulseEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PulseEncoding::DecimalAsHex => "decimal-as-hex",
            PulseEncoding::Binary => "binary",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into a [`PulseEncoding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePulseEncodingError(String);

impl fmt::Display for ParsePulseEncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pulse encoding: '{}'", self.0)
    }
}

impl std::error::Error for ParsePulseEncodingError {}

impl FromStr for PulseEncoding {
    type Err = ParsePulseEncodingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "decimal-as-hex" | "legacy" => Ok(PulseEncoding::DecimalAsHex),
            "binary" => Ok(PulseEncoding::Binary),
            _ => Err(ParsePulseEncodingError(s.to_string())),
        }
    }
}

/// Build a complete frame: slave address, function code, payload, CRC.
///
/// # Example
///
/// ```
/// use relaylib_waveshare::commands::{encode_frame, FN_READ_REGISTER};
///
/// let frame = encode_frame(FN_READ_REGISTER, &[0x80, 0x00, 0x00, 0x01]);
/// assert_eq!(frame, vec![0x01, 0x03, 0x80, 0x00, 0x00, 0x01, 0xAD, 0xCA]);
/// ```
pub fn encode_frame(function: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(2 + payload.len() + 2);
    buf.put_u8(SLAVE_ADDR);
    buf.put_u8(function);
    buf.put_slice(payload);
    let checksum = crc::checksum_bytes(&buf);
    buf.put_slice(&checksum);
    buf.to_vec()
}

/// Switch one relay (or all, with [`RelayIndex::ALL`]) on, off, or over.
///
/// ```
/// use relaylib_core::{RelayAction, RelayIndex};
/// use relaylib_waveshare::commands::cmd_toggle_relay;
///
/// let frame = cmd_toggle_relay(RelayIndex::ALL, RelayAction::Flip);
/// assert_eq!(frame, vec![0x01, 0x05, 0x00, 0xFF, 0x55, 0x00, 0xC2, 0xAA]);
/// ```
pub fn cmd_toggle_relay(index: RelayIndex, action: RelayAction) -> Vec<u8> {
    encode_frame(
        FN_WRITE_COIL,
        &[MODE_TOGGLE, index.index(), action.as_byte(), 0x00],
    )
}

/// Switch every relay on the board.
pub fn cmd_toggle_all_relays(action: RelayAction) -> Vec<u8> {
    cmd_toggle_relay(RelayIndex::ALL, action)
}

/// Close a relay for `on_ms` milliseconds, after which the board releases it.
///
/// The duration is truncated to whole [`PULSE_TICK_MS`] ticks and encoded
/// per `encoding`.
///
/// # Errors
///
/// [`Error::InvalidParameter`] if the duration is shorter than one tick or
/// its encoded tick value does not fit in 16 bits.
pub fn cmd_pulse_relay(index: RelayIndex, on_ms: u32, encoding: PulseEncoding) -> Result<Vec<u8>> {
    let [hi, lo] = pulse_ticks(on_ms, encoding)?.to_be_bytes();
    Ok(encode_frame(FN_WRITE_COIL, &[MODE_PULSE, index.index(), hi, lo]))
}

/// Read the firmware version register.
pub fn cmd_read_sw_version() -> Vec<u8> {
    encode_frame(
        FN_READ_REGISTER,
        &[REG_SW_VERSION[0], REG_SW_VERSION[1], 0x00, 0x01],
    )
}

/// The 16-bit tick value sent for a pulse of `on_ms` milliseconds.
pub fn pulse_ticks(on_ms: u32, encoding: PulseEncoding) -> Result<u16> {
    let ticks = on_ms / PULSE_TICK_MS;
    if ticks == 0 {
        return Err(Error::InvalidParameter(format!(
            "pulse of {} ms is shorter than one {} ms tick",
            on_ms, PULSE_TICK_MS
        )));
    }

    let wire = match encoding {
        // Decimal digits are always valid hex digits, so this parse only
        // fails on overflow, which the range check below reports.
        PulseEncoding::DecimalAsHex => {
            u32::from_str_radix(&ticks.to_string(), 16).unwrap_or(u32::MAX)
        }
        PulseEncoding::Binary => ticks,
    };

    u16::try_from(wire).map_err(|_| {
        Error::InvalidParameter(format!(
            "pulse of {} ms ({} ticks) does not fit the {} tick field",
            on_ms, ticks, encoding
        ))
    })
}

/// Firmware version reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwVersion(pub u16);

impl fmt::Display for SwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// If `response` is an exception reply, return its exception code.
pub fn exception_code(response: &[u8]) -> Option<u8> {
    match response {
        [_, function, code, ..] if function & EXCEPTION_FLAG != 0 => Some(*code),
        _ => None,
    }
}

/// Parse the reply to [`cmd_read_sw_version`].
///
/// Expected layout: `01 03 02 <hi> <lo> <crc lo> <crc hi>`.
///
/// ```
/// use relaylib_waveshare::commands::parse_sw_version;
///
/// let version = parse_sw_version(&[0x01, 0x03, 0x02, 0x00, 0xC8, 0xB9, 0xD2]).unwrap();
/// assert_eq!(version.to_string(), "V2.00");
/// ```
pub fn parse_sw_version(response: &[u8]) -> Result<SwVersion> {
    if !crc::is_complete_frame(response) {
        return Err(Error::Protocol(format!(
            "version reply fails checksum: {:02X?}",
            response
        )));
    }
    if let Some(code) = exception_code(response) {
        return Err(Error::Protocol(format!(
            "board rejected version read with exception {:#04X}",
            code
        )));
    }
    match response {
        [SLAVE_ADDR, FN_READ_REGISTER, 0x02, hi, lo, _, _] => {
            Ok(SwVersion(u16::from_be_bytes([*hi, *lo])))
        }
        _ => Err(Error::Protocol(format!(
            "unexpected version reply: {:02X?}",
            response
        ))),
    }
}
