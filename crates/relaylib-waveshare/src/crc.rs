//! CRC-16/MODBUS checksum.
//!
//! Every frame on the wire ends in a CRC-16/MODBUS checksum, low byte
//! first. The algorithm is self-verifying: running it over a frame that
//! already carries its own checksum yields zero. The board's replies have
//! no length field, so that zero is also how the reader knows a reply is
//! complete.
//!
//! Parameters: reflected polynomial `0xA001` (`0x8005` unreflected),
//! initial register `0xFFFF`, no final XOR.

/// Reflected CRC-16/MODBUS polynomial.
pub const POLYNOMIAL: u16 = 0xA001;

/// Initial value of the CRC register.
pub const INITIAL: u16 = 0xFFFF;

/// Compute the CRC-16/MODBUS checksum of `data`.
///
/// # Example
///
/// ```
/// use relaylib_waveshare::crc::crc16;
///
/// let crc = crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);
/// assert_eq!(crc.to_le_bytes(), [0xC5, 0xCD]);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = INITIAL;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// The two checksum bytes for `data`, in wire order (low, high).
pub fn checksum_bytes(data: &[u8]) -> [u8; 2] {
    crc16(data).to_le_bytes()
}

/// Append the checksum of `frame` to `frame`.
pub fn append_crc(frame: &mut Vec<u8>) {
    let bytes = checksum_bytes(frame);
    frame.extend_from_slice(&bytes);
}

/// Returns `true` when `buf` is a complete frame: non-empty and checksumming
/// to zero over its own trailing CRC.
pub fn is_complete_frame(buf: &[u8]) -> bool {
    !buf.is_empty() && crc16(buf) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn reference_vector() {
        let body = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        assert_eq!(checksum_bytes(&body), [0xC5, 0xCD]);

        let mut frame = body.to_vec();
        append_crc(&mut frame);
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]);
        assert_eq!(crc16(&frame), 0);
        assert!(is_complete_frame(&frame));
    }

    #[test]
    fn empty_input_is_initial_register() {
        assert_eq!(crc16(&[]), INITIAL);
        assert!(!is_complete_frame(&[]));
    }

    #[test]
    fn appended_checksum_always_verifies() {
        let mut rng = rand::thread_rng();
        for len in 1..=32 {
            for _ in 0..16 {
                let mut frame: Vec<u8> = (0..len).map(|_| rng.r#gen()).collect();
                append_crc(&mut frame);
                assert_eq!(crc16(&frame), 0, "frame {:02X?}", frame);
            }
        }
    }

    #[test]
    fn partial_frame_is_not_complete() {
        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD];
        for end in 1..frame.len() {
            assert!(
                !is_complete_frame(&frame[..end]),
                "prefix of length {} reported complete",
                end
            );
        }
    }

    #[test]
    fn corrupted_byte_breaks_verification() {
        let mut frame = vec![0x01, 0x05, 0x00, 0xFF, 0x55, 0x00];
        append_crc(&mut frame);
        frame[3] ^= 0x01;
        assert!(!is_complete_frame(&frame));
    }
}
