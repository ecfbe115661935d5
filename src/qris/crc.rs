use std::fmt;

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// A CRC-16/CCITT-FALSE value. Displays as four uppercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub u16);

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Computes CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, MSB first, no final XOR).
///
/// Each character contributes one byte: its code point truncated to the low
/// eight bits. QRIS payloads are ASCII, where this is the plain byte value.
pub fn crc16_ccitt(input: &str) -> Checksum {
    crc16_ccitt_bytes(input.chars().map(|c| (u32::from(c) & 0xFF) as u8))
}

pub fn crc16_ccitt_bytes(bytes: impl IntoIterator<Item = u8>) -> Checksum {
    let mut crc = INITIAL;
    for byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    Checksum(crc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_initial_register() {
        assert_eq!(crc16_ccitt("").to_string(), "FFFF");
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(crc16_ccitt("A").to_string(), "B915");
        assert_eq!(crc16_ccitt("123456789").to_string(), "29B1");
        assert_eq!(crc16_ccitt("6304").to_string(), "6007");
    }

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(Checksum(0x00AB).to_string(), "00AB");
    }

    #[test]
    fn test_code_points_are_truncated_to_low_byte() {
        // U+0141 truncates to 0x41 ('A').
        assert_eq!(crc16_ccitt("\u{0141}"), crc16_ccitt("A"));
    }
}
