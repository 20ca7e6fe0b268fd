//! Packing and unpacking of the bit fields of an instruction word.
//!
//! Both the [compiler](crate::compiler) and the [emulator](crate::emulator) go through these
//! functions, so the field layout and the sign extension rules live in exactly one place.

use thiserror::Error;

/// Position of the opcode nibble.
pub const OPCODE_SHIFT: u32 = 0;
/// Position of the destination register (`Rd`) and of the store offset.
pub const RD_SHIFT: u32 = 12;
/// Position of the first source / base register (`Rm`).
pub const RM_SHIFT: u32 = 8;
/// Position of the second source register (`Rn`) and of the low immediates.
pub const RN_SHIFT: u32 = 4;
/// Position of the 4, 8, 10 and 12 bit immediates.
pub const IMMEDIATE_SHIFT: u32 = 4;
/// Position of the two bit condition code of a conditional jump.
pub const CONDITION_SHIFT: u32 = 14;

/// Width of a register index field.
pub const REGISTER_WIDTH: u32 = 4;

/// Errors produced when a value does not fit the field it is being packed into.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// The register index is outside of `0..=15`.
    #[error("invalid register index {0}, expected 0-15")]
    InvalidRegister(i64),

    /// The immediate cannot be represented in a field of `width` bits.
    #[error("immediate {value} does not fit in {width} bits")]
    ImmediateOutOfRange {
        /// The rejected value.
        value: i32,
        /// Width of the target field.
        width: u32,
    },
}

/// Returns a mask covering the low `width` bits.
pub fn mask(width: u32) -> u16 {
    if width >= 16 {
        0xFFFF
    } else {
        (1u16 << width) - 1
    }
}

/// Extracts `width` bits of `word` starting at bit `shift`.
pub fn field(word: u16, shift: u32, width: u32) -> u16 {
    (word >> shift) & mask(width)
}

/// Moves the low `width` bits of `value` to bit position `shift`.
pub fn place(value: u16, shift: u32, width: u32) -> u16 {
    (value & mask(width)) << shift
}

/// Sign extends the low `width` bits of `raw` as a two's complement number.
///
/// ```
/// use cpu16::codec::decode_immediate;
///
/// assert_eq!(decode_immediate(0xFF, 8), -1);
/// assert_eq!(decode_immediate(0x7F, 8), 127);
/// assert_eq!(decode_immediate(0x3FC, 10), -4);
/// ```
pub fn decode_immediate(raw: u16, width: u32) -> i16 {
    let sign = 1u16 << (width - 1);
    let raw = raw & mask(width);

    (raw ^ sign).wrapping_sub(sign) as i16
}

/// Validates a register index and returns it as a 4 bit field value.
pub fn encode_register_field<T: Into<i64>>(value: T) -> Result<u16, FieldError> {
    let value = value.into();

    if (0..16).contains(&value) {
        Ok(value as u16)
    } else {
        Err(FieldError::InvalidRegister(value))
    }
}

/// Packs a value that the emulator will sign extend.
///
/// Accepts `-2^(width-1) ..= 2^(width-1) - 1`.
pub fn encode_signed(value: i32, width: u32) -> Result<u16, FieldError> {
    let min = -(1i32 << (width - 1));
    let max = (1i32 << (width - 1)) - 1;

    if value < min || value > max {
        return Err(FieldError::ImmediateOutOfRange { value, width });
    }

    Ok(truncate(value, width))
}

/// Packs a value that the emulator will zero extend.
pub fn encode_unsigned(value: i32, width: u32) -> Result<u16, FieldError> {
    if value < 0 || value > mask(width) as i32 {
        return Err(FieldError::ImmediateOutOfRange { value, width });
    }

    Ok(value as u16)
}

/// Packs a raw bit pattern: either signed or unsigned spellings are accepted.
///
/// Used for `MOV`, where both `#-1` and `#0xFF` denote the same byte.
pub fn encode_bits(value: i32, width: u32) -> Result<u16, FieldError> {
    encode_signed(value, width).or_else(|_| encode_unsigned(value, width))
}

/// Keeps only the low `width` bits of `value`, without any range check.
pub fn truncate(value: i32, width: u32) -> u16 {
    (value as u16) & mask(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extension() {
        assert_eq!(decode_immediate(0x000, 12), 0);
        assert_eq!(decode_immediate(0x7FF, 12), 2047);
        assert_eq!(decode_immediate(0x800, 12), -2048);
        assert_eq!(decode_immediate(0xFFC, 12), -4);
        assert_eq!(decode_immediate(0x1FF, 10), 511);
        assert_eq!(decode_immediate(0x200, 10), -512);
        assert_eq!(decode_immediate(0x80, 8), -128);
        // Bits above the field are ignored.
        assert_eq!(decode_immediate(0xFF05, 8), 5);
    }

    #[test]
    fn test_signed_round_trip() {
        for width in &[8, 10, 12] {
            let min = -(1i32 << (width - 1));
            let max = (1i32 << (width - 1)) - 1;

            for value in &[min, -4, -1, 0, 1, 4, max] {
                let raw = encode_signed(*value, *width).unwrap();
                assert_eq!(decode_immediate(raw, *width) as i32, *value);
            }

            assert!(encode_signed(max + 1, *width).is_err());
            assert!(encode_signed(min - 1, *width).is_err());
        }
    }

    #[test]
    fn test_register_field() {
        assert_eq!(encode_register_field(0u8), Ok(0));
        assert_eq!(encode_register_field(15u8), Ok(15));
        assert_eq!(encode_register_field(16u8), Err(FieldError::InvalidRegister(16)));
        assert_eq!(encode_register_field(-1i32), Err(FieldError::InvalidRegister(-1)));
    }

    #[test]
    fn test_unsigned_and_bits() {
        assert_eq!(encode_unsigned(15, 4), Ok(15));
        assert!(encode_unsigned(16, 4).is_err());
        assert!(encode_unsigned(-1, 4).is_err());

        assert_eq!(encode_bits(-1, 8), Ok(0xFF));
        assert_eq!(encode_bits(0xFF, 8), Ok(0xFF));
        assert!(encode_bits(256, 8).is_err());
        assert!(encode_bits(-129, 8).is_err());

        assert_eq!(truncate(-1, 4), 0xF);
        assert_eq!(truncate(0x123, 8), 0x23);
    }

    #[test]
    fn test_fields() {
        let word = 0xABCD;
        assert_eq!(field(word, RD_SHIFT, 4), 0xA);
        assert_eq!(field(word, RM_SHIFT, 4), 0xB);
        assert_eq!(field(word, RN_SHIFT, 4), 0xC);
        assert_eq!(field(word, OPCODE_SHIFT, 4), 0xD);
        assert_eq!(field(word, CONDITION_SHIFT, 2), 0x2);
        assert_eq!(place(0x1F, IMMEDIATE_SHIFT, 4), 0xF0);
    }
}
