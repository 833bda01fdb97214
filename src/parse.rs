use lazy_static::lazy_static;
use miette::{bail, miette, Result};
use regex::Regex;

lazy_static! {
    /// Memory operand form `IMM(REG)`, whitespace tolerated around the
    /// parentheses. The displacement may be empty (`(sp)` reads as `0(sp)`).
    static ref MEM_OPERAND: Regex =
        Regex::new(r"^\s*([^(]*?)\s*\(\s*([^)]*?)\s*\)\s*$").unwrap();
}

/// Parse an integer literal: optional leading `-`, then decimal digits or
/// `0x`/`0X` hex digits. Parsed in 64-bit arithmetic, the low 32 bits
/// reinterpreted as signed (two's-complement wraparound).
///
/// An empty (or all-whitespace) string parses to 0. Anything else that does
/// not fit the grammar is an error.
pub fn parse_int(text: &str) -> Result<i32> {
    let s = text.trim();
    if s.is_empty() {
        return Ok(0);
    }

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    // Keep to the strict grammar: the std parsers would accept a second
    // sign character here.
    let err = || miette!("Bad immediate: {s}");
    let magnitude: i64 = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }
        i64::from_str_radix(hex, 16).map_err(|_| err())?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        digits.parse::<i64>().map_err(|_| err())?
    };

    let value = if negative { -magnitude } else { magnitude };
    // Wrap like RV32, then interpret as signed
    Ok(value as u32 as i32)
}

/// Reinterpret the low 12 bits of a value as a signed number in [-2048, 2047].
#[inline]
pub fn sign_extend_12(imm: i32) -> i32 {
    (imm << 20) >> 20
}

/// Split a memory operand `IMM(REG)` into its displacement and register
/// tokens. A missing parenthesis is a hard failure; the tokens themselves
/// are not validated here.
pub fn split_mem_operand(text: &str) -> Result<(&str, &str)> {
    let caps = match MEM_OPERAND.captures(text) {
        Some(caps) => caps,
        None => bail!("Invalid memory operand: {text}"),
    };
    Ok((
        caps.get(1).map_or("", |m| m.as_str()),
        caps.get(2).map_or("", |m| m.as_str()),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_decimal() {
        assert_eq!(parse_int("42").unwrap(), 42);
        assert_eq!(parse_int("-42").unwrap(), -42);
        assert_eq!(parse_int("0").unwrap(), 0);
        assert_eq!(parse_int("  17 ").unwrap(), 17);
    }

    #[test]
    fn int_hex() {
        assert_eq!(parse_int("0x10").unwrap(), 16);
        assert_eq!(parse_int("0XfF").unwrap(), 255);
        assert_eq!(parse_int("-0x10").unwrap(), -16);
    }

    #[test]
    fn int_wraparound() {
        // Low 32 bits reinterpreted as signed
        assert_eq!(parse_int("0xFFFFFFFF").unwrap(), -1);
        assert_eq!(parse_int("4294967295").unwrap(), -1);
        assert_eq!(parse_int("0x80000000").unwrap(), i32::MIN);
        assert_eq!(parse_int("4294967296").unwrap(), 0);
    }

    #[test]
    fn int_empty_is_zero() {
        assert_eq!(parse_int("").unwrap(), 0);
        assert_eq!(parse_int("   ").unwrap(), 0);
    }

    #[test]
    fn int_malformed() {
        assert!(parse_int("abc").is_err());
        assert!(parse_int("12abc").is_err());
        assert!(parse_int("0x").is_err());
        assert!(parse_int("--4").is_err());
    }

    #[test]
    fn sext12() {
        assert_eq!(sign_extend_12(0), 0);
        assert_eq!(sign_extend_12(2047), 2047);
        assert_eq!(sign_extend_12(2048), -2048);
        assert_eq!(sign_extend_12(0xFFF), -1);
        assert_eq!(sign_extend_12(0x1000), 0);
        assert_eq!(sign_extend_12(-1), -1);
    }

    #[test]
    fn mem_operand_basic() {
        assert_eq!(split_mem_operand("8(sp)").unwrap(), ("8", "sp"));
        assert_eq!(split_mem_operand("-4(x2)").unwrap(), ("-4", "x2"));
        assert_eq!(split_mem_operand("0x10(t0)").unwrap(), ("0x10", "t0"));
    }

    #[test]
    fn mem_operand_spacing() {
        assert_eq!(split_mem_operand(" 8 ( sp ) ").unwrap(), ("8", "sp"));
        assert_eq!(split_mem_operand("(sp)").unwrap(), ("", "sp"));
    }

    #[test]
    fn mem_operand_malformed() {
        assert!(split_mem_operand("8").is_err());
        assert!(split_mem_operand("8(sp").is_err());
        assert!(split_mem_operand("8 sp)").is_err());
        assert!(split_mem_operand("").is_err());
    }
}
