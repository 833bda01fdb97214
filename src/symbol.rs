use std::fmt;

use fxhash::FxHashMap;
use lazy_static::lazy_static;

lazy_static! {
    /// Conventional ABI names for the 32 integer registers.
    static ref ABI_REG_MAP: FxHashMap<&'static str, u8> = {
        let mut map = FxHashMap::default();
        for (name, num) in [
            // Zero & link
            ("zero", 0),
            ("ra", 1),
            ("sp", 2),
            ("gp", 3),
            ("tp", 4),
            // Temporaries
            ("t0", 5),
            ("t1", 6),
            ("t2", 7),
            ("t3", 28),
            ("t4", 29),
            ("t5", 30),
            ("t6", 31),
            // Saved registers
            ("s0", 8),
            ("s1", 9),
            ("s2", 18),
            ("s3", 19),
            ("s4", 20),
            ("s5", 21),
            ("s6", 22),
            ("s7", 23),
            ("s8", 24),
            ("s9", 25),
            ("s10", 26),
            ("s11", 27),
            // Arguments / return values
            ("a0", 10),
            ("a1", 11),
            ("a2", 12),
            ("a3", 13),
            ("a4", 14),
            ("a5", 15),
            ("a6", 16),
            ("a7", 17),
        ] {
            map.insert(name, num);
        }
        map
    };
}

/// One of the 32 integer registers, by index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Register = Register(0);
    pub const RA: Register = Register(1);
    pub const SP: Register = Register(2);
    pub const GP: Register = Register(3);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Failure to resolve a register token. The two flavors map onto
/// different diagnostic categories at the call site.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RegisterError {
    /// `x`-prefixed token with a malformed or out-of-range number.
    BadIndex(String),
    /// Name not in the ABI alias table.
    UnknownName(String),
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadIndex(tok) => write!(f, "Invalid register: {tok}"),
            Self::UnknownName(tok) => write!(f, "Unknown register name: {tok} -> default x0"),
        }
    }
}

impl Register {
    /// Resolve a register token: `xN` with N in 0..=31, or an ABI alias.
    /// Case-insensitive.
    pub fn resolve(token: &str) -> Result<Register, RegisterError> {
        let name = token.trim().to_ascii_lowercase();

        if let Some(rest) = name.strip_prefix('x') {
            return match rest.parse::<u32>() {
                Ok(num) if num < 32 => Ok(Register(num as u8)),
                _ => Err(RegisterError::BadIndex(token.to_string())),
            };
        }

        match ABI_REG_MAP.get(name.as_str()) {
            Some(&num) => Ok(Register(num)),
            None => Err(RegisterError::UnknownName(token.to_string())),
        }
    }
}
