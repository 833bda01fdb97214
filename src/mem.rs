use miette::{bail, Result};

/// Flat byte-addressable memory with little-endian multi-byte access.
/// Capacity is fixed at construction.
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Memory {
            bytes: vec![0; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Zero the buffer, keeping capacity.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }

    /// An access of `width` bytes at `addr` must lie fully inside the
    /// buffer. Returns the buffer offset.
    fn bounds(&self, addr: i32, width: usize) -> Result<usize> {
        let cap = self.bytes.len();
        if addr < 0 || addr as usize + width > cap {
            bail!(
                "Memory access OOB at {:#x} (valid 0..{})",
                addr,
                cap as i32 - 1
            );
        }
        Ok(addr as usize)
    }

    fn aligned(addr: i32, align: i32, what: &str) -> Result<()> {
        if addr.rem_euclid(align) != 0 {
            bail!("Misaligned {what} at {addr:#x} (align {align})");
        }
        Ok(())
    }

    pub fn load8(&self, addr: i32) -> Result<u8> {
        let at = self.bounds(addr, 1)?;
        Ok(self.bytes[at])
    }

    pub fn load16(&self, addr: i32, what: &str) -> Result<u16> {
        Self::aligned(addr, 2, what)?;
        let at = self.bounds(addr, 2)?;
        Ok(u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]))
    }

    pub fn load32(&self, addr: i32, what: &str) -> Result<u32> {
        Self::aligned(addr, 4, what)?;
        let at = self.bounds(addr, 4)?;
        Ok(u32::from_le_bytes([
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ]))
    }

    pub fn store8(&mut self, addr: i32, val: u8) -> Result<()> {
        let at = self.bounds(addr, 1)?;
        self.bytes[at] = val;
        Ok(())
    }

    pub fn store16(&mut self, addr: i32, val: u16, what: &str) -> Result<()> {
        Self::aligned(addr, 2, what)?;
        let at = self.bounds(addr, 2)?;
        self.bytes[at..at + 2].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    pub fn store32(&mut self, addr: i32, val: u32, what: &str) -> Result<()> {
        Self::aligned(addr, 4, what)?;
        let at = self.bounds(addr, 4)?;
        self.bytes[at..at + 4].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn little_endian_round_trip() {
        let mut mem = Memory::new(64);
        mem.store32(0, 0x12345678, "SW").unwrap();
        assert_eq!(mem.load8(0).unwrap(), 0x78);
        assert_eq!(mem.load8(1).unwrap(), 0x56);
        assert_eq!(mem.load8(2).unwrap(), 0x34);
        assert_eq!(mem.load8(3).unwrap(), 0x12);
        assert_eq!(mem.load16(0, "LH").unwrap(), 0x5678);
        assert_eq!(mem.load16(2, "LH").unwrap(), 0x1234);
        assert_eq!(mem.load32(0, "LW").unwrap(), 0x12345678);
    }

    #[test]
    fn bounds_checked_per_width() {
        let mut mem = Memory::new(8);
        assert!(mem.load8(7).is_ok());
        assert!(mem.load8(8).is_err());
        assert!(mem.load8(-1).is_err());
        assert!(mem.load16(6, "LH").is_ok());
        assert!(mem.load32(4, "LW").is_ok());
        assert!(mem.load32(8, "LW").is_err());
    }

    #[test]
    fn oob_write_suppressed() {
        // Aligned but crossing the end: nothing may be written
        let mut mem = Memory::new(6);
        assert!(mem.store32(4, 0xDEADBEEF, "SW").is_err());
        assert_eq!(mem.load16(4, "LH").unwrap(), 0);
    }

    #[test]
    fn alignment_checked() {
        let mem = Memory::new(16);
        assert!(mem.load16(1, "LH").is_err());
        assert!(mem.load32(2, "LW").is_err());
        let err = mem.load16(3, "LH").unwrap_err();
        assert!(err.to_string().contains("Misaligned LH"));
    }

    #[test]
    fn reset_zeroes() {
        let mut mem = Memory::new(16);
        mem.store8(5, 0xAB).unwrap();
        mem.reset();
        assert_eq!(mem.load8(5).unwrap(), 0);
        assert_eq!(mem.capacity(), 16);
    }
}
