/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::VmResult;
use crate::set::SetValue;
use p6_vm_types::exception::FatalCode;
use p6_vm_types::{ADR_SIZE, Address, INT_SIZE, REAL_SIZE, SET_SIZE, STORE_CAPACITY};
use std::fmt::Write;

/// The machine store (from lower to higher addresses):
///
/// 1. **Code**: the loaded instructions, up to `pctop`
/// 2. **Constants**: literal data emitted after the code
/// 3. **Globals**: the standard file variables and program globals, up to `gbtop`
///    is where the heap starts
/// 4. **Heap**: grows upward, the current top is `np`
/// 5. **Stack**: grows downward from the end of the store, the current top is `sp`
///
/// Every byte carries a defined bit. Reads of undefined bytes fail when
/// definedness checking is enabled.
pub struct Memory {
    bytes: Vec<u8>,
    defined: Vec<u64>,
    check_defined: bool,
}

impl Memory {
    #[must_use]
    pub fn new(check_defined: bool) -> Self {
        let capacity = STORE_CAPACITY as usize;
        Self {
            bytes: vec![0; capacity],
            defined: vec![0; capacity.div_ceil(64)],
            check_defined,
        }
    }

    #[must_use]
    pub const fn size(&self) -> Address {
        STORE_CAPACITY
    }

    #[inline]
    fn index(&self, addr: Address, len: Address) -> VmResult<usize> {
        if addr < 0 || len < 0 || addr + len > STORE_CAPACITY {
            return Err(FatalCode::SystemError.into());
        }
        Ok(addr as usize)
    }

    #[inline]
    fn mark(&mut self, index: usize, defined: bool) {
        let (word, bit) = (index / 64, index % 64);
        if defined {
            self.defined[word] |= 1 << bit;
        } else {
            self.defined[word] &= !(1 << bit);
        }
    }

    #[inline]
    fn defined_bit(&self, index: usize) -> bool {
        self.defined[index / 64] & (1 << (index % 64)) != 0
    }

    /// Reports the defined bit. Always true when checking is disabled.
    #[must_use]
    pub fn is_defined(&self, addr: Address) -> bool {
        if !self.check_defined {
            return true;
        }
        self.index(addr, 1).is_ok_and(|index| self.defined_bit(index))
    }

    fn check_defined(&self, addr: Address, len: Address) -> VmResult<usize> {
        let index = self.index(addr, len)?;
        if self.check_defined && (index..index + len as usize).any(|i| !self.defined_bit(i)) {
            return Err(FatalCode::UndefinedLocationAccess.into());
        }
        Ok(index)
    }

    fn read<const N: usize>(&self, addr: Address) -> VmResult<[u8; N]> {
        let index = self.check_defined(addr, N as Address)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[index..index + N]);
        Ok(buf)
    }

    fn write(&mut self, addr: Address, data: &[u8]) -> VmResult {
        let index = self.index(addr, data.len() as Address)?;
        self.bytes[index..index + data.len()].copy_from_slice(data);
        for i in index..index + data.len() {
            self.mark(i, true);
        }
        Ok(())
    }

    /// Reads a byte without looking at its defined bit.
    pub fn raw_byte(&self, addr: Address) -> VmResult<u8> {
        let index = self.index(addr, 1)?;
        Ok(self.bytes[index])
    }

    pub fn get_byte(&self, addr: Address) -> VmResult<u8> {
        Ok(self.read::<1>(addr)?[0])
    }

    pub fn put_byte(&mut self, addr: Address, value: u8) -> VmResult {
        self.write(addr, &[value])
    }

    pub fn get_int(&self, addr: Address) -> VmResult<i32> {
        Ok(i32::from_le_bytes(self.read::<{ INT_SIZE as usize }>(addr)?))
    }

    pub fn put_int(&mut self, addr: Address, value: i32) -> VmResult {
        self.write(addr, &value.to_le_bytes())
    }

    /// Addresses are stored as four bytes and read back sign extended.
    pub fn get_adr(&self, addr: Address) -> VmResult<Address> {
        Ok(Address::from(i32::from_le_bytes(
            self.read::<{ ADR_SIZE as usize }>(addr)?,
        )))
    }

    pub fn put_adr(&mut self, addr: Address, value: Address) -> VmResult {
        self.write(addr, &(value as i32).to_le_bytes())
    }

    pub fn get_real(&self, addr: Address) -> VmResult<f64> {
        Ok(f64::from_le_bytes(self.read::<{ REAL_SIZE as usize }>(addr)?))
    }

    pub fn put_real(&mut self, addr: Address, value: f64) -> VmResult {
        self.write(addr, &value.to_le_bytes())
    }

    /// Sets are only checked for definedness on their first byte.
    pub fn get_set(&self, addr: Address) -> VmResult<SetValue> {
        self.check_defined(addr, 1)?;
        let index = self.index(addr, SET_SIZE)?;
        let mut bits = [0u8; SET_SIZE as usize];
        bits.copy_from_slice(&self.bytes[index..index + SET_SIZE as usize]);
        Ok(SetValue(bits))
    }

    pub fn put_set(&mut self, addr: Address, value: &SetValue) -> VmResult {
        self.write(addr, &value.0)
    }

    /// Copies raw bytes into the store and marks them defined.
    pub fn load(&mut self, addr: Address, data: &[u8]) -> VmResult {
        self.write(addr, data)
    }

    /// Reads `len` bytes, checking each one for definedness.
    pub fn get_bytes(&self, addr: Address, len: Address) -> VmResult<&[u8]> {
        let index = self.check_defined(addr, len)?;
        Ok(&self.bytes[index..index + len as usize])
    }

    /// Zeroes a range and marks it defined.
    pub fn clear(&mut self, addr: Address, len: Address) -> VmResult {
        let index = self.index(addr, len)?;
        for i in index..index + len as usize {
            self.bytes[i] = 0;
            self.mark(i, true);
        }
        Ok(())
    }

    /// Marks a range undefined. The contents are left in place.
    pub fn undefine(&mut self, addr: Address, len: Address) -> VmResult {
        let index = self.index(addr, len)?;
        for i in index..index + len as usize {
            self.mark(i, false);
        }
        Ok(())
    }

    /// Copies `len` bytes with their defined bits. The ranges may overlap.
    pub fn copy(&mut self, dst: Address, src: Address, len: Address) -> VmResult {
        let from = self.index(src, len)?;
        let to = self.index(dst, len)?;
        let len = len as usize;
        self.bytes.copy_within(from..from + len, to);
        let bits: Vec<bool> = (from..from + len).map(|i| self.defined_bit(i)).collect();
        for (offset, defined) in bits.into_iter().enumerate() {
            self.mark(to + offset, defined);
        }
        Ok(())
    }

    /// Formats a range as hex lines of 16 bytes. Undefined bytes are shown as `__`.
    pub fn dump(&self, start: Address, len: Address) -> VmResult<String> {
        let index = self.index(start, len)?;
        let mut out = String::new();
        for (row, chunk) in self.bytes[index..index + len as usize].chunks(16).enumerate() {
            let row_start = index + row * 16;
            let _ = write!(out, "{row_start:08X}:");
            for (offset, byte) in chunk.iter().enumerate() {
                if !self.check_defined || self.defined_bit(row_start + offset) {
                    let _ = write!(out, " {byte:02X}");
                } else {
                    out.push_str(" __");
                }
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fault;

    #[test]
    fn fresh_store_is_undefined() {
        let memory = Memory::new(true);
        assert!(!memory.is_defined(100));
        assert_eq!(
            memory.get_int(100),
            Err(Fault::Fatal(FatalCode::UndefinedLocationAccess))
        );
    }

    #[test]
    fn unchecked_store_reads_zero() {
        let memory = Memory::new(false);
        assert!(memory.is_defined(100));
        assert_eq!(memory.get_int(100), Ok(0));
    }

    #[test]
    fn addresses_are_sign_extended() {
        let mut memory = Memory::new(true);
        memory.put_adr(40, -20).unwrap();
        assert_eq!(memory.get_adr(40), Ok(-20));
        assert_eq!(memory.get_int(40), Ok(-20));
    }

    #[test]
    fn copy_carries_defined_bits() {
        let mut memory = Memory::new(true);
        memory.put_byte(10, 7).unwrap();
        memory.copy(20, 9, 3).unwrap();
        assert!(!memory.is_defined(20));
        assert_eq!(memory.get_byte(21), Ok(7));
        assert!(!memory.is_defined(22));
    }

    #[test]
    fn out_of_store_is_a_system_error() {
        let memory = Memory::new(true);
        assert_eq!(
            memory.raw_byte(STORE_CAPACITY),
            Err(Fault::Fatal(FatalCode::SystemError))
        );
        assert_eq!(memory.raw_byte(-1), Err(Fault::Fatal(FatalCode::SystemError)));
    }

    #[test]
    fn undefine_keeps_contents() {
        let mut memory = Memory::new(true);
        memory.put_int(0, 0x0102_0304).unwrap();
        memory.undefine(1, 1).unwrap();
        assert_eq!(memory.raw_byte(1), Ok(0x03));
        assert!(memory.get_int(0).is_err());
        assert_eq!(memory.get_byte(0), Ok(0x04));
    }
}
