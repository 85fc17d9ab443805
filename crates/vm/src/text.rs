/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::files::FileMode;
use crate::{Vm, VmResult};
use p6_vm_types::exception::ExceptionCode;
use p6_vm_types::standard_files::{COMMAND, ERROR, LIST, OUTPUT, PRR};
use p6_vm_types::{Address, INT_MAX};

/// Text file access by file number, with the command line routed in.
///
/// `width` is what is left of the field of a fielded read. Unfielded reads
/// pass `INT_MAX`. A spent field reads as blanks.
impl Vm {
    pub(crate) fn text_buffer(&mut self, file: u8) -> VmResult<u8> {
        if file == COMMAND {
            return Ok(self.command.buffer());
        }
        self.files.text_buffer(file)
    }

    pub(crate) fn text_get(&mut self, file: u8) -> VmResult {
        if file == COMMAND {
            self.command.advance();
            return Ok(());
        }
        self.files.text_advance(file)
    }

    pub(crate) fn text_eof(&mut self, file: u8) -> VmResult<bool> {
        match file {
            OUTPUT | PRR | ERROR | LIST => Ok(true),
            COMMAND => Ok(self.command.is_eof()),
            _ => self.files.text_eof(file),
        }
    }

    pub(crate) fn text_eoln(&mut self, file: u8) -> VmResult<bool> {
        match file {
            OUTPUT | PRR | ERROR | LIST => Err(ExceptionCode::FileModeIncorrect.into()),
            COMMAND => Ok(self.command.is_eoln()),
            _ => self.files.text_eoln(file),
        }
    }

    pub(crate) fn read_line(&mut self, file: u8) -> VmResult {
        match file {
            OUTPUT | PRR | ERROR | LIST => return Err(ExceptionCode::ReadOnWriteOnlyFile.into()),
            COMMAND => {
                self.command.read_line();
                return Ok(());
            }
            _ => self.files.require_mode(file, FileMode::Read)?,
        }
        while !self.text_eoln(file)? {
            if self.text_eof(file)? {
                return Err(ExceptionCode::EndOfFile.into());
            }
            self.text_get(file)?;
        }
        self.text_get(file)
    }

    fn field_buffer(&mut self, file: u8, width: i64) -> VmResult<u8> {
        if width > 0 {
            self.text_buffer(file)
        } else {
            Ok(b' ')
        }
    }

    fn field_end(&mut self, file: u8, width: i64) -> VmResult<bool> {
        Ok(width == 0 || self.text_eof(file)?)
    }

    fn field_get(&mut self, file: u8, width: &mut i64) -> VmResult {
        if *width > 0 {
            if self.text_eof(file)? {
                return Err(ExceptionCode::EndOfFile.into());
            }
            self.text_get(file)?;
            *width -= 1;
        }
        Ok(())
    }

    fn field_digit(&mut self, file: u8, width: i64) -> VmResult<Option<u8>> {
        let byte = self.field_buffer(file, width)?;
        Ok(byte.is_ascii_digit().then(|| byte - b'0'))
    }

    /// The rest of a fielded read must be blank.
    fn finish_field(&mut self, file: u8, width: &mut i64, fielded: bool) -> VmResult {
        if fielded {
            while !self.field_end(file, *width)? {
                if self.field_buffer(file, *width)? != b' ' {
                    return Err(ExceptionCode::FieldNotBlank.into());
                }
                self.field_get(file, width)?;
            }
        }
        Ok(())
    }

    fn skip_blanks(&mut self, file: u8, width: &mut i64) -> VmResult {
        while self.field_buffer(file, *width)? == b' ' && !self.field_end(file, *width)? {
            self.field_get(file, width)?;
        }
        Ok(())
    }

    pub(crate) fn read_integer(&mut self, file: u8, width: &mut i64, fielded: bool) -> VmResult<i32> {
        self.skip_blanks(file, width)?;
        let negative = match self.field_buffer(file, *width)? {
            b'+' => {
                self.field_get(file, width)?;
                false
            }
            b'-' => {
                self.field_get(file, width)?;
                true
            }
            _ => false,
        };
        if self.field_digit(file, *width)?.is_none() {
            return Err(ExceptionCode::InvalidIntegerFormat.into());
        }
        let mut value: i64 = 0;
        while let Some(digit) = self.field_digit(file, *width)? {
            let digit = i64::from(digit);
            if value > INT_MAX / 10 || (value == INT_MAX / 10 && digit > INT_MAX % 10) {
                return Err(ExceptionCode::IntegerValueOverflow.into());
            }
            value = value * 10 + digit;
            self.field_get(file, width)?;
        }
        self.finish_field(file, width, fielded)?;
        let value = if negative { -value } else { value };
        Ok(value as i32)
    }

    fn read_digits(&mut self, file: u8, width: &mut i64, value: &mut f64) -> VmResult<i64> {
        let mut count = 0;
        while let Some(digit) = self.field_digit(file, *width)? {
            *value = *value * 10.0 + f64::from(digit);
            self.field_get(file, width)?;
            count += 1;
        }
        Ok(count)
    }

    pub(crate) fn read_real(&mut self, file: u8, mut width: i64, fielded: bool) -> VmResult<f64> {
        let width = &mut width;
        self.skip_blanks(file, width)?;
        let negative = match self.field_buffer(file, *width)? {
            b'-' => {
                self.field_get(file, width)?;
                true
            }
            b'+' => {
                self.field_get(file, width)?;
                false
            }
            _ => false,
        };
        let mut value = 0.0;
        if self.read_digits(file, width, &mut value)? == 0 {
            return Err(ExceptionCode::InvalidRealNumber.into());
        }
        let mut exponent: i64 = 0;
        if self.field_buffer(file, *width)? == b'.' {
            self.field_get(file, width)?;
            let decimals = self.read_digits(file, width, &mut value)?;
            if decimals == 0 {
                return Err(ExceptionCode::InvalidRealNumber.into());
            }
            exponent -= decimals;
        }
        if self.field_buffer(file, *width)?.eq_ignore_ascii_case(&b'e') {
            self.field_get(file, width)?;
            let next = self.field_buffer(file, *width)?;
            if !(next.is_ascii_digit() || next == b'+' || next == b'-') {
                return Err(ExceptionCode::InvalidRealNumber.into());
            }
            exponent += i64::from(self.read_integer(file, width, fielded)?);
        }
        if exponent < 0 {
            value /= power_of_ten(exponent);
        } else {
            value *= power_of_ten(exponent);
        }
        self.finish_field(file, width, fielded)?;
        Ok(if negative { -value } else { value })
    }

    pub(crate) fn read_char(&mut self, file: u8, mut width: i64, fielded: bool) -> VmResult<u8> {
        let value = self.field_buffer(file, width)?;
        self.field_get(file, &mut width)?;
        self.finish_field(file, &mut width, fielded)?;
        Ok(value)
    }

    pub(crate) fn read_string(
        &mut self,
        file: u8,
        addr: Address,
        len: Address,
        mut width: i64,
        fielded: bool,
    ) -> VmResult {
        for offset in 0..len {
            let value = self.field_buffer(file, width)?;
            self.field_get(file, &mut width)?;
            self.memory.put_byte(addr + offset, value)?;
        }
        self.finish_field(file, &mut width, fielded)
    }

    /// Reads up to the end of the line and pads the rest with blanks.
    pub(crate) fn read_padded_string(&mut self, file: u8, addr: Address, len: Address) -> VmResult {
        let mut offset = 0;
        while offset < len && !self.text_eoln(file)? {
            if self.text_eof(file)? {
                return Err(ExceptionCode::EndOfFile.into());
            }
            let value = self.text_buffer(file)?;
            self.text_get(file)?;
            self.memory.put_byte(addr + offset, value)?;
            offset += 1;
        }
        for offset in offset..len {
            self.memory.put_byte(addr + offset, b' ')?;
        }
        Ok(())
    }

    pub(crate) fn write_text(&mut self, file: u8, bytes: &[u8]) -> VmResult {
        self.files.write_bytes(file, bytes)
    }
}

/// Ten to the magnitude of `exponent`, by repeated squaring.
fn power_of_ten(exponent: i64) -> f64 {
    let mut remaining = exponent.unsigned_abs();
    let mut power = 10.0_f64;
    let mut result = 1.0;
    while remaining != 0 {
        if remaining & 1 == 1 {
            result *= power;
        }
        remaining >>= 1;
        power *= power;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::power_of_ten;

    #[test]
    fn powers() {
        assert_eq!(power_of_ten(0), 1.0);
        assert_eq!(power_of_ten(3), 1000.0);
        assert_eq!(power_of_ten(-2), 100.0);
    }
}
