/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::files::FileMode;
use crate::format;
use crate::{Fault, Vm, VmResult};
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::standard::StandardProc;
use p6_vm_types::standard_files::{self, COMMAND, ERROR, INPUT, LIST, OUTPUT, PRD, PRR};
use p6_vm_types::{
    Address, FILE_ID_SIZE, FILE_NAME_LEN, INT_MAX, MAX_ASSERT_TEXT, REAL_EXP_FIELD,
};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

impl Vm {
    /// Returns the file number of the file variable at `fa`, binding a new
    /// one on first use. Header files get their fixed numbers.
    fn file_number(&mut self, fa: Address) -> VmResult<u8> {
        let current = self.memory.raw_byte(fa)?;
        if current != 0 {
            return Ok(current);
        }
        let header = (INPUT..=COMMAND).find(|&file| self.pctop + standard_files::offset_of(file) == fa);
        let file = match header {
            Some(file) => file,
            None => self.files.bind()?,
        };
        self.memory.put_byte(fa, file)?;
        Ok(file)
    }

    /// Pops the file address and leaves it on the stack.
    fn kept_file(&mut self) -> VmResult<(Address, u8)> {
        let fa = self.pop_adr()?;
        self.push_adr(fa)?;
        Ok((fa, self.file_number(fa)?))
    }

    fn taken_file(&mut self) -> VmResult<(Address, u8)> {
        let fa = self.pop_adr()?;
        Ok((fa, self.file_number(fa)?))
    }

    fn pop_width(&mut self) -> VmResult<i64> {
        Ok(i64::from(self.pop_int()?))
    }

    fn check_field(&self, width: i64) -> VmResult {
        if width < 1 && self.checks.iso7185 {
            return Err(ExceptionCode::InvalidFieldSpecification.into());
        }
        Ok(())
    }

    /// The same checks a text write performs, for writes that must fail
    /// before anything else is looked at.
    fn check_writable(&self, file: u8) -> VmResult {
        match file {
            INPUT | PRD | COMMAND => Err(ExceptionCode::WriteOnReadOnlyFile.into()),
            OUTPUT | PRR | ERROR | LIST => Ok(()),
            _ => self.files.require_mode(file, FileMode::Write),
        }
    }

    /// A string operand as a file name, without trailing blanks.
    fn name_at(&self, addr: Address, len: i32) -> VmResult<String> {
        let len = usize::try_from(len).unwrap_or(0);
        if len >= FILE_NAME_LEN {
            return Err(ExceptionCode::FilenameTooLong.into());
        }
        let bytes = self.memory.get_bytes(addr, len as Address)?;
        let trimmed = format::trim_trailing_blanks(bytes);
        if trimmed.is_empty() {
            return Err(ExceptionCode::FilenameEmpty.into());
        }
        Ok(String::from_utf8_lossy(trimmed).into_owned())
    }

    fn buffer_overlaps_var_ref(&self, fa: Address, len: Address) -> VmResult {
        let buffer = fa + FILE_ID_SIZE;
        if self.var_refs.overlaps(buffer, buffer + len - 1) {
            return Err(FatalCode::VarReferencedFileBufferModified.into());
        }
        Ok(())
    }

    pub(crate) fn execute_csp(&mut self, q: u8) -> VmResult {
        let Ok(procedure) = StandardProc::try_from(q) else {
            return Err(FatalCode::InvalidStandardProcedureOrFunction.into());
        };
        trace!(%procedure, "csp");
        match procedure {
            StandardProc::Get => self.sp_get(),
            StandardProc::Put => self.sp_put(),
            StandardProc::Thw => {
                let value = self.pop_adr()?;
                Err(Fault::Thrown(value))
            }
            StandardProc::Rln => {
                let (_, file) = self.kept_file()?;
                self.read_line(file)
            }
            StandardProc::New => self.sp_new(),
            StandardProc::Nwl => self.sp_new_tagged(),
            StandardProc::Dsp => self.sp_dispose(),
            StandardProc::Dsl => self.sp_dispose_tagged(),
            StandardProc::Wln => {
                let (_, file) = self.kept_file()?;
                self.write_text(file, b"\n")
            }
            StandardProc::Pag => {
                let (_, file) = self.taken_file()?;
                self.write_text(file, b"\x0c")
            }
            StandardProc::Wrs => self.sp_write_string(),
            StandardProc::Wrsp => self.sp_write_trimmed(),
            StandardProc::Eln => {
                let (_, file) = self.taken_file()?;
                let eoln = self.text_eoln(file)?;
                self.push_bool(eoln)
            }
            StandardProc::Eof => {
                let (_, file) = self.taken_file()?;
                let eof = self.text_eof(file)?;
                self.push_bool(eof)
            }
            StandardProc::Wri => self.sp_write_integer(10, false),
            StandardProc::Wrih => self.sp_write_integer(16, false),
            StandardProc::Wrio => self.sp_write_integer(8, false),
            StandardProc::Wrib => self.sp_write_integer(2, false),
            StandardProc::Wiz => self.sp_write_integer(10, true),
            StandardProc::Wizh => self.sp_write_integer(16, true),
            StandardProc::Wizo => self.sp_write_integer(8, true),
            StandardProc::Wizb => self.sp_write_integer(2, true),
            StandardProc::Wrr => self.sp_write_real_exponent(),
            StandardProc::Wrf => self.sp_write_real_fixed(),
            StandardProc::Wrc => {
                let width = self.pop_width()?;
                let value = self.pop_int()?;
                let (_, file) = self.kept_file()?;
                self.check_field(width)?;
                self.write_text(file, &format::character(value as u8, width))
            }
            StandardProc::Wrb => {
                let width = self.pop_width()?;
                let value = self.pop_int()?;
                let (_, file) = self.kept_file()?;
                if width < 1 {
                    return Err(ExceptionCode::InvalidFieldSpecification.into());
                }
                self.write_text(file, &format::boolean(value != 0, width))
            }
            StandardProc::Rdi => self.sp_read_integer(false, false),
            StandardProc::Rdif => self.sp_read_integer(true, false),
            StandardProc::Rib => self.sp_read_integer(false, true),
            StandardProc::Ribf => self.sp_read_integer(true, true),
            StandardProc::Rdr => self.sp_read_real(false),
            StandardProc::Rdrf => self.sp_read_real(true),
            StandardProc::Rdc => self.sp_read_char(false, false),
            StandardProc::Rdcf => self.sp_read_char(true, false),
            StandardProc::Rcb => self.sp_read_char(false, true),
            StandardProc::Rcbf => self.sp_read_char(true, true),
            StandardProc::Rds => self.sp_read_string(false),
            StandardProc::Rdsf => self.sp_read_string(true),
            StandardProc::Rdsp => {
                let len = Address::from(self.pop_int()?);
                let dest = self.pop_adr()?;
                let (_, file) = self.kept_file()?;
                self.read_padded_string(file, dest, len)
            }
            StandardProc::Sin => self.sp_math(f64::sin),
            StandardProc::Cos => self.sp_math(f64::cos),
            StandardProc::Exp => self.sp_math(f64::exp),
            StandardProc::Atn => self.sp_math(f64::atan),
            StandardProc::Log => {
                let value = self.pop_real()?;
                if value <= 0.0 {
                    return Err(ExceptionCode::InvalidArgumentToLn.into());
                }
                self.push_real(value.ln())
            }
            StandardProc::Sqt => {
                let value = self.pop_real()?;
                if value < 0.0 {
                    return Err(ExceptionCode::InvalidArgumentToSqrt.into());
                }
                self.push_real(value.sqrt())
            }
            StandardProc::Sav => Err(FatalCode::InvalidStandardProcedureOrFunction.into()),
            StandardProc::Rsf | StandardProc::Rsb => {
                let (_, file) = self.taken_file()?;
                self.sp_reset(file)
            }
            StandardProc::Rwf | StandardProc::Rwb => {
                let (_, file) = self.taken_file()?;
                self.sp_rewrite(file)
            }
            StandardProc::Wbf => {
                let len = Address::from(self.pop_int()?);
                let src = self.pop_adr()?;
                let (_, file) = self.kept_file()?;
                self.files.require_mode(file, FileMode::Write)?;
                let bytes = self.memory.get_bytes(src, len)?.to_vec();
                self.files.write_bytes(file, &bytes)
            }
            StandardProc::Wbi => {
                let value = self.pop_int()?;
                let (_, file) = self.kept_file()?;
                self.files.require_mode(file, FileMode::Write)?;
                self.files.write_bytes(file, &value.to_le_bytes())
            }
            StandardProc::Wbr => {
                let value = self.pop_real()?;
                let (_, file) = self.kept_file()?;
                self.files.require_mode(file, FileMode::Write)?;
                self.files.write_bytes(file, &value.to_le_bytes())
            }
            StandardProc::Wbc | StandardProc::Wbb | StandardProc::Wbx => {
                let value = self.pop_int()?;
                let (_, file) = self.kept_file()?;
                self.files.require_mode(file, FileMode::Write)?;
                self.files.write_bytes(file, &[value as u8])
            }
            StandardProc::Rbf => self.sp_read_binary(),
            StandardProc::Gbf => self.sp_get_binary(),
            StandardProc::Pbf => self.sp_put_binary(),
            StandardProc::Efb => {
                let (_, file) = self.taken_file()?;
                self.files.require_mode(file, FileMode::Read)?;
                let at_end = self.files.at_end(file)? && !self.files.buffer_full(file)?;
                self.push_bool(at_end)
            }
            StandardProc::Fbv => {
                let (fa, file) = self.kept_file()?;
                if self.files.mode(file)? == FileMode::Read {
                    let value = self.text_buffer(file)?;
                    self.memory.put_byte(fa + FILE_ID_SIZE, value)?;
                }
                self.files.set_buffer_full(file, true)
            }
            StandardProc::Fvb => {
                let len = self.pop_int()?;
                let (fa, file) = self.kept_file()?;
                if self.files.mode(file)? == FileMode::Read && !self.files.buffer_full(file)? {
                    let bytes = self
                        .files
                        .read_bytes(file, usize::try_from(len).unwrap_or(0))?;
                    self.memory.load(fa + FILE_ID_SIZE, &bytes)?;
                }
                self.files.set_buffer_full(file, true)
            }
            StandardProc::Asst | StandardProc::Assb => {
                let len = self.pop_int()?;
                let name_addr = self.pop_adr()?;
                let (_, file) = self.taken_file()?;
                let name = self.name_at(name_addr, len)?;
                self.files.assign(file, &name)
            }
            StandardProc::Clst | StandardProc::Clsb => {
                let (_, file) = self.taken_file()?;
                self.files.close(file)
            }
            StandardProc::Pos => {
                let position = self.pop_int()?;
                let (_, file) = self.taken_file()?;
                if position < 1 {
                    return Err(ExceptionCode::InvalidFilePosition.into());
                }
                self.files.seek(file, u64::from(position.unsigned_abs()) - 1)
            }
            StandardProc::Upd => {
                let (_, file) = self.taken_file()?;
                self.files.update(file)
            }
            StandardProc::Appt | StandardProc::Appb => {
                let (_, file) = self.taken_file()?;
                self.files.append(file)
            }
            StandardProc::Del => {
                let len = self.pop_int()?;
                let name_addr = self.pop_adr()?;
                let name = self.name_at(name_addr, len)?;
                debug!(name, "delete");
                fs::remove_file(&name).map_err(|_| ExceptionCode::FileDeleteFail.into())
            }
            StandardProc::Chg => {
                let len = self.pop_int()?;
                let from_addr = self.pop_adr()?;
                let to_len = self.pop_int()?;
                let to_addr = self.pop_adr()?;
                let from = self.name_at(from_addr, len)?;
                let to = self.name_at(to_addr, to_len)?;
                debug!(from, to, "rename");
                fs::rename(&from, &to).map_err(|_| ExceptionCode::FileNameChangeFail.into())
            }
            StandardProc::Len => {
                let (_, file) = self.taken_file()?;
                let len = self.files.length(file)?;
                let len = i32::try_from(len).map_err(|_| ExceptionCode::FileSizeTooLarge)?;
                self.push_int(len)
            }
            StandardProc::Loc => {
                let (_, file) = self.taken_file()?;
                let position = self.files.position(file)? + 1;
                let position =
                    i32::try_from(position).map_err(|_| ExceptionCode::FileSizeTooLarge)?;
                self.push_int(position)
            }
            StandardProc::Exs => {
                let len = self.pop_int()?;
                let name_addr = self.pop_adr()?;
                let name = self.name_at(name_addr, len)?;
                self.push_bool(Path::new(&name).exists())
            }
            StandardProc::Hlt => Err(Fault::Halt),
            StandardProc::Ast => {
                if self.pop_int()? == 0 {
                    return Err(FatalCode::ProgramCodeAssertion.into());
                }
                Ok(())
            }
            StandardProc::Asts => {
                let len = self.pop_int()?;
                let text_addr = self.pop_adr()?;
                let condition = self.pop_int()?;
                if condition != 0 {
                    return Ok(());
                }
                let len = usize::try_from(len).unwrap_or(0).min(MAX_ASSERT_TEXT);
                let text = self.memory.get_bytes(text_addr, len as Address)?;
                Err(Fault::Assertion(String::from_utf8_lossy(text).into_owned()))
            }
            StandardProc::Aeft | StandardProc::Aefb => {
                let _len = self.pop_int()?;
                let _header_name = self.pop_adr()?;
                let (_, file) = self.taken_file()?;
                let name = self.command.read_word();
                if name.len() >= FILE_NAME_LEN {
                    return Err(ExceptionCode::FilenameTooLong.into());
                }
                if name.is_empty() {
                    return Err(ExceptionCode::FilenameEmpty.into());
                }
                self.files.assign(file, &name)
            }
            StandardProc::Rdie => {
                let _len = self.pop_int()?;
                let _header_name = self.pop_adr()?;
                let dest = self.pop_adr()?;
                let mut width = INT_MAX;
                let value = self.read_integer(COMMAND, &mut width, false)?;
                self.memory.put_int(dest, value)
            }
            StandardProc::Rdre => {
                let _len = self.pop_int()?;
                let _header_name = self.pop_adr()?;
                let dest = self.pop_adr()?;
                let value = self.read_real(COMMAND, INT_MAX, false)?;
                self.memory.put_real(dest, value)
            }
        }
    }

    fn sp_get(&mut self) -> VmResult {
        let (fa, file) = self.taken_file()?;
        self.buffer_overlaps_var_ref(fa, 1)?;
        self.text_get(file)
    }

    fn sp_put(&mut self) -> VmResult {
        let (fa, file) = self.taken_file()?;
        self.check_writable(file)?;
        if !self.files.buffer_full(file)? {
            return Err(ExceptionCode::FileBufferVariableUndefined.into());
        }
        let value = self.memory.get_byte(fa + FILE_ID_SIZE)?;
        self.write_text(file, &[value])?;
        self.files.set_buffer_full(file, false)
    }

    fn sp_write_string(&mut self) -> VmResult {
        let len = Address::from(self.pop_int()?);
        let width = self.pop_width()?;
        let src = self.pop_adr()?;
        let (_, file) = self.kept_file()?;
        self.check_field(width)?;
        let len = if width >= 0 { len.min(width) } else { len };
        let bytes = self.memory.get_bytes(src, len)?.to_vec();
        self.write_text(file, &format::text(&bytes, width))
    }

    fn sp_write_trimmed(&mut self) -> VmResult {
        let len = Address::from(self.pop_int()?);
        let src = self.pop_adr()?;
        let (_, file) = self.kept_file()?;
        let bytes = format::trim_trailing_blanks(self.memory.get_bytes(src, len)?).to_vec();
        self.write_text(file, &bytes)
    }

    fn sp_write_integer(&mut self, radix: u32, zero_fill: bool) -> VmResult {
        let width = self.pop_width()?;
        let value = self.pop_int()?;
        let (_, file) = self.kept_file()?;
        self.check_field(width)?;
        self.check_writable(file)?;
        let text = format::integer(i64::from(value), width, radix, zero_fill)?;
        self.write_text(file, &text)
    }

    fn sp_write_real_exponent(&mut self) -> VmResult {
        let width = self.pop_width()?;
        let value = self.pop_real()?;
        let (_, file) = self.kept_file()?;
        if width < 1 {
            return Err(ExceptionCode::InvalidFieldSpecification.into());
        }
        let width = width.max(i64::from(REAL_EXP_FIELD));
        let precision = usize::try_from(width - i64::from(REAL_EXP_FIELD) + 1).unwrap_or(1);
        self.write_text(file, &format::real_exponent(value, width, precision))
    }

    fn sp_write_real_fixed(&mut self) -> VmResult {
        let fraction = self.pop_width()?;
        let width = self.pop_width()?;
        let value = self.pop_real()?;
        let (_, file) = self.kept_file()?;
        self.check_field(width)?;
        if fraction < 1 {
            return Err(ExceptionCode::InvalidFractionSpecification.into());
        }
        let fraction = usize::try_from(fraction).unwrap_or(1);
        self.write_text(file, &format::real_fixed(value, width, fraction))
    }

    /// Pops the `(min, max)` pair of a bounded read.
    fn pop_bounds(&mut self, bounded: bool) -> VmResult<Option<(i32, i32)>> {
        if !bounded {
            return Ok(None);
        }
        let max = self.pop_int()?;
        let min = self.pop_int()?;
        Ok(Some((min, max)))
    }

    fn pop_field(&mut self, fielded: bool) -> VmResult<i64> {
        if fielded {
            self.pop_width()
        } else {
            Ok(INT_MAX)
        }
    }

    fn check_bounds(value: i32, bounds: Option<(i32, i32)>) -> VmResult {
        if let Some((min, max)) = bounds {
            if value < min || value > max {
                return Err(ExceptionCode::ValueOutOfRange.into());
            }
        }
        Ok(())
    }

    fn sp_read_integer(&mut self, fielded: bool, bounded: bool) -> VmResult {
        let bounds = self.pop_bounds(bounded)?;
        let mut width = self.pop_field(fielded)?;
        let dest = self.pop_adr()?;
        let (_, file) = self.kept_file()?;
        let value = self.read_integer(file, &mut width, fielded)?;
        Self::check_bounds(value, bounds)?;
        self.memory.put_int(dest, value)
    }

    fn sp_read_real(&mut self, fielded: bool) -> VmResult {
        let width = self.pop_field(fielded)?;
        let dest = self.pop_adr()?;
        let (_, file) = self.kept_file()?;
        let value = self.read_real(file, width, fielded)?;
        self.memory.put_real(dest, value)
    }

    fn sp_read_char(&mut self, fielded: bool, bounded: bool) -> VmResult {
        let bounds = self.pop_bounds(bounded)?;
        let width = self.pop_field(fielded)?;
        let dest = self.pop_adr()?;
        let (_, file) = self.kept_file()?;
        let value = self.read_char(file, width, fielded)?;
        Self::check_bounds(i32::from(value), bounds)?;
        self.memory.put_byte(dest, value)
    }

    fn sp_read_string(&mut self, fielded: bool) -> VmResult {
        let len = Address::from(self.pop_int()?);
        let width = self.pop_field(fielded)?;
        let dest = self.pop_adr()?;
        let (_, file) = self.kept_file()?;
        self.read_string(file, dest, len, width, fielded)
    }

    fn sp_math(&mut self, f: fn(f64) -> f64) -> VmResult {
        let value = self.pop_real()?;
        self.push_real(f(value))
    }

    fn sp_reset(&mut self, file: u8) -> VmResult {
        match file {
            PRR => Err(ExceptionCode::CannotResetWriteOnlyFile.into()),
            INPUT | OUTPUT | ERROR | LIST | COMMAND => {
                Err(ExceptionCode::CannotResetOrRewriteStandardFile.into())
            }
            _ => self.files.reset(file),
        }
    }

    fn sp_rewrite(&mut self, file: u8) -> VmResult {
        match file {
            PRD => Err(ExceptionCode::CannotRewriteReadOnlyFile.into()),
            INPUT | OUTPUT | ERROR | LIST | COMMAND => {
                Err(ExceptionCode::CannotResetOrRewriteStandardFile.into())
            }
            _ => self.files.rewrite(file),
        }
    }

    /// Reads one element, taking it from the buffer variable when the
    /// buffer was filled ahead.
    fn sp_read_binary(&mut self) -> VmResult {
        let len = Address::from(self.pop_int()?);
        let dest = self.pop_adr()?;
        let (fa, file) = self.kept_file()?;
        self.files.require_mode(file, FileMode::Read)?;
        if self.files.buffer_full(file)? {
            self.memory.copy(dest, fa + FILE_ID_SIZE, len)?;
            return self.files.set_buffer_full(file, false);
        }
        let wanted = usize::try_from(len).unwrap_or(0);
        let bytes = self.files.read_bytes(file, wanted)?;
        if bytes.len() < wanted {
            return Err(ExceptionCode::EndOfFile.into());
        }
        self.memory.load(dest, &bytes)
    }

    fn sp_get_binary(&mut self) -> VmResult {
        let len = Address::from(self.pop_int()?);
        let (fa, file) = self.taken_file()?;
        self.files.require_mode(file, FileMode::Read)?;
        self.buffer_overlaps_var_ref(fa, len)?;
        if self.files.buffer_full(file)? {
            return self.files.set_buffer_full(file, false);
        }
        let bytes = self
            .files
            .read_bytes(file, usize::try_from(len).unwrap_or(0))?;
        self.memory.load(fa + FILE_ID_SIZE, &bytes)
    }

    fn sp_put_binary(&mut self) -> VmResult {
        let len = Address::from(self.pop_int()?);
        let (fa, file) = self.taken_file()?;
        self.files.require_mode(file, FileMode::Write)?;
        if !self.files.buffer_full(file)? {
            return Err(ExceptionCode::FileBufferVariableUndefined.into());
        }
        let bytes = self.memory.get_bytes(fa + FILE_ID_SIZE, len)?.to_vec();
        self.files.write_bytes(file, &bytes)?;
        self.files.set_buffer_full(file, false)
    }
}
