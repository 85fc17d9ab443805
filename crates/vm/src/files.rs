/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::host::HostStreams;
use crate::{Fault, VmResult};
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::standard_files::{COMMAND, ERROR, INPUT, LIST, OUTPUT, PRD, PRR};
use p6_vm_types::MAX_FILES;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, trace, warn};

/// The first file number handed out to program declared files.
pub const FIRST_NAMED_FILE: u8 = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FileMode {
    Closed,
    Read,
    Write,
}

#[derive(Default)]
enum Channel {
    #[default]
    Closed,
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

#[derive(Default)]
struct FileSlot {
    channel: Channel,
    /// Name given by an assign or taken off the command line.
    name: Option<PathBuf>,
    /// Backing file of a file that was opened without a name.
    temp: Option<TempPath>,
    temp_closed: bool,
    bound: bool,
    eoln_seen: bool,
    at_beginning: bool,
    buffer_full: bool,
}

impl FileSlot {
    fn mode(&self) -> FileMode {
        match self.channel {
            Channel::Closed => FileMode::Closed,
            Channel::Reader(_) => FileMode::Read,
            Channel::Writer(_) => FileMode::Write,
        }
    }

    fn start_reading(&mut self, file: File) {
        self.channel = Channel::Reader(BufReader::new(file));
        self.buffer_full = false;
        self.eoln_seen = false;
        self.at_beginning = true;
    }

    fn start_writing(&mut self, file: File) {
        self.channel = Channel::Writer(BufWriter::new(file));
        self.buffer_full = false;
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Channel::Writer(writer) = &mut self.channel {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Every file a program can refer to, by file number.
///
/// Numbers 1 to 7 are the header files, routed to the host streams, the
/// `prd`/`prr` files and the command line. Higher numbers are bound to
/// program file variables on first use and are backed by named or
/// temporary files on disk.
pub struct FileTable {
    slots: Vec<FileSlot>,
    streams: HostStreams,
    prd_path: PathBuf,
    prr_path: PathBuf,
}

impl FileTable {
    #[must_use]
    pub fn new(streams: HostStreams, prd_path: PathBuf, prr_path: PathBuf) -> Self {
        let mut slots: Vec<FileSlot> = (0..=MAX_FILES).map(|_| FileSlot::default()).collect();
        for slot in &mut slots {
            slot.at_beginning = true;
        }
        Self {
            slots,
            streams,
            prd_path,
            prr_path,
        }
    }

    fn slot(&self, file: u8) -> VmResult<&FileSlot> {
        self.slots
            .get(usize::from(file))
            .ok_or(Fault::Fatal(FatalCode::SystemError))
    }

    fn slot_mut(&mut self, file: u8) -> VmResult<&mut FileSlot> {
        self.slots
            .get_mut(usize::from(file))
            .ok_or(Fault::Fatal(FatalCode::SystemError))
    }

    /// Hands out the lowest file number that is not bound. Closing a file
    /// gives its number back.
    pub fn bind(&mut self) -> VmResult<u8> {
        for file in FIRST_NAMED_FILE..=MAX_FILES as u8 {
            let slot = self.slot_mut(file)?;
            if !slot.bound {
                slot.bound = true;
                slot.temp_closed = false;
                trace!(file, "bound file");
                return Ok(file);
            }
        }
        Err(ExceptionCode::TooManyFiles.into())
    }

    /// Header files have a fixed direction, the rest follow how they were opened.
    pub fn mode(&self, file: u8) -> VmResult<FileMode> {
        Ok(match file {
            INPUT | PRD | COMMAND => FileMode::Read,
            OUTPUT | PRR | ERROR | LIST => FileMode::Write,
            _ => self.slot(file)?.mode(),
        })
    }

    pub fn require_mode(&self, file: u8, mode: FileMode) -> VmResult {
        if self.mode(file)? != mode {
            return Err(ExceptionCode::FileModeIncorrect.into());
        }
        Ok(())
    }

    pub fn buffer_full(&self, file: u8) -> VmResult<bool> {
        Ok(self.slot(file)?.buffer_full)
    }

    pub fn set_buffer_full(&mut self, file: u8, full: bool) -> VmResult {
        self.slot_mut(file)?.buffer_full = full;
        Ok(())
    }

    fn open_prd(&mut self) -> VmResult {
        let file = File::open(&self.prd_path).map_err(|err| {
            warn!(path = %self.prd_path.display(), %err, "could not open prd");
            ExceptionCode::FileOpenFail
        })?;
        debug!(path = %self.prd_path.display(), "opened prd");
        self.slot_mut(PRD)?.start_reading(file);
        Ok(())
    }

    fn open_prr(&mut self) -> VmResult {
        let file = File::create(&self.prr_path).map_err(|err| {
            warn!(path = %self.prr_path.display(), %err, "could not create prr");
            ExceptionCode::FileOpenFail
        })?;
        debug!(path = %self.prr_path.display(), "opened prr");
        self.slot_mut(PRR)?.start_writing(file);
        Ok(())
    }

    fn reader(&mut self, file: u8) -> VmResult<&mut dyn BufRead> {
        match file {
            INPUT => return Ok(self.streams.input.as_mut()),
            OUTPUT | PRR | ERROR | LIST => return Err(ExceptionCode::ReadOnWriteOnlyFile.into()),
            COMMAND => return Err(FatalCode::SystemError.into()),
            _ => {}
        }
        if file == PRD && self.slot(PRD)?.mode() == FileMode::Closed {
            self.open_prd()?;
        }
        match &mut self.slot_mut(file)?.channel {
            Channel::Reader(reader) => Ok(reader),
            _ => Err(ExceptionCode::FileModeIncorrect.into()),
        }
    }

    fn writer(&mut self, file: u8) -> VmResult<&mut dyn Write> {
        match file {
            OUTPUT | LIST => return Ok(self.streams.output.as_mut()),
            ERROR => return Ok(self.streams.error.as_mut()),
            INPUT | PRD | COMMAND => return Err(ExceptionCode::WriteOnReadOnlyFile.into()),
            _ => {}
        }
        if file == PRR && self.slot(PRR)?.mode() == FileMode::Closed {
            self.open_prr()?;
        }
        match &mut self.slot_mut(file)?.channel {
            Channel::Writer(writer) => Ok(writer),
            _ => Err(ExceptionCode::FileModeIncorrect.into()),
        }
    }

    pub fn write_bytes(&mut self, file: u8, bytes: &[u8]) -> VmResult {
        self.writer(file)?
            .write_all(bytes)
            .map_err(|_| ExceptionCode::FileWriteFail.into())
    }

    /// The next unread byte, or `None` at end of data.
    pub fn peek(&mut self, file: u8) -> VmResult<Option<u8>> {
        let reader = self.reader(file)?;
        let buf = reader
            .fill_buf()
            .map_err(|_| ExceptionCode::FileReadFail)?;
        Ok(buf.first().copied())
    }

    pub fn read_byte(&mut self, file: u8) -> VmResult<Option<u8>> {
        let reader = self.reader(file)?;
        let buf = reader
            .fill_buf()
            .map_err(|_| ExceptionCode::FileReadFail)?;
        let byte = buf.first().copied();
        if byte.is_some() {
            reader.consume(1);
        }
        Ok(byte)
    }

    /// Reads up to `len` bytes. The result is short only at end of data.
    pub fn read_bytes(&mut self, file: u8, len: usize) -> VmResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(len);
        while bytes.len() < len {
            match self.read_byte(file)? {
                Some(byte) => bytes.push(byte),
                None => break,
            }
        }
        Ok(bytes)
    }

    pub fn at_end(&mut self, file: u8) -> VmResult<bool> {
        Ok(self.peek(file)?.is_none())
    }

    /// The text buffer variable: a blank at end of line and at end of file.
    pub fn text_buffer(&mut self, file: u8) -> VmResult<u8> {
        Ok(match self.peek(file)? {
            None | Some(b'\n') => b' ',
            Some(byte) => byte,
        })
    }

    /// Moves past the buffer variable. A file whose last line is not
    /// terminated reports one end of line before its end.
    pub fn text_advance(&mut self, file: u8) -> VmResult {
        let byte = self.read_byte(file)?;
        let slot = self.slot_mut(file)?;
        if byte.is_none() && !slot.eoln_seen {
            slot.eoln_seen = true;
        } else {
            slot.eoln_seen = byte == Some(b'\n');
        }
        if byte.is_some() {
            slot.at_beginning = false;
        }
        Ok(())
    }

    pub fn text_eof(&mut self, file: u8) -> VmResult<bool> {
        match self.mode(file)? {
            FileMode::Closed => Err(ExceptionCode::FileNotOpen.into()),
            FileMode::Write => Ok(self.position(file)? >= self.length(file)?),
            FileMode::Read => {
                let at_end = self.at_end(file)?;
                let slot = self.slot(file)?;
                Ok(at_end && (slot.eoln_seen || slot.at_beginning))
            }
        }
    }

    pub fn text_eoln(&mut self, file: u8) -> VmResult<bool> {
        if self.mode(file)? == FileMode::Closed {
            return Err(ExceptionCode::FileNotOpen.into());
        }
        let next = self.peek(file)?;
        let slot = self.slot(file)?;
        Ok((next.is_none() && !slot.eoln_seen && !slot.at_beginning) || next == Some(b'\n'))
    }

    /// The file to open for a program file, creating a temporary one when
    /// the file has never been named.
    fn backing_path(&mut self, file: u8, for_reading: bool) -> VmResult<PathBuf> {
        let slot = self.slot_mut(file)?;
        if let Some(name) = &slot.name {
            return Ok(name.clone());
        }
        if let Some(temp) = &slot.temp {
            return Ok(temp.to_path_buf());
        }
        if for_reading && slot.temp_closed {
            return Err(ExceptionCode::CannotResetClosedTempFile.into());
        }
        let temp = NamedTempFile::new()
            .map_err(|_| ExceptionCode::TooManyTemporaryFiles)?
            .into_temp_path();
        let path = temp.to_path_buf();
        trace!(file, path = %path.display(), "temporary file");
        slot.temp = Some(temp);
        slot.temp_closed = false;
        Ok(path)
    }

    fn close_channel(&mut self, file: u8) -> VmResult {
        let slot = self.slot_mut(file)?;
        slot.flush().map_err(|_| ExceptionCode::FileCloseFail)?;
        slot.channel = Channel::Closed;
        Ok(())
    }

    pub fn reset(&mut self, file: u8) -> VmResult {
        if file == PRD {
            self.close_channel(PRD)?;
            return self.open_prd();
        }
        let path = self.backing_path(file, true)?;
        self.close_channel(file)?;
        let handle = File::open(&path).map_err(|_| ExceptionCode::FileOpenFail)?;
        debug!(file, path = %path.display(), "reset");
        self.slot_mut(file)?.start_reading(handle);
        Ok(())
    }

    pub fn rewrite(&mut self, file: u8) -> VmResult {
        if file == PRR {
            self.close_channel(PRR)?;
            return self.open_prr();
        }
        let path = self.backing_path(file, false)?;
        self.close_channel(file)?;
        let handle = File::create(&path).map_err(|_| ExceptionCode::FileOpenFail)?;
        debug!(file, path = %path.display(), "rewrite");
        self.slot_mut(file)?.start_writing(handle);
        Ok(())
    }

    /// Opens for writing without truncating, either at the start or at the end.
    fn reopen_for_write(&mut self, file: u8, at_end: bool) -> VmResult {
        let path = self.backing_path(file, false)?;
        self.close_channel(file)?;
        let mut handle = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|_| ExceptionCode::FileOpenFail)?;
        if at_end {
            handle
                .seek(SeekFrom::End(0))
                .map_err(|_| ExceptionCode::FilePositionFail)?;
        }
        self.slot_mut(file)?.start_writing(handle);
        Ok(())
    }

    pub fn update(&mut self, file: u8) -> VmResult {
        if self.mode(file)? == FileMode::Read {
            self.seek(file, 0)
        } else {
            self.reopen_for_write(file, false)
        }
    }

    pub fn append(&mut self, file: u8) -> VmResult {
        if self.mode(file)? == FileMode::Write {
            self.seek_raw(file, SeekFrom::End(0)).map(|_| ())
        } else {
            self.reopen_for_write(file, true)
        }
    }

    pub fn assign(&mut self, file: u8, name: &str) -> VmResult {
        trace!(file, name, "assign");
        self.slot_mut(file)?.name = Some(PathBuf::from(name));
        Ok(())
    }

    /// Closes the file and forgets its name. A temporary backing file is
    /// removed.
    pub fn close(&mut self, file: u8) -> VmResult {
        if file < FIRST_NAMED_FILE {
            return self.flush(file);
        }
        self.close_channel(file)?;
        let slot = self.slot_mut(file)?;
        if slot.name.take().is_none() {
            if let Some(temp) = slot.temp.take() {
                temp.close().map_err(|_| ExceptionCode::FileCloseFail)?;
                slot.temp_closed = true;
            }
        }
        slot.bound = false;
        debug!(file, "closed");
        Ok(())
    }

    fn flush(&mut self, file: u8) -> VmResult {
        let result = match file {
            OUTPUT | LIST => self.streams.output.flush(),
            ERROR => self.streams.error.flush(),
            _ => self.slot_mut(file)?.flush(),
        };
        result.map_err(|_| ExceptionCode::FileWriteFail.into())
    }

    fn seek_raw(&mut self, file: u8, to: SeekFrom) -> VmResult<u64> {
        let result = match &mut self.slot_mut(file)?.channel {
            Channel::Reader(reader) => reader.seek(to),
            Channel::Writer(writer) => writer.seek(to),
            Channel::Closed => return Err(ExceptionCode::FileNotOpen.into()),
        };
        result.map_err(|_| ExceptionCode::FilePositionFail.into())
    }

    /// Moves to the zero based byte `position`.
    pub fn seek(&mut self, file: u8, position: u64) -> VmResult {
        self.seek_raw(file, SeekFrom::Start(position))?;
        let slot = self.slot_mut(file)?;
        slot.eoln_seen = false;
        slot.at_beginning = position == 0;
        slot.buffer_full = false;
        Ok(())
    }

    /// Zero based byte position.
    pub fn position(&mut self, file: u8) -> VmResult<u64> {
        self.seek_raw(file, SeekFrom::Current(0))
    }

    pub fn length(&mut self, file: u8) -> VmResult<u64> {
        let metadata = match &mut self.slot_mut(file)?.channel {
            Channel::Reader(reader) => reader.get_ref().metadata(),
            Channel::Writer(writer) => {
                writer.flush().map_err(|_| ExceptionCode::FileWriteFail)?;
                writer.get_ref().metadata()
            }
            Channel::Closed => return Err(ExceptionCode::FileNotOpen.into()),
        };
        metadata
            .map(|metadata| metadata.len())
            .map_err(|_| ExceptionCode::FileSizeFail.into())
    }

    /// Flushes every stream and closes the program files. Temporary files
    /// are removed. Failures are logged, there is nobody left to report to.
    pub fn close_all(&mut self) {
        for file in FIRST_NAMED_FILE..=MAX_FILES as u8 {
            let open = self
                .slot(file)
                .is_ok_and(|slot| slot.mode() != FileMode::Closed || slot.temp.is_some());
            if open {
                if let Err(fault) = self.close(file) {
                    warn!(file, ?fault, "close on exit failed");
                }
            }
        }
        for file in [PRR, OUTPUT, ERROR] {
            if let Err(fault) = self.flush(file) {
                warn!(file, ?fault, "flush on exit failed");
            }
        }
        for slot in &mut self.slots {
            slot.channel = Channel::Closed;
        }
    }

    /// Writes directly to the host output, ignoring failures.
    pub fn write_host_output(&mut self, bytes: &[u8]) {
        let output = &mut self.streams.output;
        if output.write_all(bytes).and_then(|()| output.flush()).is_err() {
            warn!("could not write to host output");
        }
    }

    #[must_use]
    pub fn prd_path(&self) -> &Path {
        &self.prd_path
    }

    #[must_use]
    pub fn prr_path(&self) -> &Path {
        &self.prr_path
    }

    /// The on-disk file behind a program file, if it has one.
    pub fn path_of(&self, file: u8) -> VmResult<Option<PathBuf>> {
        let slot = self.slot(file)?;
        Ok(slot
            .name
            .clone()
            .or_else(|| slot.temp.as_ref().map(|temp| temp.to_path_buf())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn table() -> FileTable {
        let streams = HostStreams::new(
            Box::new(Cursor::new(b"ab".to_vec())),
            Box::new(io::sink()),
            Box::new(io::sink()),
        );
        FileTable::new(streams, PathBuf::from("no-prd"), PathBuf::from("no-prr"))
    }

    #[test]
    fn unterminated_last_line_has_virtual_eoln() {
        let mut files = table();
        assert_eq!(files.text_buffer(INPUT).unwrap(), b'a');
        files.text_advance(INPUT).unwrap();
        files.text_advance(INPUT).unwrap();
        assert!(files.text_eoln(INPUT).unwrap());
        assert!(!files.text_eof(INPUT).unwrap());
        assert_eq!(files.text_buffer(INPUT).unwrap(), b' ');
        files.text_advance(INPUT).unwrap();
        assert!(files.text_eof(INPUT).unwrap());
    }

    #[test]
    fn temp_file_round_trip_then_removed_on_close() {
        let mut files = table();
        let file = files.bind().unwrap();
        files.rewrite(file).unwrap();
        files.write_bytes(file, b"x\n").unwrap();
        let path = files.path_of(file).unwrap().unwrap();
        files.reset(file).unwrap();
        assert_eq!(files.read_byte(file).unwrap(), Some(b'x'));
        files.close(file).unwrap();
        assert!(!path.exists());
        assert_eq!(
            files.reset(file),
            Err(Fault::Exception(ExceptionCode::CannotResetClosedTempFile))
        );
    }

    #[test]
    fn header_file_directions() {
        let mut files = table();
        assert_eq!(
            files.write_bytes(INPUT, b"x"),
            Err(Fault::Exception(ExceptionCode::WriteOnReadOnlyFile))
        );
        assert_eq!(
            files.peek(OUTPUT),
            Err(Fault::Exception(ExceptionCode::ReadOnWriteOnlyFile))
        );
        assert_eq!(
            files.peek(PRD),
            Err(Fault::Exception(ExceptionCode::FileOpenFail))
        );
    }

    #[test]
    fn files_are_numbered_until_exhausted() {
        let mut files = table();
        for expected in FIRST_NAMED_FILE..=MAX_FILES as u8 {
            assert_eq!(files.bind().unwrap(), expected);
        }
        assert_eq!(files.bind(), Err(Fault::Exception(ExceptionCode::TooManyFiles)));
    }

    #[test]
    fn closed_file_numbers_are_reused() {
        let mut files = table();
        let kept = files.bind().unwrap();
        for _ in 0..=MAX_FILES * 2 {
            let file = files.bind().unwrap();
            assert_eq!(file, kept + 1);
            files.rewrite(file).unwrap();
            files.write_bytes(file, b"x").unwrap();
            files.close(file).unwrap();
        }
        let reused = files.bind().unwrap();
        assert_eq!(reused, kept + 1);
        files.rewrite(reused).unwrap();
        files.reset(reused).unwrap();
        assert_eq!(files.read_byte(reused).unwrap(), None);
    }
}
