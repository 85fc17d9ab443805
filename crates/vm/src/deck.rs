/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
//! Code deck loading.
//!
//! A deck is a sequence of text records, one per line:
//!
//! ```text
//! :LLAAAAAAAAAAAAAAAADD..DDCC
//! ```
//!
//! `LL` is the payload length, `AAAA..` the sixteen digit load address,
//! `DD` the payload bytes and `CC` the sum of the payload bytes modulo 256.
//! Every address must continue where the previous record ended. A record
//! with zero length ends the deck.

use crate::Vm;
use p6_vm_types::{Address, STORE_CAPACITY};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckError {
    MissingColon { line: usize },
    InvalidHex { line: usize },
    Truncated { line: usize },
    AddressMismatch { line: usize, expected: Address, found: Address },
    ChecksumMismatch { line: usize, expected: u8, found: u8 },
    OutOfStore { line: usize },
    MissingEndRecord,
}

impl Display for DeckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColon { line } => write!(f, "line {line}: record does not start with ':'"),
            Self::InvalidHex { line } => write!(f, "line {line}: invalid hex digit"),
            Self::Truncated { line } => write!(f, "line {line}: record is too short"),
            Self::AddressMismatch {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {line}: record address {found:016X} does not follow {expected:016X}"
            ),
            Self::ChecksumMismatch {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {line}: checksum {found:02X} does not match payload sum {expected:02X}"
            ),
            Self::OutOfStore { line } => write!(f, "line {line}: record extends past the store"),
            Self::MissingEndRecord => write!(f, "deck has no end record"),
        }
    }
}

impl Error for DeckError {}

struct Record<'a> {
    line: usize,
    digits: &'a [u8],
    pos: usize,
}

impl Record<'_> {
    fn nibble(&self, digit: u8) -> Result<u8, DeckError> {
        match digit {
            b'0'..=b'9' => Ok(digit - b'0'),
            b'a'..=b'f' => Ok(digit - b'a' + 10),
            b'A'..=b'F' => Ok(digit - b'A' + 10),
            _ => Err(DeckError::InvalidHex { line: self.line }),
        }
    }

    fn hex(&mut self, count: usize) -> Result<u64, DeckError> {
        let end = self.pos + count;
        if end > self.digits.len() {
            return Err(DeckError::Truncated { line: self.line });
        }
        let mut value = 0u64;
        for &digit in &self.digits[self.pos..end] {
            value = (value << 4) | u64::from(self.nibble(digit)?);
        }
        self.pos = end;
        Ok(value)
    }

    fn byte(&mut self) -> Result<u8, DeckError> {
        Ok(self.hex(2)? as u8)
    }
}

/// Parses deck text into the code image that starts at address zero.
pub fn parse_deck(text: &str) -> Result<Vec<u8>, DeckError> {
    let mut image = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim_end_matches('\r').trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(body) = trimmed.strip_prefix(':') else {
            return Err(DeckError::MissingColon { line });
        };
        let mut record = Record {
            line,
            digits: body.as_bytes(),
            pos: 0,
        };
        let len = record.byte()?;
        let address = record.hex(16)?;
        if len == 0 {
            debug!(size = image.len(), "code deck loaded");
            return Ok(image);
        }
        let expected = image.len() as Address;
        let found = Address::try_from(address).map_err(|_| DeckError::OutOfStore { line })?;
        if found != expected {
            return Err(DeckError::AddressMismatch {
                line,
                expected,
                found,
            });
        }
        if found + Address::from(len) > STORE_CAPACITY {
            return Err(DeckError::OutOfStore { line });
        }
        let mut sum = 0u8;
        for _ in 0..len {
            let byte = record.byte()?;
            sum = sum.wrapping_add(byte);
            image.push(byte);
        }
        let checksum = record.byte()?;
        if checksum != sum {
            return Err(DeckError::ChecksumMismatch {
                line,
                expected: sum,
                found: checksum,
            });
        }
    }
    Err(DeckError::MissingEndRecord)
}

impl Vm {
    /// Loads a code deck at address zero.
    pub fn load_deck(&mut self, text: &str) -> Result<(), DeckError> {
        let image = parse_deck(text)?;
        self.load_code(&image)
    }

    /// Places a code image at address zero and sets the code and global
    /// tops to its end.
    pub fn load_code(&mut self, image: &[u8]) -> Result<(), DeckError> {
        if image.len() as Address > STORE_CAPACITY {
            return Err(DeckError::OutOfStore { line: 0 });
        }
        self.memory
            .load(0, image)
            .map_err(|_| DeckError::OutOfStore { line: 0 })?;
        self.pctop = image.len() as Address;
        self.gbtop = self.pctop;
        self.pc = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_records_and_end() {
        let text = ":020000000000000000010203\r\n\n:0100000000000000020505\n:000000000000000003\n";
        assert_eq!(parse_deck(text), Ok(vec![1, 2, 5]));
    }

    #[test]
    fn checksum_is_checked() {
        let text = ":0200000000000000000102FF\n:000000000000000002\n";
        assert_eq!(
            parse_deck(text),
            Err(DeckError::ChecksumMismatch {
                line: 1,
                expected: 3,
                found: 0xFF
            })
        );
    }

    #[test]
    fn addresses_must_follow() {
        let text = ":0100000000000000000707\n:0100000000000000050707\n";
        assert_eq!(
            parse_deck(text),
            Err(DeckError::AddressMismatch {
                line: 2,
                expected: 1,
                found: 5
            })
        );
    }

    #[test]
    fn rejects_malformed_records() {
        assert_eq!(parse_deck("01000"), Err(DeckError::MissingColon { line: 1 }));
        assert_eq!(parse_deck(":0G"), Err(DeckError::InvalidHex { line: 1 }));
        assert_eq!(parse_deck(":0100000000"), Err(DeckError::Truncated { line: 1 }));
        assert_eq!(
            parse_deck(":0100000000000000000707\n"),
            Err(DeckError::MissingEndRecord)
        );
    }
}
