/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm_types::MAX_COMMAND;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLineTooLong;

impl Display for CommandLineTooLong {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Too many/too long command line parameters")
    }
}

impl Error for CommandLineTooLong {}

/// The `command` header file: the program arguments joined by single
/// spaces and read like a single text line.
///
/// Positions at and past the end read as a blank. The line ends at the
/// end of the text and the file ends one position later.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandLine {
    text: Vec<u8>,
    pos: usize,
}

impl CommandLine {
    pub fn new<S: AsRef<str>>(args: &[S]) -> Result<Self, CommandLineTooLong> {
        let joined = args
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");
        if joined.len() > MAX_COMMAND - 1 {
            return Err(CommandLineTooLong);
        }
        Ok(Self {
            text: joined.into_bytes(),
            pos: 0,
        })
    }

    #[must_use]
    pub fn buffer(&self) -> u8 {
        self.text.get(self.pos).copied().unwrap_or(b' ')
    }

    pub fn advance(&mut self) {
        if self.pos <= self.text.len() {
            self.pos += 1;
        }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.pos > self.text.len()
    }

    #[must_use]
    pub fn is_eoln(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn read_line(&mut self) {
        self.pos = self.text.len() + 1;
    }

    /// Takes the next blank separated word off the line.
    pub fn read_word(&mut self) -> String {
        while !self.is_eoln() && self.buffer() == b' ' {
            self.advance();
        }
        let mut word = Vec::new();
        while !self.is_eoln() && self.buffer() != b' ' {
            word.push(self.buffer());
            self.advance();
        }
        String::from_utf8_lossy(&word).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_line_then_end_of_file() {
        let mut line = CommandLine::new(&["ab"]).unwrap();
        assert_eq!(line.buffer(), b'a');
        line.advance();
        line.advance();
        assert!(line.is_eoln());
        assert!(!line.is_eof());
        assert_eq!(line.buffer(), b' ');
        line.advance();
        assert!(line.is_eof());
        line.advance();
        assert!(line.is_eof());
    }

    #[test]
    fn words_in_order() {
        let mut line = CommandLine::new(&["in.txt", "  out.txt", "7"]).unwrap();
        assert_eq!(line.read_word(), "in.txt");
        assert_eq!(line.read_word(), "out.txt");
        assert_eq!(line.buffer(), b' ');
        line.advance();
        assert_eq!(line.buffer(), b'7');
    }

    #[test]
    fn too_long() {
        let long = "x".repeat(MAX_COMMAND);
        assert_eq!(CommandLine::new(&[long]), Err(CommandLineTooLong));
    }

    #[test]
    fn empty_line_is_at_eoln() {
        let line = CommandLine::default();
        assert!(line.is_eoln());
        assert!(!line.is_eof());
    }
}
