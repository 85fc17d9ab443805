/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::io::{self, BufRead, Write};

/// The process streams behind the `input`, `output`, `error` and `list`
/// header files. Tests substitute in-memory buffers.
pub struct HostStreams {
    pub input: Box<dyn BufRead>,
    pub output: Box<dyn Write>,
    pub error: Box<dyn Write>,
}

impl HostStreams {
    #[must_use]
    pub fn new(input: Box<dyn BufRead>, output: Box<dyn Write>, error: Box<dyn Write>) -> Self {
        Self {
            input,
            output,
            error,
        }
    }
}

impl Default for HostStreams {
    fn default() -> Self {
        Self {
            input: Box::new(io::stdin().lock()),
            output: Box::new(io::stdout()),
            error: Box::new(io::stderr()),
        }
    }
}
