/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use crate::{
    CheckFlags, Fault, TrapCode, Vm, VmResult, VmSetup, VmState,
    command::CommandLine,
    deck::{DeckError, parse_deck},
    heap::HeapBlock,
    host::HostStreams,
};
