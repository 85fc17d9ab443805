/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use crate::{
    ADR_SIZE, Address, BOOL_SIZE, CHAR_SIZE, HEAP_ALIGN, INT_MAX, INT_SIZE, MARK_SIZE,
    MAX_RESULT, NIL_VALUE, REAL_SIZE, SET_SIZE, STACK_EL_SIZE, STORE_CAPACITY,
    aligner::align,
    exception::{ExceptionCode, FatalCode},
    mark,
    opcode::{OpCode, OperandShape},
    standard::StandardProc,
    standard_files,
};
