/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
//! Shared vocabulary of the P6 stack machine: the store layout for the
//! 32-bit target, the instruction set and the runtime error codes.

pub mod aligner;
pub mod exception;
pub mod opcode;
pub mod prelude;
pub mod standard;

pub use aligner::align;

/// A store address or address-sized operand.
///
/// Computations are done in 64 bits so that intermediate results (negative
/// offsets, sums past the top of the store) never wrap. Values are stored as
/// four little endian bytes.
pub type Address = i64;

pub const INT_SIZE: Address = 4;
pub const REAL_SIZE: Address = 8;
pub const CHAR_SIZE: Address = 1;
pub const BOOL_SIZE: Address = 1;
pub const ADR_SIZE: Address = 4;
pub const PTR_SIZE: Address = 4;
pub const SET_SIZE: Address = 32;
pub const STACK_EL_SIZE: Address = 4;
pub const MAX_RESULT: Address = 8;
pub const HEAP_ALIGN: Address = 4;
pub const MARK_SIZE: Address = 32;
pub const UJP_LEN: Address = 5;
pub const FILE_ID_SIZE: Address = 1;

/// Extra space kept in a free block before it is worth splitting.
pub const RESERVED_SPACE: Address = 0;

pub const STORE_CAPACITY: Address = 16_777_216;
pub const MAX_STORE_ADDRESS: Address = STORE_CAPACITY - 1;

/// Address 0 is never a valid pointer, 1 is the nil pointer.
pub const NIL_VALUE: Address = 1;

pub const INT_MAX: i64 = i32::MAX as i64;

pub const SET_LOW: i32 = 0;
pub const SET_HIGH: i32 = 255;

pub const MAX_FILES: usize = 100;
pub const FILE_NAME_LEN: usize = 2000;
pub const REAL_EXP_FIELD: i32 = 9;
pub const MAX_COMMAND: usize = 250;
pub const MAX_ASSERT_TEXT: usize = 100;

/// Offsets of the mark fields, relative to the mark pointer.
pub mod mark {
    use crate::Address;

    pub const FUNCTION_VALUE: Address = -8;
    pub const STATIC_LINK: Address = -12;
    pub const DYNAMIC_LINK: Address = -16;
    pub const SAVED_EP: Address = -20;
    pub const STACK_BOTTOM: Address = -24;
    pub const CURRENT_EP: Address = -28;
    pub const RETURN_ADDRESS: Address = -32;
}

/// The header files live directly above the constants, two bytes each:
/// the file number followed by the character buffer variable.
pub mod standard_files {
    use crate::Address;

    pub const INPUT_OFFSET: Address = 0;
    pub const OUTPUT_OFFSET: Address = 2;
    pub const PRD_OFFSET: Address = 4;
    pub const PRR_OFFSET: Address = 6;
    pub const ERROR_OFFSET: Address = 8;
    pub const LIST_OFFSET: Address = 10;
    pub const COMMAND_OFFSET: Address = 12;

    pub const INPUT: u8 = 1;
    pub const OUTPUT: u8 = 2;
    pub const PRD: u8 = 3;
    pub const PRR: u8 = 4;
    pub const ERROR: u8 = 5;
    pub const LIST: u8 = 6;
    pub const COMMAND: u8 = 7;

    #[must_use]
    pub const fn offset_of(file_number: u8) -> Address {
        (file_number as Address - 1) * 2
    }
}
