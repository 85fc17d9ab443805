/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
//! Runtime error codes.
//!
//! Codes in `14..=87` are exceptions: they are delivered to the innermost
//! guarded block, and only end the run when no block is active. Codes in
//! `88..=115` are fatal and always end the run.

use std::fmt::{Display, Formatter};

macro_rules! error_codes {
    ($enum_name:ident, $($name:ident = $value:literal => $message:literal,)*) => {
        #[repr(u8)]
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub enum $enum_name {
            $($name = $value,)*
        }

        impl $enum_name {
            #[must_use]
            pub const fn message(&self) -> &'static str {
                match self {
                    $(Self::$name => $message,)*
                }
            }

            #[must_use]
            pub const fn code(&self) -> u8 {
                *self as u8
            }
        }

        impl TryFrom<u8> for $enum_name {
            type Error = ();

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    _ => Err(()),
                }
            }
        }

        impl Display for $enum_name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.message())
            }
        }
    };
}

error_codes! {
    ExceptionCode,
    ValueOutOfRange = 14 => "Value out of range",
    ArrayLengthMatch = 15 => "Array length match",
    CaseValueNotFound = 16 => "Case value not found",
    ZeroDivide = 17 => "Zero divide",
    InvalidOperand = 18 => "Invalid operand",
    NilPointerDereference = 19 => "Nil pointer dereference",
    RealOverflow = 20 => "Real overflow",
    RealUnderflow = 21 => "Real underflow",
    RealProcessingFault = 22 => "Real processing fault",
    TagValueNotActive = 23 => "Tag value not active",
    TooManyFiles = 24 => "Too many files",
    FileIsOpen = 25 => "File is open",
    FileAlreadyNamed = 26 => "File already named",
    FileNotOpen = 27 => "File not open",
    FileModeIncorrect = 28 => "File mode incorrect",
    InvalidFieldSpecification = 29 => "Invalid field specification",
    InvalidRealNumber = 30 => "Invalid real number",
    InvalidFractionSpecification = 31 => "Invalid fraction specification",
    InvalidIntegerFormat = 32 => "Invalid integer format",
    IntegerValueOverflow = 33 => "Integer value overflow",
    InvalidRealFormat = 34 => "Invalid real format",
    EndOfFile = 35 => "End of file",
    InvalidFilePosition = 36 => "Invalid file position",
    FilenameTooLong = 37 => "Filename too long",
    FileOpenFail = 38 => "File open fail",
    FileSizeFail = 39 => "File size fail",
    FileCloseFail = 40 => "File close fail",
    FileReadFail = 41 => "File read fail",
    FileWriteFail = 42 => "File write fail",
    FilePositionFail = 43 => "File position fail",
    FileDeleteFail = 44 => "File delete fail",
    FileNameChangeFail = 45 => "File name change fail",
    SpaceAllocateFail = 46 => "Space allocate fail",
    SpaceReleaseFail = 47 => "Space release fail",
    SpaceAllocateNegative = 48 => "Space allocate negative",
    CannotPerformSpecial = 49 => "Cannot perform special",
    CommandLineTooLong = 50 => "Command line too long",
    ReadPastEof = 51 => "Read past eof",
    FileTransferLengthZero = 52 => "File transfer length zero",
    FileSizeTooLarge = 53 => "File size too large",
    FilenameEmpty = 54 => "Filename empty",
    CannotOpenStandard = 55 => "Cannot open standard",
    TooManyTemporaryFiles = 56 => "Too many temporary files",
    InputBufferOverflow = 57 => "Input buffer overflow",
    TooManyThreads = 58 => "Too many threads",
    CannotStartThread = 59 => "Cannot start thread",
    InvalidThreadHandle = 60 => "Invalid thread handle",
    CannotStopThread = 61 => "Cannot stop thread",
    TooManyInterTaskLocks = 62 => "Too many inter task locks",
    InvalidLockHandle = 63 => "Invalid lock handle",
    LockSequenceFail = 64 => "Lock sequence fail",
    TooManySignals = 65 => "Too many signals",
    CannotCreateSignal = 66 => "Cannot create signal",
    InvalidSignalHandle = 67 => "Invalid signal handle",
    CannotDeleteSignal = 68 => "Cannot delete signal",
    CannotSendSignal = 69 => "Cannot send signal",
    WaitForSignalFail = 70 => "Wait for signal fail",
    FieldNotBlank = 71 => "Field not blank",
    ReadOnWriteOnlyFile = 72 => "Read on write only file",
    WriteOnReadOnlyFile = 73 => "Write on read only file",
    FileBufferVariableUndefined = 74 => "File buffer variable undefined",
    NondecimalRadixOfNegative = 75 => "Nondecimal radix of negative",
    InvalidArgumentToLn = 76 => "Invalid argument to ln",
    InvalidArgumentToSqrt = 77 => "Invalid argument to sqrt",
    CannotResetOrRewriteStandardFile = 78 => "Cannot reset or rewrite standard file",
    CannotResetWriteOnlyFile = 79 => "Cannot reset write only file",
    CannotRewriteReadOnlyFile = 80 => "Cannot rewrite read only file",
    SetElementOutOfRange = 81 => "Set element out of range",
    RealArgumentTooLarge = 82 => "Real argument too large",
    BooleanOperatorOfNegative = 83 => "Boolean operator of negative",
    InvalidDivisorToMod = 84 => "Invalid divisor to mod",
    PackElementsOutOfBounds = 85 => "Pack elements out of bounds",
    UnpackElementsOutOfBounds = 86 => "Unpack elements out of bounds",
    CannotResetClosedTempFile = 87 => "Cannot reset closed temp file",
}

error_codes! {
    FatalCode,
    UndefinedLocationAccess = 88 => "Undefined location access",
    FunctionNotImplemented = 89 => "Function not implemented",
    InvalidInIso7185Mode = 90 => "Invalid in ISO 7185 mode",
    HeapFormatInvalid = 91 => "Heap format invalid",
    DisposeOfUninitializedPointer = 92 => "Dispose of uninitalized pointer",
    DisposeOfNilPointer = 93 => "Dispose of nil pointer",
    BadPointerValue = 94 => "Bad pointer value",
    BlockAlreadyFreed = 95 => "Block already freed",
    InvalidStandardProcedureOrFunction = 96 => "Invalid standard procedure or function",
    InvalidInstruction = 97 => "Invalid instruction",
    NewDisposeTagsMismatch = 98 => "New dispose tags mismatch",
    PcOutOfRange = 99 => "Pc out of range",
    StoreOverflow = 100 => "Store overflow",
    StackBalance = 101 => "Stack balance",
    SetInclusion = 102 => "Set inclusion",
    UninitializedPointer = 103 => "Uninitialized pointer",
    DereferenceOfNilPointer = 104 => "Dereference of nil pointer",
    PointerUsedAfterDispose = 105 => "Pointer used after dispose",
    VariantNotActive = 106 => "Variant not active",
    InvalidCase = 107 => "Invalid case",
    SystemError = 108 => "System error",
    ChangeToAllocatedTagField = 109 => "Change to allocated tag field",
    UnhandledException = 110 => "Unhandled exception",
    ProgramCodeAssertion = 111 => "Program code assertion",
    VarListEmpty = 112 => "VAR block list empty",
    ChangeToVarReferencedVariant = 113 => "Change to VAR referenced variant",
    DisposeOfVarReferencedBlock = 114 => "Dispose of VAR referenced block",
    VarReferencedFileBufferModified = 115 => "VAR referenced file buffer modified",
}

pub const EXCEPTION_BASE: u8 = ExceptionCode::ValueOutOfRange as u8;
pub const EXCEPTION_TOP: u8 = ExceptionCode::CannotResetClosedTempFile as u8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_do_not_overlap() {
        for code in 0..=u8::MAX {
            let exception = ExceptionCode::try_from(code).is_ok();
            let fatal = FatalCode::try_from(code).is_ok();
            assert!(!(exception && fatal));
            assert_eq!(exception, (EXCEPTION_BASE..=EXCEPTION_TOP).contains(&code));
            assert_eq!(fatal, (88..=115).contains(&code));
        }
    }

    #[test]
    fn messages() {
        assert_eq!(ExceptionCode::ZeroDivide.to_string(), "Zero divide");
        assert_eq!(FatalCode::VarListEmpty.message(), "VAR block list empty");
    }
}
