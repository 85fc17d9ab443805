/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::Address;

/// Rounds `addr` up to the next multiple of `alignment`.
#[must_use]
pub fn align(addr: Address, alignment: Address) -> Address {
    debug_assert!(
        alignment > 0 && (alignment as u64).is_power_of_two(),
        "alignment must be a power of two"
    );
    (addr + alignment - 1) & !(alignment - 1)
}
