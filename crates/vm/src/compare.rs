/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::Address;
use p6_vm_types::exception::FatalCode;
use std::cmp::Ordering;

macro_rules! compare_ops {
    ($pop:ident: $($name:ident => $test:expr,)*) => {
        $(
            pub(crate) fn $name(&mut self) -> VmResult {
                let b = self.$pop()?;
                let a = self.$pop()?;
                let test: fn(Ordering) -> bool = $test;
                self.push_bool(a.partial_cmp(&b).is_some_and(test))
            }
        )*
    };
}

macro_rules! compare_bytes {
    ($($name:ident => $test:expr,)*) => {
        $(
            pub(crate) fn $name(&mut self, q: Address) -> VmResult {
                let ordering = self.compare_multiple(q)?;
                let test: fn(Ordering) -> bool = $test;
                self.push_bool(test(ordering))
            }
        )*
    };
}

impl Vm {
    compare_ops! { pop_adr:
        execute_equa => Ordering::is_eq,
        execute_neqa => Ordering::is_ne,
    }

    compare_ops! { pop_int:
        execute_equi => Ordering::is_eq,
        execute_neqi => Ordering::is_ne,
        execute_geqi => Ordering::is_ge,
        execute_grti => Ordering::is_gt,
        execute_leqi => Ordering::is_le,
        execute_lesi => Ordering::is_lt,
    }

    compare_ops! { pop_real:
        execute_equr => Ordering::is_eq,
        execute_geqr => Ordering::is_ge,
        execute_grtr => Ordering::is_gt,
        execute_leqr => Ordering::is_le,
        execute_lesr => Ordering::is_lt,
    }

    compare_bytes! {
        execute_equm => Ordering::is_eq,
        execute_neqm => Ordering::is_ne,
        execute_geqm => Ordering::is_ge,
        execute_grtm => Ordering::is_gt,
        execute_leqm => Ordering::is_le,
        execute_lesm => Ordering::is_lt,
    }

    /// NaN compares unequal to everything, itself included.
    pub(crate) fn execute_neqr(&mut self) -> VmResult {
        let b = self.pop_real()?;
        let a = self.pop_real()?;
        self.push_bool(a != b)
    }

    pub(crate) fn execute_equs(&mut self) -> VmResult {
        let b = self.pop_set()?;
        let a = self.pop_set()?;
        self.push_bool(a == b)
    }

    pub(crate) fn execute_neqs(&mut self) -> VmResult {
        let b = self.pop_set()?;
        let a = self.pop_set()?;
        self.push_bool(a != b)
    }

    /// `a >= b` holds when `b` is a subset of `a`.
    pub(crate) fn execute_geqs(&mut self) -> VmResult {
        let b = self.pop_set()?;
        let a = self.pop_set()?;
        self.push_bool(b.is_subset(&a))
    }

    pub(crate) fn execute_leqs(&mut self) -> VmResult {
        let b = self.pop_set()?;
        let a = self.pop_set()?;
        self.push_bool(a.is_subset(&b))
    }

    /// Strict set inclusion is not part of the instruction set.
    pub(crate) fn execute_set_inclusion(&mut self) -> VmResult {
        Err(FatalCode::SetInclusion.into())
    }

    /// Compares two `q` byte operands as unsigned bytes, decided by the first
    /// position where they differ. Bytes past that position are not read.
    fn compare_multiple(&mut self, q: Address) -> VmResult<Ordering> {
        let b_addr = self.pop_adr()?;
        let a_addr = self.pop_adr()?;
        for offset in 0..q {
            let a = self.memory().get_byte(a_addr + offset)?;
            let b = self.memory().get_byte(b_addr + offset)?;
            if a != b {
                return Ok(a.cmp(&b));
            }
        }
        Ok(Ordering::Equal)
    }
}

