/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::SET_SIZE;
use p6_vm_types::exception::ExceptionCode;

/// A set of small integers in `0..=255`, one bit per element, least
/// significant bit of the first byte is element 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct SetValue(pub [u8; SET_SIZE as usize]);

impl SetValue {
    #[must_use]
    pub const fn empty() -> Self {
        Self([0; SET_SIZE as usize])
    }

    /// Membership. Values outside the element range are never members.
    #[must_use]
    pub fn contains(&self, element: i64) -> bool {
        if !(0..SET_SIZE * 8).contains(&element) {
            return false;
        }
        self.0[(element / 8) as usize] & (1 << (element % 8)) != 0
    }

    pub fn insert(&mut self, element: u8) {
        self.0[(element / 8) as usize] |= 1 << (element % 8);
    }

    /// Every element in `lo..=hi`. Empty when `lo > hi`.
    #[must_use]
    pub fn range(lo: u8, hi: u8) -> Self {
        let mut set = Self::empty();
        for element in lo..=hi {
            set.insert(element);
        }
        set
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a | b)
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a & b)
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a & !b)
    }

    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a & !b == 0)
    }

    fn zip(&self, other: &Self, f: impl Fn(u8, u8) -> u8) -> Self {
        let mut out = Self::empty();
        for (i, byte) in out.0.iter_mut().enumerate() {
            *byte = f(self.0[i], other.0[i]);
        }
        out
    }
}

fn element(value: i32) -> VmResult<u8> {
    u8::try_from(value).map_err(|_| ExceptionCode::SetElementOutOfRange.into())
}

impl Vm {
    pub(crate) fn execute_sgs(&mut self) -> VmResult {
        let value = self.pop_int()?;
        let mut set = SetValue::empty();
        set.insert(element(value)?);
        self.push_set(&set)
    }

    pub(crate) fn execute_rgs(&mut self) -> VmResult {
        let second = self.pop_int()?;
        let first = self.pop_int()?;
        let (lo, hi) = if first > second {
            (second, first)
        } else {
            (first, second)
        };
        self.push_set(&SetValue::range(element(lo)?, element(hi)?))
    }

    pub(crate) fn execute_dif(&mut self) -> VmResult {
        let s2 = self.pop_set()?;
        let s1 = self.pop_set()?;
        self.push_set(&s1.difference(&s2))
    }

    pub(crate) fn execute_int(&mut self) -> VmResult {
        let s2 = self.pop_set()?;
        let s1 = self.pop_set()?;
        self.push_set(&s1.intersection(&s2))
    }

    pub(crate) fn execute_uni(&mut self) -> VmResult {
        let s2 = self.pop_set()?;
        let s1 = self.pop_set()?;
        self.push_set(&s1.union(&s2))
    }

    pub(crate) fn execute_inn(&mut self) -> VmResult {
        let set = self.pop_set()?;
        let value = self.pop_int()?;
        self.push_bool(set.contains(i64::from(value)))
    }
}
