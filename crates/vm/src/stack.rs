/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::set::SetValue;
use crate::{Vm, VmResult};
use p6_vm_types::exception::FatalCode;
use p6_vm_types::{ADR_SIZE, Address, INT_SIZE, REAL_SIZE, SET_SIZE};

/// The evaluation stack grows downward. Every pushed item takes a whole
/// number of stack elements, so booleans and characters occupy an integer slot.
impl Vm {
    #[inline]
    fn grow(&mut self, size: Address) -> VmResult<Address> {
        let sp = self.sp - size;
        if sp <= self.np {
            return Err(FatalCode::StoreOverflow.into());
        }
        self.sp = sp;
        Ok(sp)
    }

    #[inline]
    pub(crate) fn push_int(&mut self, value: i32) -> VmResult {
        let at = self.grow(INT_SIZE)?;
        self.memory_mut().put_int(at, value)
    }

    #[inline]
    pub(crate) fn pop_int(&mut self) -> VmResult<i32> {
        let value = self.memory().get_int(self.sp)?;
        self.sp += INT_SIZE;
        Ok(value)
    }

    #[inline]
    pub(crate) fn push_bool(&mut self, value: bool) -> VmResult {
        self.push_int(i32::from(value))
    }

    #[inline]
    pub(crate) fn push_adr(&mut self, value: Address) -> VmResult {
        let at = self.grow(ADR_SIZE)?;
        self.memory_mut().put_adr(at, value)
    }

    #[inline]
    pub(crate) fn pop_adr(&mut self) -> VmResult<Address> {
        let value = self.memory().get_adr(self.sp)?;
        self.sp += ADR_SIZE;
        Ok(value)
    }

    #[inline]
    pub(crate) fn push_real(&mut self, value: f64) -> VmResult {
        let at = self.grow(REAL_SIZE)?;
        self.memory_mut().put_real(at, value)
    }

    #[inline]
    pub(crate) fn pop_real(&mut self) -> VmResult<f64> {
        let value = self.memory().get_real(self.sp)?;
        self.sp += REAL_SIZE;
        Ok(value)
    }

    pub(crate) fn push_set(&mut self, value: &SetValue) -> VmResult {
        let at = self.grow(SET_SIZE)?;
        self.memory_mut().put_set(at, value)
    }

    pub(crate) fn pop_set(&mut self) -> VmResult<SetValue> {
        let value = self.memory().get_set(self.sp)?;
        self.sp += SET_SIZE;
        Ok(value)
    }

    /// Values shorter than a stack element are read from their low byte.
    pub(crate) fn pop_byte(&mut self) -> VmResult<u8> {
        let value = self.memory().get_byte(self.sp)?;
        self.sp += INT_SIZE;
        Ok(value)
    }
}
