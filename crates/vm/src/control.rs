/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::exception::FatalCode;
use p6_vm_types::{Address, INT_SIZE, UJP_LEN};

impl Vm {
    #[inline]
    pub(crate) fn execute_ujp(&mut self, q: Address) -> VmResult {
        self.pc = q;
        Ok(())
    }

    #[inline]
    pub(crate) fn execute_fjp(&mut self, q: Address) -> VmResult {
        if self.pop_int()? == 0 {
            self.pc = q;
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn execute_tjp(&mut self, q: Address) -> VmResult {
        if self.pop_int()? != 0 {
            self.pc = q;
        }
        Ok(())
    }

    /// Indexes a table of unconditional jumps starting at `q`.
    pub(crate) fn execute_xjp(&mut self, q: Address) -> VmResult {
        let index = self.pop_int()?;
        self.pc = Address::from(index) * UJP_LEN + q;
        Ok(())
    }

    /// Jumps to `q1` and pops the selector when it lies within the bounds
    /// stored at `q`, otherwise leaves it for the next case test.
    pub(crate) fn execute_cjp(&mut self, q: Address, q1: Address) -> VmResult {
        let value = self.top_int()?;
        let low = self.memory().get_int(q)?;
        let high = self.memory().get_int(q + INT_SIZE)?;
        if (low..=high).contains(&value) {
            self.sp += INT_SIZE;
            self.pc = q1;
        }
        Ok(())
    }

    pub(crate) fn execute_ujc(&mut self) -> VmResult {
        Err(FatalCode::InvalidCase.into())
    }

    pub(crate) fn execute_cal(&mut self, q: Address) -> VmResult {
        self.push_adr(self.pc)?;
        self.pc = q;
        Ok(())
    }

    pub(crate) fn execute_ret(&mut self) -> VmResult {
        self.pc = self.pop_adr()?;
        Ok(())
    }

    /// Sets the heap base above the globals, which start out undefined.
    pub(crate) fn execute_lnp(&mut self, q: Address) -> VmResult {
        self.np = q;
        self.gbtop = q;
        let start = self.pctop;
        let len = q - start;
        if len > 0 {
            self.memory_mut().clear(start, len)?;
            self.memory_mut().undefine(start, len)?;
        }
        Ok(())
    }
}
