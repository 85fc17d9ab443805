/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Fault, Vm, VmResult};
use p6_vm_types::{Address, mark};
use tracing::trace;

/// Guarded blocks.
///
/// Entering a block saves the previous handler registers on the stack,
/// followed by a dummy slot that receives the thrown value. A throw unwinds
/// `sp` and `mp` to where they were when the block was entered and resumes at
/// the handler.
impl Vm {
    pub(crate) fn execute_bge(&mut self, q: Address) -> VmResult {
        self.push_adr(self.expadr)?;
        self.push_adr(self.expstk)?;
        self.push_adr(self.expmrk)?;
        self.push_adr(0)?;
        self.expadr = q;
        self.expstk = self.sp;
        self.expmrk = self.mp;
        Ok(())
    }

    fn restore_guard(&mut self) -> VmResult {
        self.expmrk = self.pop_adr()?;
        self.expstk = self.pop_adr()?;
        self.expadr = self.pop_adr()?;
        Ok(())
    }

    pub(crate) fn execute_ede(&mut self) -> VmResult {
        let _value = self.pop_adr()?;
        self.restore_guard()
    }

    /// Leaves the handler and rethrows the value to the enclosing block.
    pub(crate) fn execute_mse(&mut self) -> VmResult {
        let value = self.pop_adr()?;
        self.restore_guard()?;
        Err(Fault::Thrown(value))
    }

    /// Delivers `value` to the innermost guarded block. Without one, the
    /// value becomes a terminal fault.
    pub(crate) fn throw_value(&mut self, value: Address) -> VmResult {
        if self.expadr == 0 {
            return Err(Fault::Thrown(value));
        }
        trace!(value, handler = self.expadr, "throw");
        self.mp = self.expmrk;
        self.sp = self.expstk;
        self.pc = self.expadr;
        let _dummy = self.pop_adr()?;
        self.push_adr(value)?;
        self.ep = self.memory.get_adr(self.mp + mark::CURRENT_EP)?;
        Ok(())
    }
}
