/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::exception::FatalCode;
use p6_vm_types::{ADR_SIZE, Address, INT_SIZE, MARK_SIZE, MAX_RESULT, STACK_EL_SIZE, mark};

/// Procedure marks.
///
/// A mark sits directly above the parameters of the call and is addressed
/// by `mp` from above:
///
/// ```text
/// mp -  8  function result
/// mp - 12  static link
/// mp - 16  dynamic link
/// mp - 20  caller's extreme pointer
/// mp - 24  stack bottom after locals
/// mp - 28  current extreme pointer
/// mp - 32  return address
/// ```
impl Vm {
    fn set_call_depth(&mut self) {
        if self.debug_stats_enabled {
            let depth = (self.memory().size() - self.mp) / MARK_SIZE;
            self.debug.max_call_depth = self.debug.max_call_depth.max(depth as usize);
        }
    }

    pub(crate) fn execute_mst(&mut self, p: u8) -> VmResult {
        let at = self.sp;
        for _ in 0..MARK_SIZE / INT_SIZE {
            self.push_int(0)?;
        }
        let static_link = self.base(p)?;
        let memory = &mut self.memory;
        memory.put_adr(at + mark::STATIC_LINK, static_link)?;
        memory.put_adr(at + mark::DYNAMIC_LINK, self.mp)?;
        memory.put_adr(at + mark::SAVED_EP, self.ep)
    }

    fn enter(&mut self, parameter_size: u8, entry: Address) -> VmResult {
        self.mp = self.sp + Address::from(parameter_size) + MARK_SIZE;
        let return_address = self.pc;
        self.memory.put_adr(self.mp + mark::RETURN_ADDRESS, return_address)?;
        self.pc = entry;
        self.set_call_depth();
        Ok(())
    }

    pub(crate) fn execute_cup(&mut self, p: u8, q: Address) -> VmResult {
        self.enter(p, q)
    }

    /// Calls through a vector. The parameter size is the last `p` decoded.
    pub(crate) fn execute_cuv(&mut self, q: Address) -> VmResult {
        let entry = self.memory.get_adr(q)?;
        self.enter(self.p, entry)
    }

    pub(crate) fn execute_suv(&mut self, q: Address, q1: Address) -> VmResult {
        self.memory.put_adr(q1, q)
    }

    /// Calls a procedure parameter: the address on the stack holds the
    /// entry point followed by the static link to use.
    pub(crate) fn execute_cip(&mut self, p: u8) -> VmResult {
        let closure = self.pop_adr()?;
        let entry = self.memory.get_adr(closure)?;
        let static_link = self.memory.get_adr(closure + ADR_SIZE)?;
        self.mp = self.sp + Address::from(p) + MARK_SIZE;
        self.memory.put_adr(self.mp + mark::STATIC_LINK, static_link)?;
        let return_address = self.pc;
        self.memory.put_adr(self.mp + mark::RETURN_ADDRESS, return_address)?;
        self.pc = entry;
        self.set_call_depth();
        Ok(())
    }

    /// Pushes a procedure parameter: static link, then entry point.
    pub(crate) fn execute_lpa(&mut self, p: u8, q: Address) -> VmResult {
        let static_link = self.base(p)?;
        self.push_adr(static_link)?;
        self.push_adr(q)
    }

    pub(crate) fn execute_lip(&mut self, p: u8, q: Address) -> VmResult {
        let at = self.base(p)? + q;
        let static_link = self.memory.get_adr(at + ADR_SIZE)?;
        let entry = self.memory.get_adr(at)?;
        self.push_adr(static_link)?;
        self.push_adr(entry)
    }

    /// Interprocedural jump to a label in an enclosing block.
    pub(crate) fn execute_ipj(&mut self, p: u8, q: Address) -> VmResult {
        self.pc = q;
        self.mp = self.base(p)?;
        self.sp = self.memory.get_adr(self.mp + mark::STACK_BOTTOM)?;
        self.ep = self.memory.get_adr(self.mp + mark::CURRENT_EP)?;
        Ok(())
    }

    pub(crate) fn execute_ents(&mut self, q: Address) -> VmResult {
        let bottom = self.mp + q;
        if bottom <= self.np {
            return Err(FatalCode::StoreOverflow.into());
        }
        if self.sp > bottom {
            let len = self.sp - bottom;
            self.memory.clear(bottom, len)?;
            self.memory.undefine(bottom, len)?;
            self.sp = bottom;
        }
        self.memory.put_adr(self.mp + mark::STACK_BOTTOM, self.sp)
    }

    pub(crate) fn execute_ente(&mut self, q: Address) -> VmResult {
        self.ep = self.sp + q;
        if self.ep <= self.np {
            return Err(FatalCode::StoreOverflow.into());
        }
        self.memory.put_adr(self.mp + mark::CURRENT_EP, self.ep)
    }

    fn leave(&mut self, sp: Address) -> VmResult {
        if self.sp != self.memory.get_adr(self.mp + mark::STACK_BOTTOM)? {
            return Err(FatalCode::StackBalance.into());
        }
        self.sp = sp;
        self.pc = self.memory.get_adr(self.mp + mark::RETURN_ADDRESS)?;
        self.ep = self.memory.get_adr(self.mp + mark::SAVED_EP)?;
        self.mp = self.memory.get_adr(self.mp + mark::DYNAMIC_LINK)?;
        Ok(())
    }

    /// Stack position of a function result that fits in a stack element.
    const fn narrow_result(mp: Address) -> Address {
        let sp = mp + mark::FUNCTION_VALUE;
        if STACK_EL_SIZE < MAX_RESULT {
            sp + MAX_RESULT / 2
        } else {
            sp
        }
    }

    pub(crate) fn execute_retp(&mut self) -> VmResult {
        self.leave(self.mp)
    }

    /// Also `retx` and `reta`.
    pub(crate) fn execute_reti(&mut self) -> VmResult {
        self.leave(Self::narrow_result(self.mp))
    }

    pub(crate) fn execute_retr(&mut self) -> VmResult {
        self.leave(self.mp + mark::FUNCTION_VALUE)
    }

    /// Also `retb`. Only the low byte of the result was stored, so the
    /// slot is widened to a full integer.
    pub(crate) fn execute_retc(&mut self) -> VmResult {
        let at = Self::narrow_result(self.mp);
        self.leave(at)?;
        let value = self.memory.get_byte(at)?;
        self.memory.put_int(at, i32::from(value))
    }
}
