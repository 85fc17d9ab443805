/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::exception::ExceptionCode;
use p6_vm_types::{ADR_SIZE, Address, NIL_VALUE, mark};

/// Storage class of a loaded or stored value.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Slot {
    Int,
    /// One byte in the store, an integer on the stack.
    Byte,
    /// Like `Byte`, but any non-zero value is stored as 1.
    Bool,
    Adr,
    Real,
    Set,
}

macro_rules! level_access {
    ($load:ident, $store:ident, $slot:expr) => {
        pub(crate) fn $load(&mut self, p: u8, q: Address) -> VmResult {
            let addr = self.base(p)? + q;
            self.push_from(addr, $slot)
        }

        pub(crate) fn $store(&mut self, p: u8, q: Address) -> VmResult {
            let addr = self.base(p)? + q;
            self.pop_into(addr, $slot)
        }
    };
}

macro_rules! global_access {
    ($load:ident, $store:ident, $indirect:ident, $slot:expr) => {
        pub(crate) fn $load(&mut self, q: Address) -> VmResult {
            self.push_from(q, $slot)
        }

        pub(crate) fn $store(&mut self, q: Address) -> VmResult {
            self.pop_into(q, $slot)
        }

        pub(crate) fn $indirect(&mut self, q: Address) -> VmResult {
            let addr = self.pop_adr()?;
            self.push_from(addr + q, $slot)
        }
    };
}

macro_rules! stack_store {
    ($name:ident, $slot:expr) => {
        pub(crate) fn $name(&mut self) -> VmResult {
            let size = Self::stack_size($slot);
            let addr = self.memory().get_adr(self.sp + size)?;
            self.pop_into(addr, $slot)?;
            self.sp += ADR_SIZE;
            Ok(())
        }
    };
}

impl Vm {
    /// Follows the static chain `p` levels up from the current mark.
    pub(crate) fn base(&self, p: u8) -> VmResult<Address> {
        let mut addr = self.mp;
        for _ in 0..p {
            addr = self.memory().get_adr(addr + mark::STATIC_LINK)?;
        }
        Ok(addr)
    }

    const fn stack_size(slot: Slot) -> Address {
        match slot {
            Slot::Int | Slot::Byte | Slot::Bool | Slot::Adr => 4,
            Slot::Real => 8,
            Slot::Set => 32,
        }
    }

    pub(crate) fn push_from(&mut self, addr: Address, slot: Slot) -> VmResult {
        match slot {
            Slot::Int => {
                let value = self.memory().get_int(addr)?;
                self.push_int(value)
            }
            Slot::Byte | Slot::Bool => {
                let value = self.memory().get_byte(addr)?;
                self.push_int(i32::from(value))
            }
            Slot::Adr => {
                let value = self.memory().get_adr(addr)?;
                self.push_adr(value)
            }
            Slot::Real => {
                let value = self.memory().get_real(addr)?;
                self.push_real(value)
            }
            Slot::Set => {
                let value = self.memory().get_set(addr)?;
                self.push_set(&value)
            }
        }
    }

    pub(crate) fn pop_into(&mut self, addr: Address, slot: Slot) -> VmResult {
        match slot {
            Slot::Int => {
                let value = self.pop_int()?;
                self.memory_mut().put_int(addr, value)
            }
            Slot::Byte => {
                let value = self.pop_int()?;
                self.memory_mut().put_byte(addr, value as u8)
            }
            Slot::Bool => {
                let value = self.pop_int()?;
                self.memory_mut().put_byte(addr, u8::from(value != 0))
            }
            Slot::Adr => {
                let value = self.pop_adr()?;
                self.memory_mut().put_adr(addr, value)
            }
            Slot::Real => {
                let value = self.pop_real()?;
                self.memory_mut().put_real(addr, value)
            }
            Slot::Set => {
                let value = self.pop_set()?;
                self.memory_mut().put_set(addr, &value)
            }
        }
    }

    level_access!(execute_lodi, execute_stri, Slot::Int);
    level_access!(execute_lodx, execute_strx, Slot::Byte);
    level_access!(execute_loda, execute_stra, Slot::Adr);
    level_access!(execute_lodr, execute_strr, Slot::Real);
    level_access!(execute_lods, execute_strs, Slot::Set);
    level_access!(execute_lodb, execute_strb, Slot::Bool);
    level_access!(execute_lodc, execute_strc, Slot::Byte);

    global_access!(execute_ldoi, execute_sroi, execute_indi, Slot::Int);
    global_access!(execute_ldox, execute_srox, execute_indx, Slot::Byte);
    global_access!(execute_ldoa, execute_sroa, execute_inda, Slot::Adr);
    global_access!(execute_ldor, execute_sror, execute_indr, Slot::Real);
    global_access!(execute_ldos, execute_sros, execute_inds, Slot::Set);
    global_access!(execute_ldob, execute_srob, execute_indb, Slot::Bool);

    pub(crate) fn execute_ldoc(&mut self, q: Address) -> VmResult {
        self.push_from(q, Slot::Byte)
    }

    pub(crate) fn execute_sroc(&mut self, q: Address) -> VmResult {
        self.pop_into(q, Slot::Byte)
    }

    stack_store!(execute_stoi, Slot::Int);
    stack_store!(execute_stox, Slot::Byte);
    stack_store!(execute_stoa, Slot::Adr);
    stack_store!(execute_stor, Slot::Real);
    stack_store!(execute_stos, Slot::Set);
    stack_store!(execute_stob, Slot::Bool);
    stack_store!(execute_stoc, Slot::Byte);

    pub(crate) fn execute_lda(&mut self, p: u8, q: Address) -> VmResult {
        let addr = self.base(p)? + q;
        self.push_adr(addr)
    }

    /// Also `lca`: pushes the operand as an address.
    pub(crate) fn execute_lao(&mut self, q: Address) -> VmResult {
        self.push_adr(q)
    }

    pub(crate) fn execute_ldc_byte(&mut self, value: u8) -> VmResult {
        self.push_int(i32::from(value))
    }

    pub(crate) fn execute_ldci(&mut self, value: Address) -> VmResult {
        self.push_int(value as i32)
    }

    pub(crate) fn execute_ldcn(&mut self) -> VmResult {
        self.push_adr(NIL_VALUE)
    }

    pub(crate) fn execute_ldcr(&mut self, q: Address) -> VmResult {
        self.push_from(q, Slot::Real)
    }

    pub(crate) fn execute_inca(&mut self, q: Address) -> VmResult {
        let addr = self.pop_adr()?;
        self.push_adr(addr + q)
    }

    pub(crate) fn execute_ixa(&mut self, q: Address) -> VmResult {
        let index = self.pop_int()?;
        let addr = self.pop_adr()?;
        self.push_adr(q * i64::from(index) + addr)
    }

    pub(crate) fn execute_mov(&mut self, q: Address) -> VmResult {
        let src = self.pop_adr()?;
        let dst = self.pop_adr()?;
        self.memory_mut().copy(dst, src, q)
    }

    pub(crate) fn execute_dmp(&mut self, q: Address) -> VmResult {
        self.sp += q;
        Ok(())
    }

    /// Moves the pointer on top of the stack below the `q` byte item under it.
    pub(crate) fn execute_swp(&mut self, q: Address) -> VmResult {
        let pointer = self.memory().get_adr(self.sp)?;
        let sp = self.sp;
        self.memory_mut().copy(sp, sp + ADR_SIZE, q)?;
        self.memory_mut().put_adr(sp + q, pointer)
    }

    pub(crate) fn execute_dupi(&mut self) -> VmResult {
        let value = self.memory().get_int(self.sp)?;
        self.push_int(value)
    }

    pub(crate) fn execute_dupa(&mut self) -> VmResult {
        let value = self.memory().get_adr(self.sp)?;
        self.push_adr(value)
    }

    pub(crate) fn execute_dupr(&mut self) -> VmResult {
        let value = self.memory().get_real(self.sp)?;
        self.push_real(value)
    }

    pub(crate) fn execute_dups(&mut self) -> VmResult {
        let value = self.memory().get_set(self.sp)?;
        self.push_set(&value)
    }

    pub(crate) fn execute_inv(&mut self) -> VmResult {
        let addr = self.pop_adr()?;
        self.memory_mut().undefine(addr, 1)
    }

    pub(crate) fn execute_pck(&mut self, q: Address, q1: Address) -> VmResult {
        let dst = self.pop_adr()?;
        let index = i64::from(self.pop_int()?);
        let src = self.pop_adr()?;
        if index + q > q1 {
            return Err(ExceptionCode::PackElementsOutOfBounds.into());
        }
        self.memory().get_bytes(src + index, q)?;
        self.memory_mut().copy(dst, src + index, q)
    }

    pub(crate) fn execute_upk(&mut self, q: Address, q1: Address) -> VmResult {
        let index = i64::from(self.pop_int()?);
        let dst = self.pop_adr()?;
        let src = self.pop_adr()?;
        if index + q > q1 {
            return Err(ExceptionCode::UnpackElementsOutOfBounds.into());
        }
        self.memory().get_bytes(src, q)?;
        self.memory_mut().copy(dst + index, src, q)
    }
}
