/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::{ADR_SIZE, Address, INT_SIZE, NIL_VALUE, SET_HIGH, SET_LOW};

impl Vm {
    /// Reads the `(low, high)` bounds pair stored at `q`.
    fn bounds(&self, q: Address) -> VmResult<(i32, i32)> {
        Ok((self.memory.get_int(q)?, self.memory.get_int(q + INT_SIZE)?))
    }

    /// Also `chkb`, `chkc` and `chkx`. The value stays on the stack.
    pub(crate) fn execute_chk(&mut self, q: Address) -> VmResult {
        let value = self.top_int()?;
        let (low, high) = self.bounds(q)?;
        if value < low || value > high {
            return Err(ExceptionCode::ValueOutOfRange.into());
        }
        Ok(())
    }

    /// Validates the pointer on top of the stack. A non-zero `q` means the
    /// pointer is about to be dereferenced, so nil is rejected too.
    pub(crate) fn execute_chka(&mut self, q: Address) -> VmResult {
        let pointer = self.memory.get_adr(self.sp)?;
        if pointer == 0 {
            return Err(FatalCode::UninitializedPointer.into());
        }
        if pointer == NIL_VALUE {
            if q != 0 {
                return Err(FatalCode::DereferenceOfNilPointer.into());
            }
            return Ok(());
        }
        if pointer < self.gbtop || pointer >= self.np {
            return Err(FatalCode::BadPointerValue.into());
        }
        if self.checks.strict_dispose() && self.is_free(pointer)? {
            return Err(FatalCode::PointerUsedAfterDispose.into());
        }
        Ok(())
    }

    pub(crate) fn execute_chks(&mut self, q: Address) -> VmResult {
        let set = self.memory.get_set(self.sp)?;
        let (low, high) = self.bounds(q)?;
        let outside = (SET_LOW..low).chain(high.saturating_add(1)..=SET_HIGH);
        for element in outside {
            if set.contains(i64::from(element)) {
                return Err(ExceptionCode::SetElementOutOfRange.into());
            }
        }
        Ok(())
    }

    /// Starts a variant selector chain with "no match yet".
    pub(crate) fn execute_cks(&mut self) -> VmResult {
        self.push_int(0)
    }

    pub(crate) fn execute_ckv(&mut self, q: Address) -> VmResult {
        let matched = self.pop_int()?;
        let selector = self.pop_int()?;
        self.push_int(selector)?;
        self.push_bool(Address::from(selector) == q || matched != 0)
    }

    pub(crate) fn execute_cke(&mut self) -> VmResult {
        let matched = self.pop_int()?;
        let _selector = self.pop_int()?;
        if matched == 0 {
            return Err(FatalCode::VariantNotActive.into());
        }
        Ok(())
    }

    /// Peeks the `(tag address, new tag value)` pair that the tag checks
    /// operate on.
    fn tag_operands(&self) -> VmResult<(Address, i32)> {
        let value = self.memory.get_int(self.sp)?;
        let addr = self.memory.get_adr(self.sp + INT_SIZE)?;
        Ok((addr, value))
    }

    fn check_tag_value(&self, value: i32, table: Address) -> VmResult {
        if value < 0 || value >= self.memory.get_int(table)? {
            return Err(ExceptionCode::ValueOutOfRange.into());
        }
        Ok(())
    }

    /// Logical variant number for a tag value, from the table at `table`.
    fn variant_of(&self, table: Address, value: i64) -> VmResult<i32> {
        self.memory.get_int(table + (value + 1) * INT_SIZE)
    }

    /// Rejects a tag change on a record that was allocated with a fixed variant.
    pub(crate) fn execute_cta(&mut self, q: Address, q1: Address, q2: Address) -> VmResult {
        let (addr, value) = self.tag_operands()?;
        let header = addr - q - INT_SIZE;
        let count = self.memory.get_adr(header)?;
        if count < INT_SIZE {
            return Err(FatalCode::SystemError.into());
        }
        let tags = count - ADR_SIZE - 1;
        if tags >= q1 {
            let tag_base = header - tags * INT_SIZE;
            self.check_tag_value(value, q2)?;
            let allocated = self.memory.get_adr(tag_base + (q1 - 1) * INT_SIZE)?;
            if allocated != Address::from(self.variant_of(q2, i64::from(value))?) {
                return Err(FatalCode::ChangeToAllocatedTagField.into());
            }
        }
        Ok(())
    }

    /// Whether storing `value` into the tag at `addr` selects another variant.
    fn changes_variant(
        &self,
        addr: Address,
        value: i32,
        q2: Address,
        wide: bool,
    ) -> VmResult<bool> {
        if !self.memory.is_defined(addr) {
            return Ok(false);
        }
        let current = if wide {
            i64::from(self.memory.get_int(addr)?)
        } else {
            i64::from(self.memory.get_byte(addr)?)
        };
        Ok(self.variant_of(q2, i64::from(value))? != self.variant_of(q2, current)?)
    }

    fn invalidate_variant(
        &mut self,
        q: Address,
        q1: Address,
        q2: Address,
        wide: bool,
    ) -> VmResult {
        let (addr, value) = self.tag_operands()?;
        self.check_tag_value(value, q2)?;
        if self.checks.check_defined && self.changes_variant(addr, value, q2, wide)? {
            self.memory.undefine(addr + q, q1)?;
        }
        Ok(())
    }

    /// Marks the old variant undefined when the tag selects a new one.
    pub(crate) fn execute_ivti(&mut self, q: Address, q1: Address, q2: Address) -> VmResult {
        self.invalidate_variant(q, q1, q2, true)
    }

    pub(crate) fn execute_ivt_byte(&mut self, q: Address, q1: Address, q2: Address) -> VmResult {
        self.invalidate_variant(q, q1, q2, false)
    }

    fn check_variant_change(&self, q: Address, q1: Address, q2: Address, wide: bool) -> VmResult {
        let (addr, value) = self.tag_operands()?;
        self.check_tag_value(value, q2)?;
        if self.changes_variant(addr, value, q2, wide)?
            && self.var_refs.overlaps(addr + q, addr + q + q1 - 1)
        {
            return Err(FatalCode::ChangeToVarReferencedVariant.into());
        }
        Ok(())
    }

    /// Rejects a variant change while part of the variant is bound to a
    /// VAR parameter.
    pub(crate) fn execute_cvbi(&mut self, q: Address, q1: Address, q2: Address) -> VmResult {
        self.check_variant_change(q, q1, q2, true)
    }

    pub(crate) fn execute_cvb_byte(&mut self, q: Address, q1: Address, q2: Address) -> VmResult {
        self.check_variant_change(q, q1, q2, false)
    }
}
