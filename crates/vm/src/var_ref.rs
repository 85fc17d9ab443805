/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::Address;
use p6_vm_types::exception::FatalCode;

/// Store ranges currently bound to VAR parameters, innermost last.
#[derive(Debug, Default)]
pub struct VarRefList {
    ranges: Vec<(Address, Address)>,
}

impl VarRefList {
    /// Registers the inclusive range `start..=end`.
    pub fn enter(&mut self, start: Address, end: Address) {
        self.ranges.push((start, end));
    }

    pub fn exit(&mut self) -> VmResult {
        self.ranges
            .pop()
            .map(|_| ())
            .ok_or_else(|| FatalCode::VarListEmpty.into())
    }

    /// True when any registered range intersects `start..=end`.
    #[must_use]
    pub fn overlaps(&self, start: Address, end: Address) -> bool {
        self.ranges.iter().any(|&(s, e)| e >= start && s <= end)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl Vm {
    pub(crate) fn execute_vbs(&mut self, q: Address) -> VmResult {
        let addr = self.pop_adr()?;
        self.var_refs.enter(addr, addr + q - 1);
        Ok(())
    }

    pub(crate) fn execute_vbe(&mut self) -> VmResult {
        self.var_refs.exit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_inclusive() {
        let mut list = VarRefList::default();
        list.enter(100, 103);
        assert!(list.overlaps(103, 110));
        assert!(list.overlaps(90, 100));
        assert!(!list.overlaps(104, 110));
        assert!(!list.overlaps(90, 99));
    }

    #[test]
    fn exit_on_empty_list_fails() {
        let mut list = VarRefList::default();
        list.enter(0, 1);
        assert!(list.exit().is_ok());
        assert_eq!(
            list.exit(),
            Err(crate::Fault::Fatal(FatalCode::VarListEmpty))
        );
    }
}
