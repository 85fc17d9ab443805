/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::{Vm, VmResult};
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::{ADR_SIZE, Address, HEAP_ALIGN, INT_SIZE, NIL_VALUE, RESERVED_SPACE, align};
use tracing::trace;

/// One block in the heap chain.
///
/// Every block starts with a length word that includes the word itself.
/// A negative length marks the block allocated, a positive one free. A free
/// block of exactly one word is a disposal marker that is never reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeapBlock {
    pub addr: Address,
    pub len: Address,
    pub allocated: bool,
}

impl Vm {
    fn block_header(&self, addr: Address) -> VmResult<Address> {
        let len = self.memory.get_adr(addr)?;
        if len.abs() < HEAP_ALIGN || addr + len.abs() > self.np {
            return Err(FatalCode::HeapFormatInvalid.into());
        }
        Ok(len)
    }

    /// Walks the heap from `gbtop` to `np`.
    pub fn heap_blocks(&self) -> VmResult<Vec<HeapBlock>> {
        let mut blocks = Vec::new();
        let mut addr = self.gbtop;
        while addr < self.np {
            let len = self.block_header(addr)?;
            blocks.push(HeapBlock {
                addr,
                len: len.abs(),
                allocated: len < 0,
            });
            addr += len.abs();
        }
        Ok(blocks)
    }

    /// First fit from the bottom of the heap. Splits the block when the
    /// remainder can hold another header.
    fn find_free(&mut self, len: Address) -> VmResult<Option<Address>> {
        let mut addr = self.gbtop;
        while addr < self.np {
            let block_len = self.block_header(addr)?;
            if block_len > ADR_SIZE && block_len >= len + ADR_SIZE {
                self.memory.put_adr(addr, -block_len)?;
                if block_len > len + ADR_SIZE + ADR_SIZE + RESERVED_SPACE {
                    self.memory.put_adr(addr, -(len + ADR_SIZE))?;
                    let rest = addr + len + ADR_SIZE;
                    self.memory.put_adr(rest, block_len - (len + ADR_SIZE))?;
                }
                return Ok(Some(addr + ADR_SIZE));
            }
            addr += block_len.abs();
        }
        Ok(None)
    }

    /// Allocates `len` bytes and returns the address of the payload, which
    /// is cleared and left undefined.
    pub(crate) fn new_space(&mut self, len: Address) -> VmResult<Address> {
        if len < 0 {
            return Err(ExceptionCode::SpaceAllocateNegative.into());
        }
        let mut len = align(len, ADR_SIZE);
        let block = if let Some(block) = self.find_free(len)? {
            block
        } else {
            let addr = self.np;
            let unaligned_top = self.np + len + ADR_SIZE;
            let top = align(unaligned_top, HEAP_ALIGN);
            if top > self.sp {
                return Err(ExceptionCode::SpaceAllocateFail.into());
            }
            len += top - unaligned_top;
            self.np = top;
            self.memory.put_adr(addr, -(len + ADR_SIZE))?;
            addr + ADR_SIZE
        };
        trace!(block, len, "new");
        if len > 0 {
            self.memory.clear(block, len)?;
            self.memory.undefine(block, len)?;
        }
        Ok(block)
    }

    /// Releases the block whose payload starts at `block`.
    pub(crate) fn dispose_space(&mut self, block: Address) -> VmResult {
        if block == 0 {
            return Err(FatalCode::DisposeOfUninitializedPointer.into());
        }
        if block == NIL_VALUE {
            return Err(FatalCode::DisposeOfNilPointer.into());
        }
        if block < self.gbtop || block >= self.np {
            return Err(FatalCode::BadPointerValue.into());
        }
        let header = block - ADR_SIZE;
        let len = self.memory.get_adr(header)?;
        if len >= 0 {
            return Err(FatalCode::BlockAlreadyFreed.into());
        }
        trace!(block, len = -len, "dispose");
        if self.checks.strict_dispose() {
            let len = len.abs();
            if len >= ADR_SIZE * 2 {
                let rest = len - ADR_SIZE;
                let rest = if self.checks.no_recycle_partial { -rest } else { rest };
                self.memory.put_adr(header + ADR_SIZE, rest)?;
            }
            self.memory.put_adr(header, ADR_SIZE)
        } else if self.checks.recycle {
            self.memory.put_adr(header, len.abs())?;
            self.coalesce()
        } else {
            Ok(())
        }
    }

    /// Merges adjacent free blocks and returns free space at the top of the
    /// heap to the gap between heap and stack.
    pub fn coalesce(&mut self) -> VmResult {
        let mut trailing_free = None;
        let mut addr = self.gbtop;
        while addr < self.np {
            let len = self.block_header(addr)?;
            if len >= 0 {
                trailing_free.get_or_insert(addr);
            } else {
                trailing_free = None;
            }
            addr += len.abs();
        }
        if let Some(top) = trailing_free {
            self.np = top;
        }

        let mut addr = self.gbtop;
        while addr < self.np {
            let len = self.memory.get_adr(addr)?;
            if len >= 0 {
                let next = addr + len;
                if next < self.np {
                    let next_len = self.memory.get_adr(next)?;
                    if next_len >= 0 {
                        self.memory.put_adr(addr, len + next_len)?;
                    } else {
                        addr = next + next_len.abs();
                    }
                } else {
                    addr = next;
                }
            } else {
                addr += len.abs();
            }
        }
        Ok(())
    }

    /// True when the block was disposed under strict disposal.
    pub(crate) fn is_free(&self, block: Address) -> VmResult<bool> {
        Ok(self.memory.get_adr(block - ADR_SIZE)? == ADR_SIZE)
    }

    pub(crate) fn sp_new(&mut self) -> VmResult {
        let len = self.pop_adr()?;
        let block = self.new_space(len)?;
        let dest = self.pop_adr()?;
        self.memory.put_adr(dest, block)
    }

    pub(crate) fn sp_dispose(&mut self) -> VmResult {
        let len = self.pop_adr()?;
        let block = self.pop_adr()?;
        if self.var_refs.overlaps(block, block + len - 1) {
            return Err(FatalCode::DisposeOfVarReferencedBlock.into());
        }
        self.dispose_space(block)
    }

    /// Zero tag lists get one padding word when partial recycling is off,
    /// so that the freed marker never overlaps the record.
    const fn tag_padding(&self, tags: i32) -> Address {
        if tags == 0 && self.checks.no_recycle_partial {
            1
        } else {
            0
        }
    }

    /// Allocates a variant record with its selected tags stored below it.
    ///
    /// Block layout: `[tags][tag count word][record]`. The count word holds
    /// `tags + ADR_SIZE + 1`, so it can never be confused with a freed marker.
    pub(crate) fn sp_new_tagged(&mut self) -> VmResult {
        let len = self.pop_adr()?;
        let tags = self.pop_int()?;
        let padding = self.tag_padding(tags);
        let tag_words = Address::from(tags) + padding;
        let block = self.new_space(len + (tag_words + 1) * INT_SIZE)?;
        let mut at = block + tag_words * INT_SIZE;
        self.memory.put_int(at, tags + ADR_SIZE as i32 + 1)?;
        for _ in 0..tags {
            at -= INT_SIZE;
            let tag = self.pop_int()?;
            self.memory.put_int(at, tag)?;
        }
        let dest = self.pop_adr()?;
        self.memory.put_adr(dest, block + (tag_words + 1) * INT_SIZE)
    }

    pub(crate) fn sp_dispose_tagged(&mut self) -> VmResult {
        let len = self.pop_adr()?;
        let tags = self.pop_int()?;
        let padding = self.tag_padding(tags);
        let tag_count = Address::from(tags);
        let record = self.memory.get_adr(self.sp + tag_count * INT_SIZE)?;
        let count = Address::from(self.memory.get_int(record - INT_SIZE)?);
        if count <= ADR_SIZE {
            return Err(FatalCode::BlockAlreadyFreed.into());
        }
        if tag_count != count - ADR_SIZE - 1 {
            return Err(FatalCode::NewDisposeTagsMismatch.into());
        }
        for index in 0..tag_count {
            let stored = self.memory.get_int(record - INT_SIZE * (2 + index))?;
            let given = self.memory.get_int(self.sp + index * INT_SIZE)?;
            if stored != given {
                return Err(FatalCode::NewDisposeTagsMismatch.into());
            }
        }
        let block = record - (tag_count + 1 + padding) * INT_SIZE;
        let total = len + (tag_count + 1 + padding) * INT_SIZE;
        if self.var_refs.overlaps(block, block + total - 1) {
            return Err(FatalCode::DisposeOfVarReferencedBlock.into());
        }
        self.dispose_space(block)?;
        self.sp += tag_count * INT_SIZE;
        let record = self.pop_adr()?;
        if self.checks.no_recycle_partial {
            self.memory.put_adr(record - ADR_SIZE, ADR_SIZE)?;
        }
        Ok(())
    }
}
