/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm_types::opcode::{OpCode, OperandShape};
use p6_vm_types::standard::StandardProc;
use p6_vm_types::{ADR_SIZE, Address, SET_SIZE};
use seq_map::SeqMap;
use std::fmt::Write;
use tracing::debug;

/// Position of a `q` operand that is filled in later.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PatchPosition(pub Address);

/// A comment attached to the instruction that starts at `position`.
#[derive(Debug, Clone)]
pub struct Meta {
    pub position: Address,
    pub comment: String,
}

/// Assembles code starting at address zero.
///
/// Literal data (strings, reals and sets) goes into a constant pool that is
/// placed right after the code by [`InstructionBuilder::build`]. Operands
/// that refer to the pool are fixed up at that point.
#[derive(Default)]
pub struct InstructionBuilder {
    code: Vec<u8>,
    pub meta: Vec<Meta>,
    pool: Vec<u8>,
    pool_offsets: SeqMap<Vec<u8>, Address>,
    pool_refs: Vec<(PatchPosition, Address)>,
}

#[must_use]
pub const fn adr_to_bytes(value: Address) -> [u8; 4] {
    (value as i32).to_le_bytes()
}

impl InstructionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn position(&self) -> Address {
        self.code.len() as Address
    }

    fn add_instruction(&mut self, op_code: OpCode, operands: &[u8], comment: &str) {
        assert_eq!(
            operands.len(),
            op_code.operand_shape().len(),
            "wrong operand count for {}",
            op_code.as_string()
        );
        if !comment.is_empty() {
            self.meta.push(Meta {
                position: self.position(),
                comment: comment.to_string(),
            });
        }
        self.code.push(op_code as u8);
        self.code.extend_from_slice(operands);
    }

    pub fn add(&mut self, op_code: OpCode, comment: &str) {
        self.add_instruction(op_code, &[], comment);
    }

    pub fn add_p(&mut self, op_code: OpCode, p: u8, comment: &str) {
        self.add_instruction(op_code, &[p], comment);
    }

    pub fn add_q(&mut self, op_code: OpCode, q: Address, comment: &str) {
        self.add_instruction(op_code, &adr_to_bytes(q), comment);
    }

    pub fn add_pq(&mut self, op_code: OpCode, p: u8, q: Address, comment: &str) {
        let mut operands = vec![p];
        operands.extend_from_slice(&adr_to_bytes(q));
        self.add_instruction(op_code, &operands, comment);
    }

    pub fn add_qq(&mut self, op_code: OpCode, q: Address, q1: Address, comment: &str) {
        let operands = [adr_to_bytes(q), adr_to_bytes(q1)].concat();
        self.add_instruction(op_code, &operands, comment);
    }

    pub fn add_qqq(
        &mut self,
        op_code: OpCode,
        q: Address,
        q1: Address,
        q2: Address,
        comment: &str,
    ) {
        let operands = [adr_to_bytes(q), adr_to_bytes(q1), adr_to_bytes(q2)].concat();
        self.add_instruction(op_code, &operands, comment);
    }

    pub fn add_ldci(&mut self, value: i32, comment: &str) {
        self.add_instruction(OpCode::Ldci, &value.to_le_bytes(), comment);
    }

    pub fn add_ldcc(&mut self, value: u8, comment: &str) {
        self.add_instruction(OpCode::Ldcc, &[value], comment);
    }

    pub fn add_ldcb(&mut self, value: bool, comment: &str) {
        self.add_instruction(OpCode::Ldcb, &[u8::from(value)], comment);
    }

    pub fn add_csp(&mut self, procedure: StandardProc, comment: &str) {
        self.add_instruction(OpCode::Csp, &[procedure as u8], comment);
    }

    /// Adds an instruction whose last `q` operand is patched later.
    pub fn add_q_placeholder(&mut self, op_code: OpCode, comment: &str) -> PatchPosition {
        match op_code.operand_shape() {
            OperandShape::Q => {
                self.add_q(op_code, 0, comment);
            }
            OperandShape::QQ => {
                self.add_qq(op_code, 0, 0, comment);
            }
            shape => panic!(
                "{} has operands {shape:?}, not a trailing q",
                op_code.as_string()
            ),
        }
        PatchPosition(self.position() - ADR_SIZE)
    }

    pub fn add_pq_placeholder(&mut self, op_code: OpCode, p: u8, comment: &str) -> PatchPosition {
        self.add_pq(op_code, p, 0, comment);
        PatchPosition(self.position() - ADR_SIZE)
    }

    /// # Panics
    /// If the patch position is not inside the code.
    pub fn patch(&mut self, patch_position: PatchPosition, value: Address) {
        let start = patch_position.0 as usize;
        assert!(
            start + ADR_SIZE as usize <= self.code.len(),
            "patch position {start} is outside the code"
        );
        self.code[start..start + ADR_SIZE as usize].copy_from_slice(&adr_to_bytes(value));
    }

    pub fn patch_here(&mut self, patch_position: PatchPosition) {
        self.patch(patch_position, self.position());
    }

    fn pool_constant(&mut self, bytes: &[u8]) -> Address {
        if let Some(offset) = self.pool_offsets.get(&bytes.to_vec()) {
            return *offset;
        }
        let offset = self.pool.len() as Address;
        self.pool.extend_from_slice(bytes);
        let _ = self.pool_offsets.insert(bytes.to_vec(), offset);
        offset
    }

    fn add_pool_ref(&mut self, op_code: OpCode, bytes: &[u8], comment: &str) {
        let offset = self.pool_constant(bytes);
        let patch = self.add_q_placeholder(op_code, comment);
        self.pool_refs.push((patch, offset));
    }

    /// Pushes the address of a string constant.
    pub fn add_lca(&mut self, text: &[u8], comment: &str) {
        self.add_pool_ref(OpCode::Lca, text, comment);
    }

    pub fn add_ldcr(&mut self, value: f64, comment: &str) {
        self.add_pool_ref(OpCode::Ldcr, &value.to_le_bytes(), comment);
    }

    /// Pushes a set constant given by its members.
    pub fn add_ldcs(&mut self, members: &[u8], comment: &str) {
        let mut bits = [0u8; SET_SIZE as usize];
        for &member in members {
            bits[usize::from(member / 8)] |= 1 << (member % 8);
        }
        self.add_pool_ref(OpCode::Ldcs, &bits, comment);
    }

    /// Address the code image will end at, which is where the header files
    /// and the globals start.
    #[must_use]
    pub fn code_end(&self) -> Address {
        self.position() + self.pool.len() as Address
    }

    /// The code followed by the constant pool, with pool references fixed up.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let base = self.position();
        let mut image = self.code.clone();
        for (patch, offset) in &self.pool_refs {
            let start = patch.0 as usize;
            image[start..start + ADR_SIZE as usize].copy_from_slice(&adr_to_bytes(base + offset));
        }
        image.extend_from_slice(&self.pool);
        debug!(code = base, pool = self.pool.len(), "built code image");
        image
    }

    #[must_use]
    pub fn to_deck(&self) -> String {
        image_to_deck(&self.build())
    }
}

/// Renders an image as deck records of at most 16 bytes, ended by an empty
/// record at the final address.
#[must_use]
pub fn image_to_deck(image: &[u8]) -> String {
    let mut deck = String::new();
    for (index, chunk) in image.chunks(16).enumerate() {
        let address = index * 16;
        let _ = write!(deck, ":{:02X}{address:016X}", chunk.len());
        for byte in chunk {
            let _ = write!(deck, "{byte:02X}");
        }
        let checksum = chunk.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));
        let _ = writeln!(deck, "{checksum:02X}");
    }
    let _ = writeln!(deck, ":00{:016X}00", image.len());
    deck
}
