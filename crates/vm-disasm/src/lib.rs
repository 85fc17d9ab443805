/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm_types::Address;
use p6_vm_types::opcode::{OpCode, OperandShape};
use p6_vm_types::standard::StandardProc;
use seq_map::SeqMap;
use std::fmt::Write;
use tracing::trace;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operands {
    Bare,
    P(u8),
    Q(Address),
    PQ(u8, Address),
    QQ(Address, Address),
    QQQ(Address, Address, Address),
    Int(i32),
    Byte(u8),
}

impl Operands {
    /// The `q` operands in encoding order.
    fn words(&self) -> Vec<Address> {
        match *self {
            Self::Q(q) | Self::PQ(_, q) => vec![q],
            Self::QQ(q, q1) => vec![q, q1],
            Self::QQQ(q, q1, q2) => vec![q, q1, q2],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DecodedInstruction {
    pub address: Address,
    pub opcode: OpCode,
    pub operands: Operands,
}

impl DecodedInstruction {
    #[must_use]
    pub fn jump_target(&self) -> Option<Address> {
        let index = self.opcode.jump_target_operand()?;
        self.operands.words().get(index).copied()
    }
}

/// One step of the walk: either an instruction or a byte that does not
/// start one.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Decoded {
    Instruction(DecodedInstruction),
    Invalid { address: Address, byte: u8 },
    Truncated { address: Address, opcode: OpCode },
}

fn word(bytes: &[u8]) -> Address {
    Address::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decodes the instruction at `offset` of `code`, where `code` starts at
/// address `base`. Returns the decoded item and its encoded length.
#[must_use]
pub fn decode(code: &[u8], base: Address, offset: usize) -> (Decoded, usize) {
    let address = base + offset as Address;
    let byte = code[offset];
    let Ok(opcode) = OpCode::try_from(byte) else {
        return (Decoded::Invalid { address, byte }, 1);
    };
    let shape = opcode.operand_shape();
    let start = offset + 1;
    let end = start + shape.len();
    if end > code.len() {
        return (Decoded::Truncated { address, opcode }, code.len() - offset);
    }
    let args = &code[start..end];
    let operands = match shape {
        OperandShape::Bare => Operands::Bare,
        OperandShape::P => Operands::P(args[0]),
        OperandShape::Q => Operands::Q(word(args)),
        OperandShape::PQ => Operands::PQ(args[0], word(&args[1..])),
        OperandShape::QQ => Operands::QQ(word(args), word(&args[4..])),
        OperandShape::QQQ => Operands::QQQ(word(args), word(&args[4..]), word(&args[8..])),
        OperandShape::InlineInt => Operands::Int(word(args) as i32),
        OperandShape::InlineByte => Operands::Byte(args[0]),
    };
    (
        Decoded::Instruction(DecodedInstruction {
            address,
            opcode,
            operands,
        }),
        1 + shape.len(),
    )
}

#[must_use]
pub fn decode_all(code: &[u8], base: Address) -> Vec<Decoded> {
    let mut offset = 0;
    let mut items = Vec::new();
    while offset < code.len() {
        let (item, len) = decode(code, base, offset);
        items.push(item);
        offset += len;
    }
    trace!(count = items.len(), "decoded");
    items
}

/// Names every jump target `L1`, `L2`, ... in the order they are first seen.
#[must_use]
pub fn collect_labels(items: &[Decoded]) -> SeqMap<Address, String> {
    let mut labels = SeqMap::new();
    let mut count = 0;
    for item in items {
        if let Decoded::Instruction(instruction) = item {
            if let Some(target) = instruction.jump_target() {
                if labels.get(&target).is_none() {
                    count += 1;
                    let _ = labels.insert(target, format!("L{count}"));
                }
            }
        }
    }
    labels
}

fn operand_text(instruction: &DecodedInstruction, labels: &SeqMap<Address, String>) -> String {
    let target_index = instruction.opcode.jump_target_operand();
    let word_text = |index: usize, value: Address| -> String {
        if target_index == Some(index) {
            labels
                .get(&value)
                .map_or_else(|| value.to_string(), |label| format!("{label} ({value})"))
        } else {
            value.to_string()
        }
    };
    match instruction.operands {
        Operands::Bare => String::new(),
        Operands::P(p) => p.to_string(),
        Operands::Q(q) => word_text(0, q),
        Operands::PQ(p, q) => format!("{p} {}", word_text(0, q)),
        Operands::QQ(q, q1) => format!("{} {}", word_text(0, q), word_text(1, q1)),
        Operands::QQQ(q, q1, q2) => format!(
            "{} {} {}",
            word_text(0, q),
            word_text(1, q1),
            word_text(2, q2)
        ),
        Operands::Int(value) => value.to_string(),
        Operands::Byte(value) => {
            if instruction.opcode == OpCode::Csp {
                StandardProc::try_from(value)
                    .map_or_else(|()| format!("?{value}"), |procedure| procedure.to_string())
            } else {
                value.to_string()
            }
        }
    }
}

#[must_use]
pub fn disasm_no_color(code: &[u8], base: Address) -> String {
    let items = decode_all(code, base);
    let labels = collect_labels(&items);
    let mut out = String::new();
    for item in &items {
        match item {
            Decoded::Instruction(instruction) => {
                if let Some(label) = labels.get(&instruction.address) {
                    let _ = writeln!(out, "{label}:");
                }
                let operands = operand_text(instruction, &labels);
                let _ = writeln!(
                    out,
                    "{:08X}: {:<5} {operands}",
                    instruction.address,
                    instruction.opcode.as_string()
                );
            }
            Decoded::Invalid { address, byte } => {
                let _ = writeln!(out, "{address:08X}: .byte {byte}");
            }
            Decoded::Truncated { address, opcode } => {
                let _ = writeln!(out, "{address:08X}: {opcode} <truncated>");
            }
        }
    }
    out.lines().map(str::trim_end).collect::<Vec<_>>().join("\n") + "\n"
}

#[must_use]
pub fn disasm_color(code: &[u8], base: Address) -> String {
    let items = decode_all(code, base);
    let labels = collect_labels(&items);
    let mut out = String::new();
    for item in &items {
        match item {
            Decoded::Instruction(instruction) => {
                if let Some(label) = labels.get(&instruction.address) {
                    let _ = writeln!(out, "{}", tinter::bright_cyan(format!("{label}:")));
                }
                let operands = operand_text(instruction, &labels);
                let operands = if instruction.opcode == OpCode::Csp {
                    format!("{}", tinter::magenta(operands))
                } else if instruction.jump_target().is_some() {
                    format!("{}", tinter::cyan(operands))
                } else {
                    format!("{}", tinter::yellow(operands))
                };
                let _ = writeln!(
                    out,
                    "{} {} {operands}",
                    tinter::bright_black(format!("{:08X}:", instruction.address)),
                    tinter::blue(format!("{:<5}", instruction.opcode.as_string())),
                );
            }
            Decoded::Invalid { address, byte } => {
                let _ = writeln!(
                    out,
                    "{} {}",
                    tinter::bright_black(format!("{address:08X}:")),
                    tinter::red(format!(".byte {byte}"))
                );
            }
            Decoded::Truncated { address, opcode } => {
                let _ = writeln!(
                    out,
                    "{} {}",
                    tinter::bright_black(format!("{address:08X}:")),
                    tinter::red(format!("{opcode} <truncated>"))
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: i32) -> [u8; 4] {
        value.to_le_bytes()
    }

    #[test]
    fn labels_and_procedure_names() {
        let mut code = vec![OpCode::Ujp as u8];
        code.extend(q(7));
        code.push(OpCode::Csp as u8);
        code.push(StandardProc::Wln as u8);
        code.push(OpCode::Stp as u8);
        let text = disasm_no_color(&code, 0);
        assert_eq!(
            text,
            "00000000: ujp   L1 (7)\n00000005: csp   wln\nL1:\n00000007: stp\n"
        );
    }

    #[test]
    fn invalid_and_truncated() {
        let items = decode_all(&[255, OpCode::Ldci as u8, 1], 16);
        assert_eq!(
            items,
            vec![
                Decoded::Invalid {
                    address: 16,
                    byte: 255
                },
                Decoded::Truncated {
                    address: 17,
                    opcode: OpCode::Ldci
                }
            ]
        );
    }

    #[test]
    fn second_word_of_cjp_is_the_target() {
        let mut code = vec![OpCode::Cjp as u8];
        code.extend(q(3));
        code.extend(q(9));
        let (Decoded::Instruction(instruction), len) = decode(&code, 0, 0) else {
            panic!("expected an instruction");
        };
        assert_eq!(len, 9);
        assert_eq!(instruction.jump_target(), Some(9));
    }
}
