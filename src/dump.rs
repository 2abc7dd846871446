//! A line-oriented disassembler for compiled chunks.
//! Purely a debugging aid; the output is stable enough to read,
//! not stable enough to parse.

use std::fmt::Write;

use crate::common::chunk::Chunk;
use crate::common::opcode::Opcode;

/// Renders `chunk` one instruction per line: byte offset, mnemonic,
/// and the immediate when the opcode carries one.
pub fn dump_chunk(chunk: &Chunk) -> String {
    let mut out = String::new();
    writeln!(out, "; {} constant(s)", chunk.constants.len()).unwrap();

    let mut i = 0;
    let mut count = 0;
    while i < chunk.code.len() {
        match Opcode::try_from(chunk.code[i]) {
            Ok(op) if op.has_operand() => {
                let imm = chunk.code.get(i + 1).copied().unwrap_or(0);
                writeln!(out, "[{:04x}] {:<15}{}", i, op.name(), imm).unwrap();
                i += 2;
            }
            Ok(op) => {
                writeln!(out, "[{:04x}] {}", i, op.name()).unwrap();
                i += 1;
            }
            Err(_) => {
                writeln!(out, "[{:04x}] ??? ({})", i, chunk.code[i]).unwrap();
                i += 1;
            }
        }
        count += 1;
    }

    writeln!(out, "; {} instruction(s)", count).unwrap();
    out
}
