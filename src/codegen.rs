//! Emisión del listado de instrucciones.
//!
//! Cada instrucción ocupa una línea con la forma `MNEMÓNICO op, op, op`.
//! Los registros se escriben como `rN` y las etiquetas como `LN`. Los
//! strings y símbolos se escriben por su [`crate::symbol::TokenId`];
//! un consumidor posterior los resuelve con la tabla de símbolos.

use std::io::{self, Write};

use crate::ir::Instruction;

/// Escribe un listado completo.
pub fn emit<W: Write>(instructions: &[Instruction], output: &mut W) -> io::Result<()> {
    for instruction in instructions {
        put_instruction(instruction, output)?;
    }

    Ok(())
}

fn put_instruction<W: Write>(instruction: &Instruction, output: &mut W) -> io::Result<()> {
    use Instruction::*;

    let opcode = instruction.mnemonic();
    match *instruction {
        LoadTrue(reg) | LoadFalse(reg) => emit!(output, opcode, "{}", reg),

        LoadNumber(reg, value) => emit!(output, opcode, "{}, {}", reg, value),
        LoadCharacter(reg, code_point) => emit!(output, opcode, "{}, {}", reg, code_point),

        LoadString(reg, id) | LoadDynamic(reg, id) | LoadUpvalue(reg, id) => {
            emit!(output, opcode, "{}, {}", reg, id)
        }

        Move(dst, src) | Car(dst, src) | Cdr(dst, src) | Atom(dst, src) => {
            emit!(output, opcode, "{}, {}", dst, src)
        }

        Cons(dst, a, b) | Eq(dst, a, b) => emit!(output, opcode, "{}, {}, {}", dst, a, b),

        Branch(label) | SetLabel(label) => emit!(output, opcode, "{}", label),
        BranchIfFalse(reg, label) => emit!(output, opcode, "{}, {}", reg, label),
    }
}
