//! Conjunto de instrucciones de la máquina de registros.

use std::fmt::{self, Display};

use crate::{symbol::TokenId, utf8::CodePoint};

/// Índice de registro.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(pub u32);

impl Reg {
    /// Registro inmediatamente siguiente.
    pub fn next(self) -> Reg {
        Reg(self.0 + 1)
    }
}

impl Display for Reg {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "r{}", self.0)
    }
}

/// Destino de salto, único en toda una compilación.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "L{}", self.0)
    }
}

/// Una instrucción. Los operandos de destino van primero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    LoadTrue(Reg),
    LoadFalse(Reg),
    LoadNumber(Reg, i64),
    LoadCharacter(Reg, CodePoint),

    /// El contenido del string se resuelve en la tabla de símbolos.
    LoadString(Reg, TokenId),

    /// Símbolo no definido léxicamente.
    LoadDynamic(Reg, TokenId),

    /// Símbolo definido en un marco exterior.
    LoadUpvalue(Reg, TokenId),

    Move(Reg, Reg),
    Cons(Reg, Reg, Reg),
    Car(Reg, Reg),
    Cdr(Reg, Reg),
    Atom(Reg, Reg),
    Eq(Reg, Reg, Reg),
    Branch(Label),
    BranchIfFalse(Reg, Label),
    SetLabel(Label),
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;

        match self {
            LoadTrue(..)      => "LOAD_TRUE",
            LoadFalse(..)     => "LOAD_FALSE",
            LoadNumber(..)    => "LOAD_NUMBER",
            LoadCharacter(..) => "LOAD_CHARACTER",
            LoadString(..)    => "LOAD_STRING",
            LoadDynamic(..)   => "LOAD_DYNAMIC",
            LoadUpvalue(..)   => "LOAD_UPVALUE",
            Move(..)          => "MOVE",
            Cons(..)          => "CONS",
            Car(..)           => "CAR",
            Cdr(..)           => "CDR",
            Atom(..)          => "ATOM",
            Eq(..)            => "EQ",
            Branch(..)        => "BRANCH",
            BranchIfFalse(..) => "BRANCH_IF_FALSE",
            SetLabel(..)      => "LABEL",
        }
    }
}
