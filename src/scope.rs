//! Cadena de ámbitos léxicos.
//!
//! Cada marco asocia símbolos a registros, asignados densamente en
//! orden de definición. Un marco anidado toma prestado a su marco
//! exterior de forma inmutable; solo el marco actual admite nuevas
//! definiciones.

use std::collections::HashMap;

use crate::{ir::Reg, symbol::TokenId};

/// Resultado de resolver un símbolo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Definido en el marco actual.
    Local(Reg),

    /// Definido en algún marco exterior.
    Upvalue,

    /// No definido léxicamente; se resuelve dinámicamente.
    NotFound,
}

/// Un marco de la cadena.
pub struct Scope<'a> {
    outer: Option<&'a Scope<'a>>,
    registers: HashMap<TokenId, Reg>,
}

impl Scope<'static> {
    /// Marco raíz, sin marco exterior.
    pub fn root() -> Self {
        Scope {
            outer: None,
            registers: HashMap::new(),
        }
    }
}

impl<'a> Scope<'a> {
    /// Marco anidado dentro de `outer`.
    pub fn nested(outer: &'a Scope<'a>) -> Self {
        Scope {
            outer: Some(outer),
            registers: HashMap::new(),
        }
    }

    pub fn find(&self, id: TokenId) -> Resolution {
        if let Some(&reg) = self.registers.get(&id) {
            return Resolution::Local(reg);
        }

        let mut outer = self.outer;
        while let Some(scope) = outer {
            if scope.registers.contains_key(&id) {
                return Resolution::Upvalue;
            }

            outer = scope.outer;
        }

        Resolution::NotFound
    }

    /// Define `id` en el siguiente registro libre de este marco.
    ///
    /// Falla sin efectos si `id` ya está definido en este mismo marco.
    pub fn define(&mut self, id: TokenId) -> bool {
        if self.registers.contains_key(&id) {
            return false;
        }

        let reg = self.base_register();
        self.registers.insert(id, reg);
        true
    }

    /// Primer registro libre: cantidad de registros ocupados.
    pub fn base_register(&self) -> Reg {
        Reg(self.registers.len() as u32)
    }

    /// Descarta toda definición en o después de `base`.
    pub fn truncate(&mut self, base: Reg) {
        self.registers.retain(|_, reg| *reg < base);
    }
}
