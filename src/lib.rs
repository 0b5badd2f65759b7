//! Compilador de s-expressions a una máquina de registros.
//!
//! # Front end
//! El archivo fuente se carga completo en memoria ([`source`]). El
//! lexer en [`lex`] decodifica UTF-8 con [`utf8`] e interna cada
//! lexema en la tabla de [`symbol`], produciendo tokens bajo demanda.
//! El lector en [`parse`] construye s-expressions de nivel superior
//! una a la vez.
//!
//! # Back end
//! Cada forma se traduce en [`semantic`] a una secuencia lineal de
//! instrucciones descritas en [`ir`], resolviendo símbolos como
//! locales, upvalues o referencias dinámicas mediante la cadena de
//! ámbitos de [`scope`]. Finalmente, [`codegen`] emite el listado
//! textual. El ciclo completo está en [`driver`].

#[macro_use]
mod macros;

pub mod codegen;
pub mod driver;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod scope;
pub mod semantic;
pub mod source;
pub mod symbol;
pub mod utf8;
