//! Ciclo principal de compilación.
//!
//! Se lee una forma de nivel superior a la vez, se imprime su árbol,
//! se compila y se imprime su listado. Un error de compilación se
//! reporta y se continúa con la siguiente forma; un error léxico o
//! sintáctico detiene la lectura, ya que no hay forma confiable de
//! resincronizar el lector.

use std::{
    io::{self, Write},
    rc::Rc,
};

use bitflags::bitflags;

use crate::{
    codegen,
    error::Diagnostics,
    parse::Reader,
    semantic::Compiler,
    source::{Located, Source},
    symbol::SymbolTable,
};

bitflags! {
    /// Secciones a incluir en la salida.
    pub struct EmitOptions: u32 {
        /// Forma estructural de cada forma leída.
        const TREE = 0x01;

        /// Listado de instrucciones de cada forma compilada.
        const CODE = 0x02;

        /// Volcado de la tabla de símbolos al terminar.
        const SYMBOLS = 0x04;
    }
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions::TREE | EmitOptions::CODE
    }
}

/// Resultado de una ejecución completa.
pub struct Report {
    pub diagnostics: Diagnostics,
    pub symbols: SymbolTable,
    pub forms: usize,
}

/// Compila todas las formas de `source`, escribiendo en `output`.
pub fn run<W: Write>(source: Rc<Source>, options: EmitOptions, output: &mut W) -> io::Result<Report> {
    let mut reader = Reader::new(source);
    let mut compiler = Compiler::new();
    let mut diagnostics = Diagnostics::default();
    let mut forms = 0;

    while !reader.eof() {
        let form = match reader.read() {
            Ok(Some(form)) => form,
            Ok(None) => break,
            Err(error) => {
                diagnostics.push("Syntax error", error);
                break;
            }
        };

        forms += 1;
        if options.contains(EmitOptions::TREE) {
            writeln!(output, "{}", form.val())?;
            writeln!(output)?;
        }

        match compiler.compile(form.val(), reader.symbols()) {
            Ok(code) => {
                if options.contains(EmitOptions::CODE) {
                    codegen::emit(&code, output)?;
                    writeln!(output)?;
                }
            }

            Err(error) => {
                let location = form.location().clone();
                diagnostics.push("Compile error", Located::at(error, location));
            }
        }
    }

    let symbols = reader.into_symbols();
    if options.contains(EmitOptions::SYMBOLS) {
        dump_symbols(&symbols, output)?;
    }

    Ok(Report {
        diagnostics,
        symbols,
        forms,
    })
}

fn dump_symbols<W: Write>(symbols: &SymbolTable, output: &mut W) -> io::Result<()> {
    for (id, category, _) in symbols.iter() {
        writeln!(output, "{:>6} {:<12} {:?}", id, category, symbols.display(id))?;
    }

    Ok(())
}
