//! Reporte de errores con ubicación.
//!
//! Cada fase reporta sus propios tipos de error envueltos en
//! [`Located`]. [`Diagnostics`] los acumula y los presenta junto con
//! un extracto del código fuente, señalando la región del error.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Errores acumulados durante una ejecución, en orden de aparición.
#[derive(Default)]
pub struct Diagnostics {
    errors: Vec<(&'static str, Box<dyn 'static + LocatedError>)>,
}

impl Diagnostics {
    /// Agrega un error bajo una categoría, como `"Syntax error"`.
    pub fn push<E: 'static + LocatedError>(&mut self, kind: &'static str, error: E) {
        self.errors.push((kind, Box::new(error)));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Categorías y mensajes, sin extractos de código.
    pub fn messages(&self) -> impl Iterator<Item = (&'static str, String)> + '_ {
        self.errors
            .iter()
            .map(|(kind, error)| (*kind, error.source().to_string()))
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for (kind, error) in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in location.start().line()..=location.end().line() {
                location.source().with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                })?
            }

            let from = location.start().column();
            let to = location.end().column().saturating_sub(1).max(1);
            let min = from.min(to);
            let max = from.max(to);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Compilation stopped with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse::Reader, source::Source};

    #[test]
    fn renders_excerpt_with_caret() {
        let source = Source::new("bad.lisp", b"(a\n  . )".to_vec());
        let error = Reader::new(source).read().unwrap_err();

        let mut diagnostics = Diagnostics::default();
        diagnostics.push("Syntax error", error);

        assert_eq!(
            diagnostics.to_string(),
            "Syntax error: Unexpected `)`\n \
             --> bad.lisp:2:5\n  \
             |\n\
             2 |   . )\n  \
             |     ^\n\
             \n\
             Compilation stopped with 1 error\n"
        );
    }

    #[test]
    fn empty_diagnostics() {
        let diagnostics = Diagnostics::default();
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.to_string(), "No errors were reported\n");
    }
}
