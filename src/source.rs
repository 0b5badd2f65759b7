//! Rastreo de ubicaciones originales en código fuente.
//!
//! El lexer trabaja sobre desplazamientos de bytes en el búfer de
//! entrada. Para reportar errores, esos rangos de bytes se traducen
//! a posiciones línea-columna con [`Source::locate()`], de forma que
//! los diagnósticos puedan señalar un punto exacto o aproximado del
//! programa original.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

use crate::utf8;

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Nombre de origen y contenido completo del archivo.
///
/// El contenido se carga en memoria completo antes de cualquier
/// análisis; ninguna fase posterior realiza E/S.
pub struct Source {
    name: String,
    bytes: Vec<u8>,
}

impl Source {
    /// Construye un origen compartido a partir de un nombre y su contenido.
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Rc<Self> {
        Rc::new(Source {
            name: name.into(),
            bytes,
        })
    }

    /// Nombre con el cual se reporta este origen.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes crudos del origen.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Traduce un rango de bytes a una ubicación línea-columna.
    ///
    /// Un rango vacío (por ejemplo, el final del archivo) se extiende a
    /// una columna para que siempre haya algo que señalar.
    pub fn locate(self: &Rc<Self>, range: Range<usize>) -> Location {
        let mut cursor = 0;
        let mut here = Position::default();
        let mut start = None;

        while cursor < range.end.min(self.bytes.len()) {
            if cursor >= range.start && start.is_none() {
                start = Some(here);
            }

            here = match utf8::decode(&self.bytes, &mut cursor) {
                0x0a => here.newline(),
                0x09 => here.tab(),
                _ => here.advance(),
            };
        }

        let start = start.unwrap_or(here);
        let end = if here == start { start.advance() } else { here };

        Location {
            from: Rc::clone(self),
            position: start..end,
        }
    }

    /// Invoca a `callback` con el texto de una línea, empezando en 1.
    pub fn with_line<F, R>(&self, line_number: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let line = self
            .bytes
            .split(|&byte| byte == b'\n')
            .nth(line_number.saturating_sub(1) as usize)
            .unwrap_or(&[]);

        callback(String::from_utf8_lossy(line).trim_end_matches('\r'))
    }
}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Origen al que pertenece esta ubicación.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() || end.line() != start.line() {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_columns_and_lines() {
        let source = Source::new("test.lisp", b"(cons 1\n  2)".to_vec());

        let one = source.locate(6..7);
        assert_eq!(one.start(), Position { line: 1, column: 7 });
        assert_eq!(one.end(), Position { line: 1, column: 8 });

        let two = source.locate(10..11);
        assert_eq!(two.start(), Position { line: 2, column: 3 });
        assert_eq!(two.to_string(), "test.lisp:2:3");
    }

    #[test]
    fn empty_range_at_end_still_points_somewhere() {
        let source = Source::new("test.lisp", b"(a".to_vec());
        let eof = source.locate(2..2);

        assert_eq!(eof.start(), Position { line: 1, column: 3 });
        assert_eq!(eof.end(), eof.start().advance());
    }

    #[test]
    fn tabs_jump_to_next_stop() {
        let source = Source::new("test.lisp", b"\tx".to_vec());
        assert_eq!(source.locate(1..2).start().column(), 5);
    }
}
