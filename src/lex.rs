//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. El lexer decodifica el búfer
//! de entrada punto de código por punto de código (ver [`crate::utf8`])
//! y produce tokens bajo demanda: cada llamada a
//! [`Lexer::next_token_id()`] consume exactamente un token. Los espacios
//! en blanco y los comentarios de línea (`;`) se descartan.
//!
//! # Contenido de un token
//! Un token no es más que un [`TokenId`] internado en la [`SymbolTable`]
//! que el lexer posee. Puntuación, prefijos y booleanos corresponden a
//! ids reservados; el resto de lexemas se internan con su categoría.
//! Los literales de string conservan sus comillas y los de carácter su
//! prefijo `#\`, de forma que nunca colisionan con identificadores.
//!
//! # Errores
//! El contrato del lexer es retornar siempre un [`TokenId`]. Tanto el
//! fin de la entrada como una entrada malformada producen
//! [`reserved::NIL`]. Para distinguir ambos casos, una entrada
//! malformada deja además un [`LexError`] disponible en
//! [`Lexer::error()`] hasta la siguiente llamada.

use std::{ops::Range, rc::Rc};

use thiserror::Error;

use crate::{
    source::Source,
    symbol::{reserved, Category, SymbolTable, TokenId},
    utf8::{self, CodePoint, INVALID},
};

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// Secuencia UTF-8 inválida en el flujo de entrada.
    #[error("Malformed UTF-8 sequence in input stream")]
    MalformedUtf8,

    /// Carácter que no puede iniciar ningún token.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// El flujo terminó antes de cerrar un literal de string.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// `#` debe ir seguido de `t`, `f` o `\`.
    #[error("Expected `t`, `f` or `\\` after `#`")]
    BadHash,

    /// `#\` debe ir seguido de exactamente un carácter.
    #[error("Expected a character after `#\\`")]
    BadCharacter,
}

/// Posición guardada del lexer, para retroceder tras un lookahead.
#[derive(Copy, Clone, Debug)]
pub struct Checkpoint(usize);

/// Lexer incremental sobre un búfer en memoria.
pub struct Lexer {
    source: Rc<Source>,
    cursor: usize,
    start: usize,
    symbols: SymbolTable,
    error: Option<LexError>,
}

impl Lexer {
    /// Crea un lexer al inicio de `source`, con una tabla nueva.
    pub fn new(source: Rc<Source>) -> Self {
        Lexer::with_symbols(source, SymbolTable::new())
    }

    /// Crea un lexer que continúa internando sobre una tabla existente.
    pub fn with_symbols(source: Rc<Source>, symbols: SymbolTable) -> Self {
        Lexer {
            source,
            cursor: 0,
            start: 0,
            symbols,
            error: None,
        }
    }

    /// Consume y clasifica el siguiente token.
    pub fn next_token_id(&mut self) -> TokenId {
        self.error = None;

        loop {
            self.skip_whitespace();
            if self.peek_char() == Some(';') {
                self.skip_line();
            } else {
                break;
            }
        }

        self.start = self.cursor;
        let first = match self.bump() {
            None => return reserved::NIL,
            Some(INVALID) => return self.fail(LexError::MalformedUtf8),
            Some(first) => first,
        };

        let first = match utf8::to_char(first) {
            Some(c) => c,
            None => return self.fail(LexError::MalformedUtf8),
        };

        match first {
            '(' => reserved::OPEN,
            ')' => reserved::CLOSE,
            '\'' => reserved::QUOTE_PREFIX,
            '`' => reserved::QUASIQUOTE,

            // `,@` requiere un carácter de lookahead
            ',' if self.eat('@') => reserved::UNQUOTE_SPLICING,
            ',' => reserved::UNQUOTE,

            '"' => self.string(),
            '#' => self.hash(),

            '.' if self.next_is_digit() => self.number(first),
            '.' => {
                let checkpoint = self.checkpoint();
                if self.eat('.') && self.eat('.') {
                    reserved::ELLIPSIS
                } else {
                    self.rewind(checkpoint);
                    reserved::DOT
                }
            }

            // Un signo sin dígito es siempre un identificador de un carácter
            '+' | '-' if self.next_is_digit() => self.number(first),
            '+' | '-' => self
                .symbols
                .intern(&[first as CodePoint], Category::Identifier),

            c if c.is_ascii_digit() => self.number(first),

            c if is_word_char(c) => self.word(first),
            c => self.fail(LexError::BadChar(c)),
        }
    }

    /// Determina si se consumió la totalidad del búfer.
    ///
    /// Espacios en blanco al final no cuentan como consumidos hasta que
    /// un intento de lectura los descarte.
    pub fn eof(&self) -> bool {
        self.cursor >= self.source.bytes().len()
    }

    /// Error que acompañó al último [`reserved::NIL`] emitido, si lo hubo.
    pub fn error(&self) -> Option<&LexError> {
        self.error.as_ref()
    }

    /// Rango de bytes del último token emitido.
    pub fn span(&self) -> Range<usize> {
        self.start..self.cursor
    }

    /// Guarda la posición actual.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.cursor)
    }

    /// Retorna a una posición guardada.
    ///
    /// Los tokens internados entre tanto permanecen en la tabla; esto
    /// no es observable ya que internar es idempotente.
    pub fn rewind(&mut self, Checkpoint(cursor): Checkpoint) {
        self.cursor = cursor;
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }

    fn fail(&mut self, error: LexError) -> TokenId {
        self.error = Some(error);
        reserved::NIL
    }

    fn string(&mut self) -> TokenId {
        let mut text = vec!['"' as CodePoint];

        loop {
            let c = match self.bump() {
                None => return self.fail(LexError::UnterminatedString),
                Some(INVALID) => return self.fail(LexError::MalformedUtf8),
                Some(c) => c,
            };

            match utf8::to_char(c) {
                Some('"') => break,
                Some('\\') => match self.bump() {
                    None => return self.fail(LexError::UnterminatedString),
                    Some(INVALID) => return self.fail(LexError::MalformedUtf8),
                    Some(escaped) => text.push(match utf8::to_char(escaped) {
                        Some('t') => '\t' as CodePoint,
                        Some('n') => '\n' as CodePoint,
                        _ => escaped,
                    }),
                },

                _ => text.push(c),
            }
        }

        text.push('"' as CodePoint);
        self.symbols.intern(&text, Category::StringLiteral)
    }

    fn hash(&mut self) -> TokenId {
        match self.bump().and_then(utf8::to_char) {
            Some('t') => reserved::TRUE,
            Some('f') => reserved::FALSE,
            Some('\\') => match self.bump() {
                None => self.fail(LexError::BadCharacter),
                Some(INVALID) => self.fail(LexError::MalformedUtf8),
                Some(c) => {
                    let text = ['#' as CodePoint, '\\' as CodePoint, c];
                    self.symbols.intern(&text, Category::Character)
                }
            },

            _ => self.fail(LexError::BadHash),
        }
    }

    /// Constante numérica: dígitos con a lo sumo un `.` en todo el token.
    fn number(&mut self, first: char) -> TokenId {
        let mut text = vec![first as CodePoint];
        let mut seen_dot = first == '.';

        loop {
            match self.peek_char() {
                Some(c) if c.is_ascii_digit() => (),
                Some('.') if !seen_dot => seen_dot = true,
                _ => break,
            }

            text.extend(self.bump());
        }

        self.symbols.intern(&text, Category::Number)
    }

    /// Identificadores, incluyendo palabras clave reservadas.
    fn word(&mut self, first: char) -> TokenId {
        let mut text = vec![first as CodePoint];
        while let Some(c) = self.peek_char() {
            if !is_word_char(c) {
                break;
            }

            text.extend(self.bump());
        }

        self.symbols.intern(&text, Category::Identifier)
    }

    fn skip_whitespace(&mut self) {
        while let Some(' ' | '\t' | '\r' | '\n') = self.peek_char() {
            self.bump();
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' as CodePoint {
                break;
            }
        }
    }

    fn next_is_digit(&self) -> bool {
        matches!(self.peek_char(), Some(c) if c.is_ascii_digit())
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn peek_char(&self) -> Option<char> {
        let mut cursor = self.cursor;
        if cursor >= self.source.bytes().len() {
            return None;
        }

        utf8::to_char(utf8::decode(self.source.bytes(), &mut cursor))
    }

    fn bump(&mut self) -> Option<CodePoint> {
        if self.eof() {
            None
        } else {
            Some(utf8::decode(self.source.bytes(), &mut self.cursor))
        }
    }
}

/// Determina si un carácter puede pertenecer a un identificador.
fn is_word_char(c: char) -> bool {
    c.is_alphabetic()
        || c.is_ascii_digit()
        || matches!(
            c,
            '!' | '$' | '%' | '&' | '*' | '+' | '-' | '.' | '/' | ':' | '<' | '=' | '>' | '?' | '@'
                | '^' | '_' | '~'
        )
}
