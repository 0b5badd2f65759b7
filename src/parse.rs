//! Análisis sintáctico.
//!
//! El lector transforma el flujo de tokens en s-expressions: átomos que
//! referencian un token y pares (celdas cons). La lista vacía no es un
//! nodo en el heap sino la variante [`Expr::Nil`]. Los prefijos `'`,
//! `` ` ``, `,` y `,@` son azúcar sintáctico para `(prefijo expr)`.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use thiserror::Error;

use crate::{
    lex::{LexError, Lexer},
    source::{Located, Source},
    symbol::{reserved, Category, SymbolTable, TokenId},
};

/// Una s-expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// Lista vacía.
    Nil,

    /// Hoja que referencia un token.
    Atom(TokenId),

    /// Celda cons: `car` y `cdr`.
    Pair(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Construye una celda cons.
    pub fn cons(car: Expr, cdr: Expr) -> Expr {
        Expr::Pair(Box::new(car), Box::new(cdr))
    }

    /// Construye una lista propia.
    pub fn list<I>(items: I) -> Expr
    where
        I: IntoIterator<Item = Expr>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Expr::Nil, |cdr, car| Expr::cons(car, cdr))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expr::Nil)
    }

    pub fn as_atom(&self) -> Option<TokenId> {
        match self {
            Expr::Atom(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(&Expr, &Expr)> {
        match self {
            Expr::Pair(car, cdr) => Some((car, cdr)),
            _ => None,
        }
    }
}

impl Display for Expr {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (car, mut rest) = match self {
            Expr::Nil => return fmt.write_str("()"),
            Expr::Atom(id) => return write!(fmt, "{}", id),
            Expr::Pair(car, cdr) => (car, cdr),
        };

        write!(fmt, "({}", car)?;
        loop {
            match &**rest {
                Expr::Nil => break,
                Expr::Pair(car, cdr) => {
                    write!(fmt, " {}", car)?;
                    rest = cdr;
                }

                tail => {
                    write!(fmt, " . {}", tail)?;
                    break;
                }
            }
        }

        fmt.write_str(")")
    }
}

/// Error de lectura.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Abrupt end of program")]
    UnexpectedEof,

    #[error("Unexpected `)`")]
    UnexpectedClose,

    #[error("Unexpected `.`")]
    UnexpectedDot,

    #[error("Expected `)` after dotted tail")]
    ExpectedClose,

    #[error(transparent)]
    Lexical(#[from] LexError),
}

pub type Read<T> = Result<T, Located<ReadError>>;

/// Lector de s-expressions de nivel superior, una a la vez.
pub struct Reader {
    lexer: Lexer,
}

impl Reader {
    pub fn new(source: Rc<Source>) -> Self {
        Reader::from_lexer(Lexer::new(source))
    }

    pub fn from_lexer(lexer: Lexer) -> Self {
        Reader { lexer }
    }

    /// Lee la siguiente forma de nivel superior.
    ///
    /// `Ok(None)` significa fin limpio de la entrada. La lista vacía `()`
    /// se lee como `Ok(Some(Expr::Nil))`. Cualquier error léxico o
    /// sintáctico, incluyendo el fin de la entrada a media expresión,
    /// se reporta como `Err`.
    pub fn read(&mut self) -> Read<Option<Located<Expr>>> {
        let id = self.lexer.next_token_id();
        if id == reserved::NIL && self.lexer.error().is_none() {
            return Ok(None);
        }

        let start = self.lexer.span().start;
        let expr = self.expr_from(id)?;
        let end = self.lexer.span().end;

        let location = self.lexer.source().locate(start..end);
        Ok(Some(Located::at(expr, location)))
    }

    /// Determina si se consumió la totalidad del búfer de bytes.
    pub fn eof(&self) -> bool {
        self.lexer.eof()
    }

    pub fn symbols(&self) -> &SymbolTable {
        self.lexer.symbols()
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.lexer.into_symbols()
    }

    fn expr(&mut self) -> Read<Expr> {
        let id = self.lexer.next_token_id();
        self.expr_from(id)
    }

    fn expr_from(&mut self, id: TokenId) -> Read<Expr> {
        use Category::*;

        match self.lexer.symbols().category_of(id) {
            Boolean | Number | Character | StringLiteral | Identifier => Ok(Expr::Atom(id)),

            Prefix => {
                let quoted = self.expr()?;
                Ok(Expr::list([Expr::Atom(id), quoted]))
            }

            Parenthesis if id == reserved::OPEN => self.list(),
            Parenthesis => self.fail(ReadError::UnexpectedClose),

            Dot => self.fail(ReadError::UnexpectedDot),
            Unknown => self.nil(),
        }
    }

    fn list(&mut self) -> Read<Expr> {
        let mut items = Vec::new();

        let tail = loop {
            match self.lexer.next_token_id() {
                reserved::CLOSE => break Expr::Nil,

                reserved::DOT if items.is_empty() => return self.fail(ReadError::UnexpectedDot),
                reserved::DOT => {
                    let tail = self.expr()?;
                    match self.lexer.next_token_id() {
                        reserved::CLOSE => break tail,
                        reserved::NIL => return self.nil(),
                        _ => return self.fail(ReadError::ExpectedClose),
                    }
                }

                id => items.push(self.expr_from(id)?),
            }
        };

        Ok(items
            .into_iter()
            .rev()
            .fold(tail, |cdr, car| Expr::cons(car, cdr)))
    }

    /// Error para un [`reserved::NIL`] donde se esperaba algo más.
    fn nil<T>(&self) -> Read<T> {
        match self.lexer.error() {
            Some(error) => self.fail(error.clone().into()),
            None => self.fail(ReadError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ReadError) -> Read<T> {
        let location = self.lexer.source().locate(self.lexer.span());
        Err(Located::at(error, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reader(text: &str) -> Reader {
        Reader::new(Source::new("<test>", text.as_bytes().to_vec()))
    }

    fn read_one(text: &str) -> Expr {
        reader(text)
            .read()
            .expect("syntax error")
            .expect("no form")
            .into_inner()
    }

    fn read_error(text: &str) -> ReadError {
        match reader(text).read() {
            Err(error) => error.into_inner(),
            Ok(form) => panic!("expected error, got {:?}", form),
        }
    }

    /// Estructura sin identidad de átomos.
    fn shape(expr: &Expr) -> String {
        match expr {
            Expr::Nil => "()".into(),
            Expr::Atom(_) => "a".into(),
            Expr::Pair(car, cdr) => format!("({} {})", shape(car), shape(cdr)),
        }
    }

    fn atom(id: u32) -> Expr {
        Expr::Atom(TokenId(id))
    }

    #[test]
    fn proper_list() {
        let first = reserved::FIRST_USER.0;
        let expected = Expr::cons(
            atom(first),
            Expr::cons(atom(first + 1), Expr::cons(atom(first + 2), Expr::Nil)),
        );

        assert_eq!(read_one("(1 2 3)"), expected);
    }

    #[test]
    fn dotted_pair() {
        let first = reserved::FIRST_USER.0;
        assert_eq!(read_one("(1 . 2)"), Expr::cons(atom(first), atom(first + 1)));
    }

    #[test]
    fn dotted_tail_after_several_elements() {
        let expr = read_one("(a b . c)");
        assert_eq!(expr.to_string(), "(29 30 . 31)");
    }

    #[test]
    fn empty_list_is_nil() {
        assert_eq!(read_one("()"), Expr::Nil);
        assert_eq!(read_one("(  )"), Expr::Nil);
    }

    #[test]
    fn nested_lists() {
        let expr = read_one("(cons (car x) ())");
        assert_eq!(expr.to_string(), "(11 (12 29) ())");
    }

    #[test]
    fn quote_desugaring() {
        let sugar = read_one("'x");
        let explicit = read_one("(quote x)");

        assert_eq!(shape(&sugar), shape(&explicit));
        assert_eq!(
            sugar,
            Expr::list([Expr::Atom(reserved::QUOTE_PREFIX), atom(reserved::FIRST_USER.0)])
        );
    }

    #[test]
    fn all_prefixes() {
        let expr = read_one("(`a ,b ,@c)");
        assert_eq!(expr.to_string(), "((4 29) (5 30) (6 31))");
    }

    #[test]
    fn printing_atoms_and_lists() {
        assert_eq!(read_one("#t").to_string(), "9");
        assert_eq!(read_one("(#t #f)").to_string(), "(9 10)");
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(read_error(")"), ReadError::UnexpectedClose));
        assert!(matches!(read_error("."), ReadError::UnexpectedDot));
        assert!(matches!(read_error("( . 1)"), ReadError::UnexpectedDot));
        assert!(matches!(read_error("(1 . 2 3)"), ReadError::ExpectedClose));
        assert!(matches!(read_error("(1 . )"), ReadError::UnexpectedClose));
        assert!(matches!(read_error("(1 2"), ReadError::UnexpectedEof));
        assert!(matches!(read_error("'"), ReadError::UnexpectedEof));
        assert!(matches!(
            read_error("(a \"b)"),
            ReadError::Lexical(LexError::UnterminatedString)
        ));
    }

    #[test]
    fn errors_are_located() {
        let error = reader("(a\n  . )").read().unwrap_err();
        assert!(matches!(error.val(), ReadError::UnexpectedClose));
        assert_eq!(error.location().start().line(), 2);
        assert_eq!(error.location().start().column(), 5);
    }

    #[test]
    fn reads_forms_in_sequence() {
        let mut reader = reader("(define a 1) a\n");

        assert!(reader.read().unwrap().is_some());
        assert!(reader.read().unwrap().is_some());
        assert!(!reader.eof());
        assert!(reader.read().unwrap().is_none());
        assert!(reader.eof());
    }

    #[test]
    fn form_location_spans_the_form() {
        let form = reader("  (a b)").read().unwrap().unwrap();
        assert_eq!(form.location().start().column(), 3);
        assert_eq!(form.location().end().column(), 8);
    }

    proptest! {
        #[test]
        fn eof_is_monotonic(text in "[()a-z0-9 .'\n]{0,40}") {
            let mut reader = reader(&text);
            let mut was_eof = reader.eof();
            prop_assert_eq!(was_eof, text.is_empty());

            for _ in 0..64 {
                let result = reader.read();
                let is_eof = reader.eof();
                prop_assert!(!was_eof || is_eof);
                was_eof = is_eof;

                match result {
                    Ok(Some(_)) => continue,
                    _ => break,
                }
            }
        }
    }
}
