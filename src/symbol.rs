//! Tabla de símbolos.
//!
//! Todo lexema se interna: textos idénticos siempre resultan en el
//! mismo [`TokenId`], de forma que fases posteriores comparan enteros
//! en vez de secuencias. Un bloque inicial de identificadores está
//! reservado para puntuación, prefijos, literales booleanos y palabras
//! clave primitivas. Ese bloque se registra al construir la tabla,
//! antes de internar cualquier lexema del usuario, y nunca se reasigna.

use std::{
    collections::HashMap,
    fmt::{self, Display},
    rc::Rc,
};

use crate::utf8::{self, CodePoint};

/// Identificador denso de un token internado.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(pub u32);

impl Display for TokenId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// Categoría léxica, asignada una única vez por token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Unknown,
    Parenthesis,
    Boolean,
    Number,
    Character,
    StringLiteral,
    Identifier,
    Prefix,
    Dot,
}

impl Display for Category {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Category::*;
        let string = match self {
            Unknown       => "unknown",
            Parenthesis   => "parenthesis",
            Boolean       => "boolean",
            Number        => "number",
            Character     => "character",
            StringLiteral => "string",
            Identifier    => "identifier",
            Prefix        => "prefix",
            Dot           => "dot",
        };

        fmt.pad(string)
    }
}

/// Identificadores reservados.
///
/// El orden de [`RESERVED`] debe coincidir con estas constantes.
pub mod reserved {
    use super::TokenId;

    pub const NIL: TokenId = TokenId(0);
    pub const OPEN: TokenId = TokenId(1);
    pub const CLOSE: TokenId = TokenId(2);
    pub const QUOTE_PREFIX: TokenId = TokenId(3);
    pub const QUASIQUOTE: TokenId = TokenId(4);
    pub const UNQUOTE: TokenId = TokenId(5);
    pub const UNQUOTE_SPLICING: TokenId = TokenId(6);
    pub const DOT: TokenId = TokenId(7);
    pub const ELLIPSIS: TokenId = TokenId(8);
    pub const TRUE: TokenId = TokenId(9);
    pub const FALSE: TokenId = TokenId(10);
    pub const CONS: TokenId = TokenId(11);
    pub const CAR: TokenId = TokenId(12);
    pub const CDR: TokenId = TokenId(13);
    pub const ATOM: TokenId = TokenId(14);
    pub const EQ: TokenId = TokenId(15);
    pub const COND: TokenId = TokenId(16);
    pub const LAMBDA: TokenId = TokenId(17);
    pub const DEFINE: TokenId = TokenId(18);
    pub const QUOTE: TokenId = TokenId(19);
    pub const ADD: TokenId = TokenId(20);
    pub const SUB: TokenId = TokenId(21);
    pub const MUL: TokenId = TokenId(22);
    pub const DIV: TokenId = TokenId(23);
    pub const MOD: TokenId = TokenId(24);
    pub const LESS_OR_EQUAL: TokenId = TokenId(25);
    pub const LESS: TokenId = TokenId(26);
    pub const GREATER_OR_EQUAL: TokenId = TokenId(27);
    pub const GREATER: TokenId = TokenId(28);

    /// Primer identificador disponible para lexemas del usuario.
    pub const FIRST_USER: TokenId = TokenId(29);
}

const RESERVED: &[(&str, TokenId, Category)] = {
    use reserved::*;
    use Category::*;

    &[
        ("",     NIL,              Unknown),
        ("(",    OPEN,             Parenthesis),
        (")",    CLOSE,            Parenthesis),
        ("'",    QUOTE_PREFIX,     Prefix),
        ("`",    QUASIQUOTE,       Prefix),
        (",",    UNQUOTE,          Prefix),
        (",@",   UNQUOTE_SPLICING, Prefix),
        (".",    DOT,              Dot),
        ("...",  ELLIPSIS,         Identifier),
        ("#t",   TRUE,             Boolean),
        ("#f",   FALSE,            Boolean),
        ("cons", CONS,             Identifier),
        ("car",  CAR,              Identifier),
        ("cdr",  CDR,              Identifier),
        ("atom", ATOM,             Identifier),
        ("eq",   EQ,               Identifier),
        ("cond", COND,             Identifier),
        ("lambda", LAMBDA,         Identifier),
        ("define", DEFINE,         Identifier),
        ("quote", QUOTE,           Identifier),
        ("+",    ADD,              Identifier),
        ("-",    SUB,              Identifier),
        ("*",    MUL,              Identifier),
        ("/",    DIV,              Identifier),
        ("%",    MOD,              Identifier),
        ("<=",   LESS_OR_EQUAL,    Identifier),
        ("<",    LESS,             Identifier),
        (">=",   GREATER_OR_EQUAL, Identifier),
        (">",    GREATER,          Identifier),
    ]
};

/// Texto internado, como secuencia de puntos de código.
pub type Text = Rc<[CodePoint]>;

struct Entry {
    text: Text,
    category: Category,
}

/// Tabla bidireccional texto ⇄ [`TokenId`], más la categoría de cada id.
pub struct SymbolTable {
    ids: HashMap<Text, TokenId>,
    entries: HashMap<TokenId, Entry>,
    next: u32,
}

impl SymbolTable {
    /// Construye una tabla con el bloque reservado ya registrado.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            ids: HashMap::new(),
            entries: HashMap::new(),
            next: 0,
        };

        for &(text, id, category) in RESERVED {
            let text: Vec<_> = text.chars().map(|c| c as CodePoint).collect();
            table.register_reserved(&text, id, category);
        }

        debug_assert_eq!(table.next, reserved::FIRST_USER.0);
        table
    }

    /// Asocia `text` a un identificador escogido por el llamador.
    ///
    /// Solo debe usarse durante la inicialización. Los identificadores
    /// automáticos continúan después del mayor id reservado.
    pub fn register_reserved(&mut self, text: &[CodePoint], id: TokenId, category: Category) {
        debug_assert!(!self.entries.contains_key(&id), "reserved id {} taken", id);

        let text: Text = text.into();
        self.ids.insert(Rc::clone(&text), id);
        self.entries.insert(id, Entry { text, category });
        self.next = self.next.max(id.0 + 1);
    }

    /// Interna un texto, retornando su id existente si ya se había visto.
    ///
    /// En ese caso `category` se ignora: prevalece el primer registro.
    pub fn intern(&mut self, text: &[CodePoint], category: Category) -> TokenId {
        if let Some(&id) = self.ids.get(text) {
            return id;
        }

        let id = TokenId(self.next);
        self.next += 1;

        let text: Text = text.into();
        self.ids.insert(Rc::clone(&text), id);
        self.entries.insert(id, Entry { text, category });

        id
    }

    /// Categoría de un id, [`Category::Unknown`] si no existe.
    pub fn category_of(&self, id: TokenId) -> Category {
        self.entries
            .get(&id)
            .map(|entry| entry.category)
            .unwrap_or(Category::Unknown)
    }

    /// Texto de un id, o el texto vacío de `nil` si no existe.
    pub fn text_of(&self, id: TokenId) -> &[CodePoint] {
        self.entries
            .get(&id)
            .or_else(|| self.entries.get(&reserved::NIL))
            .map(|entry| &*entry.text)
            .unwrap_or(&[])
    }

    /// Determina si un id pertenece al bloque reservado.
    pub fn is_reserved(&self, id: TokenId) -> bool {
        id < reserved::FIRST_USER
    }

    /// Texto de un id como `String`, para diagnósticos.
    pub fn display(&self, id: TokenId) -> String {
        lossy(self.text_of(id))
    }

    /// Contenido de un literal de string, sin delimitadores.
    pub fn string_value(&self, id: TokenId) -> Option<String> {
        match (self.category_of(id), self.text_of(id)) {
            (Category::StringLiteral, [_, inner @ .., _]) => Some(lossy(inner)),
            _ => None,
        }
    }

    /// Cantidad de ids registrados, reservados incluidos.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorre los registros en orden de id.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, Category, &[CodePoint])> + '_ {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();

        ids.into_iter().map(move |id| {
            let entry = &self.entries[&id];
            (id, entry.category, &*entry.text)
        })
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

fn lossy(text: &[CodePoint]) -> String {
    text.iter()
        .map(|&c| utf8::to_char(c).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
