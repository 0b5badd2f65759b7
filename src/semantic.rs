//! Análisis semántico y generación de IR.
//!
//! Cada forma de nivel superior se traduce a una secuencia lineal de
//! instrucciones. Los resultados se depositan a partir de un registro
//! base; las subexpresiones auxiliares usan los registros siguientes.
//! Los símbolos se clasifican según la cadena de ámbitos en locales,
//! upvalues o referencias dinámicas.
//!
//! Un error de forma en cualquier punto aborta la forma de nivel
//! superior completa: no se emite ninguna instrucción para ella y las
//! definiciones que alcanzó a registrar se descartan. El contador de
//! etiquetas, en cambio, nunca retrocede.

use thiserror::Error;

use crate::{
    ir::{Instruction, Label, Reg},
    parse::Expr,
    scope::{Resolution, Scope},
    symbol::{reserved, Category, SymbolTable, TokenId},
    utf8::{self, CodePoint, INVALID},
};

pub type Semantic<T> = Result<T, CompileError>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Malformed `{keyword}` form {form}, expected `{expected}`")]
    Shape {
        keyword: String,
        form: Expr,
        expected: &'static str,
    },

    #[error("Expected an identifier, found {0}")]
    ExpectedId(Expr),

    #[error("Symbol `{0}` is already defined in this scope")]
    Redefinition(String),

    #[error("`{0}` is a reserved keyword and cannot be redefined")]
    ReservedName(String),

    #[error("Keyword `{0}` cannot be used as a value")]
    KeywordValue(String),

    #[error("Integer literal `{0}` is out of range")]
    IntOverflow(String),

    #[error("No lowering exists for {0}")]
    Unsupported(Expr),

    #[error("The empty list is not a valid form")]
    EmptyList,
}

/// Estado que persiste entre formas de nivel superior.
pub struct Compiler {
    globals: Scope<'static>,
    labels: u32,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            globals: Scope::root(),
            labels: 0,
        }
    }

    /// Compila una forma de nivel superior en el ámbito global.
    ///
    /// El registro base es la cantidad de globales ya definidas, de
    /// forma que cada `define` sucesivo obtiene un registro nuevo.
    pub fn compile(&mut self, form: &Expr, symbols: &SymbolTable) -> Semantic<Vec<Instruction>> {
        let Compiler { globals, labels } = self;
        lower(globals, labels, form, symbols)
    }

    /// Compila una forma dentro de un marco provisto por el llamador.
    pub fn compile_in(
        &mut self,
        scope: &mut Scope<'_>,
        form: &Expr,
        symbols: &SymbolTable,
    ) -> Semantic<Vec<Instruction>> {
        lower(scope, &mut self.labels, form, symbols)
    }

    pub fn globals(&self) -> &Scope<'static> {
        &self.globals
    }

    /// Siguiente etiqueta que se asignará.
    pub fn next_label(&self) -> Label {
        Label(self.labels)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

fn lower(
    scope: &mut Scope<'_>,
    labels: &mut u32,
    form: &Expr,
    symbols: &SymbolTable,
) -> Semantic<Vec<Instruction>> {
    let base = scope.base_register();
    let mut code = Vec::new();

    let mut context = Context {
        scope: &mut *scope,
        symbols,
        labels,
        sink: &mut code,
    };

    match context.eval(form, base) {
        Ok(()) => Ok(code),
        Err(error) => {
            scope.truncate(base);
            Err(error)
        }
    }
}

struct Context<'b, 's> {
    scope: &'b mut Scope<'s>,
    symbols: &'b SymbolTable,
    labels: &'b mut u32,
    sink: &'b mut Vec<Instruction>,
}

impl Context<'_, '_> {
    fn eval(&mut self, expr: &Expr, into: Reg) -> Semantic<()> {
        match expr {
            Expr::Nil => Err(CompileError::EmptyList),
            Expr::Atom(id) => self.atom(*id, into),
            Expr::Pair(head, args) => self.combination(expr, head, args, into),
        }
    }

    fn atom(&mut self, id: TokenId, into: Reg) -> Semantic<()> {
        use Category::*;

        let text = self.symbols.text_of(id);
        let instruction = match self.symbols.category_of(id) {
            // `#t` o `#f`
            Boolean if text.get(1) == Some(&('t' as CodePoint)) => Instruction::LoadTrue(into),
            Boolean => Instruction::LoadFalse(into),

            Number => match parse_integer(text) {
                Some(value) => Instruction::LoadNumber(into, value),
                None => return Err(CompileError::IntOverflow(self.symbols.display(id))),
            },

            // `#\c`
            Character => Instruction::LoadCharacter(into, text.get(2).copied().unwrap_or(INVALID)),

            StringLiteral => Instruction::LoadString(into, id),

            Identifier if self.symbols.is_reserved(id) => {
                return Err(CompileError::KeywordValue(self.symbols.display(id)))
            }

            Identifier => match self.scope.find(id) {
                Resolution::Local(reg) => Instruction::Move(into, reg),
                Resolution::Upvalue => Instruction::LoadUpvalue(into, id),
                Resolution::NotFound => Instruction::LoadDynamic(into, id),
            },

            Unknown | Parenthesis | Prefix | Dot => {
                return Err(CompileError::Unsupported(Expr::Atom(id)))
            }
        };

        self.sink.push(instruction);
        Ok(())
    }

    fn combination(&mut self, form: &Expr, head: &Expr, args: &Expr, into: Reg) -> Semantic<()> {
        let keyword = match head {
            Expr::Atom(id) if self.symbols.is_reserved(*id) => *id,
            _ => return Err(CompileError::Unsupported(form.clone())),
        };

        match keyword {
            reserved::CONS => {
                let [car, cdr] = self.arguments::<2>(form, args, "(cons A D)")?;
                self.binary(car, cdr, into, Instruction::Cons)
            }

            reserved::EQ => {
                let [a, b] = self.arguments::<2>(form, args, "(eq A B)")?;
                self.binary(a, b, into, Instruction::Eq)
            }

            reserved::CAR => {
                let [x] = self.arguments::<1>(form, args, "(car X)")?;
                self.unary(x, into, Instruction::Car)
            }

            reserved::CDR => {
                let [x] = self.arguments::<1>(form, args, "(cdr X)")?;
                self.unary(x, into, Instruction::Cdr)
            }

            reserved::ATOM => {
                let [x] = self.arguments::<1>(form, args, "(atom X)")?;
                self.unary(x, into, Instruction::Atom)
            }

            reserved::DEFINE => self.define(form, args, into),
            reserved::COND => self.cond(form, args, into),

            // `lambda`, `quote`, aritmética y comparaciones no tienen traducción
            _ => Err(CompileError::Unsupported(form.clone())),
        }
    }

    fn unary(&mut self, arg: &Expr, into: Reg, op: fn(Reg, Reg) -> Instruction) -> Semantic<()> {
        self.eval(arg, into)?;
        self.sink.push(op(into, into));

        Ok(())
    }

    fn binary(
        &mut self,
        left: &Expr,
        right: &Expr,
        into: Reg,
        op: fn(Reg, Reg, Reg) -> Instruction,
    ) -> Semantic<()> {
        let scratch = into.next();

        self.eval(left, into)?;
        self.eval(right, scratch)?;
        self.sink.push(op(into, into, scratch));

        Ok(())
    }

    fn define(&mut self, form: &Expr, args: &Expr, into: Reg) -> Semantic<()> {
        let [name, value] = self.arguments::<2>(form, args, "(define NAME EXPR)")?;

        let id = match name {
            Expr::Atom(id) if self.symbols.category_of(*id) == Category::Identifier => *id,
            _ => return Err(CompileError::ExpectedId(name.clone())),
        };

        if self.symbols.is_reserved(id) {
            return Err(CompileError::ReservedName(self.symbols.display(id)));
        }

        if !self.scope.define(id) {
            return Err(CompileError::Redefinition(self.symbols.display(id)));
        }

        self.eval(value, into)?;

        // El valor se calculó en `into`, pero el símbolo puede haber
        // recibido un registro distinto
        if let Resolution::Local(reg) = self.scope.find(id) {
            if reg != into {
                self.sink.push(Instruction::Move(reg, into));
            }
        }

        Ok(())
    }

    /// `(cond (test body) ...)`.
    ///
    /// Las etiquetas se numeran así, con `n` cláusulas a partir de `k`:
    /// inicio de cada cláusula en `k..k+n`, siguiente cláusula de la
    /// última en `k+n`, final compartido en `k+n+1` y una etiqueta
    /// adicional en `k+n+2` que nunca es destino de salto.
    fn cond(&mut self, form: &Expr, args: &Expr, into: Reg) -> Semantic<()> {
        const EXPECTED: &str = "(cond (TEST BODY) ...)";

        let clauses = self
            .items(form, args, EXPECTED)?
            .into_iter()
            .map(|clause| self.arguments::<2>(form, clause, EXPECTED))
            .collect::<Result<Vec<[&Expr; 2]>, _>>()?;

        let first = *self.labels;
        let count = clauses.len() as u32;
        let end = Label(first + count + 1);
        *self.labels += count + 3;

        for (index, [test, body]) in (first..).zip(clauses) {
            let next = Label(index + 1);

            self.sink.push(Instruction::SetLabel(Label(index)));
            self.eval(test, into)?;
            self.sink.push(Instruction::BranchIfFalse(into, next));
            self.eval(body, into)?;
            self.sink.push(Instruction::Branch(end));
        }

        self.sink.push(Instruction::SetLabel(end));
        self.sink.push(Instruction::SetLabel(Label(first + count + 2)));

        Ok(())
    }

    /// Extrae exactamente `N` argumentos de una lista propia.
    fn arguments<'e, const N: usize>(
        &self,
        form: &Expr,
        args: &'e Expr,
        expected: &'static str,
    ) -> Semantic<[&'e Expr; N]> {
        self.items(form, args, expected)?
            .try_into()
            .map_err(|_| self.shape(form, expected))
    }

    /// Elementos de una lista propia; cualquier cola punteada es un error.
    fn items<'e>(
        &self,
        form: &Expr,
        mut args: &'e Expr,
        expected: &'static str,
    ) -> Semantic<Vec<&'e Expr>> {
        let mut items = Vec::new();
        loop {
            match args {
                Expr::Nil => break Ok(items),
                Expr::Pair(car, cdr) => {
                    items.push(&**car);
                    args = cdr;
                }

                Expr::Atom(_) => break Err(self.shape(form, expected)),
            }
        }
    }

    fn shape(&self, form: &Expr, expected: &'static str) -> CompileError {
        let keyword = match form.as_pair() {
            Some((Expr::Atom(id), _)) => self.symbols.display(*id),
            _ => String::new(),
        };

        CompileError::Shape {
            keyword,
            form: form.clone(),
            expected,
        }
    }
}

/// Interpreta un literal numérico como entero decimal con signo.
///
/// Solo se considera la parte entera: todo desde el primer `.` se
/// descarta. `None` indica desbordamiento.
fn parse_integer(text: &[CodePoint]) -> Option<i64> {
    const MINUS: CodePoint = '-' as CodePoint;
    const PLUS: CodePoint = '+' as CodePoint;
    const DOT: CodePoint = '.' as CodePoint;

    let (negative, digits) = match text {
        [MINUS, rest @ ..] => (true, rest),
        [PLUS, rest @ ..] => (false, rest),
        _ => (false, text),
    };

    digits
        .iter()
        .take_while(|&&c| c != DOT)
        .try_fold(0i64, |value, &c| {
            let digit = utf8::to_char(c)?.to_digit(10)? as i64;
            let value = value.checked_mul(10)?;

            if negative {
                value.checked_sub(digit)
            } else {
                value.checked_add(digit)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse::Reader, source::Source};
    use Instruction::*;

    fn compile_all(text: &str) -> (Vec<Semantic<Vec<Instruction>>>, SymbolTable) {
        let mut reader = Reader::new(Source::new("<test>", text.as_bytes().to_vec()));
        let mut compiler = Compiler::new();
        let mut results = Vec::new();

        while let Some(form) = reader.read().expect("syntax error") {
            results.push(compiler.compile(form.val(), reader.symbols()));
        }

        (results, reader.into_symbols())
    }

    fn compile_one(text: &str) -> Vec<Instruction> {
        let (mut results, _) = compile_all(text);
        assert_eq!(results.len(), 1);
        results.remove(0).expect("compile error")
    }

    fn compile_error(text: &str) -> CompileError {
        let (mut results, _) = compile_all(text);
        results.remove(0).expect_err("expected a compile error")
    }

    fn id(symbols: &SymbolTable, text: &str) -> TokenId {
        let text: Vec<_> = text.chars().map(|c| c as CodePoint).collect();
        symbols
            .iter()
            .find(|(_, _, entry)| *entry == &text[..])
            .map(|(id, _, _)| id)
            .expect("symbol not interned")
    }

    const R0: Reg = Reg(0);
    const R1: Reg = Reg(1);
    const R2: Reg = Reg(2);

    #[test]
    fn cons_of_numbers() {
        assert_eq!(
            compile_one("(cons 1 2)"),
            vec![LoadNumber(R0, 1), LoadNumber(R1, 2), Cons(R0, R0, R1)]
        );
    }

    #[test]
    fn nested_unary_forms() {
        assert_eq!(
            compile_one("(atom (car (cons 1 2)))"),
            vec![
                LoadNumber(R0, 1),
                LoadNumber(R1, 2),
                Cons(R0, R0, R1),
                Car(R0, R0),
                Atom(R0, R0),
            ]
        );
    }

    #[test]
    fn cond_label_layout() {
        assert_eq!(
            compile_one("(cond (#f 1) (#t 2))"),
            vec![
                SetLabel(Label(0)),
                LoadFalse(R0),
                BranchIfFalse(R0, Label(1)),
                LoadNumber(R0, 1),
                Branch(Label(3)),
                SetLabel(Label(1)),
                LoadTrue(R0),
                BranchIfFalse(R0, Label(2)),
                LoadNumber(R0, 2),
                Branch(Label(3)),
                SetLabel(Label(3)),
                SetLabel(Label(4)),
            ]
        );
    }

    #[test]
    fn labels_are_unique_across_forms() {
        let (results, _) = compile_all("(cond (#t 1)) (cond (#t 2))");

        let second = results[1].as_ref().unwrap();
        assert_eq!(second[0], SetLabel(Label(4)));
        assert_eq!(second.last(), Some(&SetLabel(Label(7))));
    }

    #[test]
    fn eq_uses_two_registers() {
        assert_eq!(
            compile_one("(eq #t #f)"),
            vec![LoadTrue(R0), LoadFalse(R1), Eq(R0, R0, R1)]
        );
    }

    #[test]
    fn cdr_into_same_register() {
        assert_eq!(
            compile_one("(cdr (cons 1 2))"),
            vec![LoadNumber(R0, 1), LoadNumber(R1, 2), Cons(R0, R0, R1), Cdr(R0, R0)]
        );
    }

    #[test]
    fn successive_defines_claim_fresh_registers() {
        let (results, _) = compile_all("(define a 1) (define b a)");

        assert_eq!(results[0].as_ref().unwrap(), &vec![LoadNumber(R0, 1)]);
        assert_eq!(results[1].as_ref().unwrap(), &vec![Move(R1, R0)]);
    }

    #[test]
    fn define_relocates_when_registers_differ() {
        assert_eq!(
            compile_one("(cons 1 (define x 2))"),
            vec![
                LoadNumber(R0, 1),
                LoadNumber(R1, 2),
                Move(R0, R1),
                Cons(R0, R0, R1),
            ]
        );
    }

    #[test]
    fn self_reference_in_define_is_local() {
        assert_eq!(compile_one("(define f f)"), vec![Move(R0, R0)]);
    }

    #[test]
    fn operands_above_globals() {
        let (results, _) = compile_all("(define a 1) (define b 2) (cons a b)");
        assert_eq!(
            results[2].as_ref().unwrap(),
            &vec![Move(R2, R0), Move(Reg(3), R1), Cons(R2, R2, Reg(3))]
        );
    }

    #[test]
    fn unbound_symbols_are_dynamic() {
        let (results, symbols) = compile_all("x");
        let x = id(&symbols, "x");

        assert_eq!(results[0].as_ref().unwrap(), &vec![LoadDynamic(R0, x)]);
    }

    #[test]
    fn outer_symbols_are_upvalues() {
        let mut reader = Reader::new(Source::new("<test>", b"x y".to_vec()));
        let x_form = reader.read().unwrap().unwrap().into_inner();
        let y_form = reader.read().unwrap().unwrap().into_inner();
        let x = x_form.as_atom().unwrap();
        let y = y_form.as_atom().unwrap();

        let mut root = Scope::root();
        root.define(x);

        let mut inner = Scope::nested(&root);
        inner.define(y);

        let mut compiler = Compiler::new();
        let symbols = reader.symbols();

        assert_eq!(
            compiler.compile_in(&mut inner, &x_form, symbols).unwrap(),
            vec![LoadUpvalue(R1, x)]
        );
        assert_eq!(
            compiler.compile_in(&mut inner, &y_form, symbols).unwrap(),
            vec![Move(R1, R0)]
        );
    }

    #[test]
    fn literals() {
        let (results, symbols) = compile_all(r#"#\a "hi" -12.7 +5 .5"#);
        let hi = id(&symbols, "\"hi\"");

        let code: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(code[0], vec![LoadCharacter(R0, 'a' as CodePoint)]);
        assert_eq!(code[1], vec![LoadString(R0, hi)]);
        assert_eq!(code[2], vec![LoadNumber(R0, -12)]);
        assert_eq!(code[3], vec![LoadNumber(R0, 5)]);
        assert_eq!(code[4], vec![LoadNumber(R0, 0)]);
    }

    #[test]
    fn integer_limits() {
        assert_eq!(
            compile_one("-9223372036854775808"),
            vec![LoadNumber(R0, i64::MIN)]
        );
        assert!(matches!(
            compile_error("9223372036854775808"),
            CompileError::IntOverflow(_)
        ));
    }

    #[test]
    fn wrong_arity_emits_nothing() {
        assert!(matches!(compile_error("(cons 1)"), CompileError::Shape { .. }));
        assert!(matches!(compile_error("(cons 1 2 3)"), CompileError::Shape { .. }));
        assert!(matches!(compile_error("(car)"), CompileError::Shape { .. }));
        assert!(matches!(compile_error("(car 1 . 2)"), CompileError::Shape { .. }));
    }

    #[test]
    fn nested_shape_error_aborts_whole_form() {
        match compile_error("(atom (car (cons 1)))") {
            CompileError::Shape { keyword, .. } => assert_eq!(keyword, "cons"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_cond_clauses() {
        assert!(matches!(compile_error("(cond (#t))"), CompileError::Shape { .. }));
        assert!(matches!(compile_error("(cond (#t 1 2))"), CompileError::Shape { .. }));
        assert!(matches!(compile_error("(cond #t)"), CompileError::Shape { .. }));
    }

    #[test]
    fn define_errors() {
        let (results, _) = compile_all("(define a 1) (define a 2)");
        assert!(matches!(results[1], Err(CompileError::Redefinition(ref name)) if name == "a"));

        assert!(matches!(compile_error("(define car 1)"), CompileError::ReservedName(_)));
        assert!(matches!(compile_error("(define 1 2)"), CompileError::ExpectedId(_)));
        assert!(matches!(compile_error("(define \"s\" 2)"), CompileError::ExpectedId(_)));
    }

    #[test]
    fn failed_form_releases_its_bindings() {
        let (results, _) = compile_all("(define a (cons 1)) (define b 2) (define a 3)");

        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap(), &vec![LoadNumber(R0, 2)]);
        assert_eq!(results[2].as_ref().unwrap(), &vec![LoadNumber(R1, 3)]);
    }

    #[test]
    fn unsupported_forms() {
        assert!(matches!(compile_error("(lambda (x) x)"), CompileError::Unsupported(_)));
        assert!(matches!(compile_error("'x"), CompileError::Unsupported(_)));
        assert!(matches!(compile_error("(quote x)"), CompileError::Unsupported(_)));
        assert!(matches!(compile_error("(+ 1 2)"), CompileError::Unsupported(_)));
        assert!(matches!(compile_error("(f 1)"), CompileError::Unsupported(_)));
        assert!(matches!(compile_error("((car x) 1)"), CompileError::Unsupported(_)));
    }

    #[test]
    fn keywords_and_empty_list_are_not_values() {
        assert!(matches!(compile_error("cons"), CompileError::KeywordValue(_)));
        assert!(matches!(compile_error("(car cdr)"), CompileError::KeywordValue(_)));
        assert!(matches!(compile_error("()"), CompileError::EmptyList));
    }
}
