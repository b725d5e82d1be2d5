use crate::ast::*;
use crate::lexer::{Keyword, LexError, Lexer, Token};
use std::fmt;
use std::rc::Rc;

mod declarations;
mod expressions;
mod statements;

/// Nesting of expressions, statements and binding patterns the parser accepts.
pub const MAX_NESTING: usize = 512;

#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {} (line {})", self.message, self.line)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            message: e.message,
            line: e.location.line,
        }
    }
}

/// Parses a whole script.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(source)?.parse_program()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev_line_terminator: bool,
    strict: bool,
    in_function: bool,
    in_generator: bool,
    in_async: bool,
    no_in: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: Token::Eof,
            prev_line_terminator: false,
            strict: false,
            in_function: false,
            in_generator: false,
            in_async: false,
            no_in: false,
            depth: 0,
        };
        parser.advance()?;
        Ok(parser)
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        self.prev_line_terminator = false;
        let next = loop {
            let tok = self.lexer.next_token()?;
            if tok == Token::LineTerminator {
                self.prev_line_terminator = true;
                continue;
            }
            break tok;
        };
        Ok(std::mem::replace(&mut self.current, next))
    }

    /// Looks at the token after `current` without consuming anything; the
    /// flag reports a line break between the two.
    fn peek_ahead(&self) -> Result<(Token, bool), ParseError> {
        let mut lexer = self.lexer.clone();
        let mut line_break = false;
        loop {
            match lexer.next_token()? {
                Token::LineTerminator => line_break = true,
                tok => return Ok((tok, line_break)),
            }
        }
    }

    fn eat(&mut self, expected: &Token) -> Result<(), ParseError> {
        if &self.current == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn eat_if(&mut self, expected: &Token) -> Result<bool, ParseError> {
        if &self.current == expected {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn is_keyword(&self, kw: Keyword) -> bool {
        self.current == Token::Keyword(kw)
    }

    fn eat_semicolon(&mut self) -> Result<(), ParseError> {
        if self.current == Token::Semicolon {
            self.advance()?;
            return Ok(());
        }
        if self.prev_line_terminator
            || self.current == Token::RightBrace
            || self.current == Token::Eof
        {
            return Ok(());
        }
        Err(self.unexpected())
    }

    /// Runs a recursive production one level deeper, failing once the
    /// nesting limit is reached.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = crate::stack::ensure_sufficient_stack(|| parse(self));
        self.depth -= 1;
        result
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            message: msg.into(),
            line: self.lexer.line(),
        }
    }

    fn unexpected(&self) -> ParseError {
        match &self.current {
            Token::Eof => self.error("Unexpected end of input"),
            tok => self.error(format!("Unexpected token {tok:?}")),
        }
    }

    /// The current token as a binding/reference identifier, honoring the
    /// contexts in which `yield` and `await` are reserved.
    fn current_identifier_name(&self) -> Option<Name> {
        match &self.current {
            Token::Identifier(name) => Some(Rc::from(name.as_str())),
            Token::Keyword(Keyword::Yield) if self.in_generator || self.strict => None,
            Token::Keyword(Keyword::Await) if self.in_async => None,
            Token::Keyword(kw) if kw.is_contextual() => Some(Rc::from(kw.as_str())),
            _ => None,
        }
    }

    fn expect_identifier(&mut self) -> Result<Name, ParseError> {
        match self.current_identifier_name() {
            Some(name) => {
                if self.strict && matches!(&*name, "eval" | "arguments") {
                    return Err(self.error("Unexpected eval or arguments in strict mode"));
                }
                self.advance()?;
                Ok(name)
            }
            None => Err(self.unexpected()),
        }
    }

    /// Property names accept any identifier name, reserved words included.
    fn current_property_name(&self) -> Option<Name> {
        match &self.current {
            Token::Identifier(name) => Some(Rc::from(name.as_str())),
            Token::Keyword(kw) => Some(Rc::from(kw.as_str())),
            Token::BooleanLiteral(b) => Some(Rc::from(if *b { "true" } else { "false" })),
            Token::NullLiteral => Some(Rc::from("null")),
            _ => None,
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        let mut in_prologue = true;
        while self.current != Token::Eof {
            let stmt = self.parse_statement_or_declaration()?;
            if in_prologue {
                match directive(&stmt) {
                    Some("use strict") => self.strict = true,
                    Some(_) => {}
                    None => in_prologue = false,
                }
            }
            body.push(stmt);
        }
        self.check_lexical_redeclaration(&body)?;
        Ok(Program {
            body: body.into(),
            strict: self.strict,
        })
    }
}

fn directive(stmt: &Statement) -> Option<&str> {
    match stmt {
        Statement::Expression(expr) => match expr.as_ref() {
            Expression::Literal(Literal::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Reinterprets an already-parsed expression as a binding/assignment target
/// (arrow parameters and destructuring assignment).
fn expr_to_pattern(expr: &Expression) -> Result<Pattern, ParseError> {
    let invalid = || ParseError {
        message: "Invalid destructuring assignment target".to_string(),
        line: 0,
    };
    match expr {
        Expression::Identifier(name) => Ok(Pattern::Identifier(name.clone())),
        Expression::Member(_, _, false) => Ok(Pattern::Member(Rc::new(expr.clone()))),
        Expression::Assign(AssignOp::Assign, target, default) => {
            Ok(Pattern::Assign(target.clone(), default.clone()))
        }
        Expression::Spread(inner) => Ok(Pattern::Rest(Rc::new(expr_to_pattern(inner)?))),
        Expression::Array(elements) => {
            let items = elements
                .iter()
                .map(|e| e.as_ref().map(expr_to_pattern).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Pattern::Array(items.into()))
        }
        Expression::Object(props) => {
            let mut out = Vec::with_capacity(props.len());
            for prop in props.iter() {
                match prop.kind {
                    PropertyKind::Spread => {
                        out.push(ObjectPatternProperty::Rest(expr_to_pattern(&prop.value)?));
                    }
                    PropertyKind::Init => {
                        if matches!(prop.value.as_ref(), Expression::Function(f) if f.kind == FunctionKind::Method)
                        {
                            return Err(invalid());
                        }
                        out.push(ObjectPatternProperty::KeyValue(
                            prop.key.clone(),
                            expr_to_pattern(&prop.value)?,
                        ));
                    }
                    PropertyKind::Get | PropertyKind::Set => return Err(invalid()),
                }
            }
            Ok(Pattern::Object(out.into()))
        }
        _ => Err(invalid()),
    }
}

fn collect_bound_names(pattern: &Pattern, names: &mut Vec<Name>) {
    match pattern {
        Pattern::Identifier(n) => names.push(n.clone()),
        Pattern::Array(items) => {
            for item in items.iter().flatten() {
                collect_bound_names(item, names);
            }
        }
        Pattern::Object(props) => {
            for prop in props.iter() {
                match prop {
                    ObjectPatternProperty::KeyValue(_, p) | ObjectPatternProperty::Rest(p) => {
                        collect_bound_names(p, names)
                    }
                }
            }
        }
        Pattern::Assign(p, _) | Pattern::Rest(p) => collect_bound_names(p, names),
        Pattern::Member(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        parse(src).unwrap()
    }

    fn first_expr(src: &str) -> Rc<Expression> {
        match &parse_ok(src).body[0] {
            Statement::Expression(e) => e.clone(),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty() {
        assert!(parse_ok("").body.is_empty());
    }

    #[test]
    fn parse_declarations() {
        let prog = parse_ok("var x = 42; let [a, ...b] = y; const {c, d: e = 1} = z;");
        assert_eq!(prog.body.len(), 3);
        assert!(matches!(&prog.body[0], Statement::Variable(v) if v.kind == VarKind::Var));
        match &prog.body[1] {
            Statement::Variable(v) => {
                assert!(matches!(v.declarations[0].pattern.as_ref(), Pattern::Array(items) if items.len() == 2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&prog.body[2], Statement::Variable(v) if v.kind == VarKind::Const));
    }

    #[test]
    fn use_strict_directive() {
        assert!(parse_ok("'use strict'; x = 1").strict);
        assert!(!parse_ok("x = 1; 'use strict'").strict);
    }

    #[test]
    fn precedence() {
        match first_expr("1 + 2 * 3").as_ref() {
            Expression::Binary(BinaryOp::Add, _, right) => {
                assert!(matches!(right.as_ref(), Expression::Binary(BinaryOp::Mul, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
        match first_expr("2 ** 3 ** 2").as_ref() {
            Expression::Binary(BinaryOp::Exp, _, right) => {
                assert!(matches!(right.as_ref(), Expression::Binary(BinaryOp::Exp, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn destructuring_assignment_becomes_pattern() {
        match first_expr("[a, b] = [b, a]").as_ref() {
            Expression::Assign(AssignOp::Assign, target, _) => {
                assert!(matches!(target.as_ref(), Pattern::Array(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        match first_expr("({a, b: {c = 2}} = o)").as_ref() {
            Expression::Assign(AssignOp::Assign, target, _) => {
                assert!(matches!(target.as_ref(), Pattern::Object(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn arrow_functions() {
        assert!(matches!(first_expr("x => x").as_ref(), Expression::Function(f) if f.kind == FunctionKind::Arrow));
        assert!(matches!(first_expr("(a, ...b) => b").as_ref(), Expression::Function(f) if f.params.len() == 2));
        assert!(matches!(first_expr("() => {}").as_ref(), Expression::Function(f) if f.params.is_empty()));
        assert!(matches!(first_expr("async (a) => await a").as_ref(), Expression::Function(f) if f.is_async));
        assert!(matches!(first_expr("async(a)").as_ref(), Expression::Call(..)));
    }

    #[test]
    fn generators_and_yield() {
        let prog = parse_ok("function* g() { const x = yield 1; yield* other(); }");
        match &prog.body[0] {
            Statement::FunctionDeclaration(f) => assert!(f.is_generator),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse("function f() { yield 1 }").is_err());
    }

    #[test]
    fn templates() {
        match first_expr("`a: ${1 + 1} b: ${x}`").as_ref() {
            Expression::Template(t) => {
                assert_eq!(t.expressions.len(), 2);
                assert_eq!(t.quasis.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(first_expr("tag`x${1}y`").as_ref(), Expression::TaggedTemplate(..)));
    }

    #[test]
    fn statements() {
        let prog = parse_ok(
            "if (a) b; else c; for (let i = 0; i < 3; i++) {} for (const k in o) {} \
             for (x of xs) {} while (0) {} do {} while (0) try {} catch {} finally {} \
             switch (x) { case 1: break; default: } outer: for (;;) break outer;",
        );
        assert_eq!(prog.body.len(), 9);
        assert!(matches!(&prog.body[2], Statement::ForIn(_)));
        assert!(matches!(&prog.body[3], Statement::ForOf(s) if matches!(s.left, ForInOfLeft::Pattern(_))));
        assert!(matches!(&prog.body[8], Statement::Labeled(..)));
    }

    #[test]
    fn automatic_semicolons() {
        let prog = parse_ok("let a = 1\nlet b = 2\nreturnValue()");
        assert_eq!(prog.body.len(), 3);
        assert!(parse("let a = 1 let b = 2").is_err());
    }

    #[test]
    fn classes() {
        let prog = parse_ok(
            "class A extends B { constructor() { super() } get x() { return 1 } set x(v) {} static s() {} *g() {} }",
        );
        match &prog.body[0] {
            Statement::ClassDeclaration(c) => {
                assert!(c.super_class.is_some());
                assert_eq!(c.members.len(), 5);
                assert_eq!(c.members[0].kind, MethodKind::Constructor);
                assert_eq!(c.members[1].kind, MethodKind::Get);
                assert!(c.members[3].is_static);
                assert!(c.members[4].value.is_generator);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn object_literal_forms() {
        match first_expr("({a, b: 1, [k]: 2, get c() { return 1 }, m() {}, ...rest, 3: x})").as_ref() {
            Expression::Object(props) => {
                assert_eq!(props.len(), 7);
                assert_eq!(props[3].kind, PropertyKind::Get);
                assert_eq!(props[5].kind, PropertyKind::Spread);
                assert!(matches!(&props[6].key, PropertyKey::Static(k) if &**k == "3"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn optional_chaining() {
        assert!(matches!(first_expr("a?.b.c").as_ref(), Expression::OptionalChain(_)));
        assert!(matches!(first_expr("a?.[0]").as_ref(), Expression::OptionalChain(_)));
        assert!(matches!(first_expr("a?.()").as_ref(), Expression::OptionalChain(_)));
    }

    #[test]
    fn rejected_forms() {
        assert!(parse("import x from 'y'").is_err());
        assert!(parse("const a;").is_err());
        assert!(parse("let a = 1; let a = 2;").is_err());
        assert!(parse("with (o) {}").is_err());
        assert!(parse("1 = 2").is_err());
    }
}
