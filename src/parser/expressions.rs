use super::*;

/// Binding power of each binary operator; `**` is the only right-associative
/// level.
fn binary_precedence(tok: &Token, no_in: bool) -> Option<(u8, BinaryOrLogical)> {
    use BinaryOrLogical::{Binary as B, Logical as L};
    Some(match tok {
        Token::NullishCoalescing => (1, L(LogicalOp::NullishCoalescing)),
        Token::LogicalOr => (2, L(LogicalOp::Or)),
        Token::LogicalAnd => (3, L(LogicalOp::And)),
        Token::Pipe => (4, B(BinaryOp::BitOr)),
        Token::Caret => (5, B(BinaryOp::BitXor)),
        Token::Ampersand => (6, B(BinaryOp::BitAnd)),
        Token::Equal => (7, B(BinaryOp::Eq)),
        Token::NotEqual => (7, B(BinaryOp::NotEq)),
        Token::StrictEqual => (7, B(BinaryOp::StrictEq)),
        Token::StrictNotEqual => (7, B(BinaryOp::StrictNotEq)),
        Token::LessThan => (8, B(BinaryOp::Lt)),
        Token::GreaterThan => (8, B(BinaryOp::Gt)),
        Token::LessThanEqual => (8, B(BinaryOp::LtEq)),
        Token::GreaterThanEqual => (8, B(BinaryOp::GtEq)),
        Token::Keyword(Keyword::Instanceof) => (8, B(BinaryOp::Instanceof)),
        Token::Keyword(Keyword::In) if !no_in => (8, B(BinaryOp::In)),
        Token::LeftShift => (9, B(BinaryOp::LShift)),
        Token::RightShift => (9, B(BinaryOp::RShift)),
        Token::UnsignedRightShift => (9, B(BinaryOp::URShift)),
        Token::Plus => (10, B(BinaryOp::Add)),
        Token::Minus => (10, B(BinaryOp::Sub)),
        Token::Star => (11, B(BinaryOp::Mul)),
        Token::Slash => (11, B(BinaryOp::Div)),
        Token::Percent => (11, B(BinaryOp::Mod)),
        Token::Exponent => (12, B(BinaryOp::Exp)),
        _ => return None,
    })
}

#[derive(Clone, Copy)]
enum BinaryOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn assign_op(tok: &Token) -> Option<AssignOp> {
    Some(match tok {
        Token::Assign => AssignOp::Assign,
        Token::PlusAssign => AssignOp::AddAssign,
        Token::MinusAssign => AssignOp::SubAssign,
        Token::StarAssign => AssignOp::MulAssign,
        Token::SlashAssign => AssignOp::DivAssign,
        Token::PercentAssign => AssignOp::ModAssign,
        Token::ExponentAssign => AssignOp::ExpAssign,
        Token::LeftShiftAssign => AssignOp::LShiftAssign,
        Token::RightShiftAssign => AssignOp::RShiftAssign,
        Token::UnsignedRightShiftAssign => AssignOp::URShiftAssign,
        Token::AmpersandAssign => AssignOp::BitAndAssign,
        Token::PipeAssign => AssignOp::BitOrAssign,
        Token::CaretAssign => AssignOp::BitXorAssign,
        Token::LogicalAndAssign => AssignOp::LogicalAndAssign,
        Token::LogicalOrAssign => AssignOp::LogicalOrAssign,
        Token::NullishAssign => AssignOp::NullishAssign,
        _ => return None,
    })
}

fn is_simple_target(expr: &Expression) -> bool {
    matches!(expr, Expression::Identifier(_) | Expression::Member(_, _, false))
}

/// Parser position saved for a speculative parse.
struct Snapshot<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev_line_terminator: bool,
}

impl<'a> Parser<'a> {
    fn snapshot(&self) -> Snapshot<'a> {
        Snapshot {
            lexer: self.lexer.clone(),
            current: self.current.clone(),
            prev_line_terminator: self.prev_line_terminator,
        }
    }

    fn restore(&mut self, snapshot: Snapshot<'a>) {
        self.lexer = snapshot.lexer;
        self.current = snapshot.current;
        self.prev_line_terminator = snapshot.prev_line_terminator;
    }

    pub(super) fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_assignment_expression()?;
        if self.current != Token::Comma {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat_if(&Token::Comma)? {
            exprs.push(self.parse_assignment_expression()?);
        }
        Ok(Expression::Sequence(exprs.into()))
    }

    pub(super) fn parse_assignment_expression(&mut self) -> Result<Expression, ParseError> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> Result<Expression, ParseError> {
        if self.in_generator && self.is_keyword(Keyword::Yield) {
            return self.parse_yield_expression();
        }
        if let Some(arrow) = self.try_parse_arrow_function()? {
            return Ok(arrow);
        }

        let left = self.parse_conditional_expression()?;
        let Some(op) = assign_op(&self.current) else {
            return Ok(left);
        };
        let target = match (&left, op) {
            (Expression::Array(_) | Expression::Object(_), AssignOp::Assign) => {
                expr_to_pattern(&left).map_err(|e| self.error(e.message))?
            }
            (Expression::Identifier(name), _) => {
                if self.strict && matches!(&**name, "eval" | "arguments") {
                    return Err(self.error("Unexpected eval or arguments in strict mode"));
                }
                Pattern::Identifier(name.clone())
            }
            (expr, _) if is_simple_target(expr) => Pattern::Member(Rc::new(left.clone())),
            _ => return Err(self.error("Invalid left-hand side in assignment")),
        };
        self.advance()?;
        let value = self.parse_assignment_expression()?;
        Ok(Expression::Assign(op, Rc::new(target), Rc::new(value)))
    }

    fn parse_yield_expression(&mut self) -> Result<Expression, ParseError> {
        self.advance()?;
        if self.eat_if(&Token::Star)? {
            let arg = self.parse_assignment_expression()?;
            return Ok(Expression::Yield(Some(Rc::new(arg)), true));
        }
        let ends_here = self.prev_line_terminator
            || matches!(
                self.current,
                Token::RightParen
                    | Token::RightBracket
                    | Token::RightBrace
                    | Token::Comma
                    | Token::Semicolon
                    | Token::Colon
                    | Token::Eof
                    | Token::TemplateMiddle(..)
                    | Token::TemplateTail(..)
            );
        if ends_here {
            return Ok(Expression::Yield(None, false));
        }
        let arg = self.parse_assignment_expression()?;
        Ok(Expression::Yield(Some(Rc::new(arg)), false))
    }

    fn try_parse_arrow_function(&mut self) -> Result<Option<Expression>, ParseError> {
        let is_async = self.is_keyword(Keyword::Async);
        if is_async {
            let (next, line_break) = self.peek_ahead()?;
            if line_break {
                return Ok(None);
            }
            match next {
                Token::Identifier(_) => {
                    self.advance()?;
                    let name = self.expect_identifier()?;
                    if self.current != Token::Arrow || self.prev_line_terminator {
                        return Err(self.unexpected());
                    }
                    let params: Rc<[Pattern]> = Rc::from(vec![Pattern::Identifier(name)]);
                    return self.parse_arrow_body(params, true).map(Some);
                }
                Token::LeftParen => {
                    let snapshot = self.snapshot();
                    self.advance()?;
                    return self.finish_parenthesized_arrow(snapshot, true);
                }
                _ => return Ok(None),
            }
        }

        if let Some(name) = self.current_identifier_name() {
            let (next, line_break) = self.peek_ahead()?;
            if next == Token::Arrow && !line_break {
                if self.strict && matches!(&*name, "eval" | "arguments") {
                    return Err(self.error("Unexpected eval or arguments in strict mode"));
                }
                self.advance()?;
                let params: Rc<[Pattern]> = Rc::from(vec![Pattern::Identifier(name)]);
                return self.parse_arrow_body(params, false).map(Some);
            }
            return Ok(None);
        }

        if self.current == Token::LeftParen {
            let snapshot = self.snapshot();
            return self.finish_parenthesized_arrow(snapshot, false);
        }
        Ok(None)
    }

    /// Tries `( params ) =>` at the current `(`; on failure rewinds to
    /// `snapshot` and reports no arrow.
    fn finish_parenthesized_arrow(
        &mut self,
        snapshot: Snapshot<'a>,
        is_async: bool,
    ) -> Result<Option<Expression>, ParseError> {
        let saved_async = self.in_async;
        self.in_async = self.in_async || is_async;
        let head = self
            .eat(&Token::LeftParen)
            .and_then(|()| self.parse_formal_parameters());
        self.in_async = saved_async;
        match head {
            Ok(params) if self.current == Token::Arrow && !self.prev_line_terminator => {
                self.parse_arrow_body(params, is_async).map(Some)
            }
            _ => {
                self.restore(snapshot);
                Ok(None)
            }
        }
    }

    /// Consumes `=>` and the body.
    fn parse_arrow_body(&mut self, params: Rc<[Pattern]>, is_async: bool) -> Result<Expression, ParseError> {
        self.eat(&Token::Arrow)?;
        let saved = (self.in_function, self.in_generator, self.in_async, self.strict);
        self.in_function = true;
        self.in_generator = false;
        self.in_async = is_async;
        let body = if self.current == Token::LeftBrace {
            let saved_no_in = std::mem::replace(&mut self.no_in, false);
            let body = self.parse_function_body();
            self.no_in = saved_no_in;
            body
        } else {
            self.parse_assignment_expression()
                .map(|expr| Rc::from(vec![Statement::Return(Some(Rc::new(expr)))]))
        };
        let strict = self.strict;
        (self.in_function, self.in_generator, self.in_async, self.strict) = saved;
        Ok(Expression::Function(Rc::new(FunctionNode {
            name: None,
            params,
            body: body?,
            kind: FunctionKind::Arrow,
            is_async,
            is_generator: false,
            strict,
        })))
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, ParseError> {
        let test = self.parse_binary_expression(0)?;
        if !self.eat_if(&Token::Question)? {
            return Ok(test);
        }
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let consequent = self.parse_assignment_expression();
        self.no_in = saved_no_in;
        let consequent = consequent?;
        self.eat(&Token::Colon)?;
        let alternate = self.parse_assignment_expression()?;
        Ok(Expression::Conditional(
            Rc::new(test),
            Rc::new(consequent),
            Rc::new(alternate),
        ))
    }

    /// Precedence climbing over [`binary_precedence`].
    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary_expression()?;
        while let Some((prec, op)) = binary_precedence(&self.current, self.no_in) {
            if prec <= min_prec {
                break;
            }
            self.advance()?;
            let right = if prec == 12 {
                self.nested(|p| p.parse_binary_expression(prec - 1))?
            } else {
                self.parse_binary_expression(prec)?
            };
            left = match op {
                BinaryOrLogical::Binary(op) => Expression::Binary(op, Rc::new(left), Rc::new(right)),
                BinaryOrLogical::Logical(op) => Expression::Logical(op, Rc::new(left), Rc::new(right)),
            };
        }
        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, ParseError> {
        let unary = match &self.current {
            Token::Minus => Some(UnaryOp::Minus),
            Token::Plus => Some(UnaryOp::Plus),
            Token::Bang => Some(UnaryOp::Not),
            Token::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = unary {
            self.advance()?;
            let arg = self.nested(Self::parse_unary_expression)?;
            return Ok(Expression::Unary(op, Rc::new(arg)));
        }
        match &self.current {
            Token::Keyword(Keyword::Typeof) => {
                self.advance()?;
                Ok(Expression::Typeof(Rc::new(self.nested(Self::parse_unary_expression)?)))
            }
            Token::Keyword(Keyword::Void) => {
                self.advance()?;
                Ok(Expression::Void(Rc::new(self.nested(Self::parse_unary_expression)?)))
            }
            Token::Keyword(Keyword::Delete) => {
                self.advance()?;
                let arg = self.nested(Self::parse_unary_expression)?;
                if self.strict && matches!(arg, Expression::Identifier(_)) {
                    return Err(self.error("Delete of an unqualified identifier in strict mode"));
                }
                Ok(Expression::Delete(Rc::new(arg)))
            }
            Token::Keyword(Keyword::Await) if self.in_async => {
                self.advance()?;
                Ok(Expression::Await(Rc::new(self.nested(Self::parse_unary_expression)?)))
            }
            Token::Increment | Token::Decrement => {
                let op = if self.current == Token::Increment {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                self.advance()?;
                let target = self.nested(Self::parse_unary_expression)?;
                if !is_simple_target(&target) {
                    return Err(self.error("Invalid left-hand side expression in prefix operation"));
                }
                Ok(Expression::Update(op, true, Rc::new(target)))
            }
            _ => self.parse_postfix_expression(),
        }
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_left_hand_side_expression()?;
        let op = match self.current {
            Token::Increment => UpdateOp::Increment,
            Token::Decrement => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if self.prev_line_terminator {
            return Ok(expr);
        }
        if !is_simple_target(&expr) {
            return Err(self.error("Invalid left-hand side expression in postfix operation"));
        }
        self.advance()?;
        Ok(Expression::Update(op, false, Rc::new(expr)))
    }

    /// Member accesses, calls, `new`, tagged templates and optional chains.
    pub(super) fn parse_left_hand_side_expression(&mut self) -> Result<Expression, ParseError> {
        let mut expr = if self.is_keyword(Keyword::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };
        let mut optional_chain = false;
        loop {
            match &self.current {
                Token::Dot => {
                    self.advance()?;
                    let name = self.expect_property_name()?;
                    expr = Expression::Member(Rc::new(expr), MemberProperty::Dot(name), false);
                }
                Token::LeftBracket => {
                    let prop = self.parse_computed_member()?;
                    expr = Expression::Member(Rc::new(expr), prop, false);
                }
                Token::LeftParen => {
                    let args = self.parse_arguments()?;
                    expr = Expression::Call(Rc::new(expr), args, false);
                }
                Token::OptionalChain => {
                    self.advance()?;
                    optional_chain = true;
                    expr = match &self.current {
                        Token::LeftParen => Expression::Call(Rc::new(expr), self.parse_arguments()?, true),
                        Token::LeftBracket => {
                            let prop = self.parse_computed_member()?;
                            Expression::Member(Rc::new(expr), prop, true)
                        }
                        Token::NoSubstitutionTemplate(..) | Token::TemplateHead(..) => {
                            return Err(self.error("Invalid tagged template on optional chain"));
                        }
                        _ => {
                            let name = self.expect_property_name()?;
                            Expression::Member(Rc::new(expr), MemberProperty::Dot(name), true)
                        }
                    };
                }
                Token::NoSubstitutionTemplate(..) | Token::TemplateHead(..) => {
                    if optional_chain {
                        return Err(self.error("Invalid tagged template on optional chain"));
                    }
                    let quasi = self.parse_template_literal(true)?;
                    expr = Expression::TaggedTemplate(Rc::new(expr), Rc::new(quasi));
                }
                _ => break,
            }
        }
        if optional_chain {
            expr = Expression::OptionalChain(Rc::new(expr));
        }
        Ok(expr)
    }

    fn parse_new_expression(&mut self) -> Result<Expression, ParseError> {
        self.eat(&Token::Keyword(Keyword::New))?;
        if self.current == Token::Dot {
            return Err(self.error("new.target is not supported"));
        }
        let mut callee = if self.is_keyword(Keyword::New) {
            self.nested(Self::parse_new_expression)?
        } else {
            self.parse_primary_expression()?
        };
        loop {
            match &self.current {
                Token::Dot => {
                    self.advance()?;
                    let name = self.expect_property_name()?;
                    callee = Expression::Member(Rc::new(callee), MemberProperty::Dot(name), false);
                }
                Token::LeftBracket => {
                    let prop = self.parse_computed_member()?;
                    callee = Expression::Member(Rc::new(callee), prop, false);
                }
                Token::NoSubstitutionTemplate(..) | Token::TemplateHead(..) => {
                    let quasi = self.parse_template_literal(true)?;
                    callee = Expression::TaggedTemplate(Rc::new(callee), Rc::new(quasi));
                }
                Token::OptionalChain => return Err(self.error("Invalid optional chain from new expression")),
                _ => break,
            }
        }
        let args = if self.current == Token::LeftParen {
            self.parse_arguments()?
        } else {
            Rc::from(Vec::new())
        };
        Ok(Expression::New(Rc::new(callee), args))
    }

    fn expect_property_name(&mut self) -> Result<Name, ParseError> {
        match self.current_property_name() {
            Some(name) => {
                self.advance()?;
                Ok(name)
            }
            None => Err(self.unexpected()),
        }
    }

    fn parse_computed_member(&mut self) -> Result<MemberProperty, ParseError> {
        self.eat(&Token::LeftBracket)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let expr = self.parse_expression();
        self.no_in = saved_no_in;
        let expr = expr?;
        self.eat(&Token::RightBracket)?;
        Ok(MemberProperty::Computed(Rc::new(expr)))
    }

    fn parse_arguments(&mut self) -> Result<Rc<[Expression]>, ParseError> {
        self.eat(&Token::LeftParen)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let args = self.parse_argument_list();
        self.no_in = saved_no_in;
        args
    }

    fn parse_argument_list(&mut self) -> Result<Rc<[Expression]>, ParseError> {
        let mut args = Vec::new();
        while !self.eat_if(&Token::RightParen)? {
            if self.eat_if(&Token::Ellipsis)? {
                args.push(Expression::Spread(Rc::new(self.parse_assignment_expression()?)));
            } else {
                args.push(self.parse_assignment_expression()?);
            }
            if self.current != Token::RightParen {
                self.eat(&Token::Comma)?;
            }
        }
        Ok(args.into())
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, ParseError> {
        match &self.current {
            Token::Keyword(Keyword::This) => {
                self.advance()?;
                Ok(Expression::This)
            }
            Token::Keyword(Keyword::Super) => {
                self.advance()?;
                if !matches!(self.current, Token::LeftParen | Token::Dot | Token::LeftBracket) {
                    return Err(self.error("'super' keyword unexpected here"));
                }
                Ok(Expression::Super)
            }
            Token::NullLiteral => {
                self.advance()?;
                Ok(Expression::Literal(Literal::Null))
            }
            Token::BooleanLiteral(b) => {
                let b = *b;
                self.advance()?;
                Ok(Expression::Literal(Literal::Boolean(b)))
            }
            Token::NumericLiteral(n) => {
                let n = *n;
                self.advance()?;
                Ok(Expression::Literal(Literal::Number(n)))
            }
            Token::BigIntLiteral(s) => {
                let lit = Literal::BigInt(Rc::from(s.as_str()));
                self.advance()?;
                Ok(Expression::Literal(lit))
            }
            Token::StringLiteral(s) => {
                let lit = Literal::String(Rc::from(s.as_str()));
                self.advance()?;
                Ok(Expression::Literal(lit))
            }
            Token::NoSubstitutionTemplate(..) | Token::TemplateHead(..) => {
                let template = self.parse_template_literal(false)?;
                Ok(Expression::Template(Rc::new(template)))
            }
            Token::LeftBracket => self.parse_array_literal(),
            Token::LeftBrace => self.parse_object_literal(),
            Token::LeftParen => self.parse_parenthesized_expression(),
            Token::Keyword(Keyword::Function) => self.parse_function_expression(false),
            Token::Keyword(Keyword::Async) if self.async_starts_function()? => {
                self.advance()?;
                self.parse_function_expression(true)
            }
            Token::Keyword(Keyword::Class) => self.parse_class_expression(),
            _ => match self.current_identifier_name() {
                Some(name) => {
                    self.advance()?;
                    Ok(Expression::Identifier(name))
                }
                None => Err(self.unexpected()),
            },
        }
    }

    fn parse_parenthesized_expression(&mut self) -> Result<Expression, ParseError> {
        self.eat(&Token::LeftParen)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let expr = self.parse_expression();
        self.no_in = saved_no_in;
        let expr = expr?;
        self.eat(&Token::RightParen)?;
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> Result<Expression, ParseError> {
        self.eat(&Token::LeftBracket)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let elements = self.parse_array_elements();
        self.no_in = saved_no_in;
        Ok(Expression::Array(elements?))
    }

    fn parse_array_elements(&mut self) -> Result<Rc<[Option<Expression>]>, ParseError> {
        let mut elements = Vec::new();
        while !self.eat_if(&Token::RightBracket)? {
            if self.eat_if(&Token::Comma)? {
                elements.push(None);
                continue;
            }
            let element = if self.eat_if(&Token::Ellipsis)? {
                Expression::Spread(Rc::new(self.parse_assignment_expression()?))
            } else {
                self.parse_assignment_expression()?
            };
            elements.push(Some(element));
            if self.current != Token::RightBracket {
                self.eat(&Token::Comma)?;
            }
        }
        Ok(elements.into())
    }

    fn parse_object_literal(&mut self) -> Result<Expression, ParseError> {
        self.eat(&Token::LeftBrace)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let mut props = Vec::new();
        let result = loop {
            match self.eat_if(&Token::RightBrace) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            }
            match self.parse_object_property() {
                Ok(prop) => props.push(prop),
                Err(e) => break Err(e),
            }
            if self.current != Token::RightBrace
                && let Err(e) = self.eat(&Token::Comma)
            {
                break Err(e);
            }
        };
        self.no_in = saved_no_in;
        result?;
        Ok(Expression::Object(props.into()))
    }

    fn parse_object_property(&mut self) -> Result<Property, ParseError> {
        if self.eat_if(&Token::Ellipsis)? {
            let value = self.parse_assignment_expression()?;
            return Ok(Property {
                key: PropertyKey::Static(Rc::from("")),
                value: Rc::new(value),
                kind: PropertyKind::Spread,
            });
        }

        let (next, line_break) = self.peek_ahead()?;
        let next_is_key = !matches!(
            next,
            Token::LeftParen | Token::Colon | Token::Comma | Token::RightBrace | Token::Assign
        );

        if self.is_keyword(Keyword::Async) && next_is_key && !line_break {
            self.advance()?;
            let is_generator = self.eat_if(&Token::Star)?;
            return self.parse_method_property(true, is_generator);
        }
        if self.current == Token::Star {
            self.advance()?;
            return self.parse_method_property(false, true);
        }
        let accessor = match &self.current {
            Token::Identifier(w) if w == "get" => Some(PropertyKind::Get),
            Token::Identifier(w) if w == "set" => Some(PropertyKind::Set),
            _ => None,
        };
        if let Some(kind) = accessor
            && next_is_key
        {
            self.advance()?;
            let key = self.parse_property_key()?;
            let func = self.parse_function_rest(static_key_name(&key), FunctionKind::Method, false, false)?;
            return Ok(Property {
                key,
                value: Rc::new(Expression::Function(Rc::new(func))),
                kind,
            });
        }

        let shorthand = self.current_identifier_name();
        let key = self.parse_property_key()?;
        match &self.current {
            Token::Colon => {
                self.advance()?;
                let value = self.parse_assignment_expression()?;
                Ok(Property {
                    key,
                    value: Rc::new(value),
                    kind: PropertyKind::Init,
                })
            }
            Token::LeftParen => {
                let func = self.parse_function_rest(static_key_name(&key), FunctionKind::Method, false, false)?;
                Ok(Property {
                    key,
                    value: Rc::new(Expression::Function(Rc::new(func))),
                    kind: PropertyKind::Init,
                })
            }
            _ => {
                let Some(name) = shorthand else {
                    return Err(self.unexpected());
                };
                // `{a = 1}` only makes sense as a destructuring target.
                let value = if self.eat_if(&Token::Assign)? {
                    let default = self.parse_assignment_expression()?;
                    Expression::Assign(
                        AssignOp::Assign,
                        Rc::new(Pattern::Identifier(name)),
                        Rc::new(default),
                    )
                } else {
                    Expression::Identifier(name)
                };
                Ok(Property {
                    key,
                    value: Rc::new(value),
                    kind: PropertyKind::Init,
                })
            }
        }
    }

    fn parse_method_property(&mut self, is_async: bool, is_generator: bool) -> Result<Property, ParseError> {
        let key = self.parse_property_key()?;
        let func = self.parse_function_rest(static_key_name(&key), FunctionKind::Method, is_async, is_generator)?;
        Ok(Property {
            key,
            value: Rc::new(Expression::Function(Rc::new(func))),
            kind: PropertyKind::Init,
        })
    }

    /// Parses a template starting at its first piece. Tagged templates keep
    /// pieces with invalid escapes as `None`; untagged ones reject them.
    fn parse_template_literal(&mut self, tagged: bool) -> Result<TemplateLiteral, ParseError> {
        let mut quasis = Vec::new();
        let mut raw_quasis = Vec::new();
        let mut expressions = Vec::new();
        let mut piece = self.current.clone();
        loop {
            let (cooked, raw, is_tail) = match piece {
                Token::NoSubstitutionTemplate(c, r) | Token::TemplateTail(c, r) => (c, r, true),
                Token::TemplateHead(c, r) | Token::TemplateMiddle(c, r) => (c, r, false),
                _ => return Err(self.unexpected()),
            };
            if cooked.is_none() && !tagged {
                return Err(self.error("Invalid escape sequence in template"));
            }
            quasis.push(cooked.map(|s| Rc::from(s.as_str())));
            raw_quasis.push(Rc::from(raw.as_str()));
            if is_tail {
                self.advance()?;
                break;
            }

            self.advance()?;
            let saved_no_in = std::mem::replace(&mut self.no_in, false);
            let expr = self.parse_expression();
            self.no_in = saved_no_in;
            expressions.push(Rc::new(expr?));
            if self.current != Token::RightBrace {
                return Err(self.unexpected());
            }
            // The lexer has consumed exactly the closing `}`.
            piece = self.lexer.read_template_continuation()?;
            self.current = piece.clone();
            self.prev_line_terminator = false;
        }
        Ok(TemplateLiteral {
            quasis,
            raw_quasis,
            expressions,
        })
    }
}

fn static_key_name(key: &PropertyKey) -> Option<Name> {
    match key {
        PropertyKey::Static(k) => Some(k.clone()),
        PropertyKey::Computed(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_table_orders_levels() {
        let prec = |t: Token| binary_precedence(&t, false).map(|(p, _)| p);
        assert!(prec(Token::Star) > prec(Token::Plus));
        assert!(prec(Token::Plus) > prec(Token::LessThan));
        assert!(prec(Token::LogicalAnd) > prec(Token::LogicalOr));
        assert!(binary_precedence(&Token::Keyword(Keyword::In), true).is_none());
    }

    #[test]
    fn numeric_property_keys_are_canonical() {
        let prog = parse("({0x10: 1, 1.50: 2})").unwrap();
        let Statement::Expression(expr) = &prog.body[0] else {
            panic!("expected expression");
        };
        let Expression::Object(props) = expr.as_ref() else {
            panic!("expected object");
        };
        let keys: Vec<_> = props
            .iter()
            .map(|p| match &p.key {
                PropertyKey::Static(k) => k.to_string(),
                PropertyKey::Computed(_) => String::new(),
            })
            .collect();
        assert_eq!(keys, ["16", "1.5"]);
    }

    #[test]
    fn in_operator_allowed_inside_for_parens() {
        assert!(parse("for (var i = ('a' in o) ? 1 : 0; i < 1; i++) {}").is_ok());
        assert!(parse("for (const k in {a: 1}) {}").is_ok());
    }

    #[test]
    fn untagged_template_rejects_bad_escape() {
        assert!(parse("`\\unicode`").is_err());
        assert!(parse("tag`\\unicode`").is_ok());
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        for (open, close) in [("(", ")"), ("[", "]"), ("!", ""), ("a = ", ""), ("2 ** ", "")] {
            let src = format!("{}1{}", open.repeat(5000), close.repeat(5000));
            let err = parse(&src).unwrap_err();
            assert_eq!(err.message, "nesting too deep", "{open}");
        }
        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn deep_statement_nesting_is_a_syntax_error() {
        let blocks = format!("{}{}", "{".repeat(5000), "}".repeat(5000));
        assert_eq!(parse(&blocks).unwrap_err().message, "nesting too deep");
        let ifs = format!("{}x;", "if (1) ".repeat(5000));
        assert_eq!(parse(&ifs).unwrap_err().message, "nesting too deep");
        let pattern = format!("let {}a{} = 1;", "[".repeat(5000), "]".repeat(5000));
        assert_eq!(parse(&pattern).unwrap_err().message, "nesting too deep");
    }

    #[test]
    fn assignment_targets() {
        assert!(parse("a.b += 1; a[0] ??= 2; x++; --y.z").is_ok());
        assert!(parse("a?.b = 1").is_err());
        assert!(parse("[a] += 1").is_err());
        assert!(parse("f() = 1").is_err());
    }
}
