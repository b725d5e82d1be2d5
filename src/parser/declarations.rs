use super::*;
use crate::types::{bigint_ops, number_ops};

impl<'a> Parser<'a> {
    pub(super) fn parse_variable_declaration_list(
        &mut self,
        kind: VarKind,
    ) -> Result<VariableDeclaration, ParseError> {
        let decl = self.parse_variable_declaration_list_in_for(kind)?;
        for d in decl.declarations.iter() {
            if d.init.is_some() {
                continue;
            }
            if kind == VarKind::Const {
                return Err(self.error("Missing initializer in const declaration"));
            }
            if !matches!(d.pattern.as_ref(), Pattern::Identifier(_)) {
                return Err(self.error("Missing initializer in destructuring declaration"));
            }
        }
        Ok(decl)
    }

    /// Like [`Self::parse_variable_declaration_list`] but leaves initializer
    /// checks to the caller, since `for (const x of xs)` has none.
    pub(super) fn parse_variable_declaration_list_in_for(
        &mut self,
        kind: VarKind,
    ) -> Result<VariableDeclaration, ParseError> {
        let mut declarations = Vec::new();
        loop {
            let pattern = self.parse_binding_target()?;
            if kind != VarKind::Var
                && let Pattern::Identifier(name) = &pattern
                && &**name == "let"
            {
                return Err(self.error("let is disallowed as a lexically bound name"));
            }
            let init = if self.eat_if(&Token::Assign)? {
                Some(Rc::new(self.parse_assignment_expression()?))
            } else {
                None
            };
            declarations.push(VariableDeclarator {
                pattern: Rc::new(pattern),
                init,
            });
            if !self.eat_if(&Token::Comma)? {
                break;
            }
        }
        Ok(VariableDeclaration {
            kind,
            declarations: declarations.into(),
        })
    }

    /// An identifier or a nested array/object pattern, without a default.
    pub(super) fn parse_binding_target(&mut self) -> Result<Pattern, ParseError> {
        match &self.current {
            Token::LeftBracket => self.nested(Self::parse_array_binding_pattern),
            Token::LeftBrace => self.nested(Self::parse_object_binding_pattern),
            _ => Ok(Pattern::Identifier(self.expect_identifier()?)),
        }
    }

    fn parse_binding_element(&mut self) -> Result<Pattern, ParseError> {
        let target = self.parse_binding_target()?;
        if self.eat_if(&Token::Assign)? {
            let default = self.parse_assignment_expression()?;
            return Ok(Pattern::Assign(Rc::new(target), Rc::new(default)));
        }
        Ok(target)
    }

    fn parse_array_binding_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.eat(&Token::LeftBracket)?;
        let mut items = Vec::new();
        while !self.eat_if(&Token::RightBracket)? {
            if self.eat_if(&Token::Comma)? {
                items.push(None);
                continue;
            }
            if self.eat_if(&Token::Ellipsis)? {
                let target = self.parse_binding_target()?;
                items.push(Some(Pattern::Rest(Rc::new(target))));
                self.eat(&Token::RightBracket)?;
                break;
            }
            items.push(Some(self.parse_binding_element()?));
            if self.current != Token::RightBracket {
                self.eat(&Token::Comma)?;
            }
        }
        Ok(Pattern::Array(items.into()))
    }

    fn parse_object_binding_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.eat(&Token::LeftBrace)?;
        let mut props = Vec::new();
        while !self.eat_if(&Token::RightBrace)? {
            if self.eat_if(&Token::Ellipsis)? {
                let name = self.expect_identifier()?;
                props.push(ObjectPatternProperty::Rest(Pattern::Identifier(name)));
                self.eat(&Token::RightBrace)?;
                break;
            }
            let shorthand = self.current_identifier_name();
            let key = self.parse_property_key()?;
            let value = if self.eat_if(&Token::Colon)? {
                self.parse_binding_element()?
            } else {
                let Some(name) = shorthand else {
                    return Err(self.unexpected());
                };
                if self.strict && matches!(&*name, "eval" | "arguments") {
                    return Err(self.error("Unexpected eval or arguments in strict mode"));
                }
                let target = Pattern::Identifier(name);
                if self.eat_if(&Token::Assign)? {
                    let default = self.parse_assignment_expression()?;
                    Pattern::Assign(Rc::new(target), Rc::new(default))
                } else {
                    target
                }
            };
            props.push(ObjectPatternProperty::KeyValue(key, value));
            if self.current != Token::RightBrace {
                self.eat(&Token::Comma)?;
            }
        }
        Ok(Pattern::Object(props.into()))
    }

    /// Identifier names, string and numeric literals, or `[expr]`.
    pub(super) fn parse_property_key(&mut self) -> Result<PropertyKey, ParseError> {
        if let Some(name) = self.current_property_name() {
            self.advance()?;
            return Ok(PropertyKey::Static(name));
        }
        match self.advance()? {
            Token::StringLiteral(s) => Ok(PropertyKey::Static(Rc::from(s.as_str()))),
            Token::NumericLiteral(n) => Ok(PropertyKey::Static(Rc::from(number_ops::to_string(n)))),
            Token::BigIntLiteral(s) => {
                let key = bigint_ops::parse_literal(&s).map_or(s, |b| b.to_string());
                Ok(PropertyKey::Static(Rc::from(key)))
            }
            Token::LeftBracket => {
                let saved_no_in = std::mem::replace(&mut self.no_in, false);
                let expr = self.parse_assignment_expression();
                self.no_in = saved_no_in;
                let expr = expr?;
                self.eat(&Token::RightBracket)?;
                Ok(PropertyKey::Computed(Rc::new(expr)))
            }
            tok => Err(self.error(format!("Unexpected token {tok:?} in property name"))),
        }
    }

    pub(super) fn parse_function_declaration(&mut self, is_async: bool) -> Result<Statement, ParseError> {
        self.eat(&Token::Keyword(Keyword::Function))?;
        let is_generator = self.eat_if(&Token::Star)?;
        let name = self.expect_identifier()?;
        let func = self.parse_function_rest(Some(name), FunctionKind::Normal, is_async, is_generator)?;
        Ok(Statement::FunctionDeclaration(Rc::new(func)))
    }

    pub(super) fn parse_function_expression(&mut self, is_async: bool) -> Result<Expression, ParseError> {
        self.eat(&Token::Keyword(Keyword::Function))?;
        let is_generator = self.eat_if(&Token::Star)?;
        // The name of a generator/async expression is bound inside its own
        // context, so `function* yield() {}` is rejected.
        let saved = (self.in_generator, self.in_async);
        self.in_generator = is_generator;
        self.in_async = is_async;
        let name = if self.current == Token::LeftParen {
            Ok(None)
        } else {
            self.expect_identifier().map(Some)
        };
        (self.in_generator, self.in_async) = saved;
        let func = self.parse_function_rest(name?, FunctionKind::Normal, is_async, is_generator)?;
        Ok(Expression::Function(Rc::new(func)))
    }

    /// Parameters and body, starting at `(`.
    pub(super) fn parse_function_rest(
        &mut self,
        name: Option<Name>,
        kind: FunctionKind,
        is_async: bool,
        is_generator: bool,
    ) -> Result<FunctionNode, ParseError> {
        let saved = (self.in_function, self.in_generator, self.in_async, self.strict, self.no_in);
        self.in_function = true;
        self.in_generator = is_generator;
        self.in_async = is_async;
        self.no_in = false;
        let result = self.parse_params_and_body();
        let strict = self.strict;
        (self.in_function, self.in_generator, self.in_async, self.strict, self.no_in) = saved;
        let (params, body) = result?;
        Ok(FunctionNode {
            name,
            params,
            body,
            kind,
            is_async,
            is_generator,
            strict,
        })
    }

    fn parse_params_and_body(&mut self) -> Result<(Rc<[Pattern]>, Rc<[Statement]>), ParseError> {
        self.eat(&Token::LeftParen)?;
        let params = self.parse_formal_parameters()?;
        let body = self.parse_function_body()?;
        Ok((params, body))
    }

    /// Parameters up to and including the closing `)`.
    pub(super) fn parse_formal_parameters(&mut self) -> Result<Rc<[Pattern]>, ParseError> {
        let mut params = Vec::new();
        while !self.eat_if(&Token::RightParen)? {
            if self.eat_if(&Token::Ellipsis)? {
                let target = self.parse_binding_target()?;
                params.push(Pattern::Rest(Rc::new(target)));
                self.eat(&Token::RightParen)?;
                break;
            }
            params.push(self.parse_binding_element()?);
            if self.current != Token::RightParen {
                self.eat(&Token::Comma)?;
            }
        }
        Ok(params.into())
    }

    /// `{ ... }` with its own directive prologue.
    pub(super) fn parse_function_body(&mut self) -> Result<Rc<[Statement]>, ParseError> {
        self.eat(&Token::LeftBrace)?;
        let mut body = Vec::new();
        let mut in_prologue = true;
        while self.current != Token::RightBrace && self.current != Token::Eof {
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
        self.eat(&Token::RightBrace)?;
        self.check_lexical_redeclaration(&body)?;
        Ok(body.into())
    }

    pub(super) fn parse_class_declaration(&mut self) -> Result<Statement, ParseError> {
        self.eat(&Token::Keyword(Keyword::Class))?;
        let name = self.expect_identifier()?;
        let class = self.parse_class_rest(Some(name))?;
        Ok(Statement::ClassDeclaration(Rc::new(class)))
    }

    pub(super) fn parse_class_expression(&mut self) -> Result<Expression, ParseError> {
        self.eat(&Token::Keyword(Keyword::Class))?;
        let name = if matches!(self.current, Token::LeftBrace | Token::Keyword(Keyword::Extends)) {
            None
        } else {
            Some(self.expect_identifier()?)
        };
        Ok(Expression::Class(Rc::new(self.parse_class_rest(name)?)))
    }

    fn parse_class_rest(&mut self, name: Option<Name>) -> Result<ClassNode, ParseError> {
        let saved_strict = std::mem::replace(&mut self.strict, true);
        let result = self.parse_class_tail(name);
        self.strict = saved_strict;
        result
    }

    fn parse_class_tail(&mut self, name: Option<Name>) -> Result<ClassNode, ParseError> {
        let super_class = if self.eat_if(&Token::Keyword(Keyword::Extends))? {
            Some(Rc::new(self.parse_left_hand_side_expression()?))
        } else {
            None
        };
        self.eat(&Token::LeftBrace)?;
        let mut members = Vec::new();
        let mut has_constructor = false;
        while !self.eat_if(&Token::RightBrace)? {
            if self.eat_if(&Token::Semicolon)? {
                continue;
            }
            let member = self.parse_class_member()?;
            if member.kind == MethodKind::Constructor {
                if has_constructor {
                    return Err(self.error("A class may only have one constructor"));
                }
                has_constructor = true;
            }
            members.push(member);
        }
        Ok(ClassNode {
            name,
            super_class,
            members: members.into(),
        })
    }

    /// Whether the current word is a modifier (`static`, `get`, ...) rather
    /// than the method's own name.
    fn is_member_modifier(&self) -> Result<bool, ParseError> {
        let (next, line_break) = self.peek_ahead()?;
        Ok(!matches!(
            next,
            Token::LeftParen | Token::Assign | Token::Semicolon | Token::RightBrace
        ) && !line_break)
    }

    fn parse_class_member(&mut self) -> Result<ClassMember, ParseError> {
        let mut is_static = false;
        if self.is_keyword(Keyword::Static) && self.is_member_modifier()? {
            self.advance()?;
            is_static = true;
        }
        let mut is_async = false;
        if self.is_keyword(Keyword::Async) && self.is_member_modifier()? {
            self.advance()?;
            is_async = true;
        }
        let is_generator = self.eat_if(&Token::Star)?;
        let mut kind = MethodKind::Method;
        if !is_async
            && !is_generator
            && matches!(&self.current, Token::Identifier(w) if w == "get" || w == "set")
            && self.is_member_modifier()?
        {
            kind = if self.current == Token::Identifier("get".into()) {
                MethodKind::Get
            } else {
                MethodKind::Set
            };
            self.advance()?;
        }
        let key = self.parse_property_key()?;
        if self.current != Token::LeftParen {
            return Err(self.error("Class fields are not supported"));
        }
        let is_constructor = !is_static && matches!(&key, PropertyKey::Static(k) if &**k == "constructor");
        let func_kind = if is_constructor {
            if kind != MethodKind::Method || is_async || is_generator {
                return Err(self.error("Class constructor may not be a special method"));
            }
            kind = MethodKind::Constructor;
            FunctionKind::Constructor
        } else {
            FunctionKind::Method
        };
        let name = match &key {
            PropertyKey::Static(k) => Some(k.clone()),
            PropertyKey::Computed(_) => None,
        };
        let value = self.parse_function_rest(name, func_kind, is_async, is_generator)?;
        Ok(ClassMember {
            key,
            kind,
            value: Rc::new(value),
            is_static,
        })
    }
}
