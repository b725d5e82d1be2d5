use super::*;

impl<'a> Parser<'a> {
    pub(super) fn parse_statement_or_declaration(&mut self) -> Result<Statement, ParseError> {
        match &self.current {
            Token::Keyword(Keyword::Function) => self.parse_function_declaration(false),
            Token::Keyword(Keyword::Class) => self.parse_class_declaration(),
            Token::Keyword(Keyword::Const) => self.parse_lexical_declaration(),
            Token::Keyword(Keyword::Let) if self.let_starts_declaration()? => {
                self.parse_lexical_declaration()
            }
            Token::Keyword(Keyword::Async) if self.async_starts_function()? => {
                self.advance()?;
                self.parse_function_declaration(true)
            }
            Token::Keyword(Keyword::Import | Keyword::Export) => {
                Err(self.error("Module syntax is not supported"))
            }
            _ => self.parse_statement(),
        }
    }

    fn let_starts_declaration(&self) -> Result<bool, ParseError> {
        let (next, _) = self.peek_ahead()?;
        Ok(match next {
            Token::Identifier(_) | Token::LeftBracket | Token::LeftBrace => true,
            Token::Keyword(kw) => kw.is_contextual(),
            _ => false,
        })
    }

    pub(super) fn async_starts_function(&self) -> Result<bool, ParseError> {
        let (next, line_break) = self.peek_ahead()?;
        Ok(next == Token::Keyword(Keyword::Function) && !line_break)
    }

    /// Parses statements until `}` (not consumed) and checks that no lexical
    /// name is declared twice in the list.
    pub(super) fn parse_statement_list(&mut self) -> Result<Rc<[Statement]>, ParseError> {
        let mut body = Vec::new();
        while self.current != Token::RightBrace && self.current != Token::Eof {
            body.push(self.nested(Self::parse_statement_or_declaration)?);
        }
        self.check_lexical_redeclaration(&body)?;
        Ok(body.into())
    }

    pub(super) fn check_lexical_redeclaration(&self, body: &[Statement]) -> Result<(), ParseError> {
        let mut lexical = Vec::new();
        for stmt in body {
            match stmt {
                Statement::Variable(decl) if decl.kind != VarKind::Var => {
                    for d in decl.declarations.iter() {
                        collect_bound_names(&d.pattern, &mut lexical);
                    }
                }
                Statement::ClassDeclaration(class) => {
                    lexical.extend(class.name.clone());
                }
                _ => {}
            }
        }
        for (i, name) in lexical.iter().enumerate() {
            if lexical[..i].contains(name) {
                return Err(self.error(format!("Identifier '{name}' has already been declared")));
            }
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.current {
            Token::LeftBrace => self.parse_block(),
            Token::Semicolon => {
                self.advance()?;
                Ok(Statement::Empty)
            }
            Token::Keyword(Keyword::Var) => {
                self.advance()?;
                let decl = self.parse_variable_declaration_list(VarKind::Var)?;
                self.eat_semicolon()?;
                Ok(Statement::Variable(decl))
            }
            Token::Keyword(Keyword::If) => self.parse_if_statement(),
            Token::Keyword(Keyword::While) => self.parse_while_statement(),
            Token::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            Token::Keyword(Keyword::For) => self.parse_for_statement(),
            Token::Keyword(Keyword::Return) => self.parse_return_statement(),
            Token::Keyword(Keyword::Break) => {
                self.advance()?;
                let label = self.parse_optional_label()?;
                self.eat_semicolon()?;
                Ok(Statement::Break(label))
            }
            Token::Keyword(Keyword::Continue) => {
                self.advance()?;
                let label = self.parse_optional_label()?;
                self.eat_semicolon()?;
                Ok(Statement::Continue(label))
            }
            Token::Keyword(Keyword::Throw) => {
                self.advance()?;
                if self.prev_line_terminator {
                    return Err(self.error("Illegal newline after throw"));
                }
                let expr = self.parse_expression()?;
                self.eat_semicolon()?;
                Ok(Statement::Throw(Rc::new(expr)))
            }
            Token::Keyword(Keyword::Try) => self.parse_try_statement(),
            Token::Keyword(Keyword::Switch) => self.parse_switch_statement(),
            Token::Keyword(Keyword::With) => Err(self.error("'with' statements are not supported")),
            Token::Keyword(Keyword::Debugger) => {
                self.advance()?;
                self.eat_semicolon()?;
                Ok(Statement::Debugger)
            }
            Token::Keyword(Keyword::Function | Keyword::Class | Keyword::Const) => {
                Err(self.error("Declaration cannot appear in a single-statement context"))
            }
            _ => self.parse_expression_statement_or_labeled(),
        }
    }

    fn parse_optional_label(&mut self) -> Result<Option<Name>, ParseError> {
        if self.prev_line_terminator {
            return Ok(None);
        }
        match self.current_identifier_name() {
            Some(name) => {
                self.advance()?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    fn parse_expression_statement_or_labeled(&mut self) -> Result<Statement, ParseError> {
        if let Some(name) = self.current_identifier_name()
            && self.peek_ahead()?.0 == Token::Colon
        {
            self.advance()?;
            self.advance()?;
            let body = if self.is_keyword(Keyword::Function) {
                self.parse_function_declaration(false)?
            } else {
                self.nested(Self::parse_statement)?
            };
            return Ok(Statement::Labeled(name, Rc::new(body)));
        }
        let expr = self.parse_expression()?;
        self.eat_semicolon()?;
        Ok(Statement::Expression(Rc::new(expr)))
    }

    pub(super) fn parse_block(&mut self) -> Result<Statement, ParseError> {
        Ok(Statement::Block(self.parse_braced_statements()?))
    }

    pub(super) fn parse_braced_statements(&mut self) -> Result<Rc<[Statement]>, ParseError> {
        self.eat(&Token::LeftBrace)?;
        let body = self.parse_statement_list()?;
        self.eat(&Token::RightBrace)?;
        Ok(body)
    }

    fn parse_lexical_declaration(&mut self) -> Result<Statement, ParseError> {
        let kind = if self.is_keyword(Keyword::Const) {
            VarKind::Const
        } else {
            VarKind::Let
        };
        self.advance()?;
        let decl = self.parse_variable_declaration_list(kind)?;
        self.eat_semicolon()?;
        Ok(Statement::Variable(decl))
    }

    fn parse_parenthesized(&mut self) -> Result<Rc<Expression>, ParseError> {
        self.eat(&Token::LeftParen)?;
        let expr = self.parse_expression()?;
        self.eat(&Token::RightParen)?;
        Ok(Rc::new(expr))
    }

    fn parse_body_statement(&mut self) -> Result<Rc<Statement>, ParseError> {
        Ok(Rc::new(self.nested(Self::parse_statement)?))
    }

    fn parse_if_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?;
        let test = self.parse_parenthesized()?;
        let consequent = self.parse_body_statement()?;
        let alternate = if self.eat_if(&Token::Keyword(Keyword::Else))? {
            Some(self.parse_body_statement()?)
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?;
        let test = self.parse_parenthesized()?;
        let body = self.parse_body_statement()?;
        Ok(Statement::While(WhileStatement { test, body }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?;
        let body = self.parse_body_statement()?;
        self.eat(&Token::Keyword(Keyword::While))?;
        let test = self.parse_parenthesized()?;
        // `do ; while (x) y` needs no semicolon before `y`.
        self.eat_if(&Token::Semicolon)?;
        Ok(Statement::DoWhile(WhileStatement { test, body }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?;
        let is_await = if self.is_keyword(Keyword::Await) {
            if !self.in_async {
                return Err(self.error("for await is only valid in async functions"));
            }
            self.advance()?;
            true
        } else {
            false
        };
        self.eat(&Token::LeftParen)?;

        let init = if self.current == Token::Semicolon {
            None
        } else {
            let kind = match &self.current {
                Token::Keyword(Keyword::Var) => Some(VarKind::Var),
                Token::Keyword(Keyword::Const) => Some(VarKind::Const),
                Token::Keyword(Keyword::Let) if self.let_starts_declaration()? => Some(VarKind::Let),
                _ => None,
            };
            let saved_no_in = std::mem::replace(&mut self.no_in, true);
            let init = match kind {
                Some(kind) => {
                    self.advance()?;
                    self.parse_variable_declaration_list_in_for(kind)
                        .map(ForInit::Variable)
                }
                None => self.parse_expression().map(|e| ForInit::Expression(Rc::new(e))),
            };
            self.no_in = saved_no_in;
            Some(init?)
        };

        let is_of = matches!(&self.current, Token::Keyword(Keyword::Of));
        let is_in = self.is_keyword(Keyword::In);
        if let Some(init) = &init
            && (is_of || is_in)
        {
            let left = match init {
                ForInit::Variable(decl) => {
                    if decl.declarations.len() != 1 || decl.declarations[0].init.is_some() {
                        return Err(self.error("Invalid left-hand side in for-in/of loop"));
                    }
                    ForInOfLeft::Declaration(decl.kind, decl.declarations[0].pattern.clone())
                }
                ForInit::Expression(expr) => {
                    let pattern = expr_to_pattern(expr).map_err(|e| self.error(e.message))?;
                    ForInOfLeft::Pattern(Rc::new(pattern))
                }
            };
            self.advance()?;
            let right = if is_of {
                Rc::new(self.parse_assignment_expression()?)
            } else {
                Rc::new(self.parse_expression()?)
            };
            self.eat(&Token::RightParen)?;
            let body = self.parse_body_statement()?;
            return Ok(if is_of {
                Statement::ForOf(ForOfStatement {
                    left,
                    right,
                    body,
                    is_await,
                })
            } else {
                Statement::ForIn(ForInStatement { left, right, body })
            });
        }
        if is_await {
            return Err(self.error("for await requires an of clause"));
        }
        if let Some(ForInit::Variable(decl)) = &init
            && decl.kind == VarKind::Const
            && decl.declarations.iter().any(|d| d.init.is_none())
        {
            return Err(self.error("Missing initializer in const declaration"));
        }

        self.eat(&Token::Semicolon)?;
        let test = if self.current == Token::Semicolon {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.eat(&Token::Semicolon)?;
        let update = if self.current == Token::RightParen {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.eat(&Token::RightParen)?;
        let body = self.parse_body_statement()?;
        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
        }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, ParseError> {
        if !self.in_function {
            return Err(self.error("Illegal return statement"));
        }
        self.advance()?;
        if self.current == Token::Semicolon
            || self.current == Token::RightBrace
            || self.current == Token::Eof
            || self.prev_line_terminator
        {
            self.eat_if(&Token::Semicolon)?;
            return Ok(Statement::Return(None));
        }
        let expr = self.parse_expression()?;
        self.eat_semicolon()?;
        Ok(Statement::Return(Some(Rc::new(expr))))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?;
        let block = self.parse_braced_statements()?;
        let handler = if self.eat_if(&Token::Keyword(Keyword::Catch))? {
            let param = if self.eat_if(&Token::LeftParen)? {
                let pattern = self.parse_binding_target()?;
                self.eat(&Token::RightParen)?;
                Some(Rc::new(pattern))
            } else {
                None
            };
            let body = self.parse_braced_statements()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_if(&Token::Keyword(Keyword::Finally))? {
            Some(self.parse_braced_statements()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }
        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
        }))
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?;
        let discriminant = self.parse_parenthesized()?;
        self.eat(&Token::LeftBrace)?;
        let mut cases = Vec::new();
        let mut all = Vec::new();
        let mut seen_default = false;
        while !self.eat_if(&Token::RightBrace)? {
            let test = if self.eat_if(&Token::Keyword(Keyword::Case))? {
                Some(Rc::new(self.parse_expression()?))
            } else {
                self.eat(&Token::Keyword(Keyword::Default))?;
                if seen_default {
                    return Err(self.error("More than one default clause in switch statement"));
                }
                seen_default = true;
                None
            };
            self.eat(&Token::Colon)?;
            let mut consequent = Vec::new();
            while !matches!(
                self.current,
                Token::Keyword(Keyword::Case | Keyword::Default) | Token::RightBrace | Token::Eof
            ) {
                consequent.push(self.nested(Self::parse_statement_or_declaration)?);
            }
            all.extend(consequent.iter().cloned());
            cases.push(SwitchCase {
                test,
                consequent: consequent.into(),
            });
        }
        self.check_lexical_redeclaration(&all)?;
        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases: cases.into(),
        }))
    }
}
