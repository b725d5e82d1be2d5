//! The step machine: resuming coroutines, executing statements and
//! unwinding abrupt completions to the frame that handles them.

use super::frames::*;
use super::helpers::strict_equality;
use super::scope::Scope;
use super::*;
use tracing::trace;

fn no_labels() -> Labels {
    Rc::from(Vec::new())
}

/// A `break`/`continue` with `label` targets a loop carrying `labels`.
fn targets(label: &Option<Name>, labels: &Labels) -> bool {
    match label {
        None => true,
        Some(l) => labels.contains(l),
    }
}

enum LoopExit {
    Break,
    Continue,
    Pass,
}

fn loop_exit(completion: &Completion, labels: &Labels) -> LoopExit {
    match completion {
        Completion::Break(l) if targets(l, labels) => LoopExit::Break,
        Completion::Continue(l) if targets(l, labels) => LoopExit::Continue,
        _ => LoopExit::Pass,
    }
}

fn is_async_generator(object: &JsObject) -> bool {
    matches!(&object.borrow().kind, ObjectKind::Generator(state) if state.borrow().is_async)
}

impl Interpreter {
    /// Runs `co` from its current suspension point until it yields, awaits
    /// or finishes.
    ///
    /// Guest calls, getters and generator steps all come back through here,
    /// so this is where the host stack is grown.
    pub(crate) fn resume(&mut self, co: &mut Coroutine, resume: Resume) -> Result<Outcome, EngineError> {
        crate::stack::ensure_sufficient_stack(|| self.resume_here(co, resume))
    }

    fn resume_here(&mut self, co: &mut Coroutine, resume: Resume) -> Result<Outcome, EngineError> {
        match co.state {
            CoroutineState::Done => {
                return Err(EngineError::SuspensionProtocol("generator has already completed".into()));
            }
            CoroutineState::Running => {
                return Err(EngineError::SuspensionProtocol("generator is already running".into()));
            }
            CoroutineState::Fresh | CoroutineState::Suspended => {}
        }
        trace!(fresh = co.state == CoroutineState::Fresh, frames = co.frames.len(), "resuming coroutine");

        let mut pending = None;
        if co.state == CoroutineState::Fresh {
            match resume {
                Resume::Next(_) => {}
                Resume::Throw(e) => {
                    co.state = CoroutineState::Done;
                    return Ok(Outcome::Threw(e));
                }
                Resume::Return(v) => {
                    co.state = CoroutineState::Done;
                    return Ok(Outcome::Complete(v));
                }
            }
        } else if let Some(Frame::Delegate { pending: slot, .. }) = co.frames.last_mut() {
            *slot = Some(resume);
        } else {
            match resume {
                Resume::Next(v) => co.values.push(v),
                Resume::Throw(e) => pending = Some(Completion::Throw(e)),
                Resume::Return(v) => pending = Some(Completion::Return(v)),
            }
        }

        co.state = CoroutineState::Running;
        let outcome = self.run_frames(co, pending);
        co.state = match &outcome {
            Ok(Outcome::Yield(_) | Outcome::Await(_)) => CoroutineState::Suspended,
            _ => CoroutineState::Done,
        };
        outcome
    }

    fn run_frames(&mut self, co: &mut Coroutine, mut pending: Option<Completion>) -> Result<Outcome, EngineError> {
        loop {
            if let Some(completion) = pending.take()
                && let Some(outcome) = self.unwind(co, completion)?
            {
                return Ok(outcome);
            }
            self.count_step()?;
            match self.step(co) {
                Ok(Step::Continue) => {}
                Ok(Step::Abrupt(completion)) => pending = Some(completion),
                Ok(Step::Finished(outcome)) => return Ok(outcome),
                Err(EvalError::Thrown(e)) => pending = Some(Completion::Throw(e)),
                Err(EvalError::Fatal(e)) => pending = Some(Completion::Fatal(e)),
            }
        }
    }

    fn count_step(&mut self) -> Result<(), EngineError> {
        self.steps += 1;
        match self.options.step_limit {
            Some(limit) if self.steps > limit => Err(EngineError::SuspensionProtocol("step limit exceeded".into())),
            _ => Ok(()),
        }
    }

    fn step(&mut self, co: &mut Coroutine) -> EvalResult<Step> {
        let Some(frame) = co.frames.pop() else {
            let result = if co.is_program {
                std::mem::take(&mut co.last_value)
            } else {
                JsValue::Undefined
            };
            return Ok(Step::Finished(Outcome::Complete(result)));
        };
        match frame {
            Frame::Stmts { body, index } => self.step_statements(co, body, index),
            Frame::Stmt(stmt) => self.exec_statement(co, &stmt, no_labels()),
            Frame::RestoreScope(scope) => {
                co.scope = scope;
                Ok(Step::Continue)
            }
            Frame::ExprStmtDone => {
                co.last_value = co.pop_value();
                Ok(Step::Continue)
            }
            Frame::Discard => {
                co.pop_value();
                Ok(Step::Continue)
            }
            Frame::VarDecls { decl, index } => self.step_var_decls(co, decl, index),
            Frame::IfBranch { consequent, alternate } => {
                if co.pop_value().to_boolean() {
                    co.push(Frame::Stmt(consequent));
                } else if let Some(alt) = alternate {
                    co.push(Frame::Stmt(alt));
                }
                Ok(Step::Continue)
            }
            Frame::WhileCheck { node, labels, base } => {
                if co.pop_value().to_boolean() {
                    let body = node.body.clone();
                    co.push(Frame::WhileNext { node, labels, base });
                    co.push(Frame::Stmt(body));
                }
                Ok(Step::Continue)
            }
            Frame::WhileNext { node, labels, base } => {
                let test = node.test.clone();
                co.push(Frame::WhileCheck { node, labels, base });
                co.push(Frame::Expr(test));
                Ok(Step::Continue)
            }
            Frame::DoWhileNext { node, labels, base } => {
                let test = node.test.clone();
                co.push(Frame::DoWhileCheck { node, labels, base });
                co.push(Frame::Expr(test));
                Ok(Step::Continue)
            }
            Frame::DoWhileCheck { node, labels, base } => {
                if co.pop_value().to_boolean() {
                    let body = node.body.clone();
                    co.push(Frame::DoWhileNext { node, labels, base });
                    co.push(Frame::Stmt(body));
                }
                Ok(Step::Continue)
            }
            Frame::ForTest {
                node,
                labels,
                per_iteration,
                base,
            } => {
                match node.test.clone() {
                    Some(test) => {
                        co.push(Frame::ForCheck {
                            node,
                            labels,
                            per_iteration,
                            base,
                        });
                        co.push(Frame::Expr(test));
                    }
                    None => {
                        let body = node.body.clone();
                        co.push(Frame::ForNext {
                            node,
                            labels,
                            per_iteration,
                            base,
                        });
                        co.push(Frame::Stmt(body));
                    }
                }
                Ok(Step::Continue)
            }
            Frame::ForCheck {
                node,
                labels,
                per_iteration,
                base,
            } => {
                if co.pop_value().to_boolean() {
                    let body = node.body.clone();
                    co.push(Frame::ForNext {
                        node,
                        labels,
                        per_iteration,
                        base,
                    });
                    co.push(Frame::Stmt(body));
                }
                Ok(Step::Continue)
            }
            Frame::ForNext {
                node,
                labels,
                per_iteration,
                base,
            } => {
                next_for_iteration(co, node, labels, per_iteration, base);
                Ok(Step::Continue)
            }
            Frame::ForInOfHead { state, kind } => self.step_for_head(co, state, kind),
            Frame::ForInNext { keys, index, state } => {
                co.scope = state.outer.clone();
                if let Some(key) = keys.get(index) {
                    let key = JsValue::from(key.as_str());
                    co.push(Frame::ForInNext {
                        keys,
                        index: index + 1,
                        state: state.clone(),
                    });
                    bind_loop_value(co, &state, key);
                }
                Ok(Step::Continue)
            }
            Frame::ForOfNext { source, is_await, state } => self.step_for_of(co, source, is_await, state),
            Frame::ForOfAwaited { source, state } => {
                let value = co.pop_value();
                co.push(Frame::ForOfNext {
                    source,
                    is_await: true,
                    state: state.clone(),
                });
                bind_loop_value(co, &state, value);
                Ok(Step::Continue)
            }
            Frame::ForOfAwaitedRecord { source, state } => {
                let record = co.pop_value();
                if !record.is_object() {
                    return Err(self.type_error("Iterator result is not an object"));
                }
                if self.get_property(&record, "done")?.to_boolean() {
                    return Ok(Step::Continue);
                }
                let value = self.get_property(&record, "value")?;
                co.push(Frame::ForOfNext {
                    source,
                    is_await: true,
                    state: state.clone(),
                });
                bind_loop_value(co, &state, value);
                Ok(Step::Continue)
            }
            Frame::LabelExit { .. } | Frame::SwitchBody { .. } | Frame::OptionalChainEnd { .. } => Ok(Step::Continue),
            Frame::SwitchStart { cases } => self.step_switch_start(co, cases),
            Frame::SwitchMatch {
                cases,
                index,
                discriminant,
            } => {
                step_switch_match(co, cases, index, discriminant);
                Ok(Step::Continue)
            }
            Frame::SwitchCompare {
                cases,
                index,
                discriminant,
            } => {
                let value = co.pop_value();
                if strict_equality(&discriminant, &value) {
                    co.push(Frame::SwitchRun { cases, index });
                } else {
                    co.push(Frame::SwitchMatch {
                        cases,
                        index: index + 1,
                        discriminant,
                    });
                }
                Ok(Step::Continue)
            }
            Frame::SwitchRun { cases, index } => {
                if let Some(case) = cases.get(index) {
                    let body = case.consequent.clone();
                    co.push(Frame::SwitchRun { cases, index: index + 1 });
                    co.push(Frame::Stmts { body, index: 0 });
                }
                Ok(Step::Continue)
            }
            Frame::ReturnValue => Ok(Step::Abrupt(Completion::Return(co.pop_value()))),
            Frame::ThrowValue => Ok(Step::Abrupt(Completion::Throw(co.pop_value()))),
            Frame::TryBlock { finalizer, scope, base, .. } | Frame::CatchBlock { finalizer, scope, base } => {
                if let Some(finalizer) = finalizer {
                    co.push(Frame::FinallyDone {
                        pending: None,
                        scope,
                        base,
                    });
                    self.push_block(co, finalizer)?;
                }
                Ok(Step::Continue)
            }
            Frame::FinallyDone { pending, .. } => Ok(match pending {
                Some(completion) => Step::Abrupt(completion),
                None => Step::Continue,
            }),
            Frame::Bind { pattern, mode, value } => {
                self.step_bind(co, pattern, mode, value)?;
                Ok(Step::Continue)
            }
            Frame::ArrayPatternStep {
                items,
                values,
                index,
                mode,
            } => {
                self.step_array_pattern(co, items, values, index, mode)?;
                Ok(Step::Continue)
            }
            Frame::ObjectPatternStep {
                props,
                feed,
                index,
                used,
                mode,
            } => {
                self.step_object_pattern(co, props, feed, index, used, mode, None)?;
                Ok(Step::Continue)
            }
            Frame::ObjectPatternKey {
                props,
                feed,
                index,
                used,
                mode,
            } => {
                let key = co.pop_value();
                let key = self.to_property_key(&key)?;
                self.step_object_pattern(co, props, feed, index, used, mode, Some(key))?;
                Ok(Step::Continue)
            }
            Frame::ClassHeritage { node, name } => {
                let parent = co.pop_value();
                self.begin_class(co, node, name, Some(parent))?;
                Ok(Step::Continue)
            }
            Frame::ClassMembers {
                node,
                index,
                constructor,
                prototype,
                parent,
                key_pending,
            } => {
                self.step_class_members(co, node, index, constructor, prototype, parent, key_pending)?;
                Ok(Step::Continue)
            }
            expression => self.step_expression(co, expression),
        }
    }

    fn step_statements(&mut self, co: &mut Coroutine, body: Rc<[Statement]>, index: usize) -> EvalResult<Step> {
        if index >= body.len() {
            return Ok(Step::Continue);
        }
        if index + 1 < body.len() {
            co.push(Frame::Stmts {
                body: body.clone(),
                index: index + 1,
            });
        }
        self.exec_statement(co, &body[index], no_labels())
    }

    /// Runs `body` in a fresh block scope.
    pub(crate) fn push_block(&mut self, co: &mut Coroutine, body: Rc<[Statement]>) -> EvalResult<()> {
        let scope = Scope::new_child(&co.scope, false);
        self.hoist_lexical(body.iter(), &scope)?;
        let saved = std::mem::replace(&mut co.scope, scope);
        co.push(Frame::RestoreScope(saved));
        co.push(Frame::Stmts { body, index: 0 });
        Ok(())
    }

    fn exec_statement(&mut self, co: &mut Coroutine, stmt: &Statement, labels: Labels) -> EvalResult<Step> {
        match stmt {
            Statement::Empty | Statement::Debugger | Statement::FunctionDeclaration(_) => {}
            Statement::Expression(expr) => {
                co.push(Frame::ExprStmtDone);
                co.push(Frame::Expr(expr.clone()));
            }
            Statement::Block(body) => self.push_block(co, body.clone())?,
            Statement::Variable(decl) => co.push(Frame::VarDecls {
                decl: decl.clone(),
                index: 0,
            }),
            Statement::If(node) => {
                co.push(Frame::IfBranch {
                    consequent: node.consequent.clone(),
                    alternate: node.alternate.clone(),
                });
                co.push(Frame::Expr(node.test.clone()));
            }
            Statement::While(node) => {
                let base = co.base();
                co.push(Frame::WhileCheck {
                    node: node.clone(),
                    labels,
                    base,
                });
                co.push(Frame::Expr(node.test.clone()));
            }
            Statement::DoWhile(node) => {
                let base = co.base();
                co.push(Frame::DoWhileNext {
                    node: node.clone(),
                    labels,
                    base,
                });
                co.push(Frame::Stmt(node.body.clone()));
            }
            Statement::For(node) => self.start_for(co, node, labels)?,
            Statement::ForIn(node) => {
                let kind = ForInOfKind::In;
                start_for_in_of(co, node.left.clone(), node.body.clone(), &node.right, labels, kind);
            }
            Statement::ForOf(node) => {
                let kind = if node.is_await {
                    if !co.is_async {
                        return Err(EvalError::syntax("for await is only valid in async functions"));
                    }
                    ForInOfKind::AwaitOf
                } else {
                    ForInOfKind::Of
                };
                start_for_in_of(co, node.left.clone(), node.body.clone(), &node.right, labels, kind);
            }
            Statement::Return(expr) => match expr {
                Some(e) => {
                    co.push(Frame::ReturnValue);
                    co.push(Frame::Expr(e.clone()));
                }
                None => return Ok(Step::Abrupt(Completion::Return(JsValue::Undefined))),
            },
            Statement::Break(label) => return Ok(Step::Abrupt(Completion::Break(label.clone()))),
            Statement::Continue(label) => return Ok(Step::Abrupt(Completion::Continue(label.clone()))),
            Statement::Throw(expr) => {
                co.push(Frame::ThrowValue);
                co.push(Frame::Expr(expr.clone()));
            }
            Statement::Try(node) => {
                let base = co.base();
                co.push(Frame::TryBlock {
                    handler: node.handler.clone(),
                    finalizer: node.finalizer.clone(),
                    scope: co.scope.clone(),
                    base,
                });
                self.push_block(co, node.block.clone())?;
            }
            Statement::Switch(node) => {
                co.push(Frame::SwitchStart {
                    cases: node.cases.clone(),
                });
                co.push(Frame::Expr(node.discriminant.clone()));
            }
            Statement::Labeled(..) => {
                let mut all = labels.to_vec();
                let mut inner = stmt;
                while let Statement::Labeled(label, body) = inner {
                    all.push(label.clone());
                    inner = &**body;
                }
                let labels: Labels = Rc::from(all);
                let base = co.base();
                co.push(Frame::LabelExit {
                    labels: labels.clone(),
                    base,
                });
                return self.exec_statement(co, inner, labels);
            }
            Statement::ClassDeclaration(node) => {
                let Some(name) = node.name.clone() else {
                    return Err(EvalError::syntax("Class declaration requires a name"));
                };
                co.push(Frame::Bind {
                    pattern: Pattern::Identifier(name.clone()),
                    mode: BindMode::Declare(VarKind::Let),
                    value: None,
                });
                self.push_class(co, node.clone(), Some(name))?;
            }
        }
        Ok(Step::Continue)
    }

    fn step_var_decls(&mut self, co: &mut Coroutine, decl: VariableDeclaration, index: usize) -> EvalResult<Step> {
        let Some(d) = decl.declarations.get(index).cloned() else {
            return Ok(Step::Continue);
        };
        let kind = decl.kind;
        if index + 1 < decl.declarations.len() {
            co.push(Frame::VarDecls { decl, index: index + 1 });
        }
        match (&d.init, &*d.pattern) {
            (None, _) if kind == VarKind::Var => {}
            (None, Pattern::Identifier(name)) => self.bind_name(co, name, BindMode::Declare(kind), JsValue::Undefined)?,
            (None, _) => return Err(EvalError::syntax("Missing initializer in destructuring declaration")),
            (Some(init), pattern) => {
                co.push(Frame::Bind {
                    pattern: pattern.clone(),
                    mode: BindMode::Declare(kind),
                    value: None,
                });
                match pattern {
                    Pattern::Identifier(name) if init.is_anonymous_function_definition() => {
                        co.push(Frame::NamedExpr(init.clone(), name.clone()))
                    }
                    _ => co.push(Frame::Expr(init.clone())),
                }
            }
        }
        Ok(Step::Continue)
    }

    fn start_for(&mut self, co: &mut Coroutine, node: &ForStatement, labels: Labels) -> EvalResult<()> {
        let lexical = matches!(&node.init, Some(ForInit::Variable(decl)) if decl.kind != VarKind::Var);
        let base = co.base();
        if lexical {
            let head = Scope::new_child(&co.scope, false);
            let saved = std::mem::replace(&mut co.scope, head);
            co.push(Frame::RestoreScope(saved));
        }
        co.push(Frame::ForTest {
            node: node.clone(),
            labels,
            per_iteration: lexical,
            base,
        });
        match &node.init {
            Some(ForInit::Variable(decl)) => co.push(Frame::VarDecls {
                decl: decl.clone(),
                index: 0,
            }),
            Some(ForInit::Expression(expr)) => {
                co.push(Frame::Discard);
                co.push(Frame::Expr(expr.clone()));
            }
            None => {}
        }
        Ok(())
    }

    fn step_for_head(&mut self, co: &mut Coroutine, state: Rc<ForInOf>, kind: ForInOfKind) -> EvalResult<Step> {
        let value = co.pop_value();
        match kind {
            ForInOfKind::In => {
                let keys: Rc<[String]> = Rc::from(self.for_in_keys(&value));
                co.push(Frame::ForInNext { keys, index: 0, state });
            }
            ForInOfKind::Of | ForInOfKind::AwaitOf => {
                let source = match &value {
                    JsValue::Object(object) if kind == ForInOfKind::AwaitOf && is_async_generator(object) => {
                        IterSource::Generator {
                            object: object.clone(),
                            done: false,
                        }
                    }
                    _ => self.get_iter_source(&value)?,
                };
                co.push(Frame::ForOfNext {
                    source,
                    is_await: kind == ForInOfKind::AwaitOf,
                    state,
                });
            }
        }
        Ok(Step::Continue)
    }

    fn step_for_of(
        &mut self,
        co: &mut Coroutine,
        mut source: IterSource,
        is_await: bool,
        state: Rc<ForInOf>,
    ) -> EvalResult<Step> {
        co.scope = state.outer.clone();
        if is_await {
            let pending = match &source {
                IterSource::Generator { object, .. } if is_async_generator(object) => {
                    let object = object.clone();
                    Some(self.async_generator_enqueue(&object, Resume::Next(JsValue::Undefined))?)
                }
                _ => None,
            };
            if let Some(record) = pending {
                co.values.push(record);
                co.push(Frame::ForOfAwaitedRecord { source, state });
                co.push(Frame::AwaitValue);
                return Ok(Step::Continue);
            }
            if let Some(value) = self.iter_next(&mut source)? {
                co.values.push(value);
                co.push(Frame::ForOfAwaited { source, state });
                co.push(Frame::AwaitValue);
            }
            return Ok(Step::Continue);
        }
        if let Some(value) = self.iter_next(&mut source)? {
            co.push(Frame::ForOfNext {
                source,
                is_await,
                state: state.clone(),
            });
            bind_loop_value(co, &state, value);
        }
        Ok(Step::Continue)
    }

    fn step_switch_start(&mut self, co: &mut Coroutine, cases: Rc<[SwitchCase]>) -> EvalResult<Step> {
        let discriminant = co.pop_value();
        let scope = Scope::new_child(&co.scope, false);
        self.hoist_lexical(cases.iter().flat_map(|c| c.consequent.iter()), &scope)?;
        let saved = std::mem::replace(&mut co.scope, scope);
        co.push(Frame::RestoreScope(saved));
        co.push(Frame::SwitchBody { base: co.base() });
        co.push(Frame::SwitchMatch {
            cases,
            index: 0,
            discriminant,
        });
        Ok(Step::Continue)
    }

    /// Abandons an async or sync source when a loop body exits early.
    fn close_loop_source(&mut self, source: &mut IterSource, is_await: bool) -> EvalResult<()> {
        if is_await
            && let IterSource::Generator { object, done } = source
            && is_async_generator(object)
        {
            *done = true;
            let object = object.clone();
            self.async_generator_enqueue(&object, Resume::Return(JsValue::Undefined))?;
            return Ok(());
        }
        self.close_iter_source(source)
    }

    /// Pops frames until one handles `completion`. Returns the outcome of the
    /// whole coroutine when nothing does.
    fn unwind(&mut self, co: &mut Coroutine, mut completion: Completion) -> Result<Option<Outcome>, EngineError> {
        loop {
            let Some(frame) = co.frames.pop() else {
                return match completion {
                    Completion::Return(v) => Ok(Some(Outcome::Complete(v))),
                    Completion::Throw(e) => Ok(Some(Outcome::Threw(e))),
                    Completion::Fatal(e) => Err(e),
                    Completion::Break(_) | Completion::Continue(_) => {
                        Err(EngineError::SyntaxViolation("Illegal break or continue statement".into()))
                    }
                };
            };
            match frame {
                Frame::RestoreScope(scope) => co.scope = scope,
                Frame::WhileNext { node, labels, base } => match loop_exit(&completion, &labels) {
                    LoopExit::Break => {
                        co.restore_base(base);
                        return Ok(None);
                    }
                    LoopExit::Continue => {
                        co.restore_base(base);
                        let test = node.test.clone();
                        co.push(Frame::WhileCheck { node, labels, base });
                        co.push(Frame::Expr(test));
                        return Ok(None);
                    }
                    LoopExit::Pass => {}
                },
                Frame::DoWhileNext { node, labels, base } => match loop_exit(&completion, &labels) {
                    LoopExit::Break => {
                        co.restore_base(base);
                        return Ok(None);
                    }
                    LoopExit::Continue => {
                        co.restore_base(base);
                        let test = node.test.clone();
                        co.push(Frame::DoWhileCheck { node, labels, base });
                        co.push(Frame::Expr(test));
                        return Ok(None);
                    }
                    LoopExit::Pass => {}
                },
                Frame::ForNext {
                    node,
                    labels,
                    per_iteration,
                    base,
                } => match loop_exit(&completion, &labels) {
                    LoopExit::Break => {
                        co.restore_base(base);
                        return Ok(None);
                    }
                    LoopExit::Continue => {
                        co.restore_base(base);
                        next_for_iteration(co, node, labels, per_iteration, base);
                        return Ok(None);
                    }
                    LoopExit::Pass => {}
                },
                Frame::ForInNext { keys, index, state } => {
                    co.scope = state.outer.clone();
                    match loop_exit(&completion, &state.labels) {
                        LoopExit::Break => {
                            co.restore_base(state.base);
                            return Ok(None);
                        }
                        LoopExit::Continue => {
                            co.restore_base(state.base);
                            co.push(Frame::ForInNext { keys, index, state });
                            return Ok(None);
                        }
                        LoopExit::Pass => {}
                    }
                }
                Frame::ForOfNext {
                    mut source,
                    is_await,
                    state,
                } => {
                    co.scope = state.outer.clone();
                    match loop_exit(&completion, &state.labels) {
                        LoopExit::Continue => {
                            co.restore_base(state.base);
                            co.push(Frame::ForOfNext { source, is_await, state });
                            return Ok(None);
                        }
                        LoopExit::Break => {
                            co.restore_base(state.base);
                            match self.close_loop_source(&mut source, is_await) {
                                Ok(()) => return Ok(None),
                                Err(EvalError::Thrown(e)) => completion = Completion::Throw(e),
                                Err(EvalError::Fatal(e)) => completion = Completion::Fatal(e),
                            }
                        }
                        LoopExit::Pass => {
                            let keep_error = matches!(completion, Completion::Throw(_) | Completion::Fatal(_));
                            match self.close_loop_source(&mut source, is_await) {
                                Err(EvalError::Fatal(e)) => completion = Completion::Fatal(e),
                                Err(EvalError::Thrown(e)) if !keep_error => completion = Completion::Throw(e),
                                _ => {}
                            }
                        }
                    }
                }
                Frame::ForOfAwaited { state, .. } | Frame::ForOfAwaitedRecord { state, .. } => {
                    co.scope = state.outer.clone();
                }
                Frame::LabelExit { labels, base } => {
                    if let Completion::Break(Some(l)) = &completion
                        && labels.contains(l)
                    {
                        co.restore_base(base);
                        return Ok(None);
                    }
                }
                Frame::SwitchBody { base } => {
                    if let Completion::Break(None) = completion {
                        co.restore_base(base);
                        return Ok(None);
                    }
                }
                Frame::TryBlock {
                    handler,
                    finalizer,
                    scope,
                    base,
                } => {
                    co.scope = scope.clone();
                    co.restore_base(base);
                    match (completion, handler) {
                        (Completion::Throw(e), Some(handler)) => {
                            co.push(Frame::CatchBlock { finalizer, scope, base });
                            if let Err(err) = self.enter_catch(co, handler, e) {
                                completion = match err {
                                    EvalError::Thrown(e) => Completion::Throw(e),
                                    EvalError::Fatal(e) => Completion::Fatal(e),
                                };
                                continue;
                            }
                            return Ok(None);
                        }
                        (other, _) => match finalizer {
                            Some(finalizer) => {
                                self.enter_finally(co, finalizer, other, scope, base)?;
                                return Ok(None);
                            }
                            None => completion = other,
                        },
                    }
                }
                Frame::CatchBlock { finalizer, scope, base } => {
                    co.scope = scope.clone();
                    co.restore_base(base);
                    if let Some(finalizer) = finalizer {
                        self.enter_finally(co, finalizer, completion, scope, base)?;
                        return Ok(None);
                    }
                }
                Frame::FinallyDone { pending, scope, base } => {
                    co.scope = scope;
                    co.restore_base(base);
                    if let Some(Completion::Fatal(e)) = pending {
                        completion = Completion::Fatal(e);
                    }
                }
                _ => {}
            }
        }
    }

    fn enter_catch(&mut self, co: &mut Coroutine, handler: CatchClause, error: JsValue) -> EvalResult<()> {
        let scope = Scope::new_child(&co.scope, false);
        self.hoist_lexical(handler.body.iter(), &scope)?;
        let saved = std::mem::replace(&mut co.scope, scope);
        co.push(Frame::RestoreScope(saved));
        co.push(Frame::Stmts {
            body: handler.body.clone(),
            index: 0,
        });
        if let Some(param) = handler.param {
            co.push(Frame::Bind {
                pattern: (*param).clone(),
                mode: BindMode::Declare(VarKind::Let),
                value: Some(error),
            });
        }
        Ok(())
    }

    fn enter_finally(
        &mut self,
        co: &mut Coroutine,
        finalizer: Rc<[Statement]>,
        pending: Completion,
        scope: ScopeRef,
        base: StackBase,
    ) -> Result<(), EngineError> {
        co.push(Frame::FinallyDone {
            pending: Some(pending),
            scope,
            base,
        });
        self.push_block(co, finalizer).map_err(|e| match e {
            EvalError::Fatal(e) => e,
            EvalError::Thrown(v) => EngineError::SyntaxViolation(format!("finally block failed: {v}")),
        })
    }
}

fn next_for_iteration(co: &mut Coroutine, node: ForStatement, labels: Labels, per_iteration: bool, base: StackBase) {
    if per_iteration {
        co.scope = Scope::copy_for_iteration(&co.scope);
    }
    let update = node.update.clone();
    co.push(Frame::ForTest {
        node,
        labels,
        per_iteration,
        base,
    });
    if let Some(update) = update {
        co.push(Frame::Discard);
        co.push(Frame::Expr(update));
    }
}

fn start_for_in_of(
    co: &mut Coroutine,
    left: ForInOfLeft,
    body: Rc<Statement>,
    right: &Rc<Expression>,
    labels: Labels,
    kind: ForInOfKind,
) {
    let state = Rc::new(ForInOf {
        left,
        body,
        labels,
        outer: co.scope.clone(),
        base: co.base(),
    });
    co.push(Frame::ForInOfHead { state, kind });
    co.push(Frame::Expr(right.clone()));
}

/// Binds one loop element and queues the body. Lexical heads get a fresh
/// scope per iteration.
fn bind_loop_value(co: &mut Coroutine, state: &ForInOf, value: JsValue) {
    let (pattern, mode) = match &state.left {
        ForInOfLeft::Declaration(VarKind::Var, pattern) => (pattern, BindMode::Declare(VarKind::Var)),
        ForInOfLeft::Declaration(kind, pattern) => {
            co.scope = Scope::new_child(&state.outer, false);
            (pattern, BindMode::Declare(*kind))
        }
        ForInOfLeft::Pattern(pattern) => (pattern, BindMode::Assign),
    };
    co.push(Frame::Stmt(state.body.clone()));
    co.push(Frame::Bind {
        pattern: (**pattern).clone(),
        mode,
        value: Some(value),
    });
}

fn step_switch_match(co: &mut Coroutine, cases: Rc<[SwitchCase]>, index: usize, discriminant: JsValue) {
    let next = cases.iter().enumerate().skip(index).find_map(|(i, c)| c.test.clone().map(|t| (i, t)));
    match next {
        Some((i, test)) => {
            co.push(Frame::SwitchCompare {
                cases,
                index: i,
                discriminant,
            });
            co.push(Frame::Expr(test));
        }
        None => {
            if let Some(default) = cases.iter().position(|c| c.test.is_none()) {
                co.push(Frame::SwitchRun { cases, index: default });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> JsValue {
        let mut interp = Interpreter::new();
        interp.run(src).unwrap()
    }

    fn number(src: &str) -> f64 {
        run(src).as_number().unwrap_or(f64::NAN)
    }

    #[test]
    fn loops_honour_break_and_continue() {
        let src = "let s = 0; for (let i = 0; i < 10; i++) { if (i % 2) continue; if (i > 6) break; s += i; } s";
        assert_eq!(number(src), 12.0);
        assert_eq!(number("let n = 0; do { n++; } while (n < 5); n"), 5.0);
        assert_eq!(number("let n = 0; while (true) { if (++n === 3) break; } n"), 3.0);
    }

    #[test]
    fn labeled_continue_targets_the_outer_loop() {
        let src = "let hits = 0; outer: for (let i = 0; i < 3; i++) { for (let j = 0; j < 3; j++) { if (j === 1) continue outer; hits++; } } hits";
        assert_eq!(number(src), 3.0);
        assert_eq!(number("let x = 1; block: { x = 2; break block; x = 3; } x"), 2.0);
    }

    #[test]
    fn per_iteration_bindings_are_captured() {
        let src = "const fs = []; for (let i = 0; i < 3; i++) fs.push(() => i); fs[0]() + fs[1]() * 10 + fs[2]() * 100";
        assert_eq!(number(src), 210.0);
    }

    #[test]
    fn switch_falls_through_until_break() {
        let src = "function f(x) { let out = ''; switch (x) { case 1: out += 'a'; case 2: out += 'b'; break; default: out += 'd'; case 3: out += 'c'; } return out; } f(1) + f(2) + f(3) + f(9)";
        assert_eq!(run(src).to_string(), "abbcdc");
    }

    #[test]
    fn finally_runs_and_can_override() {
        assert_eq!(number("function f() { try { return 1; } finally { return 2; } } f()"), 2.0);
        let src = "let log = 0; function f() { try { throw 1; } catch (e) { log += 10; return e; } finally { log += 100; } } f() + log";
        assert_eq!(number(src), 111.0);
    }

    #[test]
    fn catch_binds_patterns() {
        assert_eq!(number("try { throw {code: 7}; } catch ({code}) { code }"), 7.0);
    }

    #[test]
    fn for_in_and_for_of() {
        let src = "const o = {a: 1, b: 2}; let keys = ''; for (const k in o) keys += k; let sum = 0; for (const v of [1, 2, 3]) sum += v; keys + sum";
        assert_eq!(run(src).to_string(), "ab6");
    }

    #[test]
    fn stray_break_is_a_syntax_violation() {
        let mut interp = Interpreter::new();
        let src = "function f() { break; } f()";
        assert!(matches!(interp.run(src), Err(EngineError::SyntaxViolation(_))));
    }

    #[test]
    fn step_limit_stops_runaway_loops() {
        let mut interp = Interpreter::with_options(InterpreterOptions::default().step_limit(10_000));
        let err = interp.run("while (true) {}").unwrap_err();
        assert!(matches!(err, EngineError::SuspensionProtocol(m) if m == "step limit exceeded"));
    }
}
