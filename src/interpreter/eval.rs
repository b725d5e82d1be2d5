//! Expression evaluation. Every expression leaves exactly one value on the
//! coroutine's value stack; operands are evaluated left to right, once.

use super::class::define_method;
use super::frames::*;
use super::function::{SUPER_BASE, SUPER_CONSTRUCTOR};
use super::helpers::typeof_value;
use super::scope::{Binding, Scope};
use super::*;
use crate::types::{JsBigInt, bigint_ops};

/// The expression an argument or array element evaluates; spreads evaluate
/// their operand.
fn element_expr(element: &Expression) -> Rc<Expression> {
    match element {
        Expression::Spread(inner) => inner.clone(),
        other => Rc::new(other.clone()),
    }
}

impl Interpreter {
    pub(crate) fn step_expression(&mut self, co: &mut Coroutine, frame: Frame) -> EvalResult<Step> {
        match frame {
            Frame::Expr(expr) => self.eval_expression(co, &expr)?,
            Frame::NamedExpr(expr, name) => self.eval_named(co, &expr, &name)?,
            Frame::Unary(op) => {
                let value = co.pop_value();
                let result = self.unary_op(op, &value)?;
                co.values.push(result);
            }
            Frame::Typeof => {
                let value = co.pop_value();
                co.values.push(JsValue::from(typeof_value(&value)));
            }
            Frame::Replace(value) => {
                co.pop_value();
                co.values.push(value);
            }
            Frame::Binary(op) => {
                let right = co.pop_value();
                let left = co.pop_value();
                let result = self.binary_op(op, &left, &right)?;
                co.values.push(result);
            }
            Frame::Logical { op, right } => {
                let left = co.pop_value();
                let short = match op {
                    LogicalOp::And => !left.to_boolean(),
                    LogicalOp::Or => left.to_boolean(),
                    LogicalOp::NullishCoalescing => !left.is_nullish(),
                };
                if short {
                    co.values.push(left);
                } else {
                    co.push(Frame::Expr(right));
                }
            }
            Frame::Conditional { consequent, alternate } => {
                let branch = if co.pop_value().to_boolean() { consequent } else { alternate };
                co.push(Frame::Expr(branch));
            }
            Frame::Sequence { exprs, index } => {
                if index > 0 {
                    co.pop_value();
                }
                let current = Rc::new(exprs[index].clone());
                if index + 1 < exprs.len() {
                    co.push(Frame::Sequence { exprs, index: index + 1 });
                }
                co.push(Frame::Expr(current));
            }
            Frame::Template { node, index, text } => self.step_template(co, node, index, text)?,
            Frame::ArrayLit { elements, index, items } => self.step_array_literal(co, elements, index, items)?,
            Frame::ObjectLit {
                props,
                index,
                object,
                stage,
            } => self.step_object_literal(co, props, index, object, stage)?,
            Frame::MemberObject {
                property,
                optional,
                usage,
            } => self.step_member_object(co, property, optional, usage)?,
            Frame::MemberKey { usage } => {
                let key = co.pop_value();
                let object = co.pop_value();
                let key = self.to_property_key(&key)?;
                let binding = Binding::Property {
                    object: object.clone(),
                    key,
                    receiver: object,
                };
                self.apply_reference(co, binding, usage)?;
            }
            Frame::SuperMemberKey { usage } => {
                let key = co.pop_value();
                let key = self.to_property_key(&key)?;
                let binding = self.super_binding(co, key)?;
                self.apply_reference(co, binding, usage)?;
            }
            Frame::AssignFinish { op } => {
                let rhs = co.pop_value();
                let Some(binding) = co.refs.pop() else {
                    return Err(EvalError::syntax("Invalid left-hand side in assignment"));
                };
                let value = match op.binary_op() {
                    Some(binary) => {
                        let old = co.pop_value();
                        self.binary_op(binary, &old, &rhs)?
                    }
                    None => rhs,
                };
                binding.set(self, value.clone())?;
                co.values.push(value);
            }
            Frame::AssignPattern { pattern } => self.step_assign_pattern(co, pattern)?,
            Frame::InsertThis => {
                let func = co.pop_value();
                co.values.push(JsValue::Undefined);
                co.values.push(func);
            }
            Frame::CallArgs {
                args,
                index,
                collected,
                optional,
                kind,
            } => self.step_call_args(co, args, index, collected, optional, kind)?,
            Frame::NewArgs { args, index, collected } => self.step_new_args(co, args, index, collected)?,
            Frame::TaggedArgs { node, index, mut collected } => {
                if index > 0 {
                    collected.push(co.pop_value());
                }
                if let Some(expr) = node.expressions.get(index).cloned() {
                    co.push(Frame::TaggedArgs {
                        node,
                        index: index + 1,
                        collected,
                    });
                    co.push(Frame::Expr(expr));
                } else {
                    let func = co.pop_value();
                    let this = co.pop_value();
                    let result = self.call_function(&func, this, &collected)?;
                    co.values.push(result);
                }
            }
            Frame::YieldValue => return Ok(Step::Finished(Outcome::Yield(co.pop_value()))),
            Frame::AwaitValue => return Ok(Step::Finished(Outcome::Await(co.pop_value()))),
            Frame::YieldDelegate => self.start_delegate(co)?,
            Frame::Delegate { target, pending } => return self.step_delegate(co, target, pending),
            _ => return Err(EvalError::syntax("unexpected frame in expression position")),
        }
        Ok(Step::Continue)
    }

    fn eval_expression(&mut self, co: &mut Coroutine, expr: &Rc<Expression>) -> EvalResult<()> {
        match &**expr {
            Expression::Literal(lit) => {
                let value = literal_value(lit)?;
                co.values.push(value);
            }
            Expression::Identifier(name) => {
                let binding = Scope::resolve(&co.scope, name, true)
                    .map_err(|n| self.reference_error(&format!("{n} is not defined")))?;
                let value = binding.get(self)?;
                co.values.push(value);
            }
            Expression::This => {
                let this = self.lookup_hidden(co, "this")?.unwrap_or_default();
                co.values.push(this);
            }
            Expression::Super => return Err(EvalError::syntax("'super' keyword unexpected here")),
            Expression::Array(elements) => co.push(Frame::ArrayLit {
                elements: elements.clone(),
                index: 0,
                items: Vec::new(),
            }),
            Expression::Object(props) => co.push(Frame::ObjectLit {
                props: props.clone(),
                index: 0,
                object: self.create_object(),
                stage: LiteralStage::Start,
            }),
            Expression::Function(node) => {
                let func = self.function_expression(co, node)?;
                co.values.push(func);
            }
            Expression::Class(node) => self.push_class(co, node.clone(), node.name.clone())?,
            Expression::Unary(op, operand) => {
                co.push(Frame::Unary(*op));
                co.push(Frame::Expr(operand.clone()));
            }
            Expression::Typeof(operand) => match &**operand {
                Expression::Identifier(name) => {
                    let value = match Scope::resolve(&co.scope, name, true) {
                        Ok(binding) => binding.get(self)?,
                        Err(_) => JsValue::Undefined,
                    };
                    co.values.push(JsValue::from(typeof_value(&value)));
                }
                _ => {
                    co.push(Frame::Typeof);
                    co.push(Frame::Expr(operand.clone()));
                }
            },
            Expression::Void(operand) => {
                co.push(Frame::Replace(JsValue::Undefined));
                co.push(Frame::Expr(operand.clone()));
            }
            Expression::Delete(operand) => match &**operand {
                Expression::Identifier(_) | Expression::Member(..) => self.push_reference(co, operand, RefUse::Delete)?,
                _ => {
                    co.push(Frame::Replace(JsValue::Boolean(true)));
                    co.push(Frame::Expr(operand.clone()));
                }
            },
            Expression::Binary(op, left, right) => {
                co.push(Frame::Binary(*op));
                co.push(Frame::Expr(right.clone()));
                co.push(Frame::Expr(left.clone()));
            }
            Expression::Logical(op, left, right) => {
                co.push(Frame::Logical {
                    op: *op,
                    right: right.clone(),
                });
                co.push(Frame::Expr(left.clone()));
            }
            Expression::Update(op, prefix, target) => self.push_reference(co, target, RefUse::Update(*op, *prefix))?,
            Expression::Assign(op, pattern, value) => self.eval_assignment(co, *op, pattern, value)?,
            Expression::Conditional(test, consequent, alternate) => {
                co.push(Frame::Conditional {
                    consequent: consequent.clone(),
                    alternate: alternate.clone(),
                });
                co.push(Frame::Expr(test.clone()));
            }
            Expression::Call(callee, args, optional) => self.start_call(co, callee, args, *optional, CallKind::Plain)?,
            Expression::New(callee, args) => {
                co.push(Frame::NewArgs {
                    args: args.clone(),
                    index: 0,
                    collected: Vec::new(),
                });
                co.push(Frame::Expr(callee.clone()));
            }
            Expression::Member(..) => self.push_reference(co, expr, RefUse::Get)?,
            Expression::OptionalChain(inner) => {
                co.push(Frame::OptionalChainEnd { base: co.base() });
                co.push(Frame::Expr(inner.clone()));
            }
            Expression::Sequence(exprs) => {
                if exprs.is_empty() {
                    co.values.push(JsValue::Undefined);
                } else {
                    co.push(Frame::Sequence {
                        exprs: exprs.clone(),
                        index: 0,
                    });
                }
            }
            Expression::Spread(_) => return Err(EvalError::syntax("Unexpected spread element")),
            Expression::Yield(argument, delegate) => {
                if !co.is_generator {
                    return Err(EvalError::syntax("yield is only valid in generator functions"));
                }
                co.push(if *delegate { Frame::YieldDelegate } else { Frame::YieldValue });
                match argument {
                    Some(arg) => co.push(Frame::Expr(arg.clone())),
                    None => co.values.push(JsValue::Undefined),
                }
            }
            Expression::Await(argument) => {
                if !co.is_async {
                    return Err(EvalError::suspension("await is only valid in async functions"));
                }
                match &**argument {
                    Expression::Call(callee, args, false) if !matches!(**callee, Expression::Super) => {
                        self.start_call(co, callee, args, false, CallKind::Awaited)?
                    }
                    _ => {
                        co.push(Frame::AwaitValue);
                        co.push(Frame::Expr(argument.clone()));
                    }
                }
            }
            Expression::Template(node) => co.push(Frame::Template {
                node: node.clone(),
                index: 0,
                text: String::new(),
            }),
            Expression::TaggedTemplate(tag, node) => {
                let strings = self.template_strings(node);
                co.push(Frame::TaggedArgs {
                    node: node.clone(),
                    index: 0,
                    collected: vec![strings],
                });
                self.push_callee(co, tag)?;
            }
        }
        Ok(())
    }

    /// Evaluates an anonymous function or class, naming it `name`.
    fn eval_named(&mut self, co: &mut Coroutine, expr: &Rc<Expression>, name: &Name) -> EvalResult<()> {
        match &**expr {
            Expression::Function(node) => {
                let func = self.function_expression(co, node)?;
                self.set_function_name(&func, name);
                co.values.push(func);
            }
            Expression::Class(node) => {
                let name = node.name.clone().unwrap_or_else(|| name.clone());
                self.push_class(co, node.clone(), Some(name))?;
            }
            _ => co.push(Frame::Expr(expr.clone())),
        }
        Ok(())
    }

    /// A named function expression sees its own name in a scope of its own.
    fn function_expression(&mut self, co: &Coroutine, node: &Rc<FunctionNode>) -> EvalResult<JsValue> {
        if node.kind == FunctionKind::Normal
            && let Some(name) = &node.name
        {
            let scope = Scope::new_child(&co.scope, false);
            let func = JsValue::Object(self.create_closure(node.clone(), scope.clone(), None));
            scope.borrow_mut().declare_lexical(name, VarKind::Const, Some(func.clone()))?;
            return Ok(func);
        }
        Ok(JsValue::Object(self.create_closure(node.clone(), co.scope.clone(), None)))
    }

    pub(crate) fn push_class(&mut self, co: &mut Coroutine, node: Rc<ClassNode>, name: Option<Name>) -> EvalResult<()> {
        match node.super_class.clone() {
            Some(heritage) => {
                co.push(Frame::ClassHeritage { node, name });
                co.push(Frame::Expr(heritage));
                Ok(())
            }
            None => self.begin_class(co, node, name, None),
        }
    }

    /// Reads a binding the call machinery keeps in scope (`this`, the
    /// super-link), if any scope on the chain has it.
    fn lookup_hidden(&mut self, co: &Coroutine, name: &str) -> EvalResult<Option<JsValue>> {
        match Scope::lookup(&co.scope, name) {
            Some(scope) => {
                let binding = Binding::Variable {
                    scope,
                    name: Name::from(name),
                };
                Ok(Some(binding.get(self)?))
            }
            None => Ok(None),
        }
    }

    fn eval_assignment(
        &mut self,
        co: &mut Coroutine,
        op: AssignOp,
        pattern: &Rc<Pattern>,
        value: &Rc<Expression>,
    ) -> EvalResult<()> {
        match &**pattern {
            Pattern::Identifier(name) => {
                let binding = self.resolve_binding(co, name)?;
                self.apply_reference(co, binding, RefUse::Assign(op, value.clone()))
            }
            Pattern::Member(target) => self.push_reference(co, target, RefUse::Assign(op, value.clone())),
            _ if op == AssignOp::Assign => {
                co.push(Frame::AssignPattern {
                    pattern: pattern.clone(),
                });
                co.push(Frame::Expr(value.clone()));
                Ok(())
            }
            _ => Err(EvalError::syntax("Invalid left-hand side in assignment")),
        }
    }

    /// Resolves `expr` to a binding (evaluating object and key operands as
    /// needed) and then applies `usage` to it.
    pub(crate) fn push_reference(&mut self, co: &mut Coroutine, expr: &Rc<Expression>, usage: RefUse) -> EvalResult<()> {
        match &**expr {
            Expression::Identifier(name) => {
                let strict = match usage {
                    RefUse::Get | RefUse::CallTarget => true,
                    RefUse::Delete => false,
                    _ => co.strict,
                };
                let binding = Scope::resolve(&co.scope, name, strict)
                    .map_err(|n| self.reference_error(&format!("{n} is not defined")))?;
                if let RefUse::CallTarget = usage {
                    let func = binding.get(self)?;
                    co.values.push(JsValue::Undefined);
                    co.values.push(func);
                    return Ok(());
                }
                self.apply_reference(co, binding, usage)
            }
            Expression::Member(object, property, optional) => {
                if let Expression::Super = **object {
                    return match property {
                        MemberProperty::Dot(name) => {
                            let binding = self.super_binding(co, name.to_string())?;
                            self.apply_reference(co, binding, usage)
                        }
                        MemberProperty::Computed(key) => {
                            co.push(Frame::SuperMemberKey { usage });
                            co.push(Frame::Expr(key.clone()));
                            Ok(())
                        }
                    };
                }
                co.push(Frame::MemberObject {
                    property: property.clone(),
                    optional: *optional,
                    usage,
                });
                co.push(Frame::Expr(object.clone()));
                Ok(())
            }
            _ if matches!(usage, RefUse::Get) => {
                co.push(Frame::Expr(expr.clone()));
                Ok(())
            }
            _ => Err(EvalError::syntax("Invalid left-hand side in assignment")),
        }
    }

    fn step_member_object(
        &mut self,
        co: &mut Coroutine,
        property: MemberProperty,
        optional: bool,
        usage: RefUse,
    ) -> EvalResult<()> {
        let object = co.pop_value();
        if optional && object.is_nullish() {
            return self.short_circuit(co);
        }
        match property {
            MemberProperty::Dot(name) => {
                let binding = Binding::Property {
                    object: object.clone(),
                    key: name.to_string(),
                    receiver: object,
                };
                self.apply_reference(co, binding, usage)
            }
            MemberProperty::Computed(key) => {
                co.values.push(object);
                co.push(Frame::MemberKey { usage });
                co.push(Frame::Expr(key));
                Ok(())
            }
        }
    }

    /// `super[key]`: lookups start at the home object's parent; `this` is the
    /// receiver, so setters run against it and data writes land on it.
    fn super_binding(&mut self, co: &Coroutine, key: String) -> EvalResult<Binding> {
        let this = self.lookup_hidden(co, "this")?.unwrap_or_default();
        let Some(base) = self.lookup_hidden(co, SUPER_BASE)? else {
            return Err(EvalError::syntax("'super' keyword unexpected here"));
        };
        Ok(Binding::Property {
            object: base,
            key,
            receiver: this,
        })
    }

    fn apply_reference(&mut self, co: &mut Coroutine, binding: Binding, usage: RefUse) -> EvalResult<()> {
        match usage {
            RefUse::Get => {
                let value = binding.get(self)?;
                co.values.push(value);
            }
            RefUse::CallTarget => {
                let this = match &binding {
                    Binding::Property { receiver, .. } => receiver.clone(),
                    Binding::Variable { .. } => JsValue::Undefined,
                };
                let func = binding.get(self)?;
                co.values.push(this);
                co.values.push(func);
            }
            RefUse::Delete => {
                let deleted = binding.delete(self)?;
                co.values.push(JsValue::Boolean(deleted));
            }
            RefUse::Store => {
                let value = co.pop_value();
                binding.set(self, value)?;
            }
            RefUse::Update(op, prefix) => {
                let current = binding.get(self)?;
                let (old, new) = self.update_value(op, &current)?;
                binding.set(self, new.clone())?;
                co.values.push(if prefix { new } else { old });
            }
            RefUse::Assign(AssignOp::Assign, rhs) => {
                let hint = match &binding {
                    Binding::Variable { name, .. } if rhs.is_anonymous_function_definition() => Some(name.clone()),
                    _ => None,
                };
                co.refs.push(binding);
                co.push(Frame::AssignFinish { op: AssignOp::Assign });
                co.push(match hint {
                    Some(name) => Frame::NamedExpr(rhs, name),
                    None => Frame::Expr(rhs),
                });
            }
            RefUse::Assign(op, rhs) => {
                let old = binding.get(self)?;
                if let Some(logical) = op.logical_op() {
                    let keep = match logical {
                        LogicalOp::And => !old.to_boolean(),
                        LogicalOp::Or => old.to_boolean(),
                        LogicalOp::NullishCoalescing => !old.is_nullish(),
                    };
                    if keep {
                        co.values.push(old);
                        return Ok(());
                    }
                    co.refs.push(binding);
                    co.push(Frame::AssignFinish { op: AssignOp::Assign });
                    co.push(Frame::Expr(rhs));
                    return Ok(());
                }
                co.values.push(old);
                co.refs.push(binding);
                co.push(Frame::AssignFinish { op });
                co.push(Frame::Expr(rhs));
            }
        }
        Ok(())
    }

    /// A nullish link in an optional chain: drop the rest of the chain and
    /// produce `undefined`.
    fn short_circuit(&mut self, co: &mut Coroutine) -> EvalResult<()> {
        while let Some(frame) = co.frames.pop() {
            if let Frame::OptionalChainEnd { base } = frame {
                co.restore_base(base);
                co.values.push(JsValue::Undefined);
                return Ok(());
            }
        }
        Err(EvalError::syntax("optional access outside of an optional chain"))
    }

    /// Leaves the receiver and the function on the stack.
    fn push_callee(&mut self, co: &mut Coroutine, callee: &Rc<Expression>) -> EvalResult<()> {
        match &**callee {
            Expression::Member(..) | Expression::Identifier(_) => self.push_reference(co, callee, RefUse::CallTarget),
            _ => {
                co.push(Frame::InsertThis);
                co.push(Frame::Expr(callee.clone()));
                Ok(())
            }
        }
    }

    fn start_call(
        &mut self,
        co: &mut Coroutine,
        callee: &Rc<Expression>,
        args: &Rc<[Expression]>,
        optional: bool,
        kind: CallKind,
    ) -> EvalResult<()> {
        if let Expression::Super = **callee {
            let this = self.lookup_hidden(co, "this")?.unwrap_or_default();
            let Some(parent) = self.lookup_hidden(co, SUPER_CONSTRUCTOR)? else {
                return Err(EvalError::syntax("'super' keyword unexpected here"));
            };
            co.values.push(this);
            co.values.push(parent);
            co.push(Frame::CallArgs {
                args: args.clone(),
                index: 0,
                collected: Vec::new(),
                optional: false,
                kind: CallKind::Super,
            });
            return Ok(());
        }
        co.push(Frame::CallArgs {
            args: args.clone(),
            index: 0,
            collected: Vec::new(),
            optional,
            kind,
        });
        self.push_callee(co, callee)
    }

    fn collect_element(&mut self, element: &Expression, value: JsValue, out: &mut Vec<JsValue>) -> EvalResult<()> {
        if let Expression::Spread(_) = element {
            out.extend(self.iterate_to_vec(&value)?);
        } else {
            out.push(value);
        }
        Ok(())
    }

    fn step_call_args(
        &mut self,
        co: &mut Coroutine,
        args: Rc<[Expression]>,
        index: usize,
        mut collected: Vec<JsValue>,
        optional: bool,
        kind: CallKind,
    ) -> EvalResult<()> {
        if index == 0 && optional && co.values.last().is_some_and(|f| f.is_nullish()) {
            return self.short_circuit(co);
        }
        if index > 0 {
            let value = co.pop_value();
            self.collect_element(&args[index - 1], value, &mut collected)?;
        }
        if let Some(next) = args.get(index).map(element_expr) {
            co.push(Frame::CallArgs {
                args,
                index: index + 1,
                collected,
                optional,
                kind,
            });
            co.push(Frame::Expr(next));
            return Ok(());
        }
        let func = co.pop_value();
        let this = co.pop_value();
        match kind {
            CallKind::Plain => {
                let result = self.call_function(&func, this, &collected)?;
                co.values.push(result);
            }
            CallKind::Super => {
                let result = self.call_super_constructor(&func, this, &collected)?;
                co.values.push(result);
            }
            CallKind::Awaited => match self.prepare_awaited_call(&func, &this, &collected)? {
                Some(callee) => co.push(Frame::Delegate {
                    target: DelegateTarget::Call(Box::new(callee)),
                    pending: None,
                }),
                None => {
                    let result = self.call_function(&func, this, &collected)?;
                    co.values.push(result);
                    co.push(Frame::AwaitValue);
                }
            },
        }
        Ok(())
    }

    fn step_new_args(
        &mut self,
        co: &mut Coroutine,
        args: Rc<[Expression]>,
        index: usize,
        mut collected: Vec<JsValue>,
    ) -> EvalResult<()> {
        if index > 0 {
            let value = co.pop_value();
            self.collect_element(&args[index - 1], value, &mut collected)?;
        }
        if let Some(next) = args.get(index).map(element_expr) {
            co.push(Frame::NewArgs {
                args,
                index: index + 1,
                collected,
            });
            co.push(Frame::Expr(next));
            return Ok(());
        }
        let func = co.pop_value();
        let result = self.construct(&func, &collected)?;
        co.values.push(result);
        Ok(())
    }

    fn step_template(&mut self, co: &mut Coroutine, node: Rc<TemplateLiteral>, index: usize, mut text: String) -> EvalResult<()> {
        if index > 0 {
            let value = co.pop_value();
            text.push_str(self.to_js_string(&value)?.as_str());
        }
        if let Some(Some(quasi)) = node.quasis.get(index) {
            text.push_str(quasi);
        }
        match node.expressions.get(index).cloned() {
            Some(expr) => {
                co.push(Frame::Template {
                    node,
                    index: index + 1,
                    text,
                });
                co.push(Frame::Expr(expr));
            }
            None => co.values.push(JsValue::from(text)),
        }
        Ok(())
    }

    /// The frozen strings array handed to a template tag, with its frozen
    /// `raw` companion.
    fn template_strings(&self, node: &TemplateLiteral) -> JsValue {
        let cooked = node
            .quasis
            .iter()
            .map(|q| q.as_deref().map(JsValue::from).unwrap_or_default())
            .collect();
        let raw = node.raw_quasis.iter().map(|q| JsValue::from(&**q)).collect();
        let raw = self.create_array(raw);
        raw.borrow_mut().freeze();
        let strings = self.create_array(cooked);
        {
            let mut data = strings.borrow_mut();
            data.define_own_property(
                "raw".to_string(),
                PropertyDescriptor::data(JsValue::Object(raw), false, false, false),
            );
            data.freeze();
        }
        JsValue::Object(strings)
    }

    fn step_array_literal(
        &mut self,
        co: &mut Coroutine,
        elements: Rc<[Option<Expression>]>,
        mut index: usize,
        mut items: Vec<JsValue>,
    ) -> EvalResult<()> {
        if let Some(Some(done)) = index.checked_sub(1).map(|i| &elements[i]) {
            let value = co.pop_value();
            self.collect_element(done, value, &mut items)?;
        }
        while let Some(None) = elements.get(index) {
            items.push(JsValue::Undefined);
            index += 1;
        }
        match elements.get(index) {
            Some(Some(element)) => {
                let next = element_expr(element);
                co.push(Frame::ArrayLit {
                    elements,
                    index: index + 1,
                    items,
                });
                co.push(Frame::Expr(next));
            }
            _ => co.values.push(JsValue::Object(self.create_array(items))),
        }
        Ok(())
    }

    fn step_object_literal(
        &mut self,
        co: &mut Coroutine,
        props: Rc<[Property]>,
        index: usize,
        object: JsObject,
        stage: LiteralStage,
    ) -> EvalResult<()> {
        let Some(prop) = props.get(index).cloned() else {
            co.values.push(JsValue::Object(object));
            return Ok(());
        };
        match stage {
            LiteralStage::Start => {
                if prop.kind == PropertyKind::Spread {
                    co.values.push(JsValue::Undefined);
                    co.push(Frame::ObjectLit {
                        props,
                        index,
                        object,
                        stage: LiteralStage::ValueReady,
                    });
                    co.push(Frame::Expr(prop.value));
                    return Ok(());
                }
                match prop.key {
                    PropertyKey::Static(key) => {
                        co.values.push(JsValue::from(&*key));
                        self.step_object_literal(co, props, index, object, LiteralStage::KeyReady)
                    }
                    PropertyKey::Computed(expr) => {
                        co.push(Frame::ObjectLit {
                            props,
                            index,
                            object,
                            stage: LiteralStage::KeyReady,
                        });
                        co.push(Frame::Expr(expr));
                        Ok(())
                    }
                }
            }
            LiteralStage::KeyReady => {
                let key = co.pop_value();
                let key = self.to_property_key(&key)?;
                match (&*prop.value, prop.kind) {
                    (Expression::Function(node), PropertyKind::Get | PropertyKind::Set) => {
                        let (kind, prefix) = if prop.kind == PropertyKind::Get {
                            (MethodKind::Get, "get")
                        } else {
                            (MethodKind::Set, "set")
                        };
                        let func = self.object_method(co, &object, node);
                        self.set_function_name(&func, &format!("{prefix} {key}"));
                        define_method(&object, key, kind, func, true);
                    }
                    (Expression::Function(node), _) if node.kind == FunctionKind::Method => {
                        let func = self.object_method(co, &object, node);
                        self.set_function_name(&func, &key);
                        define_method(&object, key, MethodKind::Method, func, true);
                    }
                    (value, _) => {
                        let named = value.is_anonymous_function_definition();
                        let name = Name::from(key.as_str());
                        co.values.push(JsValue::from(key));
                        let value = prop.value.clone();
                        co.push(Frame::ObjectLit {
                            props,
                            index,
                            object,
                            stage: LiteralStage::ValueReady,
                        });
                        co.push(if named { Frame::NamedExpr(value, name) } else { Frame::Expr(value) });
                        return Ok(());
                    }
                }
                co.push(Frame::ObjectLit {
                    props,
                    index: index + 1,
                    object,
                    stage: LiteralStage::Start,
                });
                Ok(())
            }
            LiteralStage::ValueReady => {
                let value = co.pop_value();
                let key = co.pop_value();
                if prop.kind == PropertyKind::Spread {
                    self.copy_data_properties(&object, &value)?;
                } else {
                    let key = self.to_property_key(&key)?;
                    object
                        .borrow_mut()
                        .define_own_property(key, PropertyDescriptor::data_default(value));
                }
                co.push(Frame::ObjectLit {
                    props,
                    index: index + 1,
                    object,
                    stage: LiteralStage::Start,
                });
                Ok(())
            }
        }
    }

    /// Object literal methods get a super-link to the literal's prototype.
    fn object_method(&mut self, co: &Coroutine, object: &JsObject, node: &Rc<FunctionNode>) -> JsValue {
        let link = SuperLink {
            constructor: JsValue::Undefined,
            base: object.prototype().map(JsValue::Object).unwrap_or(JsValue::Null),
        };
        JsValue::Object(self.create_closure(node.clone(), co.scope.clone(), Some(link)))
    }

    fn copy_data_properties(&mut self, target: &JsObject, source: &JsValue) -> EvalResult<()> {
        match source {
            JsValue::Object(o) => {
                let keys = o.borrow().own_enumerable_keys();
                for key in keys {
                    let value = self.get_property(source, &key)?;
                    target
                        .borrow_mut()
                        .define_own_property(key, PropertyDescriptor::data_default(value));
                }
            }
            JsValue::String(s) => {
                for (i, c) in s.chars().enumerate() {
                    target
                        .borrow_mut()
                        .define_own_property(i.to_string(), PropertyDescriptor::data_default(JsValue::String(c)));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn start_delegate(&mut self, co: &mut Coroutine) -> EvalResult<()> {
        let iterable = co.pop_value();
        if let JsValue::Object(o) = &iterable
            && matches!(&o.borrow().kind, ObjectKind::Generator(state) if state.borrow().is_async)
        {
            return Err(self.type_error("yield* over an async generator is not supported"));
        }
        let target = match self.get_iter_source(&iterable)? {
            IterSource::Generator { object, .. } => DelegateTarget::Generator(object),
            source => DelegateTarget::Iter(source),
        };
        co.push(Frame::Delegate { target, pending: None });
        Ok(())
    }

    /// Forwards one resumption to the delegate and reports what it did.
    fn step_delegate(&mut self, co: &mut Coroutine, target: DelegateTarget, pending: Option<Resume>) -> EvalResult<Step> {
        let resume = pending.unwrap_or(Resume::Next(JsValue::Undefined));
        match target {
            DelegateTarget::Call(mut inner) => {
                self.enter_call()?;
                let outcome = self.resume(&mut inner, resume);
                self.exit_call();
                match outcome? {
                    Outcome::Await(value) => {
                        co.push(Frame::Delegate {
                            target: DelegateTarget::Call(inner),
                            pending: None,
                        });
                        Ok(Step::Finished(Outcome::Await(value)))
                    }
                    Outcome::Complete(value) => {
                        let deferred = Self::deferred_state(&value).is_some();
                        co.values.push(value);
                        if deferred {
                            co.push(Frame::AwaitValue);
                        }
                        Ok(Step::Continue)
                    }
                    Outcome::Threw(error) => Err(EvalError::Thrown(error)),
                    Outcome::Yield(_) => Err(EvalError::suspension("yield outside of a generator")),
                }
            }
            DelegateTarget::Generator(object) => {
                let returning = matches!(resume, Resume::Return(_));
                let (value, done) = self.generator_resume(&object, resume)?;
                if !done {
                    co.push(Frame::Delegate {
                        target: DelegateTarget::Generator(object),
                        pending: None,
                    });
                    return Ok(Step::Finished(Outcome::Yield(value)));
                }
                if returning {
                    return Ok(Step::Abrupt(Completion::Return(value)));
                }
                co.values.push(value);
                Ok(Step::Continue)
            }
            DelegateTarget::Iter(mut source) => match resume {
                Resume::Next(_) => match self.iter_next(&mut source)? {
                    Some(value) => {
                        co.push(Frame::Delegate {
                            target: DelegateTarget::Iter(source),
                            pending: None,
                        });
                        Ok(Step::Finished(Outcome::Yield(value)))
                    }
                    None => {
                        co.values.push(JsValue::Undefined);
                        Ok(Step::Continue)
                    }
                },
                Resume::Throw(error) => {
                    self.close_iter_source(&mut source)?;
                    Err(EvalError::Thrown(error))
                }
                Resume::Return(value) => {
                    self.close_iter_source(&mut source)?;
                    Ok(Step::Abrupt(Completion::Return(value)))
                }
            },
        }
    }
}

fn literal_value(lit: &Literal) -> EvalResult<JsValue> {
    Ok(match lit {
        Literal::Null => JsValue::Null,
        Literal::Boolean(b) => JsValue::Boolean(*b),
        Literal::Number(n) => JsValue::Number(*n),
        Literal::String(s) => JsValue::String(JsString::from(s.clone())),
        Literal::BigInt(digits) => match bigint_ops::parse_literal(digits) {
            Some(value) => JsValue::BigInt(JsBigInt { value }),
            None => return Err(EvalError::syntax(format!("Invalid BigInt literal {digits}n"))),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> JsValue {
        let mut interp = Interpreter::new();
        interp.run(src).unwrap()
    }

    fn text(src: &str) -> String {
        run(src).to_string()
    }

    #[test]
    fn operators_evaluate_left_to_right_once() {
        let src = "let log = ''; function f(x) { log += x; return x; } f(1) + f(2) * f(3); log";
        assert_eq!(text(src), "123");
        assert_eq!(text("let i = 0; const o = {a: 0}; o[i++] = i; i + ':' + o[0]"), "1:1");
    }

    #[test]
    fn compound_and_logical_assignment() {
        assert_eq!(text("let a = 5; a += 2; a *= 3; a"), "21");
        assert_eq!(text("let a = null; a ??= 'x'; let b = 0; b ||= 7; let c = 1; c &&= 9; a + b + c"), "x79");
        assert_eq!(text("let calls = 0; const o = {get v() { calls++; return 1; }}; o.v ||= 2; calls"), "1");
    }

    #[test]
    fn update_expressions_return_old_or_new() {
        assert_eq!(text("let i = 1; const a = i++; const b = ++i; `${a},${b},${i}`"), "1,3,3");
    }

    #[test]
    fn optional_chains_short_circuit() {
        assert_eq!(text("const o = null; typeof o?.a.b.c"), "undefined");
        assert_eq!(text("const o = {f() { return 4; }}; o.f?.() + (o.g?.() ?? 1)"), "5");
        assert_eq!(text("const k = 'x'; const o = {x: 2}; o?.[k]"), "2");
    }

    #[test]
    fn typeof_undeclared_is_undefined_but_reads_throw() {
        assert_eq!(text("typeof nowhere"), "undefined");
        let mut interp = Interpreter::new();
        assert!(matches!(interp.run("nowhere + 1"), Err(EngineError::Uncaught { .. })));
    }

    #[test]
    fn object_literals_merge_accessors_and_spread() {
        let src = "const base = {a: 1, b: 2}; const k = 'c'; const o = {...base, [k]: 3, get d() { return this.a + 10; }, m() { return 'm'; }}; `${o.a},${o.b},${o.c},${o.d},${o.m()}`";
        assert_eq!(text(src), "1,2,3,11,m");
    }

    #[test]
    fn array_holes_and_spread() {
        assert_eq!(text("const a = [1, , ...'xy']; a.length + ':' + a[1] + a[3]"), "4:undefinedy");
    }

    #[test]
    fn tagged_templates_receive_frozen_strings() {
        let src = "function tag(s, ...v) { return Object.isFrozen(s) && Object.isFrozen(s.raw) ? s.raw[0] + v[0] + s[1] : 'no'; } tag`a\\n${1 + 1}b`";
        assert_eq!(text(src), "a\\n2b");
    }

    #[test]
    fn tag_reached_through_member_keeps_receiver() {
        assert_eq!(text("const o = {p: '!', t(s, x) { return x + this.p; }}; o.t`${'hi'}`"), "hi!");
    }

    #[test]
    fn named_function_expressions_see_themselves() {
        assert_eq!(text("const f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(5)"), "120");
        assert_eq!(text("const anon = () => 1; anon.name"), "anon");
    }

    #[test]
    fn super_property_access_uses_current_this() {
        let src = "class A { who() { return this.tag; } } class B extends A { who() { return 'B' + super.who(); } } const b = new B(); b.tag = '!'; b.who()";
        assert_eq!(text(src), "B!");
    }

    #[test]
    fn super_setter_runs_against_the_instance() {
        let src = "class A { set v(x) { this._v = x * 2; } } class B extends A { put(x) { super.v = x; return this._v; } } new B().put(4)";
        assert_eq!(text(src), "8");
        let src = "class A {} A.prototype.v = 1; class B extends A { put() { super.v = 5; return `${this.hasOwnProperty('v')} ${this.v} ${A.prototype.v}`; } } new B().put()";
        assert_eq!(text(src), "true 5 1");
    }

    #[test]
    fn new_spreads_arguments() {
        assert_eq!(text("function P(a, b) { this.s = a + b; } new P(...[2, 3]).s"), "5");
    }

    #[test]
    fn delete_reports_success() {
        assert_eq!(text("const o = {a: 1}; const r = delete o.a; r + ',' + ('a' in o)"), "true,false");
    }
}
