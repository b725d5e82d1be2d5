//! Resumable execution state.
//!
//! A guest function body runs on an explicit frame stack instead of the host
//! call stack, so it can stop at any `yield` or `await` and later continue
//! exactly where it left off.

use super::error::EngineError;
use super::scope::{Binding, ScopeRef};
use crate::ast::*;
use crate::types::{JsObject, JsValue};
use std::rc::Rc;

/// Labels attached to a statement; empty for unlabeled ones.
pub type Labels = Rc<[Name]>;

/// Abrupt completion travelling up the frame stack.
#[derive(Debug)]
pub enum Completion {
    Return(JsValue),
    Throw(JsValue),
    Break(Option<Name>),
    Continue(Option<Name>),
    /// Host-level failure: skips `catch`, still runs `finally`.
    Fatal(EngineError),
}

/// Value delivered to a suspended computation.
#[derive(Debug, Clone)]
pub enum Resume {
    Next(JsValue),
    Throw(JsValue),
    Return(JsValue),
}

/// Why a coroutine stopped running.
#[derive(Debug)]
pub enum Outcome {
    Yield(JsValue),
    Await(JsValue),
    Complete(JsValue),
    Threw(JsValue),
}

/// Result of a single step of the machine.
pub(crate) enum Step {
    Continue,
    Abrupt(Completion),
    Finished(Outcome),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BindMode {
    Declare(VarKind),
    Assign,
}

/// Stack heights to restore when a handler frame takes over.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StackBase {
    pub values: usize,
    pub refs: usize,
}

/// What to do with a reference once it has been resolved.
#[derive(Clone)]
pub(crate) enum RefUse {
    Get,
    /// Push the receiver and the function for a call.
    CallTarget,
    Assign(AssignOp, Rc<Expression>),
    Update(UpdateOp, bool),
    Delete,
    /// Store the value found below the reference's own operands.
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LiteralStage {
    Start,
    KeyReady,
    ValueReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    Plain,
    /// `super(...)`: runs the parent constructor on the current `this`.
    Super,
    /// Operand of `await`: an async callee runs inside the caller's chain.
    Awaited,
}

/// Source of values for `for-of`, spread, array patterns and `yield*`.
pub(crate) enum IterSource {
    List { items: Vec<JsValue>, index: usize },
    ArrayLike { object: JsObject, index: usize },
    Generator { object: JsObject, done: bool },
    /// An object implementing `next()` by hand.
    Protocol { iterator: JsValue, done: bool },
}

pub(crate) enum DelegateTarget {
    /// `await asyncCall()`: the callee's body runs inside the caller's chain.
    Call(Box<Coroutine>),
    Generator(JsObject),
    Iter(IterSource),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ForInOfKind {
    In,
    Of,
    AwaitOf,
}

pub(crate) struct ForInOf {
    pub left: ForInOfLeft,
    pub body: Rc<Statement>,
    pub labels: Labels,
    pub outer: ScopeRef,
    pub base: StackBase,
}

pub(crate) enum Frame {
    // Statements
    Stmts {
        body: Rc<[Statement]>,
        index: usize,
    },
    Stmt(Rc<Statement>),
    RestoreScope(ScopeRef),
    ExprStmtDone,
    Discard,
    VarDecls {
        decl: VariableDeclaration,
        index: usize,
    },
    IfBranch {
        consequent: Rc<Statement>,
        alternate: Option<Rc<Statement>>,
    },
    WhileCheck {
        node: WhileStatement,
        labels: Labels,
        base: StackBase,
    },
    /// Body of a `while` finished; also the break/continue target.
    WhileNext {
        node: WhileStatement,
        labels: Labels,
        base: StackBase,
    },
    DoWhileNext {
        node: WhileStatement,
        labels: Labels,
        base: StackBase,
    },
    DoWhileCheck {
        node: WhileStatement,
        labels: Labels,
        base: StackBase,
    },
    ForTest {
        node: ForStatement,
        labels: Labels,
        per_iteration: bool,
        base: StackBase,
    },
    ForCheck {
        node: ForStatement,
        labels: Labels,
        per_iteration: bool,
        base: StackBase,
    },
    ForNext {
        node: ForStatement,
        labels: Labels,
        per_iteration: bool,
        base: StackBase,
    },
    /// The right-hand side of a `for-in`/`for-of` is on the stack.
    ForInOfHead {
        state: Rc<ForInOf>,
        kind: ForInOfKind,
    },
    ForInNext {
        keys: Rc<[String]>,
        index: usize,
        state: Rc<ForInOf>,
    },
    ForOfNext {
        source: IterSource,
        is_await: bool,
        state: Rc<ForInOf>,
    },
    /// `for await`: the awaited element is on the stack.
    ForOfAwaited {
        source: IterSource,
        state: Rc<ForInOf>,
    },
    /// `for await` over an async generator: the awaited `{value, done}`
    /// record is on the stack.
    ForOfAwaitedRecord {
        source: IterSource,
        state: Rc<ForInOf>,
    },
    LabelExit {
        labels: Labels,
        base: StackBase,
    },
    /// The discriminant is on the stack.
    SwitchStart {
        cases: Rc<[SwitchCase]>,
    },
    SwitchBody {
        base: StackBase,
    },
    SwitchMatch {
        cases: Rc<[SwitchCase]>,
        index: usize,
        discriminant: JsValue,
    },
    SwitchCompare {
        cases: Rc<[SwitchCase]>,
        index: usize,
        discriminant: JsValue,
    },
    SwitchRun {
        cases: Rc<[SwitchCase]>,
        index: usize,
    },
    ReturnValue,
    ThrowValue,
    TryBlock {
        handler: Option<CatchClause>,
        finalizer: Option<Rc<[Statement]>>,
        scope: ScopeRef,
        base: StackBase,
    },
    CatchBlock {
        finalizer: Option<Rc<[Statement]>>,
        scope: ScopeRef,
        base: StackBase,
    },
    /// A `finally` block is running; `pending` resumes afterwards.
    FinallyDone {
        pending: Option<Completion>,
        scope: ScopeRef,
        base: StackBase,
    },

    // Expressions
    Expr(Rc<Expression>),
    /// Evaluates an anonymous function or class under the given name.
    NamedExpr(Rc<Expression>, Name),
    Unary(UnaryOp),
    Typeof,
    /// Drops the operand and pushes a fixed value (`void`, `delete` of a
    /// non-reference).
    Replace(JsValue),
    Binary(BinaryOp),
    Logical {
        op: LogicalOp,
        right: Rc<Expression>,
    },
    Conditional {
        consequent: Rc<Expression>,
        alternate: Rc<Expression>,
    },
    Sequence {
        exprs: Rc<[Expression]>,
        index: usize,
    },
    Template {
        node: Rc<TemplateLiteral>,
        index: usize,
        text: String,
    },
    ArrayLit {
        elements: Rc<[Option<Expression>]>,
        index: usize,
        items: Vec<JsValue>,
    },
    ObjectLit {
        props: Rc<[Property]>,
        index: usize,
        object: JsObject,
        /// The value (or computed key) of `props[index]` is on the stack.
        stage: LiteralStage,
    },
    MemberObject {
        property: MemberProperty,
        optional: bool,
        usage: RefUse,
    },
    MemberKey {
        usage: RefUse,
    },
    SuperMemberKey {
        usage: RefUse,
    },
    AssignFinish {
        op: AssignOp,
    },
    AssignPattern {
        pattern: Rc<Pattern>,
    },
    /// Moves the function on top of the stack above an `undefined` receiver.
    InsertThis,
    CallArgs {
        args: Rc<[Expression]>,
        index: usize,
        collected: Vec<JsValue>,
        optional: bool,
        kind: CallKind,
    },
    NewArgs {
        args: Rc<[Expression]>,
        index: usize,
        collected: Vec<JsValue>,
    },
    TaggedArgs {
        node: Rc<TemplateLiteral>,
        index: usize,
        collected: Vec<JsValue>,
    },
    OptionalChainEnd {
        base: StackBase,
    },
    YieldValue,
    YieldDelegate,
    AwaitValue,
    Delegate {
        target: DelegateTarget,
        pending: Option<Resume>,
    },
    ClassHeritage {
        node: Rc<ClassNode>,
        name: Option<Name>,
    },
    ClassMembers {
        node: Rc<ClassNode>,
        index: usize,
        constructor: JsObject,
        prototype: JsObject,
        parent: Option<JsValue>,
        /// The computed key of `members[index]` is on the stack.
        key_pending: bool,
    },

    // Patterns
    Bind {
        pattern: Pattern,
        mode: BindMode,
        value: Option<JsValue>,
    },
    ArrayPatternStep {
        items: Rc<[Option<Pattern>]>,
        values: Rc<[JsValue]>,
        index: usize,
        mode: BindMode,
    },
    ObjectPatternStep {
        props: Rc<[ObjectPatternProperty]>,
        feed: JsValue,
        index: usize,
        used: Vec<String>,
        mode: BindMode,
    },
    /// A computed key of an object pattern entry is on the stack.
    ObjectPatternKey {
        props: Rc<[ObjectPatternProperty]>,
        feed: JsValue,
        index: usize,
        used: Vec<String>,
        mode: BindMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CoroutineState {
    Fresh,
    Suspended,
    Running,
    Done,
}

/// One in-flight evaluation of a program or function body.
pub(crate) struct Coroutine {
    pub frames: Vec<Frame>,
    pub values: Vec<JsValue>,
    pub refs: Vec<Binding>,
    pub scope: ScopeRef,
    pub strict: bool,
    /// Value of the last expression statement; the result of a program.
    pub last_value: JsValue,
    pub is_program: bool,
    pub is_async: bool,
    pub is_generator: bool,
    pub state: CoroutineState,
}

impl Coroutine {
    pub fn new(body: Rc<[Statement]>, scope: ScopeRef, strict: bool) -> Self {
        Self {
            frames: vec![Frame::Stmts { body, index: 0 }],
            values: Vec::new(),
            refs: Vec::new(),
            scope,
            strict,
            last_value: JsValue::Undefined,
            is_program: false,
            is_async: false,
            is_generator: false,
            state: CoroutineState::Fresh,
        }
    }

    pub fn for_program(program: &Program, scope: ScopeRef, strict: bool) -> Self {
        let mut co = Self::new(program.body.clone(), scope, strict);
        co.is_program = true;
        co
    }

    pub fn base(&self) -> StackBase {
        StackBase {
            values: self.values.len(),
            refs: self.refs.len(),
        }
    }

    pub fn restore_base(&mut self, base: StackBase) {
        self.values.truncate(base.values);
        self.refs.truncate(base.refs);
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_value(&mut self) -> JsValue {
        self.values.pop().unwrap_or_default()
    }
}
