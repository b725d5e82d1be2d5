//! Syntax tree consumed by the evaluator.
//!
//! Children are reference counted so a suspended generator or async body can
//! keep the sub-trees it still has to run without borrowing the program.

use std::rc::Rc;

pub type Name = Rc<str>;

#[derive(Clone, Debug)]
pub struct Program {
    pub body: Rc<[Statement]>,
    pub strict: bool,
}

#[derive(Clone, Debug)]
pub enum Statement {
    Empty,
    Expression(Rc<Expression>),
    Block(Rc<[Statement]>),
    Variable(VariableDeclaration),
    If(IfStatement),
    While(WhileStatement),
    DoWhile(WhileStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    ForOf(ForOfStatement),
    Return(Option<Rc<Expression>>),
    Break(Option<Name>),
    Continue(Option<Name>),
    Throw(Rc<Expression>),
    Try(TryStatement),
    Switch(SwitchStatement),
    Labeled(Name, Rc<Statement>),
    Debugger,
    FunctionDeclaration(Rc<FunctionNode>),
    ClassDeclaration(Rc<ClassNode>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Debug)]
pub struct VariableDeclaration {
    pub kind: VarKind,
    pub declarations: Rc<[VariableDeclarator]>,
}

#[derive(Clone, Debug)]
pub struct VariableDeclarator {
    pub pattern: Rc<Pattern>,
    pub init: Option<Rc<Expression>>,
}

#[derive(Clone, Debug)]
pub struct IfStatement {
    pub test: Rc<Expression>,
    pub consequent: Rc<Statement>,
    pub alternate: Option<Rc<Statement>>,
}

#[derive(Clone, Debug)]
pub struct WhileStatement {
    pub test: Rc<Expression>,
    pub body: Rc<Statement>,
}

#[derive(Clone, Debug)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Rc<Expression>>,
    pub update: Option<Rc<Expression>>,
    pub body: Rc<Statement>,
}

#[derive(Clone, Debug)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Rc<Expression>),
}

#[derive(Clone, Debug)]
pub struct ForInStatement {
    pub left: ForInOfLeft,
    pub right: Rc<Expression>,
    pub body: Rc<Statement>,
}

#[derive(Clone, Debug)]
pub struct ForOfStatement {
    pub left: ForInOfLeft,
    pub right: Rc<Expression>,
    pub body: Rc<Statement>,
    pub is_await: bool,
}

#[derive(Clone, Debug)]
pub enum ForInOfLeft {
    Declaration(VarKind, Rc<Pattern>),
    Pattern(Rc<Pattern>),
}

#[derive(Clone, Debug)]
pub struct TryStatement {
    pub block: Rc<[Statement]>,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<Rc<[Statement]>>,
}

#[derive(Clone, Debug)]
pub struct CatchClause {
    pub param: Option<Rc<Pattern>>,
    pub body: Rc<[Statement]>,
}

#[derive(Clone, Debug)]
pub struct SwitchStatement {
    pub discriminant: Rc<Expression>,
    pub cases: Rc<[SwitchCase]>,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub test: Option<Rc<Expression>>,
    pub consequent: Rc<[Statement]>,
}

#[derive(Clone, Debug)]
pub enum Pattern {
    Identifier(Name),
    /// `None` entries are elisions (`[, b]`); a rest element is `Pattern::Rest`.
    Array(Rc<[Option<Pattern>]>),
    Object(Rc<[ObjectPatternProperty]>),
    Assign(Rc<Pattern>, Rc<Expression>),
    Rest(Rc<Pattern>),
    /// Only valid as an assignment target, never in a declaration.
    Member(Rc<Expression>),
}

#[derive(Clone, Debug)]
pub enum ObjectPatternProperty {
    KeyValue(PropertyKey, Pattern),
    Rest(Pattern),
}

#[derive(Clone, Debug)]
pub enum Expression {
    Literal(Literal),
    Identifier(Name),
    This,
    Super,
    /// `None` entries are holes.
    Array(Rc<[Option<Expression>]>),
    Object(Rc<[Property]>),
    Function(Rc<FunctionNode>),
    Class(Rc<ClassNode>),
    Unary(UnaryOp, Rc<Expression>),
    Typeof(Rc<Expression>),
    Void(Rc<Expression>),
    Delete(Rc<Expression>),
    Binary(BinaryOp, Rc<Expression>, Rc<Expression>),
    Logical(LogicalOp, Rc<Expression>, Rc<Expression>),
    Update(UpdateOp, bool, Rc<Expression>), // op, prefix, target
    Assign(AssignOp, Rc<Pattern>, Rc<Expression>),
    Conditional(Rc<Expression>, Rc<Expression>, Rc<Expression>),
    Call(Rc<Expression>, Rc<[Expression]>, bool), // callee, args, optional
    New(Rc<Expression>, Rc<[Expression]>),
    Member(Rc<Expression>, MemberProperty, bool), // object, property, optional
    /// Delimits how far an optional `?.` link short-circuits.
    OptionalChain(Rc<Expression>),
    Sequence(Rc<[Expression]>),
    Spread(Rc<Expression>),
    Yield(Option<Rc<Expression>>, bool), // argument, delegate
    Await(Rc<Expression>),
    Template(Rc<TemplateLiteral>),
    TaggedTemplate(Rc<Expression>, Rc<TemplateLiteral>),
}

#[derive(Clone, Debug)]
pub enum MemberProperty {
    Dot(Name),
    Computed(Rc<Expression>),
}

#[derive(Clone, Debug)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(Name),
    BigInt(Name),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    LShift,
    RShift,
    URShift,
    BitAnd,
    BitOr,
    BitXor,
    In,
    Instanceof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    NullishCoalescing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ExpAssign,
    LShiftAssign,
    RShiftAssign,
    URShiftAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    LogicalAndAssign,
    LogicalOrAssign,
    NullishAssign,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::AddAssign => BinaryOp::Add,
            AssignOp::SubAssign => BinaryOp::Sub,
            AssignOp::MulAssign => BinaryOp::Mul,
            AssignOp::DivAssign => BinaryOp::Div,
            AssignOp::ModAssign => BinaryOp::Mod,
            AssignOp::ExpAssign => BinaryOp::Exp,
            AssignOp::LShiftAssign => BinaryOp::LShift,
            AssignOp::RShiftAssign => BinaryOp::RShift,
            AssignOp::URShiftAssign => BinaryOp::URShift,
            AssignOp::BitAndAssign => BinaryOp::BitAnd,
            AssignOp::BitOrAssign => BinaryOp::BitOr,
            AssignOp::BitXorAssign => BinaryOp::BitXor,
            _ => return None,
        })
    }

    pub fn logical_op(self) -> Option<LogicalOp> {
        match self {
            AssignOp::LogicalAndAssign => Some(LogicalOp::And),
            AssignOp::LogicalOrAssign => Some(LogicalOp::Or),
            AssignOp::NullishAssign => Some(LogicalOp::NullishCoalescing),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum PropertyKey {
    /// Identifier, string and numeric keys, already in canonical string form.
    Static(Name),
    Computed(Rc<Expression>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
    Spread,
}

#[derive(Clone, Debug)]
pub struct Property {
    pub key: PropertyKey,
    pub value: Rc<Expression>,
    pub kind: PropertyKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Method,
    Constructor,
}

#[derive(Clone, Debug)]
pub struct FunctionNode {
    pub name: Option<Name>,
    pub params: Rc<[Pattern]>,
    /// Arrow functions with an expression body get `[Return(expr)]`.
    pub body: Rc<[Statement]>,
    pub kind: FunctionKind,
    pub is_async: bool,
    pub is_generator: bool,
    pub strict: bool,
}

impl FunctionNode {
    /// Number of parameters before the first default or rest element.
    pub fn expected_argument_count(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !matches!(p, Pattern::Assign(..) | Pattern::Rest(_)))
            .count()
    }
}

#[derive(Clone, Debug)]
pub struct ClassNode {
    pub name: Option<Name>,
    pub super_class: Option<Rc<Expression>>,
    pub members: Rc<[ClassMember]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
}

#[derive(Clone, Debug)]
pub struct ClassMember {
    pub key: PropertyKey,
    pub kind: MethodKind,
    pub value: Rc<FunctionNode>,
    pub is_static: bool,
}

#[derive(Clone, Debug)]
pub struct TemplateLiteral {
    pub quasis: Vec<Option<Name>>,
    pub raw_quasis: Vec<Name>,
    pub expressions: Vec<Rc<Expression>>,
}

impl Expression {
    /// Function and class expressions without their own binding name take
    /// the name of the binding they are assigned to.
    pub fn is_anonymous_function_definition(&self) -> bool {
        match self {
            Expression::Function(f) => f.name.is_none(),
            Expression::Class(c) => c.name.is_none(),
            _ => false,
        }
    }
}
