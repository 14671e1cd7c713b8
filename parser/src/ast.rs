pub type Identifier = String;

/// Value types of the language. `void` only occurs as a function return
/// type and is modeled as `Option<Type>` on [`Function`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub enum Type {
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

#[derive(Debug, PartialEq, PartialOrd)]
pub enum Expression {
    IntConstant(i32),
    FloatConstant(f64),
    BoolConstant(bool),
    StringConstant(String),
    Var(Identifier),
    ArrayElement {
        name: Identifier,
        index: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        expression: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    FunctionCall(Identifier, Vec<Expression>),
}

/// `int a;` or `int[10] arr;`. Declarations never carry initializers.
#[derive(Debug, PartialEq)]
pub struct Declaration {
    pub ty: Type,
    /// Element count for array declarations, `None` for scalars.
    pub size: Option<usize>,
    pub name: Identifier,
}

/// Assignments are statements, not expressions.
#[derive(Debug, PartialEq)]
pub struct Assignment {
    pub name: Identifier,
    /// Index expression for `name[index] = value;`.
    pub index: Option<Expression>,
    pub value: Expression,
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    Declaration(Declaration),
    Assignment(Assignment),
    Expression(Expression),
    If {
        condition: Expression,
        then: Box<Statement>,
        r#else: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Return(Option<Expression>),
    Compound(Vec<Statement>),
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: Identifier,
}

#[derive(Debug, PartialEq)]
pub struct Function {
    /// `None` for `void` functions.
    pub return_type: Option<Type>,
    pub name: Identifier,
    pub params: Vec<Param>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq)]
pub struct Program {
    pub functions: Vec<Function>,
}
