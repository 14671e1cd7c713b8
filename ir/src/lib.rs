pub mod print;

pub type Identifier = String;

/// Index of a row within the program-wide stream. Row results are
/// referenced by this index, so rows may only point backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub usize);

/// Jump target. Label numbers are unique across the whole program and
/// allocated in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Instruction {
    /// arg1: destination (variable or array element), arg2: source value.
    Assign,
    /// arg1: target label.
    Jump,
    /// arg1: condition value, arg2: target label.
    JumpFalse,
    /// arg1: the label defined at this row.
    Label,
    /// arg1: the function name. Starts a new function in the stream.
    FuncLabel,
    /// arg1: name of the callee. The call result is this row's value.
    Call,
    /// arg1: one argument for the upcoming call.
    Push,
    /// No args. The k-th pop row of a function yields its k-th parameter.
    Pop,
    /// arg1: optional return value.
    Return,
    Plus,
    Minus,
    Multiply,
    Divide,
    And,
    Or,
    Equals,
    NotEquals,
    Smaller,
    Greater,
    SmallerEq,
    GreaterEq,
    /// arg1: operand. Arithmetic negation.
    Negative,
    /// arg1: operand. Boolean negation.
    Not,
    /// arg1: array name, arg2: element count.
    ArrayBool,
    ArrayInt,
    ArrayFloat,
    ArrayString,
    /// Never produced by the generator. Kept so that malformed streams
    /// stay representable and consumers must handle them explicitly.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    IntConstant(i32),
    FloatConstant(f64),
    BoolConstant(bool),
    StringConstant(String),
    /// A named variable.
    Var(Identifier),
    /// The result of an earlier row.
    Row(RowId),
    Label(LabelId),
    FuncLabel(Identifier),
    ArrayElement { name: Identifier, index: Box<Arg> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub instr: Instruction,
    pub arg1: Option<Arg>,
    pub arg2: Option<Arg>,
}

/// One flat stream of rows for the whole program. Functions are
/// delimited by their func-label rows.
#[derive(Debug, Default, PartialEq)]
pub struct Ir(pub Vec<Row>);

impl Ir {
    pub fn rows(&self) -> &[Row] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Row indices of every func-label row, in stream order.
    pub fn function_starts(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, row)| row.instr == Instruction::FuncLabel)
            .map(|(index, _)| index)
            .collect()
    }

    /// Exclusive end of the function beginning at `start`: the next
    /// func-label row or the end of the stream.
    pub fn function_end(&self, start: usize) -> usize {
        self.0[start + 1..]
            .iter()
            .position(|row| row.instr == Instruction::FuncLabel)
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.0.len())
    }

    /// Name carried by the func-label row at `start`.
    pub fn function_name(&self, start: usize) -> Option<&str> {
        let row = self.0.get(start)?;
        if row.instr != Instruction::FuncLabel {
            return None;
        }
        match &row.arg1 {
            Some(Arg::FuncLabel(name)) => Some(name),
            _ => None,
        }
    }
}
