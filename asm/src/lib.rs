//! Structured 32-bit x86 assembly. The generator builds these values,
//! the emitter renders them as AT&T syntax text.

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Register {
    EAX,
    EBX,
    EDX,
    /// Byte register written by set instructions.
    DL,
    ESP,
    EBP,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum Operand {
    Imm(i32),
    Register(Register),
    /// Offset relative to %ebp. Negative offsets are locals, positive
    /// offsets reach into the caller's pushed arguments.
    Stack(i32),
    /// A label in the data section.
    Data(String),
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    And,
    Or,
    Xor,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum CondCode {
    E,
    NE,
    L,
    LE,
    G,
    GE,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum Instruction {
    Mov {
        src: Operand,
        dst: Operand,
    },
    /// Zero extending byte to doubleword move.
    Movzbl {
        src: Operand,
        dst: Operand,
    },
    Neg(Operand),
    Binary {
        op: BinaryOperator,
        src: Operand,
        dst: Operand,
    },
    /// Signed division of %edx:%eax by the operand.
    Idiv(Operand),
    Cmp {
        src: Operand,
        dst: Operand,
    },
    SetCC(CondCode, Operand),
    Jmp(u32),
    JmpCC(CondCode, u32),
    Label(u32),
    Push(Operand),
    Call(String),
    Leave,
    /// `pop_bytes` of pushed arguments are dropped on return.
    Ret {
        pop_bytes: u32,
    },
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum ArrayType {
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, PartialEq, PartialOrd, Clone)]
pub enum Declaration {
    /// A zero terminated byte string.
    Db {
        identifier: String,
        value: String,
    },
    Float {
        identifier: String,
        value: f32,
    },
    Array {
        identifier: String,
        ty: ArrayType,
        count: usize,
    },
}

#[derive(Debug, Default, PartialEq, PartialOrd)]
pub struct DataSection {
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FunctionDefinition {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Default, PartialEq, PartialOrd)]
pub struct TextSection {
    pub functions: Vec<FunctionDefinition>,
}

#[derive(Debug, Default, PartialEq, PartialOrd)]
pub struct Program {
    pub data: DataSection,
    pub text: TextSection,
}
