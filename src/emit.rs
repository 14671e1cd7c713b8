//! Renders the assembly model as AT&T syntax text that the GNU
//! assembler accepts with `-m32`.

use rmc_asm::{
    BinaryOperator, CondCode, DataSection, Declaration, FunctionDefinition, Instruction, Operand,
    Program, Register, TextSection,
};

/// A structure implementing this trait can render itself as assembly
/// text.
pub trait EmitAsm {
    /// `indent_depth` is the number of tabs the enclosing constructs
    /// already require.
    fn emit(&self, indent_depth: u32) -> String;
}

/// Local trait so `Operand` (defined in `rmc-asm`) can have an `emit`
/// method here without violating the orphan rule.
trait EmitOperand {
    fn emit(&self) -> String;
}

impl EmitOperand for Operand {
    fn emit(&self) -> String {
        match self {
            Operand::Imm(value) => format!("${value}"),
            Operand::Register(register) => format!(
                "%{}",
                match register {
                    Register::EAX => "eax",
                    Register::EBX => "ebx",
                    Register::EDX => "edx",
                    Register::DL => "dl",
                    Register::ESP => "esp",
                    Register::EBP => "ebp",
                }
            ),
            Operand::Stack(offset) => format!("{offset}(%ebp)"),
            Operand::Data(identifier) => identifier.clone(),
        }
    }
}

impl EmitAsm for Instruction {
    fn emit(&self, indent_depth: u32) -> String {
        let tabs = "\t".repeat(indent_depth as usize);

        match self {
            Instruction::Mov { src, dst } => {
                format!("{}movl {}, {}\n", tabs, src.emit(), dst.emit())
            }
            Instruction::Movzbl { src, dst } => {
                format!("{}movzbl {}, {}\n", tabs, src.emit(), dst.emit())
            }
            Instruction::Neg(operand) => format!("{}negl {}\n", tabs, operand.emit()),
            Instruction::Binary { op, src, dst } => format!(
                "{}{} {}, {}\n",
                tabs,
                op.emit(indent_depth),
                src.emit(),
                dst.emit()
            ),
            Instruction::Idiv(operand) => format!("{}idivl {}\n", tabs, operand.emit()),
            Instruction::Cmp { src, dst } => {
                format!("{}cmpl {}, {}\n", tabs, src.emit(), dst.emit())
            }
            Instruction::SetCC(cond_code, operand) => format!(
                "{}set{} {}\n",
                tabs,
                cond_code.emit(indent_depth),
                operand.emit()
            ),
            Instruction::Jmp(label) => format!("{tabs}jmp .L{label}\n"),
            Instruction::JmpCC(cond_code, label) => {
                format!("{}j{} .L{}\n", tabs, cond_code.emit(indent_depth), label)
            }
            Instruction::Label(label) => format!(".L{label}:\n"),
            Instruction::Push(operand) => format!("{}pushl {}\n", tabs, operand.emit()),
            Instruction::Call(identifier) => format!("{tabs}call {identifier}\n"),
            Instruction::Leave => format!("{tabs}leave\n"),
            Instruction::Ret { pop_bytes: 0 } => format!("{tabs}ret\n"),
            Instruction::Ret { pop_bytes } => format!("{tabs}ret ${pop_bytes}\n"),
        }
    }
}

impl EmitAsm for CondCode {
    fn emit(&self, _: u32) -> String {
        match self {
            CondCode::E => "e",
            CondCode::NE => "ne",
            CondCode::L => "l",
            CondCode::LE => "le",
            CondCode::G => "g",
            CondCode::GE => "ge",
        }
        .to_owned()
    }
}

impl EmitAsm for BinaryOperator {
    fn emit(&self, _: u32) -> String {
        match self {
            BinaryOperator::Add => "addl",
            BinaryOperator::Sub => "subl",
            BinaryOperator::Mult => "imull",
            BinaryOperator::And => "andl",
            BinaryOperator::Or => "orl",
            BinaryOperator::Xor => "xorl",
        }
        .to_owned()
    }
}

impl EmitAsm for Declaration {
    fn emit(&self, indent_depth: u32) -> String {
        let tabs = "\t".repeat(indent_depth as usize);

        match self {
            Declaration::Db { identifier, value } => {
                format!("{identifier}:\n{tabs}.string \"{value}\"\n")
            }
            Declaration::Float { identifier, value } => {
                // {:?} keeps the decimal point on round values.
                format!("{identifier}:\n{tabs}.float {value:?}\n")
            }
            Declaration::Array {
                identifier, count, ..
            } => format!("{identifier}:\n{tabs}.zero {}\n", 4 * count),
        }
    }
}

impl EmitAsm for DataSection {
    fn emit(&self, indent_depth: u32) -> String {
        if self.declarations.is_empty() {
            return String::new();
        }
        let tabs = "\t".repeat((indent_depth + 1) as usize);

        format!(
            "{}.data\n{}",
            tabs,
            self.declarations
                .iter()
                .map(|declaration| declaration.emit(indent_depth + 1))
                .collect::<String>()
        )
    }
}

impl EmitAsm for FunctionDefinition {
    fn emit(&self, indent_depth: u32) -> String {
        let tabs = "\t".repeat((indent_depth + 1) as usize);

        format!(
            "{}.globl {}\n{}:\n{}",
            tabs,
            self.name,
            self.name,
            self.instructions
                .iter()
                .map(|instruction| instruction.emit(indent_depth + 1))
                .collect::<String>()
        )
    }
}

impl EmitAsm for TextSection {
    fn emit(&self, indent_depth: u32) -> String {
        let tabs = "\t".repeat((indent_depth + 1) as usize);

        format!(
            "{}.text\n{}",
            tabs,
            self.functions
                .iter()
                .map(|function| function.emit(indent_depth))
                .reduce(|acc, function| format!("{acc}\n{function}"))
                .unwrap_or_default()
        )
    }
}

impl EmitAsm for Program {
    fn emit(&self, indent_depth: u32) -> String {
        format!(
            "{}{}.section .note.GNU-stack,\"\",@progbits\n",
            self.data.emit(indent_depth),
            self.text.emit(indent_depth)
        )
    }
}
