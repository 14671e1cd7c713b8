//! Human readable rendering of the row stream as a bordered table.

use std::fmt;

use crate::{Arg, Instruction, Ir};

const TABLE_WIDTH: usize = 80;

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instruction::Assign => "assign",
            Instruction::Jump => "jump",
            Instruction::JumpFalse => "jumpfalse",
            Instruction::Label => "label",
            Instruction::FuncLabel => "func_label",
            Instruction::Call => "call",
            Instruction::Push => "push",
            Instruction::Pop => "pop",
            Instruction::Return => "return",
            Instruction::Plus => "plus",
            Instruction::Minus => "minus",
            Instruction::Multiply => "multiply",
            Instruction::Divide => "divide",
            Instruction::And => "and",
            Instruction::Or => "or",
            Instruction::Equals => "equals",
            Instruction::NotEquals => "notequals",
            Instruction::Smaller => "smaller",
            Instruction::Greater => "greater",
            Instruction::SmallerEq => "smallereq",
            Instruction::GreaterEq => "greatereq",
            Instruction::Negative => "negative",
            Instruction::Not => "not",
            Instruction::ArrayBool => "array_bool",
            Instruction::ArrayInt => "array_int",
            Instruction::ArrayFloat => "array_float",
            Instruction::ArrayString => "array_string",
            Instruction::Unknown => "unknown",
        };
        // Pad instead of write so the table's column width reaches us.
        f.pad(name)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::IntConstant(value) => write!(f, "{value}"),
            // {:?} keeps the decimal point on round values.
            Arg::FloatConstant(value) => write!(f, "{value:?}"),
            Arg::BoolConstant(value) => write!(f, "{value}"),
            Arg::StringConstant(value) => write!(f, "\"{value}\""),
            Arg::Var(name) => write!(f, "{name}"),
            Arg::Row(row) => write!(f, "({})", row.0),
            Arg::Label(label) => write!(f, "L{}", label.0),
            Arg::FuncLabel(name) => write!(f, "{name}"),
            Arg::ArrayElement { name, index } => write!(f, "{name}[{index}]"),
        }
    }
}

impl fmt::Display for Ir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = "-".repeat(TABLE_WIDTH);
        writeln!(f, "{line}")?;
        writeln!(
            f,
            "| {:<9} | {:<16} | {:<21} | {:<21} |",
            "row", "instruction", "arg1", "arg2"
        )?;
        writeln!(f, "{line}")?;
        for (index, row) in self.rows().iter().enumerate() {
            let arg1 = row
                .arg1
                .as_ref()
                .map(Arg::to_string)
                .unwrap_or_default();
            let arg2 = row
                .arg2
                .as_ref()
                .map(Arg::to_string)
                .unwrap_or_default();
            writeln!(
                f,
                "| {index:<9} | {:<16} | {arg1:<21} | {arg2:<21} |",
                row.instr
            )?;
        }
        writeln!(f, "{line}")
    }
}
