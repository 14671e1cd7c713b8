//! Lowers one function of the row stream into x86 instructions. Values
//! move through %eax, results land in stack slots handed out by the
//! position list.

use rmc_asm::{BinaryOperator, CondCode, Instruction, Operand, Register};
use rmc_ir::{self, Arg, Ir, Row, RowId};

use crate::positions::PositionList;
use crate::AsmGenError;

pub(crate) fn lower_function(
    ir: &Ir,
    start: usize,
    frame_size: u32,
) -> Result<Vec<Instruction>, AsmGenError> {
    FunctionLowerer::new(ir, start).run(start, frame_size)
}

struct FunctionLowerer<'a> {
    ir: &'a Ir,
    positions: PositionList,
    instructions: Vec<Instruction>,
    /// Pop rows lowered so far. The k-th pop reads the k-th argument
    /// above the return address.
    pops_seen: u32,
    /// Bytes of caller-pushed arguments dropped by the final ret.
    ret_bytes: u32,
}

impl<'a> FunctionLowerer<'a> {
    fn new(ir: &'a Ir, start: usize) -> Self {
        let end = ir.function_end(start);
        let pops = ir.rows()[start + 1..end]
            .iter()
            .filter(|row| row.instr == rmc_ir::Instruction::Pop)
            .count();

        FunctionLowerer {
            ir,
            positions: PositionList::default(),
            instructions: vec![],
            pops_seen: 0,
            ret_bytes: 4 * pops as u32,
        }
    }

    fn run(mut self, start: usize, frame_size: u32) -> Result<Vec<Instruction>, AsmGenError> {
        self.instructions
            .push(Instruction::Push(Operand::Register(Register::EBP)));
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::ESP),
            dst: Operand::Register(Register::EBP),
        });
        if frame_size != 0 {
            self.instructions.push(Instruction::Binary {
                op: BinaryOperator::Sub,
                src: Operand::Imm(frame_size as i32),
                dst: Operand::Register(Register::ESP),
            });
        }

        let rows = self.ir.rows();
        for index in start + 1..self.ir.function_end(start) {
            self.lower_row(RowId(index), &rows[index])?;
        }

        if !matches!(self.instructions.last(), Some(Instruction::Ret { .. })) {
            self.instructions.push(Instruction::Leave);
            self.instructions.push(Instruction::Ret {
                pop_bytes: self.ret_bytes,
            });
        }

        Ok(self.instructions)
    }

    fn lower_row(&mut self, id: RowId, row: &Row) -> Result<(), AsmGenError> {
        match row.instr {
            rmc_ir::Instruction::Assign => self.lower_assign(row),
            rmc_ir::Instruction::Jump => {
                let target = label_arg(&row.arg1)?;
                self.instructions.push(Instruction::Jmp(target));
                Ok(())
            }
            rmc_ir::Instruction::JumpFalse => self.lower_jump_false(row),
            rmc_ir::Instruction::Label => {
                let label = label_arg(&row.arg1)?;
                self.instructions.push(Instruction::Label(label));
                Ok(())
            }
            rmc_ir::Instruction::FuncLabel => {
                unreachable!("function boundaries are cut before lowering")
            }
            rmc_ir::Instruction::Call => self.lower_call(id, row),
            rmc_ir::Instruction::Push => {
                let value = self.value_arg(row)?;
                self.instructions.push(Instruction::Push(value));
                Ok(())
            }
            rmc_ir::Instruction::Pop => {
                self.lower_pop(id);
                Ok(())
            }
            rmc_ir::Instruction::Return => self.lower_return(row),
            instr @ (rmc_ir::Instruction::Plus
            | rmc_ir::Instruction::Minus
            | rmc_ir::Instruction::Multiply
            | rmc_ir::Instruction::And
            | rmc_ir::Instruction::Or) => self.lower_binary(id, row, binary_operator(instr)),
            rmc_ir::Instruction::Divide => self.lower_divide(id, row),
            instr @ (rmc_ir::Instruction::Equals
            | rmc_ir::Instruction::NotEquals
            | rmc_ir::Instruction::Smaller
            | rmc_ir::Instruction::Greater
            | rmc_ir::Instruction::SmallerEq
            | rmc_ir::Instruction::GreaterEq) => self.lower_comparison(id, row, cond_code(instr)),
            rmc_ir::Instruction::Negative => self.lower_negative(id, row),
            rmc_ir::Instruction::Not => self.lower_not(id, row),
            rmc_ir::Instruction::ArrayBool
            | rmc_ir::Instruction::ArrayInt
            | rmc_ir::Instruction::ArrayFloat
            | rmc_ir::Instruction::ArrayString => self.lower_array(row),
            rmc_ir::Instruction::Unknown => {
                Err(AsmGenError::UnsupportedConstruct("unknown instruction"))
            }
        }
    }

    fn lower_assign(&mut self, row: &Row) -> Result<(), AsmGenError> {
        let value = match &row.arg2 {
            Some(arg) => self.operand(arg)?,
            None => {
                return Err(AsmGenError::UnsupportedConstruct(
                    "assignment without a value",
                ))
            }
        };
        let name = match &row.arg1 {
            Some(Arg::Var(name)) => name,
            Some(Arg::ArrayElement { .. }) => {
                return Err(AsmGenError::UnsupportedConstruct(
                    "assignment to an array element",
                ))
            }
            _ => {
                return Err(AsmGenError::UnsupportedConstruct(
                    "assignment without a variable target",
                ))
            }
        };
        let dst = Operand::Stack(self.positions.alloc_ident(name));

        match value {
            value @ Operand::Imm(_) => self.instructions.push(Instruction::Mov { src: value, dst }),
            // movl cannot take two memory operands.
            value => {
                self.instructions.push(Instruction::Mov {
                    src: value,
                    dst: Operand::Register(Register::EAX),
                });
                self.instructions.push(Instruction::Mov {
                    src: Operand::Register(Register::EAX),
                    dst,
                });
            }
        }
        Ok(())
    }

    fn lower_binary(
        &mut self,
        id: RowId,
        row: &Row,
        op: BinaryOperator,
    ) -> Result<(), AsmGenError> {
        let (lhs, rhs) = self.value_args(row)?;
        let dst = Operand::Stack(self.positions.alloc_row(id));

        self.instructions.push(Instruction::Mov {
            src: lhs,
            dst: Operand::Register(Register::EAX),
        });
        self.instructions.push(Instruction::Binary {
            op,
            src: rhs,
            dst: Operand::Register(Register::EAX),
        });
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::EAX),
            dst,
        });
        Ok(())
    }

    fn lower_divide(&mut self, id: RowId, row: &Row) -> Result<(), AsmGenError> {
        let (lhs, rhs) = self.value_args(row)?;
        let dst = Operand::Stack(self.positions.alloc_row(id));

        self.instructions.push(Instruction::Mov {
            src: lhs,
            dst: Operand::Register(Register::EAX),
        });
        // idivl divides the 64 bit value in %edx:%eax.
        self.instructions.push(Instruction::Binary {
            op: BinaryOperator::Xor,
            src: Operand::Register(Register::EDX),
            dst: Operand::Register(Register::EDX),
        });
        self.instructions.push(Instruction::Mov {
            src: rhs,
            dst: Operand::Register(Register::EBX),
        });
        self.instructions
            .push(Instruction::Idiv(Operand::Register(Register::EBX)));
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::EAX),
            dst,
        });
        Ok(())
    }

    fn lower_comparison(
        &mut self,
        id: RowId,
        row: &Row,
        cond: CondCode,
    ) -> Result<(), AsmGenError> {
        let (lhs, rhs) = self.value_args(row)?;
        let dst = Operand::Stack(self.positions.alloc_row(id));

        // cmpl takes at most one memory operand, and the flags must
        // reflect lhs minus rhs.
        match (lhs, rhs) {
            (lhs @ Operand::Stack(_), rhs @ Operand::Imm(_)) => {
                self.instructions.push(Instruction::Cmp { src: rhs, dst: lhs });
            }
            (lhs, rhs) => {
                self.instructions.push(Instruction::Mov {
                    src: lhs,
                    dst: Operand::Register(Register::EAX),
                });
                self.instructions.push(Instruction::Cmp {
                    src: rhs,
                    dst: Operand::Register(Register::EAX),
                });
            }
        }
        self.instructions
            .push(Instruction::SetCC(cond, Operand::Register(Register::DL)));
        self.instructions.push(Instruction::Movzbl {
            src: Operand::Register(Register::DL),
            dst: Operand::Register(Register::EAX),
        });
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::EAX),
            dst,
        });
        Ok(())
    }

    fn lower_negative(&mut self, id: RowId, row: &Row) -> Result<(), AsmGenError> {
        let value = self.value_arg(row)?;
        let dst = Operand::Stack(self.positions.alloc_row(id));

        self.instructions.push(Instruction::Mov {
            src: value,
            dst: Operand::Register(Register::EAX),
        });
        self.instructions
            .push(Instruction::Neg(Operand::Register(Register::EAX)));
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::EAX),
            dst,
        });
        Ok(())
    }

    fn lower_not(&mut self, id: RowId, row: &Row) -> Result<(), AsmGenError> {
        let value = self.value_arg(row)?;
        let dst = Operand::Stack(self.positions.alloc_row(id));

        self.instructions.push(Instruction::Mov {
            src: value,
            dst: Operand::Register(Register::EAX),
        });
        // Booleans are always 0 or 1, so flipping bit zero negates them.
        self.instructions.push(Instruction::Binary {
            op: BinaryOperator::Xor,
            src: Operand::Imm(1),
            dst: Operand::Register(Register::EAX),
        });
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::EAX),
            dst,
        });
        Ok(())
    }

    fn lower_jump_false(&mut self, row: &Row) -> Result<(), AsmGenError> {
        let condition = self.value_arg(row)?;
        let target = label_arg(&row.arg2)?;

        match condition {
            condition @ Operand::Stack(_) => self.instructions.push(Instruction::Cmp {
                src: Operand::Imm(0),
                dst: condition,
            }),
            condition => {
                self.instructions.push(Instruction::Mov {
                    src: condition,
                    dst: Operand::Register(Register::EAX),
                });
                self.instructions.push(Instruction::Cmp {
                    src: Operand::Imm(0),
                    dst: Operand::Register(Register::EAX),
                });
            }
        }
        self.instructions.push(Instruction::JmpCC(CondCode::E, target));
        Ok(())
    }

    fn lower_pop(&mut self, id: RowId) {
        // Saved %ebp and the return address sit between the frame and
        // the arguments, so the first argument lives at +8.
        let offset = 8 + 4 * self.pops_seen as i32;
        self.pops_seen += 1;

        self.instructions.push(Instruction::Mov {
            src: Operand::Stack(offset),
            dst: Operand::Register(Register::EAX),
        });
        let dst = Operand::Stack(self.positions.alloc_row(id));
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::EAX),
            dst,
        });
    }

    fn lower_call(&mut self, id: RowId, row: &Row) -> Result<(), AsmGenError> {
        let name = match &row.arg1 {
            Some(Arg::Var(name) | Arg::FuncLabel(name)) => name.clone(),
            _ => {
                return Err(AsmGenError::UnsupportedConstruct(
                    "call without a callee name",
                ))
            }
        };

        self.instructions.push(Instruction::Call(name));
        let dst = Operand::Stack(self.positions.alloc_row(id));
        self.instructions.push(Instruction::Mov {
            src: Operand::Register(Register::EAX),
            dst,
        });
        Ok(())
    }

    fn lower_return(&mut self, row: &Row) -> Result<(), AsmGenError> {
        if let Some(arg) = &row.arg1 {
            let value = self.operand(arg)?;
            self.instructions.push(Instruction::Mov {
                src: value,
                dst: Operand::Register(Register::EAX),
            });
        }
        self.instructions.push(Instruction::Leave);
        self.instructions.push(Instruction::Ret {
            pop_bytes: self.ret_bytes,
        });
        Ok(())
    }

    // Reserving the block keeps later slots aligned with the frame
    // measurement. The elements themselves are never addressed here.
    fn lower_array(&mut self, row: &Row) -> Result<(), AsmGenError> {
        match (&row.arg1, &row.arg2) {
            (Some(Arg::Var(name)), Some(Arg::IntConstant(count))) => {
                self.positions
                    .alloc_array(name, usize::try_from(*count).unwrap_or(0));
                Ok(())
            }
            _ => Err(AsmGenError::UnsupportedConstruct("malformed array row")),
        }
    }

    fn value_arg(&self, row: &Row) -> Result<Operand, AsmGenError> {
        match &row.arg1 {
            Some(arg) => self.operand(arg),
            None => Err(AsmGenError::UnsupportedConstruct("row without its operand")),
        }
    }

    fn value_args(&self, row: &Row) -> Result<(Operand, Operand), AsmGenError> {
        match (&row.arg1, &row.arg2) {
            (Some(lhs), Some(rhs)) => Ok((self.operand(lhs)?, self.operand(rhs)?)),
            _ => Err(AsmGenError::UnsupportedConstruct(
                "binary row without two operands",
            )),
        }
    }

    fn operand(&self, arg: &Arg) -> Result<Operand, AsmGenError> {
        match arg {
            Arg::IntConstant(value) => Ok(Operand::Imm(*value)),
            Arg::BoolConstant(value) => Ok(Operand::Imm(i32::from(*value))),
            Arg::Var(name) => self
                .positions
                .resolve_ident(name)
                .map(Operand::Stack)
                .ok_or_else(|| AsmGenError::UnresolvedOperand(format!("variable \"{name}\""))),
            Arg::Row(id) => self
                .positions
                .resolve_row(*id)
                .map(Operand::Stack)
                .ok_or_else(|| AsmGenError::UnresolvedOperand(format!("row {}", id.0))),
            Arg::FloatConstant(_) => Err(AsmGenError::UnsupportedConstruct("float literal")),
            Arg::StringConstant(_) => Err(AsmGenError::UnsupportedConstruct("string literal")),
            Arg::ArrayElement { .. } => {
                Err(AsmGenError::UnsupportedConstruct("array element access"))
            }
            Arg::Label(_) | Arg::FuncLabel(_) => Err(AsmGenError::UnsupportedConstruct(
                "label in a value position",
            )),
        }
    }
}

fn label_arg(arg: &Option<Arg>) -> Result<u32, AsmGenError> {
    match arg {
        Some(Arg::Label(label)) => Ok(label.0),
        _ => Err(AsmGenError::UnsupportedConstruct(
            "row without a label argument",
        )),
    }
}

fn binary_operator(instr: rmc_ir::Instruction) -> BinaryOperator {
    match instr {
        rmc_ir::Instruction::Plus => BinaryOperator::Add,
        rmc_ir::Instruction::Minus => BinaryOperator::Sub,
        rmc_ir::Instruction::Multiply => BinaryOperator::Mult,
        rmc_ir::Instruction::And => BinaryOperator::And,
        rmc_ir::Instruction::Or => BinaryOperator::Or,
        instr => unreachable!("not an arithmetic row: {instr:?}"),
    }
}

fn cond_code(instr: rmc_ir::Instruction) -> CondCode {
    match instr {
        rmc_ir::Instruction::Equals => CondCode::E,
        rmc_ir::Instruction::NotEquals => CondCode::NE,
        rmc_ir::Instruction::Smaller => CondCode::L,
        rmc_ir::Instruction::SmallerEq => CondCode::LE,
        rmc_ir::Instruction::Greater => CondCode::G,
        rmc_ir::Instruction::GreaterEq => CondCode::GE,
        instr => unreachable!("not a comparison row: {instr:?}"),
    }
}
