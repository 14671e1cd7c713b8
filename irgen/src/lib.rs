//! Lowers the type-checked syntax tree into the flat three-address row
//! stream. Every expression result lives in the row that computed it and
//! is referenced by row number, so all references point backwards.

use rmc_ir::{Arg, Instruction, Ir, LabelId, Row, RowId};
use rmc_parser::ast;
use rmc_symbols::SymbolTable;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IrGenError {
    #[error("Array \"{0}\" can not be used as a scalar value.")]
    ArrayValue(String),
    #[error("Variable \"{0}\" does not appear in the symbol table.")]
    UnknownVariable(String),
}

struct GenCtx<'a> {
    rows: Vec<Row>,
    next_label: u32,
    table: &'a SymbolTable,
    function: &'a str,
}

/// Turns a whole program into one row stream. Functions appear in source
/// order, each starting with its func-label row. Label numbers keep
/// counting across functions, so they are program-unique.
pub fn generate(program: &ast::Program, table: &SymbolTable) -> Result<Ir, IrGenError> {
    let mut ctx = GenCtx {
        rows: vec![],
        next_label: 0,
        table,
        function: "",
    };

    for function in &program.functions {
        ctx.function = &function.name;
        let start = ctx.rows.len();

        ctx.emit(
            Instruction::FuncLabel,
            Some(Arg::FuncLabel(function.name.clone())),
            None,
        );
        for param in &function.params {
            let pop = ctx.emit(Instruction::Pop, None, None);
            ctx.emit(
                Instruction::Assign,
                Some(Arg::Var(param.name.clone())),
                Some(Arg::Row(pop)),
            );
        }
        for statement in &function.body {
            ctx.gen_statement(statement)?;
        }

        log::debug!(
            "lowered function {} to {} rows",
            function.name,
            ctx.rows.len() - start
        );
    }

    Ok(Ir(ctx.rows))
}

impl GenCtx<'_> {
    fn emit(&mut self, instr: Instruction, arg1: Option<Arg>, arg2: Option<Arg>) -> RowId {
        let id = RowId(self.rows.len());
        self.rows.push(Row { instr, arg1, arg2 });
        id
    }

    fn fresh_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    fn gen_statement(&mut self, statement: &ast::Statement) -> Result<(), IrGenError> {
        match statement {
            // Scalar declarations produce no rows. Arrays get one row so
            // the assembly generator can reserve their storage.
            ast::Statement::Declaration(decl) => {
                if let Some(size) = decl.size {
                    self.emit(
                        array_instruction(decl.ty),
                        Some(Arg::Var(decl.name.clone())),
                        Some(Arg::IntConstant(size as i32)),
                    );
                }
                Ok(())
            }
            ast::Statement::Assignment(assignment) => {
                let target = match &assignment.index {
                    Some(index) => {
                        let index = self.gen_expression(index)?;
                        Arg::ArrayElement {
                            name: assignment.name.clone(),
                            index: Box::new(index),
                        }
                    }
                    None => Arg::Var(assignment.name.clone()),
                };
                let value = self.gen_expression(&assignment.value)?;
                self.emit(Instruction::Assign, Some(target), Some(value));
                Ok(())
            }
            ast::Statement::Expression(expression) => {
                self.gen_expression(expression)?;
                Ok(())
            }
            ast::Statement::If {
                condition,
                then,
                r#else,
            } => {
                let condition = self.gen_expression(condition)?;
                match r#else {
                    None => {
                        let after = self.fresh_label();
                        self.emit(
                            Instruction::JumpFalse,
                            Some(condition),
                            Some(Arg::Label(after)),
                        );
                        self.gen_statement(then)?;
                        self.emit(Instruction::Label, Some(Arg::Label(after)), None);
                    }
                    Some(else_stmt) => {
                        let else_label = self.fresh_label();
                        self.emit(
                            Instruction::JumpFalse,
                            Some(condition),
                            Some(Arg::Label(else_label)),
                        );
                        self.gen_statement(then)?;
                        let end_label = self.fresh_label();
                        self.emit(Instruction::Jump, Some(Arg::Label(end_label)), None);
                        self.emit(Instruction::Label, Some(Arg::Label(else_label)), None);
                        self.gen_statement(else_stmt)?;
                        self.emit(Instruction::Label, Some(Arg::Label(end_label)), None);
                    }
                }
                Ok(())
            }
            ast::Statement::While { condition, body } => {
                let top = self.fresh_label();
                self.emit(Instruction::Label, Some(Arg::Label(top)), None);
                let condition = self.gen_expression(condition)?;
                let exit = self.fresh_label();
                self.emit(
                    Instruction::JumpFalse,
                    Some(condition),
                    Some(Arg::Label(exit)),
                );
                self.gen_statement(body)?;
                self.emit(Instruction::Jump, Some(Arg::Label(top)), None);
                self.emit(Instruction::Label, Some(Arg::Label(exit)), None);
                Ok(())
            }
            ast::Statement::Return(expression) => {
                let value = match expression {
                    Some(expression) => Some(self.gen_expression(expression)?),
                    None => None,
                };
                self.emit(Instruction::Return, value, None);
                Ok(())
            }
            ast::Statement::Compound(statements) => {
                for statement in statements {
                    self.gen_statement(statement)?;
                }
                Ok(())
            }
        }
    }

    fn gen_expression(&mut self, expression: &ast::Expression) -> Result<Arg, IrGenError> {
        match expression {
            ast::Expression::IntConstant(value) => Ok(Arg::IntConstant(*value)),
            ast::Expression::FloatConstant(value) => Ok(Arg::FloatConstant(*value)),
            ast::Expression::BoolConstant(value) => Ok(Arg::BoolConstant(*value)),
            ast::Expression::StringConstant(value) => Ok(Arg::StringConstant(value.clone())),
            ast::Expression::Var(name) => match self.table.variable(self.function, name) {
                Some(info) if info.array_size.is_some() => {
                    Err(IrGenError::ArrayValue(name.clone()))
                }
                Some(_) => Ok(Arg::Var(name.clone())),
                None => Err(IrGenError::UnknownVariable(name.clone())),
            },
            ast::Expression::ArrayElement { name, index } => {
                let index = self.gen_expression(index)?;
                Ok(Arg::ArrayElement {
                    name: name.clone(),
                    index: Box::new(index),
                })
            }
            ast::Expression::Unary { op, expression } => {
                let operand = self.gen_expression(expression)?;
                let row = self.emit(unary_instruction(op), Some(operand), None);
                Ok(Arg::Row(row))
            }
            ast::Expression::Binary { op, lhs, rhs } => {
                let lhs = self.gen_expression(lhs)?;
                let rhs = self.gen_expression(rhs)?;
                let row = self.emit(binary_instruction(op), Some(lhs), Some(rhs));
                Ok(Arg::Row(row))
            }
            // Arguments are pushed right to left, each one evaluated
            // directly before its push row.
            ast::Expression::FunctionCall(name, arguments) => {
                for argument in arguments.iter().rev() {
                    let value = self.gen_expression(argument)?;
                    self.emit(Instruction::Push, Some(value), None);
                }
                let row = self.emit(Instruction::Call, Some(Arg::Var(name.clone())), None);
                Ok(Arg::Row(row))
            }
        }
    }
}

fn array_instruction(ty: ast::Type) -> Instruction {
    match ty {
        ast::Type::Bool => Instruction::ArrayBool,
        ast::Type::Int => Instruction::ArrayInt,
        ast::Type::Float => Instruction::ArrayFloat,
        ast::Type::String => Instruction::ArrayString,
    }
}

fn unary_instruction(op: &ast::UnaryOperator) -> Instruction {
    match op {
        ast::UnaryOperator::Negate => Instruction::Negative,
        ast::UnaryOperator::Not => Instruction::Not,
    }
}

fn binary_instruction(op: &ast::BinaryOperator) -> Instruction {
    match op {
        ast::BinaryOperator::Add => Instruction::Plus,
        ast::BinaryOperator::Subtract => Instruction::Minus,
        ast::BinaryOperator::Multiply => Instruction::Multiply,
        ast::BinaryOperator::Divide => Instruction::Divide,
        ast::BinaryOperator::And => Instruction::And,
        ast::BinaryOperator::Or => Instruction::Or,
        ast::BinaryOperator::Equal => Instruction::Equals,
        ast::BinaryOperator::NotEqual => Instruction::NotEquals,
        ast::BinaryOperator::LessThan => Instruction::Smaller,
        ast::BinaryOperator::LessOrEqual => Instruction::SmallerEq,
        ast::BinaryOperator::GreaterThan => Instruction::Greater,
        ast::BinaryOperator::GreaterOrEqual => Instruction::GreaterEq,
    }
}
