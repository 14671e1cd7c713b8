//! Turns the row stream into structured 32-bit x86. Functions are
//! lowered one at a time: named variables and row results live in stack
//! slots below the saved %ebp, arguments are read from above it and the
//! callee drops them on return.

pub mod frame;
pub mod positions;

mod lower;

use rmc_asm::{DataSection, FunctionDefinition, Program, TextSection};
use rmc_ir::Ir;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AsmGenError {
    #[error("construct not supported by the assembly generator: {0}")]
    UnsupportedConstruct(&'static str),
    #[error("no stack position recorded for {0}")]
    UnresolvedOperand(String),
}

/// Lowers the whole row stream into an assembly program.
///
/// # Panics
///
/// Panics when a non-empty stream does not start with a func-label row.
/// Streams built by the row generator always do.
pub fn generate(ir: &Ir) -> Result<Program, AsmGenError> {
    if !ir.is_empty() {
        assert!(
            ir.rows()[0].instr == rmc_ir::Instruction::FuncLabel,
            "row streams must start with a func_label row"
        );
    }

    let mut functions = vec![];
    for start in ir.function_starts() {
        let name = match ir.function_name(start) {
            Some(name) => name.to_owned(),
            None => unreachable!("function starts point at func_label rows"),
        };
        let frame_size = frame::stack_frame_size(ir, start);
        log::debug!("lowering {name} with a {frame_size} byte frame");

        let instructions = lower::lower_function(ir, start, frame_size)?;
        functions.push(FunctionDefinition { name, instructions });
    }

    Ok(Program {
        data: DataSection::default(),
        text: TextSection { functions },
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rmc_asm::{BinaryOperator, CondCode, Instruction, Operand, Register};
    use rmc_ir::{Arg, Row};
    use rmc_parser::{lexer::Lexer, Parser};
    use rmc_symbols::SymbolTable;

    use super::*;

    fn generate_ir(input: &str) -> Ir {
        let lexer = Lexer::new(input.to_owned());
        let mut parser = Parser::try_build(lexer).expect("parser should be created successfully");
        let program = parser.parse_program().expect("should successfully parse");
        let table = SymbolTable::build(&program).expect("symbol table should build");
        rmc_symbols::run_checks(&program, &table).expect("checks should pass");
        rmc_irgen::generate(&program, &table).expect("ir generation should succeed")
    }

    fn generate_program(input: &str) -> Program {
        generate(&generate_ir(input)).expect("assembly generation should succeed")
    }

    fn mov(src: Operand, dst: Operand) -> Instruction {
        Instruction::Mov { src, dst }
    }

    fn reg(register: Register) -> Operand {
        Operand::Register(register)
    }

    fn stack(offset: i32) -> Operand {
        Operand::Stack(offset)
    }

    fn imm(value: i32) -> Operand {
        Operand::Imm(value)
    }

    fn sub_esp(bytes: i32) -> Instruction {
        Instruction::Binary {
            op: BinaryOperator::Sub,
            src: imm(bytes),
            dst: reg(Register::ESP),
        }
    }

    #[test]
    fn test_main_returning_a_constant() {
        let program = generate_program("int main() { return 42; }");

        assert!(program.data.declarations.is_empty());
        assert_eq!(program.text.functions.len(), 1);
        assert_eq!(program.text.functions[0].name, "main");
        assert_eq!(
            program.text.functions[0].instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                mov(imm(42), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_empty_body_still_gets_prolog_and_epilog() {
        let program = generate_program("void nothing() { } int main() { return 0; }");

        assert_eq!(
            program.text.functions[0].instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_locals_are_reserved_up_front() {
        let program = generate_program(
            "int main() { int a; int b; a = 0; b = 1; while (a < 5) { a = a + b; } return a; }",
        );

        assert_eq!(program.text.functions[0].instructions[2], sub_esp(8));
    }

    #[test]
    fn test_arithmetic_lowering() {
        let program = generate_program(
            "int main() { int a; int b; int c; a = 2; b = 4; c = a * b; return c; }",
        );

        assert_eq!(
            program.text.functions[0].instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                sub_esp(12),
                mov(imm(2), stack(-4)),
                mov(imm(4), stack(-8)),
                mov(stack(-4), reg(Register::EAX)),
                Instruction::Binary {
                    op: BinaryOperator::Mult,
                    src: stack(-8),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-12)),
                mov(stack(-12), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-16)),
                mov(stack(-16), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_division_clears_edx() {
        let program = generate_program("int main() { int a; a = 7; return a / 2; }");

        assert_eq!(
            &program.text.functions[0].instructions[4..9],
            vec![
                mov(stack(-4), reg(Register::EAX)),
                Instruction::Binary {
                    op: BinaryOperator::Xor,
                    src: reg(Register::EDX),
                    dst: reg(Register::EDX),
                },
                mov(imm(2), reg(Register::EBX)),
                Instruction::Idiv(reg(Register::EBX)),
                mov(reg(Register::EAX), stack(-8)),
            ]
        );
    }

    #[test]
    fn test_comparison_of_variable_and_constant() {
        let program =
            generate_program("int main() { int a; a = 1; bool c; c = a < 5; return 0; }");

        assert_eq!(
            &program.text.functions[0].instructions[4..8],
            vec![
                Instruction::Cmp {
                    src: imm(5),
                    dst: stack(-4),
                },
                Instruction::SetCC(CondCode::L, reg(Register::DL)),
                Instruction::Movzbl {
                    src: reg(Register::DL),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-8)),
            ]
        );
    }

    #[test]
    fn test_comparison_of_two_variables() {
        let program =
            generate_program("int main() { int a; int b; a = 1; b = 2; return a == b; }");

        assert_eq!(
            &program.text.functions[0].instructions[5..10],
            vec![
                mov(stack(-4), reg(Register::EAX)),
                Instruction::Cmp {
                    src: stack(-8),
                    dst: reg(Register::EAX),
                },
                Instruction::SetCC(CondCode::E, reg(Register::DL)),
                Instruction::Movzbl {
                    src: reg(Register::DL),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-12)),
            ]
        );
    }

    #[test]
    fn test_comparison_of_two_constants() {
        let program = generate_program("int main() { bool c; c = 3 != 4; return 0; }");

        assert_eq!(
            &program.text.functions[0].instructions[3..8],
            vec![
                mov(imm(3), reg(Register::EAX)),
                Instruction::Cmp {
                    src: imm(4),
                    dst: reg(Register::EAX),
                },
                Instruction::SetCC(CondCode::NE, reg(Register::DL)),
                Instruction::Movzbl {
                    src: reg(Register::DL),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-4)),
            ]
        );
    }

    #[test]
    fn test_if_without_locals_skips_the_reservation() {
        let program = generate_program("int main() { if (0 == 1) 1 + 1; return 0; }");

        assert_eq!(
            program.text.functions[0].instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                mov(imm(0), reg(Register::EAX)),
                Instruction::Cmp {
                    src: imm(1),
                    dst: reg(Register::EAX),
                },
                Instruction::SetCC(CondCode::E, reg(Register::DL)),
                Instruction::Movzbl {
                    src: reg(Register::DL),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-4)),
                Instruction::Cmp {
                    src: imm(0),
                    dst: stack(-4),
                },
                Instruction::JmpCC(CondCode::E, 0),
                mov(imm(1), reg(Register::EAX)),
                Instruction::Binary {
                    op: BinaryOperator::Add,
                    src: imm(1),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-8)),
                Instruction::Label(0),
                mov(imm(0), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_while_loop_jumps() {
        let program = generate_program(
            "int main() { int a; a = 1; while (a < 10) { a = a + 1; } return a; }",
        );

        assert_eq!(
            program.text.functions[0].instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                sub_esp(4),
                mov(imm(1), stack(-4)),
                Instruction::Label(0),
                Instruction::Cmp {
                    src: imm(10),
                    dst: stack(-4),
                },
                Instruction::SetCC(CondCode::L, reg(Register::DL)),
                Instruction::Movzbl {
                    src: reg(Register::DL),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-8)),
                Instruction::Cmp {
                    src: imm(0),
                    dst: stack(-8),
                },
                Instruction::JmpCC(CondCode::E, 1),
                mov(stack(-4), reg(Register::EAX)),
                Instruction::Binary {
                    op: BinaryOperator::Add,
                    src: imm(1),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-12)),
                mov(stack(-12), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-4)),
                Instruction::Jmp(0),
                Instruction::Label(1),
                mov(stack(-4), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_parameters_are_read_above_the_frame() {
        let program = generate_program(
            r"
            int add(int x, int y) { return x + y; }
            int main() { int a; int b; int c; a = 1; b = 2; c = add(a, b); return c; }
            ",
        );

        let add = &program.text.functions[0];
        assert_eq!(add.name, "add");
        assert_eq!(
            add.instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                sub_esp(8),
                mov(stack(8), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-4)),
                mov(stack(-4), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-8)),
                mov(stack(12), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-12)),
                mov(stack(-12), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-16)),
                mov(stack(-8), reg(Register::EAX)),
                Instruction::Binary {
                    op: BinaryOperator::Add,
                    src: stack(-16),
                    dst: reg(Register::EAX),
                },
                mov(reg(Register::EAX), stack(-20)),
                mov(stack(-20), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 8 },
            ]
        );
    }

    #[test]
    fn test_call_pushes_arguments_right_to_left() {
        let program = generate_program(
            r"
            int add(int x, int y) { return x + y; }
            int main() { int a; int b; int c; a = 1; b = 2; c = add(a, b); return c; }
            ",
        );

        let main = &program.text.functions[1];
        assert_eq!(main.name, "main");
        assert_eq!(
            main.instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                sub_esp(12),
                mov(imm(1), stack(-4)),
                mov(imm(2), stack(-8)),
                Instruction::Push(stack(-8)),
                Instruction::Push(stack(-4)),
                Instruction::Call("add".to_owned()),
                mov(reg(Register::EAX), stack(-12)),
                mov(stack(-12), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-16)),
                mov(stack(-16), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_assignment_from_a_variable_goes_through_eax() {
        let program = generate_program("int main() { int a; int b; a = 5; b = a; return b; }");

        assert_eq!(
            program.text.functions[0].instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                sub_esp(8),
                mov(imm(5), stack(-4)),
                mov(stack(-4), reg(Register::EAX)),
                mov(reg(Register::EAX), stack(-8)),
                mov(stack(-8), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_array_storage_is_reserved() {
        let program = generate_program("int main() { int[10] arr; int i; i = 3; return i; }");

        assert_eq!(
            program.text.functions[0].instructions,
            vec![
                Instruction::Push(reg(Register::EBP)),
                mov(reg(Register::ESP), reg(Register::EBP)),
                sub_esp(44),
                mov(imm(3), stack(-44)),
                mov(stack(-44), reg(Register::EAX)),
                Instruction::Leave,
                Instruction::Ret { pop_bytes: 0 },
            ]
        );
    }

    #[test]
    fn test_array_element_store_is_rejected() {
        let ir = generate_ir("int main() { int[10] arr; arr[0] = 1; return 0; }");

        assert_eq!(
            generate(&ir),
            Err(AsmGenError::UnsupportedConstruct(
                "assignment to an array element"
            ))
        );
    }

    #[test]
    fn test_float_assignment_is_rejected() {
        let ir = generate_ir("int main() { float f; f = 2.5; return 0; }");

        assert_eq!(
            generate(&ir),
            Err(AsmGenError::UnsupportedConstruct("float literal"))
        );
    }

    #[test]
    fn test_uninitialized_reads_have_no_position() {
        let ir = generate_ir("int main() { int a; return a; }");

        assert_eq!(
            generate(&ir),
            Err(AsmGenError::UnresolvedOperand("variable \"a\"".to_owned()))
        );
    }

    #[test]
    fn test_unknown_rows_are_rejected() {
        let ir = Ir(vec![
            Row {
                instr: rmc_ir::Instruction::FuncLabel,
                arg1: Some(Arg::FuncLabel("main".to_owned())),
                arg2: None,
            },
            Row {
                instr: rmc_ir::Instruction::Unknown,
                arg1: None,
                arg2: None,
            },
        ]);

        assert_eq!(
            generate(&ir),
            Err(AsmGenError::UnsupportedConstruct("unknown instruction"))
        );
    }

    #[test]
    #[should_panic(expected = "must start with a func_label row")]
    fn test_streams_must_start_with_a_function() {
        let ir = Ir(vec![Row {
            instr: rmc_ir::Instruction::Return,
            arg1: None,
            arg2: None,
        }]);

        let _ = generate(&ir);
    }

    #[test]
    fn test_every_function_opens_and_closes_its_frame() {
        let sources = [
            "int main() { return 0; }",
            "int main() { int a; a = 1; if (a < 2) a = 3; return a; }",
            "int one() { return 1; } int main() { return one(); }",
            "void nothing() { return; } int main() { nothing(); return 0; }",
        ];

        for source in sources {
            let program = generate_program(source);
            for function in &program.text.functions {
                assert_eq!(
                    function.instructions[0],
                    Instruction::Push(reg(Register::EBP)),
                    "{source}"
                );
                assert_eq!(
                    function.instructions[1],
                    mov(reg(Register::ESP), reg(Register::EBP)),
                    "{source}"
                );
                assert!(
                    matches!(function.instructions.last(), Some(Instruction::Ret { .. })),
                    "{source}"
                );
            }
        }
    }
}
