//! Measures how many bytes of locals a function needs below the saved
//! %ebp, so the prolog can reserve them in one subtraction.

use rmc_ir::{Arg, Instruction, Ir};

/// Frame bytes for the function starting at `start`: four per named
/// scalar, counted at its first assignment, plus four per array element.
/// Row results are not counted, their slots sit below the reservation.
///
/// # Panics
///
/// Panics when `start` does not point at a func-label row.
pub fn stack_frame_size(ir: &Ir, start: usize) -> u32 {
    let rows = ir.rows();
    assert!(
        matches!(rows.get(start), Some(row) if row.instr == Instruction::FuncLabel),
        "frame size requested for row {start}, which is not a func-label row"
    );
    let end = ir.function_end(start);

    let mut bytes = 0;
    let mut seen: Vec<&str> = vec![];
    for row in &rows[start + 1..end] {
        match row.instr {
            Instruction::Assign => {
                if let Some(Arg::Var(name)) = &row.arg1 {
                    if !seen.contains(&name.as_str()) {
                        seen.push(name.as_str());
                        bytes += 4;
                    }
                }
            }
            Instruction::ArrayBool
            | Instruction::ArrayInt
            | Instruction::ArrayFloat
            | Instruction::ArrayString => {
                if let Some(Arg::IntConstant(count)) = row.arg2 {
                    bytes += 4 * u32::try_from(count).unwrap_or(0);
                }
            }
            _ => {}
        }
    }

    bytes
}

#[cfg(test)]
mod tests {
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

    #[test]
    fn test_constant_return_needs_no_frame() {
        let ir = generate_ir("int main() { return 42; }");

        assert_eq!(stack_frame_size(&ir, 0), 0);
    }

    #[test]
    fn test_one_slot_per_assigned_variable() {
        let ir = generate_ir(
            "int main() { int a; int b; a = 0; b = 1; while (a < 5) { a = a + b; } return a; }",
        );

        assert_eq!(stack_frame_size(&ir, 0), 8);
    }

    #[test]
    fn test_reassignment_is_counted_once() {
        let ir = generate_ir("int main() { int a; a = 1; a = 2; a = 3; return a; }");

        assert_eq!(stack_frame_size(&ir, 0), 4);
    }

    #[test]
    fn test_parameters_take_slots() {
        let ir = generate_ir("int add(int x, int y) { return x + y; } int main() { return 0; }");

        assert_eq!(stack_frame_size(&ir, 0), 8);
    }

    #[test]
    fn test_arrays_reserve_their_elements() {
        let ir = generate_ir("int main() { int[10] arr; int i; i = 3; return i; }");

        assert_eq!(stack_frame_size(&ir, 0), 44);
    }

    #[test]
    fn test_frames_are_measured_per_function() {
        let ir = generate_ir(
            r"
            int first() { int a; a = 1; return a; }
            int main() { int a; int b; a = 1; b = 2; return a + b; }
            ",
        );
        let starts = ir.function_starts();

        assert_eq!(stack_frame_size(&ir, starts[0]), 4);
        assert_eq!(stack_frame_size(&ir, starts[1]), 8);
    }
}
