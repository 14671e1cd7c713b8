//! Splits one function of the row stream into basic blocks.
//!
//! Leaders are the function's first row, every row targeted by a jump and
//! every row directly behind a jump. Blocks run from one leader up to the
//! next. Return rows do not end a block on their own.

use std::{collections::HashMap, fmt};

use rmc_ir::{Arg, Instruction, Ir, LabelId, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, PartialEq, Eq)]
pub struct BasicBlock {
    /// First row of the block, as an absolute index into the stream.
    pub first: usize,
    /// Exclusive end of the block.
    pub end: usize,
    /// Successor reached when the final row does not jump, or when a
    /// conditional jump falls through.
    pub fall_through: Option<BlockId>,
    /// Successor reached through the final row's jump target.
    pub branch: Option<BlockId>,
}

/// Blocks of a single function, in leader order. Walking the vector
/// front to back visits every block exactly once.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    /// Builds the graph for the function starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics when `start` does not point at a func-label row. Callers
    /// are expected to hand in starts from [`Ir::function_starts`].
    pub fn build(ir: &Ir, start: usize) -> Cfg {
        let rows = ir.rows();
        assert!(
            matches!(rows.get(start), Some(row) if row.instr == Instruction::FuncLabel),
            "basic blocks requested for row {start}, which is not a func-label row"
        );
        let end = ir.function_end(start);

        let mut label_rows: HashMap<LabelId, usize> = HashMap::new();
        for (index, row) in rows.iter().enumerate().take(end).skip(start) {
            if row.instr == Instruction::Label {
                if let Some(Arg::Label(label)) = row.arg1 {
                    label_rows.insert(label, index);
                }
            }
        }

        let mut is_leader = vec![false; end - start];
        is_leader[0] = true;
        for (index, row) in rows.iter().enumerate().take(end).skip(start) {
            if let Some(target) = jump_target(row) {
                if index + 1 < end {
                    is_leader[index + 1 - start] = true;
                }
                let target_row = label_rows.get(&target).copied().unwrap_or_else(|| {
                    panic!("row {index} jumps to unknown label L{}", target.0)
                });
                is_leader[target_row - start] = true;
            }
        }

        let leaders: Vec<usize> = is_leader
            .iter()
            .enumerate()
            .filter(|(_, leads)| **leads)
            .map(|(offset, _)| start + offset)
            .collect();

        let block_of_row: HashMap<usize, BlockId> = leaders
            .iter()
            .enumerate()
            .map(|(block, leader)| (*leader, BlockId(block)))
            .collect();

        let mut blocks = Vec::with_capacity(leaders.len());
        for (index, &leader) in leaders.iter().enumerate() {
            let block_end = leaders.get(index + 1).copied().unwrap_or(end);
            let next_block = if index + 1 < leaders.len() {
                Some(BlockId(index + 1))
            } else {
                None
            };

            let last = &rows[block_end - 1];
            let (fall_through, branch) = match last.instr {
                Instruction::Jump => (None, Some(target_block(last, &label_rows, &block_of_row))),
                Instruction::JumpFalse => (
                    next_block,
                    Some(target_block(last, &label_rows, &block_of_row)),
                ),
                _ => (next_block, None),
            };

            blocks.push(BasicBlock {
                first: leader,
                end: block_end,
                fall_through,
                branch,
            });
        }

        log::debug!(
            "function slice {}..{} split into {} blocks",
            start,
            end,
            blocks.len()
        );

        Cfg { blocks }
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.blocks.iter().enumerate() {
            write!(f, "block {index}: rows {}..{}", block.first, block.end)?;
            if let Some(BlockId(fall)) = block.fall_through {
                write!(f, ", fall through -> {fall}")?;
            }
            if let Some(BlockId(branch)) = block.branch {
                write!(f, ", branch -> {branch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn jump_target(row: &Row) -> Option<LabelId> {
    let arg = match row.instr {
        Instruction::Jump => &row.arg1,
        Instruction::JumpFalse => &row.arg2,
        _ => return None,
    };
    match arg {
        Some(Arg::Label(label)) => Some(*label),
        _ => None,
    }
}

fn target_block(
    row: &Row,
    label_rows: &HashMap<LabelId, usize>,
    block_of_row: &HashMap<usize, BlockId>,
) -> BlockId {
    // Both lookups were populated from the same slice walk, so a jump
    // that survived leader detection always resolves.
    let label = match jump_target(row) {
        Some(label) => label,
        None => unreachable!("block ends in a jump row without a label"),
    };
    block_of_row[&label_rows[&label]]
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

    fn block(
        first: usize,
        end: usize,
        fall_through: Option<usize>,
        branch: Option<usize>,
    ) -> BasicBlock {
        BasicBlock {
            first,
            end,
            fall_through: fall_through.map(BlockId),
            branch: branch.map(BlockId),
        }
    }

    #[test]
    fn test_straight_line_function() {
        let ir = generate_ir("int main() { int a; a = 1; return a; }");
        let cfg = Cfg::build(&ir, 0);

        assert_eq!(cfg.blocks, vec![block(0, 3, None, None)]);
    }

    #[test]
    fn test_while_loop() {
        let ir =
            generate_ir("int main() { int a; a = 1; while (a < 10) { a = a + 1; } return a; }");
        // 0 func_label  1 assign  2 label L0  3 smaller  4 jumpfalse L1
        // 5 plus  6 assign  7 jump L0  8 label L1  9 return
        let cfg = Cfg::build(&ir, 0);

        assert_eq!(
            cfg.blocks,
            vec![
                block(0, 2, Some(1), None),
                block(2, 5, Some(2), Some(3)),
                block(5, 8, None, Some(1)),
                block(8, 10, None, None),
            ]
        );
    }

    #[test]
    fn test_if_else_diamond() {
        let ir = generate_ir("int main() { if (0 == 1) 1 + 1; else 2 + 2; return 0; }");
        // 0 func_label  1 equals  2 jumpfalse L0  3 plus  4 jump L1
        // 5 label L0  6 plus  7 label L1  8 return
        let cfg = Cfg::build(&ir, 0);

        assert_eq!(
            cfg.blocks,
            vec![
                block(0, 3, Some(1), Some(2)),
                block(3, 5, None, Some(3)),
                block(5, 7, Some(3), None),
                block(7, 9, None, None),
            ]
        );
    }

    #[test]
    fn test_return_does_not_split_blocks() {
        let ir = generate_ir("int main() { return 1; return 2; }");
        let cfg = Cfg::build(&ir, 0);

        assert_eq!(cfg.blocks, vec![block(0, 3, None, None)]);
    }

    #[test]
    fn test_second_function_slice() {
        let ir = generate_ir(
            r"
            int first() { return 1; }
            int main() { if (true) return 1; return 0; }
            ",
        );
        // main: 2 func_label  3 jumpfalse L0  4 return  5 label L0  6 return
        let starts = ir.function_starts();
        let cfg = Cfg::build(&ir, starts[1]);

        assert_eq!(
            cfg.blocks,
            vec![
                block(2, 4, Some(1), Some(2)),
                block(4, 5, Some(2), None),
                block(5, 7, None, None),
            ]
        );
    }

    #[test]
    fn test_display() {
        let ir = generate_ir("int main() { if (0 == 1) 1 + 1; else 2 + 2; return 0; }");
        let cfg = Cfg::build(&ir, 0);

        let rendered = cfg.to_string();
        assert!(rendered.contains("block 0: rows 0..3, fall through -> 1, branch -> 2"));
        assert!(rendered.contains("block 3: rows 7..9\n"));
    }

    #[test]
    #[should_panic]
    fn test_non_func_label_start_panics() {
        let ir = Ir(vec![Row {
            instr: Instruction::Return,
            arg1: Some(Arg::IntConstant(0)),
            arg2: None,
        }]);

        Cfg::build(&ir, 0);
    }

    #[test]
    fn test_block_rows_cover_the_function_exactly_once() {
        let ir = generate_ir(
            r"
            int main() {
                int a;
                a = 0;
                while (a < 3) {
                    if (a == 1) a = a + 2; else a = a + 1;
                }
                return a;
            }
            ",
        );
        let cfg = Cfg::build(&ir, 0);

        let mut covered = vec![];
        for basic_block in &cfg.blocks {
            for index in basic_block.first..basic_block.end {
                covered.push(index);
            }
        }
        let expected: Vec<usize> = (0..ir.function_end(0)).collect();
        assert_eq!(covered, expected);
    }
}
