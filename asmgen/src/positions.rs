//! Stack slot bookkeeping for one function. Every slot is four bytes and
//! addressed relative to the saved %ebp, starting at -4 and growing
//! downwards.

use rmc_ir::RowId;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PosKey {
    Ident(String),
    Row(RowId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Position {
    key: PosKey,
    offset: i32,
}

/// Append-only record of the slots handed out so far. Lookups scan from
/// the front, so the first slot recorded for a name wins.
#[derive(Debug, Default)]
pub struct PositionList {
    positions: Vec<Position>,
    ebp_offset: i32,
}

impl PositionList {
    pub fn resolve_ident(&self, name: &str) -> Option<i32> {
        self.positions.iter().find_map(|position| match &position.key {
            PosKey::Ident(ident) if ident == name => Some(position.offset),
            _ => None,
        })
    }

    pub fn resolve_row(&self, row: RowId) -> Option<i32> {
        self.positions.iter().find_map(|position| match position.key {
            PosKey::Row(id) if id == row => Some(position.offset),
            _ => None,
        })
    }

    /// Slot for a named variable. Assigning to the same name again keeps
    /// its original slot.
    pub fn alloc_ident(&mut self, name: &str) -> i32 {
        match self.resolve_ident(name) {
            Some(offset) => offset,
            None => self.push_slot(PosKey::Ident(name.to_owned())),
        }
    }

    /// Slot for the result of a row. Rows are unique, so this always
    /// appends.
    pub fn alloc_row(&mut self, row: RowId) -> i32 {
        self.push_slot(PosKey::Row(row))
    }

    /// Reserves `count` consecutive slots for an array and returns the
    /// offset of element zero, the lowest address of the block.
    pub fn alloc_array(&mut self, name: &str, count: usize) -> i32 {
        self.ebp_offset -= 4 * count as i32;
        self.positions.push(Position {
            key: PosKey::Ident(name.to_owned()),
            offset: self.ebp_offset,
        });
        self.ebp_offset
    }

    fn push_slot(&mut self, key: PosKey) -> i32 {
        self.ebp_offset -= 4;
        self.positions.push(Position {
            key,
            offset: self.ebp_offset,
        });
        self.ebp_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idents_reuse_their_slot() {
        let mut positions = PositionList::default();

        assert_eq!(positions.alloc_ident("a"), -4);
        assert_eq!(positions.alloc_ident("b"), -8);
        assert_eq!(positions.alloc_ident("a"), -4);
        assert_eq!(positions.alloc_ident("c"), -12);
    }

    #[test]
    fn test_rows_descend() {
        let mut positions = PositionList::default();

        assert_eq!(positions.alloc_row(RowId(3)), -4);
        assert_eq!(positions.alloc_row(RowId(7)), -8);
        assert_eq!(positions.resolve_row(RowId(3)), Some(-4));
        assert_eq!(positions.resolve_row(RowId(7)), Some(-8));
    }

    #[test]
    fn test_unknown_keys_resolve_to_none() {
        let positions = PositionList::default();

        assert_eq!(positions.resolve_ident("missing"), None);
        assert_eq!(positions.resolve_row(RowId(0)), None);
    }

    #[test]
    fn test_array_block_sits_below_earlier_slots() {
        let mut positions = PositionList::default();

        assert_eq!(positions.alloc_ident("x"), -4);
        assert_eq!(positions.alloc_array("arr", 10), -44);
        assert_eq!(positions.resolve_ident("arr"), Some(-44));
        assert_eq!(positions.alloc_ident("y"), -48);
    }

    #[test]
    fn test_idents_and_rows_do_not_collide() {
        let mut positions = PositionList::default();

        positions.alloc_ident("a");
        positions.alloc_row(RowId(2));

        assert_eq!(positions.resolve_ident("a"), Some(-4));
        assert_eq!(positions.resolve_row(RowId(2)), Some(-8));
    }
}
