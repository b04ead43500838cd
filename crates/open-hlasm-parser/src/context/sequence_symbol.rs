//! Sequence symbols — targets of conditional-assembly branches.
//!
//! A sequence symbol inside a macro body is an offset into the body; in
//! opencode it is a source position plus a snapshot to rewind the reader to.

use open_hlasm_lang_core::Location;

use crate::context::ids::Id;
use crate::context::source::{SourcePosition, SourceSnapshot};

/// A sequence symbol registered in opencode.
///
/// Two registrations of the same name are considered identical when both
/// their statement position and snapshot agree; anything else is a duplicate
/// definition.
#[derive(Debug, Clone, PartialEq)]
pub struct OpencodeSequenceSymbol {
    pub name: Id,
    /// Where the symbol was written.
    pub location: Location,
    /// Cursor position that re-delivers the labeled statement.
    pub position: SourcePosition,
    /// Snapshot to rewind to when jumping here.
    pub snapshot: SourceSnapshot,
}

impl OpencodeSequenceSymbol {
    /// Whether another registration denotes the same position.
    pub fn same_position(&self, other: &OpencodeSequenceSymbol) -> bool {
        self.position == other.position && self.snapshot == other.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_hlasm_lang_core::{FileId, Range};

    fn sym(index: usize) -> OpencodeSequenceSymbol {
        OpencodeSequenceSymbol {
            name: Id::EMPTY,
            location: Location::new(FileId::MAIN, Range::default()),
            position: SourcePosition {
                statement_index: index,
                file_line: index,
            },
            snapshot: SourceSnapshot::default(),
        }
    }

    #[test]
    fn test_same_position() {
        assert!(sym(3).same_position(&sym(3)));
        assert!(!sym(3).same_position(&sym(4)));
    }
}
