//! Opencode source cursor, COPY stack, and snapshots.
//!
//! The opencode reader's logical cursor is a statement index plus the stack
//! of active COPY frames. A [`SourceSnapshot`] captures enough of that state
//! to rewind after lookahead or to resume at a registered sequence symbol;
//! snapshots are plain values and may be cloned freely.

use crate::context::ids::Id;

/// Position of the opencode cursor: the statement about to be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// Index of the next opencode statement.
    pub statement_index: usize,
    /// 0-indexed source line of that statement.
    pub file_line: usize,
}

/// One active COPY inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFrame {
    /// The member being replayed.
    pub member: Id,
    /// Index of the next statement within the member body.
    pub statement_offset: usize,
}

/// Captured cursor state sufficient to resume at a prior point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSnapshot {
    pub position: SourcePosition,
    pub copy_frames: Vec<CopyFrame>,
}

/// Live source state owned by the assembly context.
#[derive(Debug, Default)]
pub struct SourceState {
    /// Index of the next opencode statement to fetch.
    pub next_statement: usize,
    /// Source line of the most recently fetched opencode statement.
    pub current_line: usize,
    /// Active COPY frames, innermost last.
    pub copy_stack: Vec<CopyFrame>,
    /// Snapshot that re-delivers the statement currently being processed.
    /// Maintained by the processing manager before every fetch.
    pub pending: SourceSnapshot,
}

impl SourceState {
    /// Capture the current cursor.
    pub fn create_snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            position: SourcePosition {
                statement_index: self.next_statement,
                file_line: self.current_line,
            },
            copy_frames: self.copy_stack.clone(),
        }
    }

    /// Restore a captured cursor.
    pub fn apply_snapshot(&mut self, snapshot: SourceSnapshot) {
        self.next_statement = snapshot.position.statement_index;
        self.current_line = snapshot.position.file_line;
        self.copy_stack = snapshot.copy_frames;
    }

    /// Whether `member` is an active COPY frame (recursion check).
    pub fn is_copy_active(&self, member: Id) -> bool {
        self.copy_stack.iter().any(|f| f.member == member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = SourceState {
            next_statement: 7,
            current_line: 12,
            copy_stack: vec![CopyFrame {
                member: Id::EMPTY,
                statement_offset: 3,
            }],
            pending: SourceSnapshot::default(),
        };
        let snap = state.create_snapshot();
        state.apply_snapshot(snap.clone());
        assert_eq!(state.create_snapshot(), snap);
    }

    #[test]
    fn test_apply_snapshot_rewinds() {
        let mut state = SourceState::default();
        let at_start = state.create_snapshot();
        state.next_statement = 42;
        state.copy_stack.push(CopyFrame {
            member: Id::EMPTY,
            statement_offset: 1,
        });
        state.apply_snapshot(at_start);
        assert_eq!(state.next_statement, 0);
        assert!(state.copy_stack.is_empty());
    }
}
