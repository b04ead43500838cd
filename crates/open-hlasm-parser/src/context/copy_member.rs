//! COPY member registry records.
//!
//! Once captured, a member body is immutable and shared by name; replaying a
//! member pushes a frame onto the context's COPY stack.

use std::rc::Rc;

use open_hlasm_lang_core::{FileId, Location};

use crate::context::ids::Id;
use crate::semantics::Statement;

/// A captured COPY member.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyMember {
    pub name: Id,
    /// Captured statements; replayed verbatim on inclusion.
    pub body: Vec<Rc<Statement>>,
    /// Where the inclusion that captured the member was written.
    pub location: Location,
    /// The file id assigned to the member's source text.
    pub file: FileId,
}
