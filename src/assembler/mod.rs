//! The two-pass assembler.
//!
//! Pass 1 walks the source, sizes every instruction and pseudo-op and
//! assigns labels to addresses. Pass 2 re-walks the same lines, parses the
//! operands in full and emits bytes into the memory image. Errors are
//! accumulated in a [Diagnostics] value and stop the assembly at the end of
//! the pass that produced them; pass 2 is never entered after a failed
//! pass 1.

mod expr;
mod pass1;
mod pass2;

use crate::binary::Binary;
use crate::error::{Diagnostics, ErrorCode, Note, WarningCode};
use crate::parsing::{LineCursor, Source};
use crate::symbol_table::LabelTable;

/// Everything a successful assembly produces.
pub struct Assembly {
    pub binary: Binary,
    pub labels: LabelTable,

    /// Warnings collected along the way.
    pub diagnostics: Diagnostics,
}

/// Assembles a source file.
///
/// On failure the returned [Diagnostics] holds every error and warning
/// found up to the phase boundary that aborted the assembly.
pub fn assemble(src: &Source) -> Result<Assembly, Diagnostics> {
    let mut diag = Diagnostics::new();
    let mut labels = LabelTable::new();

    pass1::run(src, &mut labels, &mut diag);
    if diag.has_errors() {
        return Err(diag);
    }

    let binary = pass2::run(src, &labels, &mut diag);
    if diag.has_errors() {
        return Err(diag);
    }

    Ok(Assembly {
        binary,
        labels,
        diagnostics: diag,
    })
}

/// Parser state for one source line: the cursor, the line number and the
/// shared label table and diagnostics sink. All expression and operand
/// parsing runs against this context.
pub(crate) struct LineCtx<'a> {
    pub cur: LineCursor<'a>,
    pub num: usize,
    pub labels: &'a LabelTable,
    pub diag: &'a mut Diagnostics,
}

impl<'a> LineCtx<'a> {
    pub(crate) fn new(
        line: &'a str,
        num: usize,
        labels: &'a LabelTable,
        diag: &'a mut Diagnostics,
    ) -> LineCtx<'a> {
        LineCtx {
            cur: LineCursor::new(line),
            num,
            labels,
            diag,
        }
    }

    pub(crate) fn error(&mut self, start: usize, len: Option<usize>, code: ErrorCode) {
        self.diag.error(self.num, start, len, code);
    }

    pub(crate) fn error_note(
        &mut self,
        start: usize,
        len: Option<usize>,
        code: ErrorCode,
        note: String,
    ) {
        self.diag
            .error_with_notes(self.num, start, len, code, vec![Note::Text(note)]);
    }

    pub(crate) fn error_with_notes(
        &mut self,
        start: usize,
        len: Option<usize>,
        code: ErrorCode,
        notes: Vec<Note>,
    ) {
        self.diag.error_with_notes(self.num, start, len, code, notes);
    }

    pub(crate) fn warn(&mut self, start: usize, len: Option<usize>, code: WarningCode, note: String) {
        self.diag
            .warning(self.num, start, len, code, vec![Note::Text(note)]);
    }
}
