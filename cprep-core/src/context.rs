use crate::error::Diagnostics;
use crate::line_assembler::LineAssembler;
use crate::line_source::LineSource;
use crate::lookahead::Lookahead;
use std::path::PathBuf;

/// Everything the preprocessing pipeline needs to carry between calls,
/// except the string interner (owned by the caller so its arena can
/// outlive any one `Context`). A fresh `Context` can be built per
/// translation unit; dropping it releases the lookahead deque and the
/// open `LineSource` stack.
pub struct Context {
    pub assembler: LineAssembler,
    pub lookahead: Lookahead,
    pub diagnostics: Diagnostics,
}

impl Context {
    pub fn init_preprocessing(source: Box<dyn LineSource>, path: PathBuf) -> Self {
        let diagnostics = Diagnostics::new(path.display().to_string());
        Context { assembler: LineAssembler::new(source, path), lookahead: Lookahead::new(), diagnostics }
    }

    /// Drops the current deque and re-seeds the assembler on a new
    /// source, as the driver does between translation units.
    pub fn clear_preprocessing(&mut self, source: Box<dyn LineSource>, path: PathBuf) {
        self.diagnostics = Diagnostics::new(path.display().to_string());
        self.lookahead = Lookahead::new();
        self.assembler = LineAssembler::new(source, path);
    }
}
