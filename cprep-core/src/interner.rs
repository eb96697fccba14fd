use bumpalo::Bump;
use std::collections::HashMap;
use std::fmt;

/// Handle to an interned string. Cheap to copy, compare and hash; the
/// backing bytes live in the interner's arena for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

/// Bump-arena string interner, one per translation unit.
///
/// Using an arena instead of `Rc<str>`/`String` clones solves the same
/// problem it solves for the host project's parser `Session`: token text
/// needs to outlive the line it was lexed from without every token
/// owning a heap allocation.
pub struct Interner<'bump> {
    bump: &'bump Bump,
    strings: Vec<&'bump str>,
    lookup: HashMap<&'bump str, Symbol>,
    /// Backing buffer for the adjacent-`STRING` merge chain currently in
    /// progress, if any, paired with the symbol it's being built under.
    /// `concat` grows this in place across a run of literals instead of
    /// re-copying the whole accumulated prefix on every call; `raw` reads
    /// through it for that symbol until the chain is superseded and
    /// flushed into a permanent arena slice.
    merge_buf: Option<(Symbol, bumpalo::collections::String<'bump>)>,
}

impl<'bump> Interner<'bump> {
    pub fn new(bump: &'bump Bump) -> Self {
        Interner { bump, strings: Vec::new(), lookup: HashMap::new(), merge_buf: None }
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(sym) = self.lookup.get(s) {
            return *sym;
        }
        let alloced: &'bump str = self.bump.alloc_str(s);
        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(alloced);
        self.lookup.insert(alloced, sym);
        sym
    }

    pub fn raw(&self, sym: Symbol) -> &str {
        if let Some((merge_sym, buf)) = &self.merge_buf {
            if *merge_sym == sym {
                return buf.as_str();
            }
        }
        self.strings[sym.0 as usize]
    }

    /// Commits the in-progress merge buffer's current contents into a
    /// permanent arena slice, so `raw` for its symbol no longer depends
    /// on `merge_buf` once a new chain (or none) takes its place.
    fn flush_merge_buf(&mut self) {
        if let Some((sym, buf)) = self.merge_buf.take() {
            self.strings[sym.0 as usize] = self.bump.alloc_str(buf.as_str());
        }
    }

    /// Concatenate two already-interned strings into one symbol. Called
    /// once per newly arriving literal in a run of adjacent `STRING`
    /// tokens, with `a` equal to the previous call's own result for every
    /// call but the first in a chain, so the buffer grows geometrically
    /// (the same amortized doubling `String`/`Vec` use) instead of
    /// re-copying the whole merged prefix on every pairwise merge. Merge
    /// results are not deduplicated against unrelated interned text.
    pub fn concat(&mut self, a: Symbol, b: Symbol) -> Symbol {
        let continues_chain = matches!(&self.merge_buf, Some((sym, _)) if *sym == a);
        if continues_chain {
            let b_text = self.raw(b).to_string();
            let (sym, buf) = self.merge_buf.as_mut().expect("just checked");
            buf.push_str(&b_text);
            return *sym;
        }

        self.flush_merge_buf();

        let mut buf = bumpalo::collections::String::with_capacity_in(
            self.raw(a).len() + self.raw(b).len(),
            self.bump,
        );
        buf.push_str(self.raw(a));
        buf.push_str(self.raw(b));

        let sym = Symbol(self.strings.len() as u32);
        self.strings.push("");
        self.merge_buf = Some((sym, buf));
        sym
    }
}

impl fmt::Debug for Interner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("len", &self.strings.len()).finish()
    }
}
