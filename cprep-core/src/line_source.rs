use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Yields one logical source line at a time, with backslash-newline
/// continuations already joined.
pub trait LineSource {
    /// `None` means end of the final translation unit.
    fn next_logical_line(&mut self) -> Option<String>;
}

/// Reads physical lines from a file, splicing any that end in `\` onto
/// the next physical line before handing the logical line to the lexer.
pub struct FileLineSource {
    reader: BufReader<File>,
    pub path: PathBuf,
}

impl FileLineSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = BufReader::new(File::open(&path)?);
        Ok(FileLineSource { reader, path })
    }

    fn read_physical_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
            Err(_) => None,
        }
    }
}

impl LineSource for FileLineSource {
    fn next_logical_line(&mut self) -> Option<String> {
        let mut logical = self.read_physical_line()?;
        while logical.ends_with('\\') {
            logical.pop();
            match self.read_physical_line() {
                Some(cont) => logical.push_str(&cont),
                None => break,
            }
        }
        logical.push('\n');
        Some(logical)
    }
}

/// Queue of pre-split logical lines. Used for `inject_line` (the CLI's
/// `-D` built-in macro definitions) and for `#include`d content, and in
/// tests to drive the pipeline without touching the filesystem.
#[derive(Debug, Default)]
pub struct VecLineSource {
    lines: VecDeque<String>,
}

impl VecLineSource {
    pub fn new() -> Self {
        VecLineSource { lines: VecDeque::new() }
    }

    pub fn from_text(text: &str) -> Self {
        let mut src = VecLineSource::new();
        for line in text.split_inclusive('\n') {
            src.push_back(line.to_string());
        }
        src
    }

    pub fn push_back(&mut self, mut line: String) {
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.lines.push_back(line);
    }

    pub fn push_front(&mut self, mut line: String) {
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.lines.push_front(line);
    }
}

impl LineSource for VecLineSource {
    fn next_logical_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_line_source_splits_on_newlines() {
        let mut src = VecLineSource::from_text("a\nb\nc");
        assert_eq!(src.next_logical_line(), Some("a\n".to_string()));
        assert_eq!(src.next_logical_line(), Some("b\n".to_string()));
        assert_eq!(src.next_logical_line(), Some("c\n".to_string()));
        assert_eq!(src.next_logical_line(), None);
    }

    #[test]
    fn push_front_injects_ahead_of_queue() {
        let mut src = VecLineSource::from_text("second\n");
        src.push_front("first\n".to_string());
        assert_eq!(src.next_logical_line(), Some("first\n".to_string()));
        assert_eq!(src.next_logical_line(), Some("second\n".to_string()));
    }
}
