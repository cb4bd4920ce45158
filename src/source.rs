//! Line registry
//!
//! Splits request source text into 1-indexed physical lines and resolves
//! parser byte offsets back to line numbers. Built once per request;
//! immutable afterwards.

/// Ordered, 1-indexed view of the physical lines of a source snippet.
#[derive(Debug)]
pub struct LineRegistry {
    /// Raw line text, without terminators. `lines[0]` is line 1.
    lines: Vec<String>,
    /// Byte offset of the start of each line, parallel to `lines`.
    starts: Vec<usize>,
}

impl LineRegistry {
    /// Split `source` on line boundaries. Empty lines are kept; empty input
    /// produces an empty registry.
    pub fn new(source: &str) -> Self {
        let mut lines = Vec::new();
        let mut starts = Vec::new();
        let mut offset = 0usize;
        for line in source.split_inclusive('\n') {
            starts.push(offset);
            offset += line.len();
            let text = line.strip_suffix('\n').unwrap_or(line);
            let text = text.strip_suffix('\r').unwrap_or(text);
            lines.push(text.to_string());
        }
        Self { lines, starts }
    }

    /// Look up the raw text of a 1-based line number.
    pub fn lookup(&self, index: u32) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.lines.get(index as usize - 1).map(String::as_str)
    }

    /// Map a byte offset into the source to its 1-based line number.
    ///
    /// Offsets past the end of the text resolve to the last line, so parse
    /// errors reported at EOF still land on a real line. An empty registry
    /// resolves everything to line 1.
    pub fn line_of(&self, offset: usize) -> u32 {
        if self.starts.is_empty() {
            return 1;
        }
        match self.starts.binary_search(&offset) {
            Ok(i) => i as u32 + 1,
            Err(i) => i as u32, // i >= 1 since starts[0] == 0
        }
    }

    /// Number of physical lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when the source text was empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate `(line_number, raw_text)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, text)| (i as u32 + 1, text.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source() {
        let reg = LineRegistry::new("");
        assert_eq!(reg.len(), 0);
        assert!(reg.is_empty());
        assert_eq!(reg.lookup(1), None);
    }

    #[test]
    fn test_trailing_newline_does_not_add_a_line() {
        let reg = LineRegistry::new("x = 1\nprint(x)\n");
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.lookup(1), Some("x = 1"));
        assert_eq!(reg.lookup(2), Some("print(x)"));
        assert_eq!(reg.lookup(3), None);
    }

    #[test]
    fn test_blank_lines_are_kept() {
        let reg = LineRegistry::new("a\n\nb");
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.lookup(2), Some(""));
        assert_eq!(reg.lookup(3), Some("b"));
    }

    #[test]
    fn test_lookup_is_one_based() {
        let reg = LineRegistry::new("only");
        assert_eq!(reg.lookup(0), None);
        assert_eq!(reg.lookup(1), Some("only"));
    }

    #[test]
    fn test_line_of_offsets() {
        let src = "x = 1\nprint(x)\n";
        let reg = LineRegistry::new(src);
        assert_eq!(reg.line_of(0), 1);
        assert_eq!(reg.line_of(4), 1);
        assert_eq!(reg.line_of(6), 2);
        assert_eq!(reg.line_of(src.len()), 2);
        assert_eq!(reg.line_of(src.len() + 10), 2);
    }

    #[test]
    fn test_crlf_terminators() {
        let reg = LineRegistry::new("a\r\nb\r\n");
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.lookup(1), Some("a"));
        assert_eq!(reg.lookup(2), Some("b"));
    }

    #[test]
    fn test_iter_in_order() {
        let reg = LineRegistry::new("a\nb\nc");
        let collected: Vec<_> = reg.iter().collect();
        assert_eq!(collected, vec![(1, "a"), (2, "b"), (3, "c")]);
    }
}
