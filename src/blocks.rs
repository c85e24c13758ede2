//! Blank-line delimited block splitting over trimmed input lines.

/// One run of non-empty lines, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub end: usize,
}

/// What a block describes, decoded from its header line's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `[Name]`, weak when doubled: `[[Name]]`
    Entity,
    /// `i` marker, one `parent child...` line per group
    Inheritance,
    /// `{Name}`, weak when doubled: `{{Name}}`
    Association,
    /// Unrecognized header, silently dropped
    Other,
}

impl BlockKind {
    pub fn classify(header: &str) -> Self {
        match header.chars().next() {
            Some('[') => Self::Entity,
            Some('i') => Self::Inheritance,
            Some('{') => Self::Association,
            _ => Self::Other,
        }
    }
}

/// Trim every line and append an empty terminator line.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(|l| l.trim().to_string()).collect();
    lines.push(String::new());
    lines
}

/// Scan linearly for runs of non-empty lines. Runs of empty lines yield
/// no block; any input yields a deterministic block sequence.
pub fn split_blocks(lines: &[String]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            if let Some(s) = start.take() {
                blocks.push(Block { start: s, end: i });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        blocks.push(Block {
            start: s,
            end: lines.len(),
        });
    }
    blocks
}
