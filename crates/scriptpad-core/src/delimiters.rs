//! Auto-closing of typed delimiters.
//!
//! Context-blind by contract: pairs are inserted even inside strings and
//! comments, and quote characters always insert a pair rather than closing
//! an open literal.

/// Recognized delimiter pairs: opener, closer, and the two-character
/// insertion text.
const PAIRS: [(char, char, &str); 5] = [
    ('(', ')', "()"),
    ('[', ']', "[]"),
    ('{', '}', "{}"),
    ('"', '"', "\"\""),
    ('\'', '\'', "''"),
];

/// Insertion produced when a typed opener auto-closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairInsertion {
    /// Text to insert at the cursor: the opener followed by its closer.
    pub text: &'static str,
    /// Cursor position after the insertion, between the two characters.
    pub cursor: usize,
}

/// The closing delimiter for a recognized opener.
pub fn closing_delimiter(opener: char) -> Option<char> {
    PAIRS
        .iter()
        .find(|(open, _, _)| *open == opener)
        .map(|(_, close, _)| *close)
}

/// Decide whether typing `typed` at `cursor` auto-closes.
///
/// Returns the pair to insert in place of the single character, with the
/// caret left between opener and closer. Non-opener characters return
/// `None` and should be inserted as typed.
pub fn auto_close(typed: char, cursor: usize) -> Option<PairInsertion> {
    PAIRS
        .iter()
        .find(|(open, _, _)| *open == typed)
        .map(|(_, _, text)| PairInsertion {
            text,
            cursor: cursor + 1,
        })
}
