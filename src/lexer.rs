//! Line-oriented lexer for the assembly dialect: `#` comments, colon-
//! terminated labels, and comma/whitespace-separated operand tokens.

/// Raw statement from one source line: uppercased opcode plus operand
/// tokens, still unexpanded and unresolved.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawStmt {
    pub opcode: String,
    pub args: Vec<String>,
}

/// Lexed form of one source line. A line may define any number of labels
/// and at most one statement.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct LexedLine {
    pub labels: Vec<String>,
    pub stmt: Option<RawStmt>,
}

fn trim(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}

/// Lex a single source line.
pub fn lex_line(raw: &str) -> LexedLine {
    let mut out = LexedLine::default();
    let mut line = trim(raw);

    // Whole-line and trailing comments
    if line.is_empty() || line.starts_with('#') {
        return out;
    }
    if let Some(pos) = line.find('#') {
        line = trim(&line[..pos]);
    }

    // Peel off colon-terminated labels
    while let Some(pos) = line.find(':') {
        let label = trim(&line[..pos]);
        if !label.is_empty() {
            out.labels.push(label.to_string());
        }
        line = trim(&line[pos + 1..]);
    }
    if line.is_empty() {
        return out;
    }

    // Opcode, then comma/whitespace-separated operands
    let mut parts = line.splitn(2, [' ', '\t']);
    let opcode = parts.next().unwrap_or("").to_ascii_uppercase();
    let tail = parts.next().unwrap_or("").replace(',', " ");
    let args = tail
        .split_ascii_whitespace()
        .map(str::to_string)
        .collect();

    out.stmt = Some(RawStmt { opcode, args });
    out
}
