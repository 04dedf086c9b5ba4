//! Safety gates consulted before any externally supplied statement reaches a
//! connection. Predicates only, a `false` is reported to the caller as plain
//! text rather than an error.

pub const MIN_QUERY_TIMEOUT_SECS: u64 = 1;
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 600;

const READ_PREFIXES: [&str; 6] = ["SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH"];

const FORBIDDEN: [&str; 24] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "RENAME", "REPLACE",
    "GRANT", "REVOKE", "LOCK", "UNLOCK", "CALL", "SET", "USE", "KILL", "LOAD", "HANDLER",
    "PREPARE", "EXECUTE", "SHUTDOWN", "OUTFILE", "DUMPFILE",
];

/// Accept only a single read-only statement. Comments are stripped first so
/// a keyword cannot hide behind `--`, `#` or `/* */`, then every bare word
/// is checked against the deny list. Words inside quoted literals are still
/// scanned, which deliberately errs on the side of rejection.
pub fn validate_sql(statement: &str) -> bool {
    let stripped = strip_comments(statement);
    let statement = stripped.trim().trim_end_matches(';').trim_end();
    if statement.is_empty() || statement.contains(';') {
        return false;
    }
    let first = match words(statement).next() {
        Some(word) => word,
        None => return false,
    };
    if !READ_PREFIXES.iter().any(|p| first.eq_ignore_ascii_case(p)) {
        return false;
    }
    words(statement).all(|word| !FORBIDDEN.iter().any(|k| word.eq_ignore_ascii_case(k)))
}

/// Table names are interpolated into DDL introspection statements, so only
/// plain identifier characters are allowed.
pub fn validate_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    !name.is_empty()
        && name.len() <= 64
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

pub fn validate_timeout(seconds: u64) -> bool {
    (MIN_QUERY_TIMEOUT_SECS..=MAX_QUERY_TIMEOUT_SECS).contains(&seconds)
}

fn words(statement: &str) -> impl Iterator<Item = &str> {
    statement
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .filter(|word| !word.is_empty())
}

/// Remove `/* */`, `-- ` and `#` comments, leaving quoted literals intact.
fn strip_comments(statement: &str) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Plain,
        Quoted(char),
        Block,
        Line,
    }
    let mut out = String::with_capacity(statement.len());
    let mut state = State::Plain;
    let mut chars = statement.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Plain => match c {
                '\'' | '"' | '`' => {
                    state = State::Quoted(c);
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::Block;
                }
                '#' => state = State::Line,
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = State::Line;
                }
                _ => out.push(c),
            },
            State::Quoted(quote) => {
                out.push(c);
                if c == '\\' && quote != '`' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    state = State::Plain;
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Plain;
                    // Keep statements such as `SELECT/**/1` well formed.
                    out.push(' ');
                }
            }
            State::Line => {
                if c == '\n' {
                    state = State::Plain;
                    out.push(c);
                }
            }
        }
    }
    out
}
