//! Guards for SQL fragments spliced into generated statements.
//!
//! Where clauses come from configuration and are embedded verbatim into the copy `SELECT`, so
//! they must be a single read-only predicate. Identifiers are always backtick-quoted.

use thiserror::Error;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "DROP", "CREATE", "ALTER", "TRUNCATE", "RENAME",
    "GRANT", "REVOKE", "LOAD", "CALL", "HANDLER", "LOCK", "UNLOCK", "INTO", "OUTFILE", "SHUTDOWN",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqlGuardError {
    #[error("predicate is empty")]
    Empty,

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("predicate contains forbidden keyword: {0}")]
    ForbiddenKeyword(String),

    #[error("predicate has unbalanced parentheses")]
    UnbalancedParentheses,
}

/// Validate that a where clause is a single, read-only predicate.
pub fn validate_predicate(predicate: &str) -> Result<(), SqlGuardError> {
    let code = strip_non_code(predicate);
    if code.trim().is_empty() {
        return Err(SqlGuardError::Empty);
    }
    if code.contains(';') {
        return Err(SqlGuardError::MultipleStatements);
    }

    if let Some(word) = code
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(str::to_ascii_uppercase)
        .find(|w| FORBIDDEN_KEYWORDS.contains(&w.as_str()))
    {
        return Err(SqlGuardError::ForbiddenKeyword(word));
    }

    let mut depth = 0i32;
    for ch in code.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Err(SqlGuardError::UnbalancedParentheses),
            ')' => depth -= 1,
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SqlGuardError::UnbalancedParentheses);
    }
    Ok(())
}

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// `db`.`table`
pub fn qualified(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lex {
    Code,
    /// Inside a `'`, `"`, or `` ` `` quoted run.
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Replace literals, quoted identifiers, and comments with spaces, leaving only SQL structure.
fn strip_non_code(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut state = Lex::Code;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        let next = chars.peek().copied();
        state = match (state, ch, next) {
            (Lex::Code, '\'' | '"' | '`', _) => Lex::Quoted(ch),
            (Lex::Code, '-', Some('-')) | (Lex::Code, '#', _) => Lex::LineComment,
            (Lex::Code, '/', Some('*')) => {
                chars.next();
                Lex::BlockComment
            }
            (Lex::Code, _, _) => {
                out.push(ch);
                continue;
            }
            // Backslash escapes apply inside string literals only.
            (Lex::Quoted(q), '\\', Some(_)) if q != '`' => {
                chars.next();
                state
            }
            // A doubled quote is an escaped quote.
            (Lex::Quoted(q), c, Some(n)) if c == q && n == q => {
                chars.next();
                state
            }
            (Lex::Quoted(q), c, _) if c == q => Lex::Code,
            (Lex::LineComment, '\n', _) => Lex::Code,
            (Lex::BlockComment, '*', Some('/')) => {
                chars.next();
                Lex::Code
            }
            (s, _, _) => s,
        };
        out.push(' ');
    }
    out
}
