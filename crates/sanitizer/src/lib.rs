//! Optional semicolon-insertion pre-pass.
//!
//! Ember statements are terminated by `;`, but a source file written one
//! statement per line shouldn't have to spell that out. This pass scans
//! the source once with the same [`ember_compiler::Scanner`] the real
//! compiler uses and inserts a `;` at every line break that falls between
//! two tokens which can only mean "end of one statement, start of the
//! next" — never inside an expression that merely wraps a line.
//!
//! This is a textual rewrite that runs before compilation, not a parser
//! change: it never needs to understand precedence or scoping, only
//! which token *kinds* are statement boundaries.

use ember_compiler::{Scanner, Token, TokenKind};

/// Returns `source` with inferred semicolons inserted at line breaks
/// that sit between a statement-ending token and a statement-starting
/// one.
pub fn sanitize(source: &str) -> String {
    let mut scanner = Scanner::new(source);
    let mut cur = scanner.scan_token();
    let mut prev = cur;
    let mut positions: Vec<usize> = Vec::new();

    while cur.kind != TokenKind::Eof {
        prev = cur;
        cur = scanner.scan_token();
        if prev.line != cur.line && needs_semicolon(prev.kind, cur.kind) {
            positions.push(token_end_offset(source, prev));
        }
    }

    // `prev` is only a real scanned token once the loop above has run at
    // least one iteration. On empty input `cur` is EOF from the very
    // first scan and `prev` is that same EOF token, never a genuine
    // trailing token, so the check below must not fire for it.
    if prev.kind != TokenKind::Eof && trailing_needs_semicolon(prev.kind) {
        positions.push(token_end_offset(source, prev));
    }

    rebuild_with_semicolons(source, &positions)
}

fn token_end_offset(source: &str, token: Token) -> usize {
    let base = source.as_ptr() as usize;
    let start = token.lexeme.as_ptr() as usize - base;
    start + token.lexeme.len()
}

fn needs_semicolon(prev: TokenKind, cur: TokenKind) -> bool {
    match prev {
        TokenKind::RightParen
        | TokenKind::RightBracket
        | TokenKind::Identifier
        | TokenKind::String
        | TokenKind::Number
        | TokenKind::False
        | TokenKind::None
        | TokenKind::True => starts_new_statement(cur),
        TokenKind::Break | TokenKind::Continue => true,
        TokenKind::Return => follows_return(cur),
        _ => false,
    }
}

fn starts_new_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LeftParen
            | TokenKind::LeftBracket
            | TokenKind::Identifier
            | TokenKind::String
            | TokenKind::Number
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Def
            | TokenKind::Elif
            | TokenKind::Else
            | TokenKind::End
            | TokenKind::False
            | TokenKind::For
            | TokenKind::If
            | TokenKind::None
            | TokenKind::Return
            | TokenKind::True
            | TokenKind::Var
            | TokenKind::While
    )
}

fn follows_return(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Def
            | TokenKind::Elif
            | TokenKind::Else
            | TokenKind::End
            | TokenKind::For
            | TokenKind::If
            | TokenKind::Return
            | TokenKind::Var
            | TokenKind::While
    )
}

fn trailing_needs_semicolon(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::RightParen
            | TokenKind::RightBracket
            | TokenKind::Identifier
            | TokenKind::String
            | TokenKind::Number
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::False
            | TokenKind::None
            | TokenKind::Return
            | TokenKind::True
    )
}

fn rebuild_with_semicolons(source: &str, positions: &[usize]) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + positions.len());
    let mut next = 0usize;
    for &pos in positions {
        out.extend_from_slice(&bytes[next..pos]);
        out.push(b';');
        next = pos;
    }
    out.extend_from_slice(&bytes[next..]);
    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_unchanged() {
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn single_statement_gets_trailing_semicolon() {
        assert_eq!(sanitize("x"), "x;");
    }

    #[test]
    fn two_statements_on_separate_lines_get_separated() {
        assert_eq!(sanitize("x\ny"), "x;\ny;");
    }

    #[test]
    fn already_terminated_statement_is_untouched() {
        assert_eq!(sanitize("x;\ny;\n"), "x;\ny;\n");
    }

    #[test]
    fn wrapped_call_arguments_do_not_gain_semicolons() {
        let source = "print(\n1,\n2\n)";
        assert_eq!(sanitize(source), source);
    }

    #[test]
    fn break_and_continue_always_terminate() {
        assert_eq!(sanitize("while true:\nbreak\nend"), "while true:\nbreak;\nend");
    }

    #[test]
    fn return_before_a_new_statement_keyword_is_terminated() {
        assert_eq!(sanitize("def f():\nreturn\nend"), "def f():\nreturn;\nend");
    }

    #[test]
    fn return_followed_by_a_value_is_not_split() {
        // `return` directly above a value continues the same statement;
        // the trailing check on the value supplies the semicolon.
        assert_eq!(sanitize("def f():\nreturn\n1\nend"), "def f():\nreturn\n1;\nend");
    }
}
