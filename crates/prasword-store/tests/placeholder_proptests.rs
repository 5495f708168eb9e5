#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for placeholder rewriting.

use proptest::prelude::*;
use prasword_store::backend::{rewrite_placeholders, PlaceholderStyle};

/// One piece of a generated statement.
#[derive(Debug, Clone)]
enum Piece {
    /// A bare `?`.
    Param,
    /// Unquoted SQL text without quotes or `?`.
    Plain(String),
    /// A quoted literal whose body may contain `?`.
    Quoted(char, String),
}

fn piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        Just(Piece::Param),
        "[a-zA-Z0-9_ =,()*<>.-]{1,12}".prop_map(Piece::Plain),
        "[a-z ?$1]{0,8}".prop_map(|body| Piece::Quoted('\'', body)),
        "[a-z ?$1]{0,8}".prop_map(|body| Piece::Quoted('"', body)),
    ]
}

/// The statement as written and as PostgreSQL should receive it.
fn render(pieces: &[Piece]) -> (String, String, usize) {
    let mut sql = String::new();
    let mut expected = String::new();
    let mut params = 0;
    for piece in pieces {
        match piece {
            Piece::Param => {
                params += 1;
                sql.push('?');
                expected.push_str(&format!("${params}"));
            }
            Piece::Plain(text) => {
                sql.push_str(text);
                expected.push_str(text);
            }
            Piece::Quoted(q, body) => {
                let literal = format!("{q}{body}{q}");
                sql.push_str(&literal);
                expected.push_str(&literal);
            }
        }
    }
    (sql, expected, params)
}

proptest! {
    /// Unquoted `?` become `$1..$n` in order; quoted text is left byte-identical.
    #[test]
    fn numbered_rewrite_matches_model(pieces in prop::collection::vec(piece(), 0..24)) {
        let (sql, expected, params) = render(&pieces);
        let rewritten = rewrite_placeholders(&sql, PlaceholderStyle::Numbered);
        prop_assert_eq!(rewritten.as_ref(), expected.as_str());

        // Only the quoted `?` survive.
        prop_assert_eq!(rewritten.matches('?').count(), sql.matches('?').count() - params);
    }

    /// The native style never changes the statement.
    #[test]
    fn question_mark_style_is_identity(pieces in prop::collection::vec(piece(), 0..24)) {
        let (sql, _, _) = render(&pieces);
        let rewritten = rewrite_placeholders(&sql, PlaceholderStyle::QuestionMark);
        prop_assert_eq!(rewritten.as_ref(), sql.as_str());
    }
}
