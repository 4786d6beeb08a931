//! Property tests for canonical selector rendering.

use crate::ast::{MatchOp, Matcher, VectorSelector};
use crate::parse_expr;
use crate::selector::extract_selectors;
use proptest::prelude::*;

fn label_strategy() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    // Printable values including characters that require escaping.
    proptest::collection::vec(
        prop_oneof![
            proptest::char::range('a', 'z'),
            proptest::char::range('0', '9'),
            Just('"'),
            Just('\\'),
            Just('.'),
            Just('+'),
            Just('-'),
            Just(' '),
        ],
        0..12,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn op_strategy() -> impl Strategy<Value = MatchOp> {
    prop_oneof![
        Just(MatchOp::Eq),
        Just(MatchOp::Ne),
        Just(MatchOp::Re),
        Just(MatchOp::NotRe),
    ]
}

fn matcher_strategy() -> impl Strategy<Value = Matcher> {
    (label_strategy(), op_strategy(), value_strategy())
        .prop_map(|(label, op, value)| Matcher { label, op, value })
}

proptest! {
    /// Rendering a canonical fragment, reparsing it and re-rendering must
    /// yield the identical string.
    #[test]
    fn canonical_fragment_round_trips(
        name in "[a-z_][a-z0-9_]{0,10}",
        matchers in proptest::collection::vec(matcher_strategy(), 0..5),
    ) {
        let selector = VectorSelector {
            name,
            matchers,
            offset: None,
            span: 0,
        };
        let fragment = selector.canonical().to_string();

        let expr = parse_expr(&fragment)
            .unwrap_or_else(|e| panic!("reparse of {fragment:?} failed: {e}"));
        let reparsed = extract_selectors(&expr, &fragment, 1);
        prop_assert_eq!(reparsed.len(), 1);
        prop_assert_eq!(reparsed[0].fragment(), fragment);
    }

    /// Canonicalization is idempotent.
    #[test]
    fn canonicalization_is_idempotent(
        matchers in proptest::collection::vec(matcher_strategy(), 0..6),
    ) {
        let selector = VectorSelector {
            name: "metric".to_string(),
            matchers,
            offset: None,
            span: 0,
        };
        let once = selector.canonical();
        let twice = once.canonical();
        prop_assert_eq!(once.to_string(), twice.to_string());
    }
}
