//! Property-based tests using proptest
//!
//! These tests generate random rule sets from a small vocabulary of spells
//! and check the invariants of the compile pipeline and the engine.

use futures::executor::block_on;
use postspell::spells::{
    compile, parse, ruleset::fingerprint, CompiledRuleset, Context, Engine, PostFacts, Printer,
};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

/// A spell decided by the post alone, valid in every context
fn unscoped_spell() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("#sage".to_string()),
        Just("#op".to_string()),
        Just("#all".to_string()),
        Just("#words(spam)".to_string()),
        Just("#num(1-3)".to_string()),
        Just("#tlen(0-4)".to_string()),
    ]
}

fn spell() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => unscoped_spell(),
        1 => Just("#sage[b]".to_string()),
        1 => Just("#op[c]".to_string()),
    ]
}

fn operand() -> impl Strategy<Value = String> {
    operand_from(spell().boxed())
}

fn operand_from(spell: BoxedStrategy<String>) -> impl Strategy<Value = String> {
    let leaf = (any::<bool>(), spell)
        .prop_map(|(negated, spell)| format!("{}{}", if negated { "!" } else { "" }, spell));
    leaf.prop_recursive(3, 16, 4, |inner| {
        (
            any::<bool>(),
            prop::collection::vec((inner, prop::bool::ANY), 1..4),
        )
            .prop_map(|(negated, parts)| {
                let mut text = String::from(if negated { "!(" } else { "(" });
                for (i, (part, and)) in parts.iter().enumerate() {
                    if i > 0 {
                        text.push_str(if *and { " & " } else { " | " });
                    }
                    text.push_str(part);
                }
                text.push(')');
                text
            })
    })
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(operand(), 1..4).prop_map(|lines| lines.join("\n"))
}

fn unscoped_document() -> impl Strategy<Value = String> {
    prop::collection::vec(operand_from(unscoped_spell().boxed()), 1..4)
        .prop_map(|lines| lines.join("\n"))
}

fn post() -> impl Strategy<Value = PostFacts> {
    (any::<bool>(), any::<bool>(), 1u64..6, prop::bool::ANY).prop_map(
        |(sage, op, position, spam)| {
            PostFacts::new(position)
                .position(position)
                .sage(sage)
                .original_post(op)
                .text(if spam { "SPAM" } else { "hello there" })
        },
    )
}

fn canonical(source: &str, context: &Context) -> String {
    let ruleset = compile(source, context).expect("generated source should compile");
    Printer::new().print_ruleset(&ruleset)
}

fn matches(source: &str, context: &Context, post: &PostFacts) -> bool {
    let ruleset = compile(source, context).expect("generated source should compile");
    block_on(Engine::default().evaluate(&ruleset, post)).matched
}

// =============================================================================
// Compile Pipeline
// =============================================================================

proptest! {
    /// Printing the canonical form and compiling again changes nothing
    #[test]
    fn test_canonical_form_is_idempotent(source in document()) {
        let context = Context::board("b");
        let once = canonical(&source, &context);
        prop_assert_eq!(canonical(&once, &context), once);
    }

    /// Compiling the same text twice yields identical rulesets
    #[test]
    fn test_compile_is_deterministic(source in document()) {
        let context = Context::board("c");
        let first = compile(&source, &context).unwrap();
        prop_assert_eq!(first, compile(&source, &context).unwrap());
    }

    /// The fingerprint does not depend on statement order
    #[test]
    fn test_fingerprint_ignores_statement_order(lines in prop::collection::vec(operand(), 2..4)) {
        let forward = lines.join("\n");
        let backward = lines.iter().rev().cloned().collect::<Vec<_>>().join("\n");
        prop_assert_eq!(
            fingerprint(&parse(&forward).unwrap()),
            fingerprint(&parse(&backward).unwrap())
        );
    }

    /// Canonicalization preserves the verdict of the raw left fold
    #[test]
    fn test_canonical_form_keeps_meaning(source in unscoped_document(), post in post()) {
        let context = Context::global();
        let filter = parse(&source).unwrap().filter;
        let raw = CompiledRuleset::from_parts(filter, Vec::new(), Vec::new(), context.clone());
        let before = block_on(Engine::default().evaluate(&raw, &post)).matched;
        prop_assert_eq!(matches(&source, &context, &post), before);
    }
}

// =============================================================================
// Evaluation
// =============================================================================

proptest! {
    /// `a & b | c` reads as `(a & b) | c`
    #[test]
    fn test_and_then_or(
        a in unscoped_spell(),
        b in unscoped_spell(),
        c in unscoped_spell(),
        post in post()
    ) {
        let context = Context::global();
        let eval = |s: &str| matches(s, &context, &post);
        let expected = (eval(&a) && eval(&b)) || eval(&c);
        prop_assert_eq!(eval(&format!("{} & {} | {}", a, b, c)), expected);
    }

    /// Spells scoped to another board never change the verdict
    #[test]
    fn test_foreign_scope_is_ignored(source in document(), post in post()) {
        let context = Context::board("b");
        let with_foreign = format!("{}\n#all[elsewhere]\n!#sage[elsewhere] & #op", source);
        let without = format!("{}\n#op", source);
        prop_assert_eq!(
            matches(&with_foreign, &context, &post),
            matches(&without, &context, &post)
        );
    }
}
