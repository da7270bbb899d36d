//! Integration tests for parsing, canonicalization and printing
//!
//! These tests cover:
//! - Statements, continuation lines and groups
//! - Canonical output of the optimizer
//! - Printing as the inverse of parsing

use postspell::spells::{
    compile, optimize, parse, Combinator, Context, Node, Printer, SpellArg, SpellKind,
};

fn canonical(source: &str) -> String {
    let ruleset = compile(source, &Context::board("b")).expect("source should compile");
    Printer::new().print_ruleset(&ruleset)
}

// ============================================================================
// Structure Tests
// ============================================================================

#[test]
fn test_statements_are_or_combined() {
    let root = parse("#sage\n#op").unwrap().filter.unwrap();
    assert_eq!(root.len(), 2);
    assert_eq!(root.children[0].op, Combinator::Or);
}

#[test]
fn test_left_fold_has_no_precedence() {
    // a | b & c reads as (a | b) & c
    assert_eq!(canonical("#op | #sage & #num(1)"), "#num(1) & (#sage | #op)");
}

#[test]
fn test_every_argument_shape() {
    let source = "#words(hi) & #exp(/x/i) & #img(<5) & #wipe(capslock) & #num(2-3) & #ihash(0x10)";
    let root = parse(source).unwrap().filter.unwrap();
    let leaves = root.leaves();
    assert_eq!(leaves.len(), 6);
    assert!(matches!(leaves[0].arg, Some(SpellArg::Text(_))));
    assert!(matches!(leaves[1].arg, Some(SpellArg::Regex(_))));
    assert!(matches!(leaves[2].arg, Some(SpellArg::Image(_))));
    assert!(matches!(leaves[3].arg, Some(SpellArg::Wipe(_))));
    assert!(matches!(leaves[4].arg, Some(SpellArg::Ranges(_))));
    assert_eq!(leaves[5].arg, Some(SpellArg::Signature(16)));
}

#[test]
fn test_optional_arguments() {
    for source in ["#subj", "#name", "#trip", "#img", "#tlen", "#wipe", "#video"] {
        assert!(parse(source).is_ok(), "{} should parse without argument", source);
    }
}

// ============================================================================
// Canonicalization Tests
// ============================================================================

#[test]
fn test_clause_order_does_not_matter() {
    assert_eq!(canonical("#sage | #op"), canonical("#op\n#sage"));
    assert_eq!(canonical("#sage & #sage & #op"), "#sage & #op");
}

#[test]
fn test_constants_fold() {
    assert_eq!(canonical("#all | #sage"), "#all");
    assert_eq!(canonical("#all & #sage"), "#sage");
    assert_eq!(canonical("!#all | #sage"), "#sage");
    assert_eq!(canonical("!#all & #sage"), "!#all");
}

#[test]
fn test_nested_same_operator_flattens() {
    assert_eq!(canonical("#op | (#sage | (#num(1)))"), "#sage | #op | #num(1)");
    assert_eq!(canonical("!(!#sage)"), "#sage");
}

#[test]
fn test_scope_pruning() {
    let source = "#sage[a] | #op[b]\n#num[b,7](1) & #img";
    assert_eq!(canonical(source), "#img | #op[b]");

    let thread = compile(source, &Context::thread("b", 7)).unwrap();
    assert_eq!(
        Printer::new().print_ruleset(&thread),
        "#op[b] | (#img & #num[b,7](1))"
    );
}

#[test]
fn test_context_free_form_keeps_everything() {
    let raw = parse("#sage[a] & #op[b]").unwrap().filter.unwrap();
    let all = optimize(&raw, None).unwrap();
    assert_eq!(all.leaves().len(), 2);
    assert!(optimize(&raw, Some(&Context::board("c"))).is_none());
}

#[test]
fn test_async_spells_sort_last() {
    let root = compile("#vauthor(x) & #ihash(1) & #sage", &Context::global())
        .unwrap()
        .filter
        .unwrap();
    let kinds: Vec<SpellKind> = root.leaves().iter().map(|l| l.kind).collect();
    assert_eq!(kinds, vec![SpellKind::Sage, SpellKind::Ihash, SpellKind::Vauthor]);
}

// ============================================================================
// Printing Tests
// ============================================================================

#[test]
fn test_canonical_print_is_stable() {
    let sources = [
        "#words(spam) & !#op | #sage",
        "(#name(John) | #trip(XYZ)) & !#op",
        "#exp(/a(b)c/gi) | #imgn(/\\.gif$/)",
        "#img(=10-20@100x100-200x200) & #tlen(1,5-9)",
        "#rep(/a/,b)\n#sage\n#outrep[b](/c/i,d \\) e)",
    ];
    for source in sources {
        let once = canonical(source);
        assert_eq!(canonical(&once), once, "unstable print of {:?}", source);
    }
}

#[test]
fn test_long_disjunction_wraps_and_reparses() {
    let source: Vec<String> = (0..6).map(|n| format!("#words(keyword number {})", n)).collect();
    let printed = canonical(&source.join("\n"));
    assert!(printed.contains(" |\n    #words"));
    assert_eq!(canonical(&printed), printed);
}

#[test]
fn test_print_node_of_group() {
    let root = parse("!(#sage | #op)").unwrap().filter.unwrap();
    match &root.children[0].node {
        node @ Node::Group(_) => {
            assert_eq!(Printer::new().print_node(node), "!(#sage | #op)");
        }
        other => panic!("expected group, got {:?}", other),
    }
}

#[test]
fn test_replacement_references_print_normalized() {
    let printed = canonical("#rep(/a(b)/,$1x)\n#rep(/cost/,$5 each)");
    assert_eq!(printed, "#rep(/a(b)/,${1}x)\n#rep(/cost/,$$5 each)");
    assert_eq!(canonical(&printed), printed);

    let source = "#rep(/a(b)/,$1x)\n#rep(/cost/,$5 each)";
    let ruleset = compile(source, &Context::board("b")).unwrap();
    assert_eq!(ruleset.apply_incoming("ab, cost"), "bx, $5 each");
}

// ============================================================================
// Regex Literal Tests
// ============================================================================

#[test]
fn test_slash_inside_character_class() {
    let root = parse("#exp(/[/]x/) & #exp(/a[^/\\]]+b/i)").unwrap().filter.unwrap();
    let sources: Vec<String> = root
        .leaves()
        .iter()
        .map(|leaf| match &leaf.arg {
            Some(SpellArg::Regex(re)) => re.source().to_string(),
            other => panic!("expected regex, got {:?}", other),
        })
        .collect();
    assert_eq!(sources, vec!["[/]x", "a[^/\\]]+b"]);

    let once = canonical("#exp(/[/]x/)");
    assert_eq!(once, "#exp(/[/]x/)");
    assert_eq!(canonical(&once), once);
}
