//! Scope resolution and canonicalization
//!
//! Rewrites a raw tree into the canonical form the engine evaluates and the
//! fingerprint is computed from. Each group is processed in one
//! left-to-right pass:
//!
//! 1. The left fold `c0 op0 c1 op1 c2 ...` is re-nested into chains that use
//!    a single operator (`#a | #b & #c` becomes `(#a | #b) & #c`).
//! 2. Spells whose scope does not match the context are absent and dropped.
//!    A group whose children are all absent is itself absent, negated or not.
//! 3. Unscoped `#all` is TRUE and `!#all` is FALSE; identities are dropped and
//!    a dominating constant replaces the whole chain.
//! 4. Un-negated child chains using the same operator are flattened.
//! 5. Chain members are sorted and exact duplicates removed.
//! 6. A chain of one collapses into its member, combining negation.
//!
//! Every step preserves the boolean value of the tree. Only the order in
//! which members are tried (and therefore the reported trace) changes.

use super::ast::{Combinator, Context, Group, Leaf, Node, ReplacementRule};
use super::kind::SpellKind;

/// Canonicalize `raw` for `context`
///
/// With `context == None` no spell is pruned; this is the context-free form
/// used for fingerprinting. Returns `None` when nothing is left, meaning no
/// post can match.
pub fn optimize(raw: &Group, context: Option<&Context>) -> Option<Group> {
    let reduced = reduce_group(raw.clone(), context)?;
    let root = match reduced {
        Node::Group(group) if !group.negated => group,
        other => Group::single(other),
    };

    log_debug!(
        "optimized {} spells into {} for {:?}",
        raw.leaves().len(),
        root.leaves().len(),
        context
    );
    Some(root)
}

/// Keep the replacement rules active under `context`, preserving order
pub fn filter_rules(rules: &[ReplacementRule], context: Option<&Context>) -> Vec<ReplacementRule> {
    rules
        .iter()
        .filter(|rule| context.map_or(true, |c| c.admits(rule.scope.as_ref())))
        .cloned()
        .collect()
}

fn reduce_node(node: Node, context: Option<&Context>) -> Option<Node> {
    match node {
        Node::Leaf(leaf) => {
            let active = context.map_or(true, |c| c.admits(leaf.scope.as_ref()));
            active.then_some(Node::Leaf(leaf))
        }
        Node::Group(group) => reduce_group(group, context),
    }
}

fn reduce_group(group: Group, context: Option<&Context>) -> Option<Node> {
    let negated = group.negated;
    let mut children = group.children.into_iter();
    let first = children.next()?;

    // Members of the current single-operator segment, already reduced
    let mut segment = vec![reduce_node(first.node, context)];
    let mut segment_op: Option<Combinator> = None;
    let mut link = first.op;

    for child in children {
        if let Some(op) = segment_op {
            if op != link {
                let folded = fold_chain(op, segment, false);
                segment = vec![folded];
            }
        }
        segment_op = Some(link);
        link = child.op;
        segment.push(reduce_node(child.node, context));
    }

    fold_chain(segment_op.unwrap_or(Combinator::Or), segment, negated)
}

/// Fold one single-operator chain of reduced members (`None` = absent)
fn fold_chain(op: Combinator, members: Vec<Option<Node>>, negated: bool) -> Option<Node> {
    // TRUE for AND, FALSE for OR
    let identity = op == Combinator::And;

    let mut kept: Vec<Node> = Vec::with_capacity(members.len());
    let mut saw_identity = false;

    for node in members.into_iter().flatten() {
        match constant_value(&node) {
            Some(value) if value == identity => {
                saw_identity = true;
                continue;
            }
            Some(value) => return Some(constant(value != negated)),
            None => {}
        }

        match node {
            Node::Group(group) if !group.negated && chain_op(&group) == Some(op) => {
                kept.extend(group.children.into_iter().map(|c| c.node));
            }
            other => kept.push(other),
        }
    }

    if kept.is_empty() {
        return saw_identity.then(|| constant(identity != negated));
    }

    kept.sort();
    kept.dedup();

    if kept.len() == 1 {
        let node = kept.remove(0);
        return Some(if negated { node.negate() } else { node });
    }

    let mut group = Group::chain(op, kept);
    group.negated = negated;
    Some(Node::Group(group))
}

fn constant_value(node: &Node) -> Option<bool> {
    match node {
        Node::Leaf(leaf) => leaf.as_constant(),
        Node::Group(_) => None,
    }
}

fn constant(value: bool) -> Node {
    let leaf = Leaf::new(SpellKind::All);
    Node::Leaf(if value { leaf } else { leaf.negate() })
}

/// Operator of a canonical chain
fn chain_op(group: &Group) -> Option<Combinator> {
    match group.children.as_slice() {
        [first, _, ..] => Some(first.op),
        _ => None,
    }
}
