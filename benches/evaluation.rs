//! Benchmarks for the compile pipeline and post evaluation
//!
//! Three stages are measured:
//! 1. Parse - source text to raw tree
//! 2. Compile - parse, optimize and fingerprint for one board
//! 3. Evaluate - one post, a batch, and a batch through the decision cache
//!
//! Run with: cargo bench --bench evaluation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::executor::block_on;
use postspell::spells::{compile, parse, Context, DecisionCache, Engine, PostFacts};

/// A rule set of the size users typically keep
fn rule_set() -> String {
    let mut lines = Vec::new();
    for n in 0..40 {
        lines.push(format!("#words(unwanted phrase {})", n));
    }
    lines.push("#sage & #tlen(0-10)".to_string());
    lines.push("(#name(Troll) | #trip(!!abc123)) & !#op".to_string());
    lines.push("#exp(/buy (now|cheap)/i) & #img".to_string());
    lines.push("#wipe[b](samelines,capslock)".to_string());
    lines.push("#num[b,-](1-5) & #subj(/sale/i)".to_string());
    lines.push("#rep(/colour/,color)".to_string());
    lines.join("\n")
}

fn posts() -> Vec<PostFacts> {
    (1..=200)
        .map(|n| {
            PostFacts::new(n)
                .position(n)
                .sage(n % 7 == 0)
                .original_post(n == 1)
                .name(if n % 13 == 0 { "Troll" } else { "Anonymous" })
                .text(format!("post number {} with some ordinary text in it", n))
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let source = rule_set();
    c.bench_function("parse", |b| b.iter(|| parse(black_box(&source))));
}

fn bench_compile(c: &mut Criterion) {
    let source = rule_set();
    let context = Context::board("b");
    c.bench_function("compile", |b| {
        b.iter(|| compile(black_box(&source), black_box(&context)))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let ruleset = compile(&rule_set(), &Context::board("b")).unwrap();
    let engine = Engine::default();
    let posts = posts();

    let mut g = c.benchmark_group("evaluate");
    g.bench_function("single", |b| {
        b.iter(|| block_on(engine.evaluate(&ruleset, black_box(&posts[12]))))
    });
    g.bench_function("batch_200", |b| {
        b.iter(|| block_on(engine.evaluate_batch(&ruleset, black_box(&posts))))
    });
    g.bench_function("cached_200", |b| {
        let mut cache = DecisionCache::default();
        b.iter(|| {
            for post in &posts {
                black_box(block_on(engine.evaluate_cached(&ruleset, post, &mut cache)));
            }
        })
    });
    g.finish();
}

criterion_group!(benches, bench_parse, bench_compile, bench_evaluate);
criterion_main!(benches);
