//! Integration tests for post evaluation
//!
//! These tests cover:
//! - The end-to-end scenarios from source text to verdict
//! - Asynchronous spells through mock providers
//! - Failed lookups and backoff requests
//! - Batches and the decision cache

use async_trait::async_trait;
use postspell::spells::{
    compile, Attachment, Context, DecisionCache, Engine, NoProviders, Pause, PostFacts,
    ProviderError, Providers, Scheduler, SchedulerConfig, VideoMetadata, VideoRef,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn board() -> Context {
    Context::board("b")
}

async fn evaluate(source: &str, post: &PostFacts) -> bool {
    let ruleset = compile(source, &board()).expect("source should compile");
    Engine::default().evaluate(&ruleset, post).await.matched
}

/// Providers answering from fixed tables
#[derive(Default)]
struct TableProviders {
    signatures: HashMap<String, u64>,
    videos: HashMap<String, VideoMetadata>,
    /// Number of leading calls answered with a backoff request
    backoffs: AtomicUsize,
    calls: AtomicUsize,
}

impl TableProviders {
    fn signature(mut self, id: &str, signature: u64) -> Self {
        self.signatures.insert(id.to_string(), signature);
        self
    }

    fn video(mut self, id: &str, title: &str, author: &str) -> Self {
        self.videos.insert(
            id.to_string(),
            VideoMetadata {
                title: title.to_string(),
                author: author.to_string(),
                views: None,
            },
        );
        self
    }

    fn backoff_first(self, count: usize) -> Self {
        self.backoffs.store(count, Ordering::SeqCst);
        self
    }

    fn take_backoff(&self) -> Result<(), ProviderError> {
        let remaining = self.backoffs.load(Ordering::SeqCst);
        if remaining > 0 {
            self.backoffs.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Backoff(Pause::For(Duration::from_millis(500))));
        }
        Ok(())
    }
}

#[async_trait]
impl Providers for TableProviders {
    async fn image_signature(&self, attachment: &Attachment) -> Result<u64, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.take_backoff()?;
        self.signatures
            .get(&attachment.id)
            .copied()
            .ok_or_else(|| ProviderError::Failed(format!("no image {}", attachment.id)))
    }

    async fn video_metadata(&self, video: &VideoRef) -> Result<VideoMetadata, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.take_backoff()?;
        self.videos
            .get(&video.id)
            .cloned()
            .ok_or_else(|| ProviderError::Failed(format!("no video {}", video.id)))
    }
}

fn engine_with(providers: Arc<TableProviders>) -> Engine {
    Engine::new(providers, Arc::new(Scheduler::new()))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_sage_without_flag() {
    assert!(!evaluate("#sage", &PostFacts::new(1)).await);
}

#[tokio::test]
async fn test_words_case_insensitive() {
    let post = PostFacts::new(1).text("this is SPAM here");
    assert!(evaluate("#words(spam)", &post).await);
}

#[tokio::test]
async fn test_op_with_text_length() {
    let short = PostFacts::new(1).original_post(true).text("abc");
    assert!(evaluate("#op & #tlen(0-5)", &short).await);

    let long = PostFacts::new(1).original_post(true).text("x".repeat(50));
    assert!(!evaluate("#op & #tlen(0-5)", &long).await);
}

#[tokio::test]
async fn test_negated_trip() {
    let signed = PostFacts::new(1).signature("ABC123");
    assert!(!evaluate("!#trip(ABC123)", &signed).await);
    assert!(evaluate("!#trip(ABC123)", &PostFacts::new(2)).await);
}

#[tokio::test]
async fn test_group_with_negation() {
    let source = "(#name(John) | #trip(XYZ)) & !#op";
    let reply = PostFacts::new(2).position(2).name("John Smith");
    assert!(evaluate(source, &reply).await);

    let original = PostFacts::new(1).original_post(true).name("John Smith");
    assert!(!evaluate(source, &original).await);
}

#[tokio::test]
async fn test_scoped_out_spell_never_fires() {
    let ruleset = compile("#all[boardA]", &Context::board("boardB")).unwrap();
    assert!(ruleset.filter.is_none());
    let verdict = Engine::default().evaluate(&ruleset, &PostFacts::new(1)).await;
    assert!(!verdict.matched);

    // Even negated, an absent spell does not decide anything
    let negated = compile("!#all[boardA]", &Context::board("boardB")).unwrap();
    assert!(negated.filter.is_none());
}

#[tokio::test]
async fn test_reason_lists_deciding_spells() {
    let ruleset = compile("#sage & #words(spam) | #op", &board()).unwrap();
    let post = PostFacts::new(5).sage(true).text("Spam!");
    let verdict = Engine::default().evaluate(&ruleset, &post).await;
    assert!(verdict.matched);
    assert_eq!(verdict.reason().as_deref(), Some("#words(spam) & #sage"));
}

// ============================================================================
// Asynchronous Spells
// ============================================================================

#[tokio::test]
async fn test_ihash_uses_provider() {
    let providers = Arc::new(TableProviders::default().signature("a1", 0xff00));
    let engine = engine_with(providers.clone());
    let ruleset = compile("#ihash(0xff01)", &board()).unwrap();

    let post = PostFacts::new(1).attachment(Attachment::new("x.png", "a1"));
    assert!(engine.evaluate(&ruleset, &post).await.matched);
    assert_eq!(providers.calls.load(Ordering::SeqCst), 1);

    // Far away hash
    let far = compile("#ihash(0x00ff)", &board()).unwrap();
    assert!(!engine.evaluate(&far, &post).await.matched);
}

#[tokio::test]
async fn test_known_signature_skips_provider() {
    let providers = Arc::new(TableProviders::default());
    let engine = engine_with(providers.clone());
    let ruleset = compile("#ihash(42)", &board()).unwrap();

    let post = PostFacts::new(1).attachment(Attachment::new("x.png", "a1").signature(42));
    assert!(engine.evaluate(&ruleset, &post).await.matched);
    assert_eq!(providers.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_video_title_and_author() {
    let providers = Arc::new(TableProviders::default().video("v1", "Cat compilation", "Alice"));
    let engine = engine_with(providers);
    let post = PostFacts::new(1).video(VideoRef::new("youtube", "v1"));

    let title = compile("#video(/cat/i)", &board()).unwrap();
    assert!(engine.evaluate(&title, &post).await.matched);

    let author = compile("#vauthor(alice)", &board()).unwrap();
    assert!(engine.evaluate(&author, &post).await.matched);

    let other = compile("#vauthor(bob)", &board()).unwrap();
    assert!(!engine.evaluate(&other, &post).await.matched);
}

#[tokio::test]
async fn test_cheap_spells_decide_before_lookups() {
    let providers = Arc::new(TableProviders::default().signature("a1", 1));
    let engine = engine_with(providers.clone());
    let ruleset = compile("#ihash(1) & #sage", &board()).unwrap();

    let post = PostFacts::new(1).attachment(Attachment::new("x.png", "a1"));
    assert!(!engine.evaluate(&ruleset, &post).await.matched);
    assert_eq!(providers.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_failed_lookup_is_no_match() {
    let engine = Engine::new(Arc::new(NoProviders), Arc::new(Scheduler::new()));
    let post = PostFacts::new(1).attachment(Attachment::new("x.png", "a1"));

    let ruleset = compile("#ihash(1)", &board()).unwrap();
    assert!(!engine.evaluate(&ruleset, &post).await.matched);

    // The next attachment is still considered
    let post = post.attachment(Attachment::new("y.png", "a2").signature(1));
    assert!(engine.evaluate(&ruleset, &post).await.matched);
}

#[tokio::test]
async fn test_failed_lookup_never_hides_through_negation() {
    let engine = Engine::new(Arc::new(NoProviders), Arc::new(Scheduler::new()));
    let post = PostFacts::new(1).video(VideoRef::new("youtube", "v1"));

    for source in ["!#vauthor(bob)", "!#video(/cat/)", "#sage | !#vauthor(bob)"] {
        let ruleset = compile(source, &board()).unwrap();
        let verdict = engine.evaluate(&ruleset, &post).await;
        assert!(!verdict.matched, "{} hid a post it could not look at", source);
        assert_eq!(verdict.reason(), None);
    }

    // A resolved author still lets the negation match
    let video = VideoRef::new("youtube", "v2").resolved(VideoMetadata {
        title: "Dogs".to_string(),
        author: "alice".to_string(),
        views: None,
    });
    let resolved = PostFacts::new(2).video(video);
    let ruleset = compile("!#vauthor(bob)", &board()).unwrap();
    assert!(engine.evaluate(&ruleset, &resolved).await.matched);
}

#[tokio::test]
async fn test_failed_lookup_is_not_cached() {
    let engine = Engine::new(Arc::new(NoProviders), Arc::new(Scheduler::new()));
    let ruleset = compile("#ihash(1)", &board()).unwrap();
    let post = PostFacts::new(9).attachment(Attachment::new("x.png", "a1"));

    let mut cache = DecisionCache::default();
    engine.evaluate_cached(&ruleset, &post, &mut cache).await;
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_retries_after_pause() {
    let providers = Arc::new(TableProviders::default().signature("a1", 7).backoff_first(1));
    let scheduler = Arc::new(Scheduler::new());
    let engine = Engine::new(providers.clone(), scheduler.clone());
    let ruleset = compile("#ihash(7)", &board()).unwrap();
    let post = PostFacts::new(1).attachment(Attachment::new("x.png", "a1"));

    let start = tokio::time::Instant::now();
    assert!(engine.evaluate(&ruleset, &post).await.matched);
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(providers.calls.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.stats().backoffs, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_evaluation_is_cancelled() {
    let providers = Arc::new(TableProviders::default().signature("a1", 7));
    let scheduler = Arc::new(Scheduler::new());
    scheduler.pause(Pause::Indefinite);
    let engine = Engine::new(providers.clone(), scheduler.clone());
    let ruleset = compile("#ihash(7)", &board()).unwrap();
    let post = PostFacts::new(1).attachment(Attachment::new("x.png", "a1"));

    let pending = engine.evaluate(&ruleset, &post);
    assert!(tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .is_err());

    scheduler.resume();
    assert_eq!(providers.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Batches and Caching
// ============================================================================

/// Providers that answer after a per-item delay
struct SlowProviders {
    delays: HashMap<String, u64>,
}

impl SlowProviders {
    fn new(ids: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self {
            delays: ids.into_iter().collect(),
        }
    }

    async fn wait(&self, id: &str) -> Result<u64, ProviderError> {
        let delay = *self
            .delays
            .get(id)
            .ok_or_else(|| ProviderError::Failed(format!("unknown {}", id)))?;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(delay)
    }
}

#[async_trait]
impl Providers for SlowProviders {
    async fn image_signature(&self, attachment: &Attachment) -> Result<u64, ProviderError> {
        // The delay doubles as the hash
        self.wait(&attachment.id).await
    }

    async fn video_metadata(&self, video: &VideoRef) -> Result<VideoMetadata, ProviderError> {
        let delay = self.wait(&video.id).await?;
        Ok(VideoMetadata {
            title: format!("clip {}", delay),
            author: if delay % 2 == 0 { "even" } else { "odd" }.to_string(),
            views: None,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_verdicts_do_not_depend_on_lookup_timing() {
    // Later posts resolve first, and some lookups fail
    let delays = (0..12u64).map(|n| (format!("m{}", n), 240 - n * 20));
    let providers = Arc::new(SlowProviders::new(delays));
    let scheduler = Arc::new(Scheduler::with_config(
        SchedulerConfig::default().with_max_concurrent(3),
    ));
    let engine = Engine::new(providers, scheduler);

    let posts: Vec<PostFacts> = (0..14u64)
        .map(|n| {
            PostFacts::new(n)
                .sage(n % 3 == 0)
                .text(if n % 4 == 0 { "buy now" } else { "hello" })
                .attachment(Attachment::new("x.png", format!("m{}", n)))
                .video(VideoRef::new("youtube", format!("m{}", (n + 5) % 14)))
        })
        .collect();

    let sources = [
        "#ihash(200) | #sage & #vauthor(even)",
        "!#vauthor(odd) & #words(buy)",
        "#video(/clip 1/) | (#sage & !#ihash(0))",
    ];
    for source in sources {
        let ruleset = compile(source, &board()).unwrap();
        let batch = engine.evaluate_batch(&ruleset, &posts).await;

        let mut reversed: Vec<PostFacts> = posts.clone();
        reversed.reverse();
        let mut reversed_batch = engine.evaluate_batch(&ruleset, &reversed).await;
        reversed_batch.reverse();

        for (post, verdict) in posts.iter().zip(&batch) {
            let alone = engine.evaluate(&ruleset, post).await;
            let at = format!("{} on post {}", source, post.number);
            assert_eq!(verdict.matched, alone.matched, "{}", at);
            assert_eq!(verdict.triggered, alone.triggered, "{}", at);
        }
        assert_eq!(batch, reversed_batch, "{}", source);
    }
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let ruleset = compile("#sage", &board()).unwrap();
    let posts: Vec<PostFacts> = (1..=6)
        .map(|n| PostFacts::new(n).sage(n % 2 == 0))
        .collect();

    let verdicts = Engine::default().evaluate_batch(&ruleset, &posts).await;
    let matched: Vec<bool> = verdicts.iter().map(|v| v.matched).collect();
    assert_eq!(matched, vec![false, true, false, true, false, true]);
}

#[tokio::test]
async fn test_batch_shares_lookup_bound() {
    let mut providers = TableProviders::default();
    for n in 0..8 {
        providers = providers.signature(&format!("a{}", n), n);
    }
    let providers = Arc::new(providers);
    let scheduler = Arc::new(Scheduler::with_config(
        SchedulerConfig::default().with_max_concurrent(2),
    ));
    let engine = Engine::new(providers.clone(), scheduler.clone());
    let ruleset = compile("#ihash(0)", &board()).unwrap();

    let posts: Vec<PostFacts> = (0..8)
        .map(|n| PostFacts::new(n).attachment(Attachment::new("x.png", format!("a{}", n))))
        .collect();
    let verdicts = engine.evaluate_batch(&ruleset, &posts).await;

    // Hashes 0..8 differ from 0 in at most 3 bits
    assert!(verdicts.iter().all(|v| v.matched));
    assert_eq!(scheduler.stats().dispatched, 8);
}

#[tokio::test]
async fn test_cache_reuses_and_invalidates() {
    let engine = Engine::default();
    let mut cache = DecisionCache::default();
    let post = PostFacts::new(3).sage(true);

    let sage = compile("#sage", &board()).unwrap();
    assert!(engine.evaluate_cached(&sage, &post, &mut cache).await.matched);
    assert!(engine.evaluate_cached(&sage, &post, &mut cache).await.matched);
    let (hits, misses, _) = cache.stats();
    assert_eq!((hits, misses), (1, 1));

    // New rules drop the cached verdict
    let op = compile("#op", &board()).unwrap();
    assert!(!engine.evaluate_cached(&op, &post, &mut cache).await.matched);
    assert_eq!(cache.len(), 1);
}
