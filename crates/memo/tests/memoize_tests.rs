//! End-to-end behavior of memoized computations over in-process stores.

use async_trait::async_trait;
use memostore::{
    Args, Blob, CacheContext, CacheOutcome, CacheStore, Error, Fingerprint, FunctionId, StoreError,
};
use memostore_remote::{LocalStore, MemoryStore, ObjectStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug)]
enum AppError {
    Memo(Error),
    Rejected(i64),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::Memo(e)
    }
}

fn memory_context() -> (Arc<CacheContext>, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let ctx = CacheContext::new(CacheStore::with_default_prefix(memory.clone()));
    (ctx, memory)
}

/// Object store whose reads or writes can be made to fail
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_get: bool,
    fail_put: bool,
}

#[async_trait]
impl ObjectStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn exists(&self, key: &str) -> memostore_remote::Result<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> memostore_remote::Result<Vec<u8>> {
        if self.fail_get {
            return Err(StoreError::connection("get", "connection reset by peer"));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> memostore_remote::Result<()> {
        if self.fail_put {
            return Err(StoreError::permission_denied(
                "put",
                key,
                "caller lacks storage.objects.create",
            ));
        }
        self.inner.put(key, body, content_type).await
    }

    async fn ensure_namespace(&self) -> memostore_remote::Result<()> {
        Ok(())
    }
}

#[test]
fn repeated_blocking_call_runs_once() {
    let (ctx, memory) = memory_context();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let poly = ctx.wrap_blocking(FunctionId::new("poly", "v1"), move |(x, y): (i64, i64)| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Error>(x * y + x * x - y * y)
    });

    let first = poly.call_traced((3, 4)).unwrap();
    assert_eq!(first.value, 5);
    assert!(matches!(first.outcome, CacheOutcome::Stored));

    let second = poly.call_traced((3, 4)).unwrap();
    assert_eq!(second.value, 5);
    assert!(second.outcome.is_hit());
    assert_eq!(second.fingerprint, first.fingerprint);

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(memory.len(), 1);
    assert_eq!(
        memory.keys(),
        vec![format!("cache/{}.zip", first.fingerprint)]
    );
}

#[test]
fn different_arguments_get_different_entries() {
    let (ctx, memory) = memory_context();
    let poly = ctx.wrap_blocking(FunctionId::new("poly", "v1"), |(x, y): (i64, i64)| {
        Ok::<_, Error>(x * y + x * x - y * y)
    });

    let a = poly.call_traced((3, 4)).unwrap();
    let b = poly.call_traced((2, 3)).unwrap();
    assert_eq!(a.value, 5);
    assert_eq!(b.value, 1);
    assert_ne!(a.fingerprint, b.fingerprint);
    assert_eq!(memory.len(), 2);
}

#[test]
fn identity_separates_computations() {
    let (ctx, _memory) = memory_context();
    let add = ctx.wrap_blocking(FunctionId::new("add", "v1"), |(x, y): (i64, i64)| {
        Ok::<_, Error>(x + y)
    });
    let mul = ctx.wrap_blocking(FunctionId::new("mul", "v1"), |(x, y): (i64, i64)| {
        Ok::<_, Error>(x * y)
    });

    assert_eq!(add.call((3, 4)).unwrap(), 7);
    assert_eq!(mul.call((3, 4)).unwrap(), 12);
}

#[test]
fn blocking_computation_can_call_another_memoized_computation() {
    let (ctx, memory) = memory_context();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let increment = ctx.wrap_blocking(FunctionId::new("increment", "v1"), |(x,): (i64,)| {
        Ok::<_, Error>(x + 1)
    });
    let double_next = ctx.wrap_blocking(FunctionId::new("double_next", "v1"), move |(x,): (i64,)| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Error>(increment.call((x,))? * 2)
    });

    assert_eq!(double_next.call((20,)).unwrap(), 42);
    let again = double_next.call_traced((20,)).unwrap();
    assert_eq!(again.value, 42);
    assert!(again.outcome.is_hit());

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    // One entry for each computation
    assert_eq!(memory.len(), 2);
}

#[tokio::test]
async fn nested_blocking_calls_inside_async_runtime() {
    let (ctx, memory) = memory_context();
    let square = ctx.wrap_blocking(FunctionId::new("square", "v1"), |(x,): (i64,)| {
        Ok::<_, Error>(x * x)
    });
    let sum_of_squares = ctx.wrap_blocking(
        FunctionId::new("sum_of_squares", "v1"),
        move |(x, y): (i64, i64)| Ok::<_, Error>(square.call((x,))? + square.call((y,))?),
    );

    assert_eq!(sum_of_squares.call((3, 4)).unwrap(), 25);
    assert_eq!(memory.len(), 3);
}

#[tokio::test]
async fn async_computation_matches_blocking_behavior() {
    let (ctx, memory) = memory_context();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let diff = ctx.wrap_async(FunctionId::new("diff_of_squares", "v1"), move |(x, y): (i64, i64)| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, Error>((x + y) * (x - y))
        }
    });

    let first = diff.call_traced((5, 2)).await.unwrap();
    let second = diff.call_traced((5, 2)).await.unwrap();

    assert_eq!(first.value, 21);
    assert_eq!(second.value, 21);
    assert!(matches!(first.outcome, CacheOutcome::Stored));
    assert!(second.outcome.is_hit());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(memory.len(), 1);
}

#[test]
fn upstream_error_passes_through_and_stores_nothing() {
    let (ctx, memory) = memory_context();
    let checked = ctx.wrap_blocking(FunctionId::new("checked", "v1"), |(x,): (i64,)| {
        if x < 0 {
            Err(AppError::Rejected(x))
        } else {
            Ok(x * 2)
        }
    });

    assert!(matches!(checked.call((-3,)), Err(AppError::Rejected(-3))));
    assert!(memory.is_empty());

    assert_eq!(checked.call((3,)).unwrap(), 6);
    assert_eq!(memory.len(), 1);
}

#[tokio::test]
async fn upstream_error_in_async_computation_stores_nothing() {
    let (ctx, memory) = memory_context();
    let checked = ctx.wrap_async(FunctionId::new("checked_async", "v1"), |(x,): (i64,)| async move {
        Err::<i64, _>(AppError::Rejected(x))
    });

    assert!(matches!(checked.call((9,)).await, Err(AppError::Rejected(9))));
    assert!(memory.is_empty());
}

#[test]
fn failed_write_still_returns_value() {
    let flaky = Arc::new(FlakyStore {
        fail_put: true,
        ..FlakyStore::default()
    });
    let ctx = CacheContext::new(CacheStore::with_default_prefix(flaky.clone()));
    let square = ctx.wrap_blocking(FunctionId::new("square", "v1"), |(x,): (i64,)| {
        Ok::<_, Error>(x * x)
    });

    let traced = square.call_traced((7,)).unwrap();
    assert_eq!(traced.value, 49);
    assert!(matches!(
        traced.outcome,
        CacheOutcome::StoreFailed(StoreError::PermissionDenied { .. })
    ));
    assert!(flaky.inner.is_empty());
}

#[test]
fn failed_read_bypasses_cache() {
    let flaky = Arc::new(FlakyStore {
        fail_get: true,
        ..FlakyStore::default()
    });
    let ctx = CacheContext::new(CacheStore::with_default_prefix(flaky.clone()));
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let square = ctx.wrap_blocking(FunctionId::new("square", "v1"), move |(x,): (i64,)| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Error>(x * x)
    });

    for _ in 0..2 {
        let traced = square.call_traced((7,)).unwrap();
        assert_eq!(traced.value, 49);
        assert!(matches!(
            traced.outcome,
            CacheOutcome::Bypassed(StoreError::Connection { .. })
        ));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(flaky.inner.is_empty());
}

#[tokio::test]
async fn blocking_call_inside_async_runtime_does_not_panic() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = CacheContext::new(CacheStore::with_default_prefix(Arc::new(LocalStore::new(
        tmp.path(),
    ))));
    let poly = ctx.wrap_blocking(FunctionId::new("poly", "v1"), |(x, y): (i64, i64)| {
        Ok::<_, Error>(x * y + x * x - y * y)
    });

    assert_eq!(poly.call((3, 4)).unwrap(), 5);
    let again = poly.call_traced((3, 4)).unwrap();
    assert!(again.outcome.is_hit());
    assert!(
        tmp.path()
            .join(format!("cache/{}.zip", again.fingerprint))
            .is_file()
    );
}

#[test]
fn binary_arguments_are_keyed_by_content() {
    let (ctx, _memory) = memory_context();
    let checksum = ctx.wrap_blocking(FunctionId::new("checksum", "v1"), |(blob,): (Vec<u8>,)| {
        Ok::<_, Error>(blob.iter().map(|b| u64::from(*b)).sum::<u64>())
    });

    let a = checksum.call_traced((vec![0_u8, 1, 2, 3],)).unwrap();
    let b = checksum.call_traced((vec![3_u8, 2, 1, 0],)).unwrap();
    assert_eq!(a.value, b.value);
    assert_ne!(a.fingerprint, b.fingerprint);
    assert!(matches!(b.outcome, CacheOutcome::Stored));
}

#[test]
fn named_argument_order_hits_same_entry() {
    let (ctx, _memory) = memory_context();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let render = ctx.wrap_blocking(FunctionId::new("render", "v2"), move |args: Args| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Error>(format!("{} named", args.named().len()))
    });

    let first = render
        .call_traced(Args::new().arg("invoice").kwarg("lang", "pl").kwarg("dpi", 300))
        .unwrap();
    let second = render
        .call_traced(Args::new().arg("invoice").kwarg("dpi", 300).kwarg("lang", "pl"))
        .unwrap();

    assert_eq!(first.fingerprint, second.fingerprint);
    assert!(second.outcome.is_hit());
    assert_eq!(second.value, "2 named");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn text_and_binary_results_keep_their_types() {
    let (ctx, _memory) = memory_context();
    let text = ctx.wrap_blocking(FunctionId::new("text", "v1"), |(): ()| {
        Ok::<_, Error>("dummy_text_result".to_string())
    });
    let binary = ctx.wrap_blocking(FunctionId::new("binary", "v1"), |(): ()| {
        Ok::<_, Error>(b"dummy_binary_result\x00\xff".to_vec())
    });

    text.call(()).unwrap();
    binary.call(()).unwrap();

    let cached_text = text.call_traced(()).unwrap();
    let cached_binary = binary.call_traced(()).unwrap();
    assert!(cached_text.outcome.is_hit());
    assert!(cached_binary.outcome.is_hit());
    assert_eq!(cached_text.value, "dummy_text_result");
    assert_eq!(cached_binary.value, b"dummy_binary_result\x00\xff".to_vec());
}

#[test]
fn blob_results_are_cached_compactly() {
    let (ctx, memory) = memory_context();
    let render = ctx.wrap_blocking(FunctionId::new("render_pdf", "v1"), |(pages,): (u32,)| {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.resize(pdf.len() + pages as usize * 512, 0xff);
        Ok::<_, Error>(Blob(pdf))
    });

    let fresh = render.call_traced((4,)).unwrap();
    let cached = render.call_traced((4,)).unwrap();
    assert!(cached.outcome.is_hit());
    assert_eq!(cached.value, fresh.value);
    assert!(cached.value.0.starts_with(b"%PDF-1.7"));

    let key = format!("cache/{}.zip", fresh.fingerprint);
    let stored = memostore_cache::read_entry(&memory.object(&key).unwrap().body, "result").unwrap();
    assert!(stored.len() < fresh.value.0.len() + 16);
}

#[test]
fn concurrent_misses_converge_on_one_entry() {
    let (ctx, memory) = memory_context();
    let slow = ctx.wrap_blocking(FunctionId::new("slow", "v1"), |(x,): (i64,)| {
        std::thread::sleep(Duration::from_millis(20));
        Ok::<_, Error>(x + 1)
    });

    let fingerprints: Vec<Fingerprint> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| slow.call_traced((41,)).unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                let traced = h.join().unwrap();
                assert_eq!(traced.value, 42);
                traced.fingerprint
            })
            .collect()
    });

    assert!(fingerprints.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(memory.len(), 1);
}

#[tokio::test]
async fn cancelled_async_call_leaves_no_entry() {
    let (ctx, memory) = memory_context();
    let never = ctx.wrap_async(FunctionId::new("never", "v1"), |(): ()| async {
        std::future::pending::<Result<i64, Error>>().await
    });

    let outcome = tokio::time::timeout(Duration::from_millis(20), never.call(())).await;
    assert!(outcome.is_err());
    assert!(memory.is_empty());
}

#[test]
fn unrepresentable_argument_surfaces_as_wrapper_error() {
    let (ctx, memory) = memory_context();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let scale = ctx.wrap_blocking(FunctionId::new("scale", "v1"), move |(x,): (f64,)| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, AppError>(x * 2.0)
    });

    match scale.call((f64::NAN,)) {
        Err(AppError::Memo(Error::Cache(memostore_cache::Error::Serialization { .. }))) => {}
        other => panic!("expected a serialization failure, got {other:?}"),
    }
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(memory.get_count(), 0);
}
