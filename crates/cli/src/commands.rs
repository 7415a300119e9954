//! Subcommand implementations

use memostore::{CacheContext, CacheOutcome, Error, Traced};
use memostore_cache::{
    ArgValue, Args, Call, DeterministicArchive, Fingerprint, FunctionId, IDENTITY_ENTRY,
    RESULT_ENTRY, entry_names, read_entry,
};
use memostore_remote::CacheStore;
use miette::{IntoDiagnostic, Result};
use std::fmt::Write as _;
use std::sync::Arc;

/// Fingerprint of a call, and where its entry lives
pub fn fingerprint(
    id: &str,
    args: Vec<ArgValue>,
    kwargs: Vec<(String, ArgValue)>,
    store_prefix: &str,
) -> Result<String> {
    let mut call_args = Args::new();
    for value in args {
        call_args = call_args.arg(value);
    }
    for (name, value) in kwargs {
        call_args = call_args.kwarg(name, value);
    }
    let call = Call::new(FunctionId::from_text(id), call_args);
    let archive = DeterministicArchive::build(&call)?;
    let fingerprint = Fingerprint::of(archive.as_bytes());
    Ok(format!(
        "fingerprint: {fingerprint}\nobject key:  {}\narchive:     {} bytes",
        fingerprint.object_key(store_prefix),
        archive.len()
    ))
}

/// Whether an entry is present in the store
pub async fn exists(store: &CacheStore, fingerprint: &str) -> Result<String> {
    let fingerprint = Fingerprint::parse(fingerprint)?;
    let present = store.exists(&fingerprint).await?;
    Ok(format!(
        "{} {}",
        store.key_for(&fingerprint),
        if present { "present" } else { "absent" }
    ))
}

/// Describe the entries of a cached archive
pub async fn inspect(store: &CacheStore, fingerprint: &str) -> Result<String> {
    let fingerprint = Fingerprint::parse(fingerprint)?;
    let archive = store.fetch(&fingerprint).await?;
    describe_archive(&archive)
}

fn describe_archive(archive: &[u8]) -> Result<String> {
    let mut out = String::new();
    for name in entry_names(archive)? {
        let content = read_entry(archive, &name)?;
        let line = if name == RESULT_ENTRY {
            format!("{name}  ({} bytes, encoded)", content.len())
        } else {
            let text = String::from_utf8_lossy(&content);
            if name == IDENTITY_ENTRY {
                format!("{name}  {text}")
            } else {
                format!("{name}  {}", preview(&text))
            }
        };
        writeln!(out, "{line}").into_diagnostic()?;
    }
    Ok(out)
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 64;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{head}...")
    }
}

/// Provision the configured namespace, reporting failure
pub async fn bootstrap(store: &CacheStore) -> Result<String> {
    store.ensure_namespace().await?;
    Ok(format!("{} store ready", store.backend_name()))
}

fn outcome_label(outcome: &CacheOutcome) -> String {
    match outcome {
        CacheOutcome::Hit => "cache hit".to_string(),
        CacheOutcome::Stored => "computed, stored".to_string(),
        CacheOutcome::StoreFailed(e) => format!("computed, store failed: {e}"),
        CacheOutcome::Bypassed(e) => format!("computed, cache unavailable: {e}"),
    }
}

fn report<T: std::fmt::Display>(out: &mut String, label: &str, traced: &Traced<T>) -> Result<()> {
    writeln!(
        out,
        "{label} = {}  [{}] {}",
        traced.value,
        traced.fingerprint,
        outcome_label(&traced.outcome)
    )
    .into_diagnostic()
}

/// Run a blocking and an async example computation twice each.
///
/// Takes the context by value: the blocking half runs on a worker thread so
/// the CLI's runtime stays free.
pub async fn demo(context: Arc<CacheContext>) -> Result<String> {
    let mut out = String::new();

    let blocking_context = Arc::clone(&context);
    let blocking = tokio::task::spawn_blocking(move || {
        let poly = blocking_context.wrap_blocking(
            FunctionId::new("demo_poly", "v1"),
            |(x, y): (i64, i64)| Ok::<_, Error>(x * y + x * x - y * y),
        );
        let first = poly.call_traced((3, 4))?;
        let second = poly.call_traced((3, 4))?;
        Ok::<_, Error>((first, second))
    })
    .await
    .into_diagnostic()??;
    report(&mut out, "poly(3, 4)", &blocking.0)?;
    report(&mut out, "poly(3, 4)", &blocking.1)?;

    let diff = context.wrap_async(
        FunctionId::new("demo_diff_of_squares", "v1"),
        |(x, y): (i64, i64)| async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok::<_, Error>((x + y) * (x - y))
        },
    );
    let first = diff.call_traced((5, 2)).await?;
    let second = diff.call_traced((5, 2)).await?;
    report(&mut out, "diff(5, 2)", &first)?;
    report(&mut out, "diff(5, 2)", &second)?;

    Ok(out)
}
