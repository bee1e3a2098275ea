// Batch tree fetcher.
// Warms many directory trees at once: the disk-cached subset costs zero
// network calls, the rest is fetched with a bounded number of requests in
// flight so a large warm-up cannot trample the upstream rate limit.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::{StreamExt, stream};
use tracing::{debug, warn};

use crate::error::Result;
use crate::github::TreeEntry;

use super::disk::DiskCache;

/// Disk-cache key for a directory tree snapshot.
pub(crate) fn tree_key(path: &str) -> String {
    format!("tree:{}", path)
}

/// Fetch the trees for `paths`, consulting `disk` first and fetching the
/// remainder through `fetch` with at most `concurrency` requests in flight.
///
/// Failed fetches are logged and omitted: a missing key in the result means
/// "unknown", not "empty directory". Successes are written through to disk.
pub(crate) async fn fetch_trees<F, Fut>(
    disk: &DiskCache,
    paths: &[String],
    ttl: Duration,
    concurrency: usize,
    fetch: F,
) -> HashMap<String, Vec<TreeEntry>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<TreeEntry>>>,
{
    let mut results = HashMap::new();
    let mut missing = Vec::new();

    for path in paths {
        match disk.get::<Vec<TreeEntry>>(&tree_key(path), None) {
            Some(entries) => {
                results.insert(path.clone(), entries);
            }
            None => missing.push(path.clone()),
        }
    }
    debug!(
        cached = results.len(),
        missing = missing.len(),
        "partitioned tree batch"
    );

    let fetched: Vec<(String, Result<Vec<TreeEntry>>)> =
        stream::iter(missing.into_iter().map(|path| {
            let fut = fetch(path.clone());
            async move { (path, fut.await) }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (path, result) in fetched {
        match result {
            Ok(entries) => {
                disk.set(&tree_key(&path), &entries, ttl);
                results.insert(path, entries);
            }
            Err(e) => {
                warn!(path, error = %e, "tree fetch failed, omitting from batch result");
            }
        }
    }

    results
}
