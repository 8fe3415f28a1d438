//! Fan-out over every tracked account, fan-in once they have all settled.
//!
//! Failures never escape as panics: each failed account is logged and
//! recorded in the [`FetchSummary`], and only a failed account list is
//! returned as an error.

use super::{FeedData, FeedMessage, FeedSource, FetchError, FetchSummary, Post};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Upper bound on in-flight account requests. `None` dispatches them all at once.
    pub concurrency: Option<usize>,
}

impl FetchOptions {
    fn in_flight(&self, accounts: usize) -> usize {
        self.concurrency.unwrap_or(accounts).max(1)
    }
}

/// Fetch one account's posts, logging the failure before handing it back.
pub async fn fetch_posts_for_account<S>(
    source: &S,
    account: &str,
) -> Result<Vec<Post>, FetchError>
where
    S: FeedSource + ?Sized,
{
    match source.posts(account).await {
        Ok(posts) => Ok(posts),
        Err(e) => {
            tracing::warn!(account, error = %e, "GET account posts failed");
            Err(e)
        }
    }
}

/// Load the account list, then every account's posts concurrently.
///
/// `on_each` runs once per account that loaded, in completion order.
/// `on_all_complete` runs exactly once after every account request settled,
/// failed ones included, and immediately when there are no accounts. It never
/// runs if the account list itself could not be fetched.
pub async fn fetch_all_accounts<S, E, C>(
    source: &S,
    options: &FetchOptions,
    mut on_each: E,
    on_all_complete: C,
) -> Result<FetchSummary, FetchError>
where
    S: FeedSource + ?Sized,
    E: FnMut(&str, Vec<Post>),
    C: FnOnce(),
{
    let summary = fetch_each(source, options, |account, result| {
        if let Ok(posts) = result {
            on_each(account.as_str(), posts);
        }
    })
    .await?;

    on_all_complete();
    Ok(summary)
}

/// Run [`fetch_all_accounts`] on a background task and report through a channel.
///
/// Every settled account produces one message, `Posts` or `Error`. A final
/// `Complete` message (with no account) follows them. If the account list
/// fails, a single account-less `Error` is sent instead and the channel closes.
pub fn spawn_fetch_all(
    source: Arc<dyn FeedSource>,
    options: FetchOptions,
) -> mpsc::UnboundedReceiver<FeedMessage> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let per_account = tx.clone();
        let result = fetch_each(source.as_ref(), &options, move |account, result| {
            let data = match result {
                Ok(posts) => FeedData::Posts(posts),
                Err(e) => FeedData::Error(e.to_string()),
            };
            let _ = per_account.send(FeedMessage {
                account: Some(account),
                data,
            });
        })
        .await;

        let data = match result {
            Ok(summary) => FeedData::Complete(summary),
            Err(e) => FeedData::Error(e.to_string()),
        };
        let _ = tx.send(FeedMessage {
            account: None,
            data,
        });
    });

    rx
}

async fn fetch_each<S, F>(
    source: &S,
    options: &FetchOptions,
    mut on_settled: F,
) -> Result<FetchSummary, FetchError>
where
    S: FeedSource + ?Sized,
    F: FnMut(String, Result<Vec<Post>, FetchError>),
{
    let accounts = match source.accounts().await {
        Ok(accounts) => accounts,
        Err(e) => {
            tracing::error!(error = %e, "GET accounts failed");
            return Err(e);
        }
    };

    let mut summary = FetchSummary {
        accounts: accounts.len(),
        ..FetchSummary::default()
    };
    let limit = options.in_flight(accounts.len());
    tracing::info!(accounts = summary.accounts, limit, "fetching posts for all accounts");

    let mut settled = stream::iter(accounts.into_iter().map(move |account| async move {
        let result = fetch_posts_for_account(source, &account).await;
        (account, result)
    }))
    .buffer_unordered(limit);

    while let Some((account, result)) = settled.next().await {
        match &result {
            Ok(_) => summary.loaded += 1,
            Err(_) => summary.failed.push(account.clone()),
        }
        on_settled(account, result);
    }

    tracing::info!(
        loaded = summary.loaded,
        failed = summary.failed.len(),
        "all account fetches settled"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MemorySource {
        accounts: Option<Vec<String>>,
        posts: HashMap<String, Vec<Post>>,
        delays: HashMap<String, u64>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MemorySource {
        fn new(accounts: &[&str]) -> Self {
            Self {
                accounts: Some(accounts.iter().map(|a| a.to_string()).collect()),
                posts: HashMap::new(),
                delays: HashMap::new(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn broken() -> Self {
            Self {
                accounts: None,
                ..Self::new(&[])
            }
        }

        fn with_posts(mut self, account: &str, posts: Vec<Post>) -> Self {
            self.posts.insert(account.to_string(), posts);
            self
        }

        fn with_delay(mut self, account: &str, millis: u64) -> Self {
            self.delays.insert(account.to_string(), millis);
            self
        }
    }

    fn status_error(url: &str) -> FetchError {
        FetchError::Status {
            url: url.to_string(),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[async_trait]
    impl FeedSource for MemorySource {
        async fn accounts(&self) -> Result<Vec<String>, FetchError> {
            self.accounts.clone().ok_or_else(|| status_error("/accts"))
        }

        async fn posts(&self, account: &str) -> Result<Vec<Post>, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(millis) = self.delays.get(account) {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
            } else {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.posts
                .get(account)
                .cloned()
                .ok_or_else(|| status_error(&format!("/tweets/{}", account)))
        }
    }

    #[tokio::test]
    async fn test_zero_accounts_completes_without_callbacks() {
        let source = MemorySource::new(&[]);
        let mut each = 0;
        let mut done = 0;

        let summary = fetch_all_accounts(
            &source,
            &FetchOptions::default(),
            |_, _| each += 1,
            || done += 1,
        )
        .await
        .unwrap();

        assert_eq!(each, 0);
        assert_eq!(done, 1);
        assert_eq!(summary, FetchSummary::default());
    }

    #[tokio::test]
    async fn test_every_account_loaded_then_complete_once() {
        let source = MemorySource::new(&["a", "b", "c"])
            .with_posts("a", vec![json!({"id": 1})])
            .with_posts("b", vec![json!({"id": 2})])
            .with_posts("c", vec![]);
        let mut seen = Vec::new();
        let mut done = 0;

        let summary = fetch_all_accounts(
            &source,
            &FetchOptions::default(),
            |account, posts| seen.push((account.to_string(), posts)),
            || done += 1,
        )
        .await
        .unwrap();

        seen.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), vec![json!({"id": 1})]),
                ("b".to_string(), vec![json!({"id": 2})]),
                ("c".to_string(), vec![]),
            ]
        );
        assert_eq!(done, 1);
        assert_eq!(summary.loaded, 3);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn test_callbacks_follow_completion_order() {
        let source = MemorySource::new(&["slow", "fast"])
            .with_posts("slow", vec![json!(1)])
            .with_posts("fast", vec![json!(2)])
            .with_delay("slow", 50)
            .with_delay("fast", 1);
        let mut order = Vec::new();

        fetch_all_accounts(
            &source,
            &FetchOptions::default(),
            |account, _| order.push(account.to_string()),
            || {},
        )
        .await
        .unwrap();

        assert_eq!(order, vec!["fast".to_string(), "slow".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_account_still_counts_toward_completion() {
        let source = MemorySource::new(&["a", "missing", "b"])
            .with_posts("a", vec![json!({"id": 1})])
            .with_posts("b", vec![json!({"id": 2})]);
        let mut loaded = Vec::new();
        let mut done = 0;

        let summary = fetch_all_accounts(
            &source,
            &FetchOptions::default(),
            |account, _| loaded.push(account.to_string()),
            || done += 1,
        )
        .await
        .unwrap();

        loaded.sort();
        assert_eq!(loaded, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(done, 1);
        assert_eq!(summary.failed, vec!["missing".to_string()]);
        assert_eq!(summary.settled(), 3);
    }

    #[tokio::test]
    async fn test_account_list_failure_never_completes() {
        let source = MemorySource::broken();
        let mut done = 0;

        let result =
            fetch_all_accounts(&source, &FetchOptions::default(), |_, _| {}, || done += 1).await;

        assert!(matches!(result, Err(FetchError::Status { .. })));
        assert_eq!(done, 0);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let names = ["a", "b", "c", "d", "e", "f"];
        let mut source = MemorySource::new(&names);
        for name in names {
            source = source.with_posts(name, vec![]).with_delay(name, 10);
        }

        let options = FetchOptions {
            concurrency: Some(2),
        };
        let summary = fetch_all_accounts(&source, &options, |_, _| {}, || {})
            .await
            .unwrap();

        assert_eq!(summary.loaded, 6);
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_unbounded_dispatches_everything_at_once() {
        let names = ["a", "b", "c", "d"];
        let mut source = MemorySource::new(&names);
        for name in names {
            source = source.with_posts(name, vec![]).with_delay(name, 20);
        }

        fetch_all_accounts(&source, &FetchOptions::default(), |_, _| {}, || {})
            .await
            .unwrap();

        assert_eq!(source.peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fetch_posts_for_account_passes_errors_through() {
        let source = MemorySource::new(&["a"]).with_posts("a", vec![json!("p")]);

        assert_eq!(
            fetch_posts_for_account(&source, "a").await.unwrap(),
            vec![json!("p")]
        );
        assert!(fetch_posts_for_account(&source, "nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_spawn_fetch_all_reports_each_then_complete() {
        let source = MemorySource::new(&["a", "gone"]).with_posts("a", vec![json!({"id": 1})]);
        let mut rx = spawn_fetch_all(Arc::new(source), FetchOptions::default());

        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }

        assert_eq!(messages.len(), 3);
        let last = messages.pop().unwrap();
        assert!(last.account.is_none());
        match last.data {
            FeedData::Complete(summary) => {
                assert_eq!(summary.loaded, 1);
                assert_eq!(summary.failed, vec!["gone".to_string()]);
            }
            other => panic!("expected Complete, got {:?}", other),
        }

        for message in messages {
            match (message.account.as_deref(), message.data) {
                (Some("a"), FeedData::Posts(posts)) => assert_eq!(posts, vec![json!({"id": 1})]),
                (Some("gone"), FeedData::Error(_)) => {}
                (account, data) => panic!("unexpected message {:?} {:?}", account, data),
            }
        }
    }

    #[tokio::test]
    async fn test_spawn_fetch_all_account_list_failure() {
        let mut rx = spawn_fetch_all(Arc::new(MemorySource::broken()), FetchOptions::default());

        let message = rx.recv().await.unwrap();
        assert!(message.account.is_none());
        assert!(matches!(message.data, FeedData::Error(_)));
        assert!(rx.recv().await.is_none());
    }
}
