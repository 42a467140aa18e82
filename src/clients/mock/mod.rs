//! Scripted metrics provider for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::interfaces::{MetricsError, MetricsProvider};
use crate::model::PostMetrics;

/// One scripted answer for a post.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Metrics(PostMetrics),
    Fail(MetricsError),
    /// Panic inside the fetch, to exercise task isolation.
    Panic,
}

/// Mock metrics provider.
///
/// Each post has a queue of responses. Queued responses are consumed in
/// order until one remains, which then repeats. Unscripted posts fail with
/// `NotFound`.
#[derive(Default)]
pub struct MockMetricsProvider {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: AtomicUsize,
}

impl MockMetricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `post_ref` with `views` views.
    pub async fn set_views(&self, post_ref: &str, views: u64) {
        self.set_response(
            post_ref,
            ScriptedResponse::Metrics(PostMetrics {
                view_count: views,
                ..Default::default()
            }),
        )
        .await;
    }

    /// Replace the script for `post_ref` with a single repeating response.
    pub async fn set_response(&self, post_ref: &str, response: ScriptedResponse) {
        self.scripts
            .lock()
            .await
            .insert(post_ref.to_string(), VecDeque::from([response]));
    }

    /// Append a response to the script for `post_ref`.
    pub async fn push_response(&self, post_ref: &str, response: ScriptedResponse) {
        self.scripts
            .lock()
            .await
            .entry(post_ref.to_string())
            .or_default()
            .push_back(response);
    }

    /// Total fetches made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsProvider for MockMetricsProvider {
    async fn fetch(&self, post_ref: &str) -> Result<PostMetrics, MetricsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let response = {
            let mut scripts = self.scripts.lock().await;
            match scripts.get_mut(post_ref) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(ScriptedResponse::Metrics(metrics)) => Ok(metrics),
            Some(ScriptedResponse::Fail(err)) => Err(err),
            Some(ScriptedResponse::Panic) => panic!("scripted panic for {}", post_ref),
            None => Err(MetricsError::NotFound(post_ref.to_string())),
        }
    }
}
