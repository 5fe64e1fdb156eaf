//! Push-notification sink boundary.
//!
//! Push delivery is fire-and-forget: the sink reports a per-token tally that
//! the core only logs. A real FCM adapter implements this trait in
//! production; `LogPushSink` stands in elsewhere.

use async_trait::async_trait;
use std::collections::HashMap;

/// Per-token delivery outcome of one `send_push` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushTally {
    pub success: usize,
    pub failure: usize,
}

#[async_trait]
pub trait PushSink: Send + Sync {
    /// Attempts delivery to each token independently. Never fails as a call;
    /// individual token failures show up in the tally.
    async fn send_push(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &HashMap<String, String>,
    ) -> PushTally;
}

/// Logs instead of sending. Used until a push backend is wired.
pub struct LogPushSink;

#[async_trait]
impl PushSink for LogPushSink {
    async fn send_push(
        &self,
        tokens: &[String],
        title: &str,
        _body: &str,
        _data: &HashMap<String, String>,
    ) -> PushTally {
        tracing::info!(tokens = tokens.len(), title = %title, "push sink (log only)");
        PushTally {
            success: tokens.len(),
            failure: 0,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct PushCall {
        pub tokens: Vec<String>,
        pub title: String,
        pub body: String,
        pub data: HashMap<String, String>,
    }

    /// Records every call; tokens listed in `fail_tokens` count as failures.
    #[derive(Default)]
    pub struct RecordingPushSink {
        pub calls: Mutex<Vec<PushCall>>,
        pub fail_tokens: HashSet<String>,
    }

    impl RecordingPushSink {
        pub fn failing(tokens: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_tokens: tokens.iter().map(|t| t.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl PushSink for RecordingPushSink {
        async fn send_push(
            &self,
            tokens: &[String],
            title: &str,
            body: &str,
            data: &HashMap<String, String>,
        ) -> PushTally {
            self.calls.lock().unwrap().push(PushCall {
                tokens: tokens.to_vec(),
                title: title.to_string(),
                body: body.to_string(),
                data: data.clone(),
            });
            let failure = tokens
                .iter()
                .filter(|t| self.fail_tokens.contains(*t))
                .count();
            PushTally {
                success: tokens.len() - failure,
                failure,
            }
        }
    }
}
