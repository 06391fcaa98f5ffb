use crate::errors::DispatchError;
use crate::metrics_defs::{DISPATCH_DURATION, DISPATCH_FAILURES};
use crate::telegram::{MessageId, MessageSender};
use serde::Serialize;
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Result of delivering the notification to one recipient
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub success: bool,
    pub chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl DispatchOutcome {
    fn delivered(chat_id: String, message_id: MessageId, elapsed: Duration) -> Self {
        Self {
            success: true,
            chat_id,
            message_id: Some(message_id),
            error: None,
            duration_ms: millis(elapsed),
        }
    }

    fn failed(chat_id: String, error: &DispatchError, elapsed: Duration) -> Self {
        Self {
            success: false,
            chat_id,
            message_id: None,
            error: Some(error.to_string()),
            duration_ms: millis(elapsed),
        }
    }
}

/// Per-recipient outcomes, one per recipient, in recipient order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DispatchResult {
    outcomes: Vec<DispatchOutcome>,
}

impl DispatchResult {
    pub fn outcomes(&self) -> &[DispatchOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.success)
    }

    /// Caller-facing cause for the first failed recipient, in recipient
    /// order. The full list stays available through `outcomes`.
    pub fn first_failure(&self) -> Option<String> {
        self.outcomes
            .iter()
            .find(|outcome| !outcome.success)
            .map(|outcome| {
                format!(
                    "Failed to send to chat {}: {}",
                    outcome.chat_id,
                    outcome.error.as_deref().unwrap_or("unknown error")
                )
            })
    }
}

/// Fans one notification out to every recipient and joins on all of them
#[derive(Clone)]
pub struct Dispatcher {
    sender: Arc<dyn MessageSender>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn MessageSender>, timeout: Duration) -> Self {
        Self { sender, timeout }
    }

    /// Sends `text` to each recipient concurrently.
    ///
    /// Every call is bounded by the dispatcher timeout on its own; a slow or
    /// failing recipient never cancels its siblings. The returned result
    /// holds exactly one outcome per recipient in the order given, whatever
    /// order the calls complete in.
    pub async fn dispatch(
        &self,
        bot_token: &str,
        recipients: &[String],
        text: &str,
    ) -> DispatchResult {
        let bot_token: Arc<str> = Arc::from(bot_token);
        let text: Arc<str> = Arc::from(text);

        let mut join_set = JoinSet::new();
        let mut task_to_index = HashMap::new();

        for (index, chat_id) in recipients.iter().enumerate() {
            let sender = self.sender.clone();
            let bot_token = bot_token.clone();
            let text = text.clone();
            let chat_id = chat_id.clone();
            let timeout_duration = self.timeout;

            let handle = join_set.spawn(async move {
                let outcome =
                    send_with_timeout(sender, &bot_token, chat_id, &text, timeout_duration).await;
                (index, outcome)
            });
            task_to_index.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<DispatchOutcome>> = vec![None; recipients.len()];

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => {
                    let Some(&index) = task_to_index.get(&e.id()) else {
                        tracing::error!(error = %e, "Unknown delivery task failed");
                        continue;
                    };
                    let chat_id = recipients[index].clone();
                    tracing::error!(chat_id = %chat_id, error = %e, "Delivery task panicked");
                    counter!(DISPATCH_FAILURES).increment(1);
                    let error = DispatchError::TaskFailed(e.to_string());
                    slots[index] = Some(DispatchOutcome::failed(chat_id, &error, Duration::ZERO));
                }
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(recipients)
            .map(|(slot, chat_id)| {
                slot.unwrap_or_else(|| {
                    let error = DispatchError::TaskFailed("no result recorded".into());
                    DispatchOutcome::failed(chat_id.clone(), &error, Duration::ZERO)
                })
            })
            .collect();

        DispatchResult { outcomes }
    }
}

async fn send_with_timeout(
    sender: Arc<dyn MessageSender>,
    bot_token: &str,
    chat_id: String,
    text: &str,
    timeout_duration: Duration,
) -> DispatchOutcome {
    let started = Instant::now();
    tracing::debug!(chat_id = %chat_id, "Sending notification");

    let result = timeout(timeout_duration, sender.send_message(bot_token, &chat_id, text))
        .await
        .unwrap_or_else(|_| Err(DispatchError::Timeout(millis(timeout_duration))));
    let elapsed = started.elapsed();

    match result {
        Ok(message_id) => {
            histogram!(DISPATCH_DURATION, "outcome" => "delivered").record(elapsed.as_secs_f64());
            tracing::info!(
                chat_id = %chat_id,
                message_id,
                duration_ms = millis(elapsed),
                "Notification delivered"
            );
            DispatchOutcome::delivered(chat_id, message_id, elapsed)
        }
        Err(e) => {
            histogram!(DISPATCH_DURATION, "outcome" => "failed").record(elapsed.as_secs_f64());
            counter!(DISPATCH_FAILURES).increment(1);
            tracing::warn!(
                chat_id = %chat_id,
                error = %e,
                duration_ms = millis(elapsed),
                "Notification delivery failed"
            );
            DispatchOutcome::failed(chat_id, &e, elapsed)
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
