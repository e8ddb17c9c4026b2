//! Live-reload broadcast hub.
//!
//! Tasks publish a [`ReloadEvent`] after writing outputs; the dev server
//! forwards each event to connected browsers. Sends never block and are
//! dropped when nobody is listening.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// What the browser should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Swap the matching stylesheet in place
    Css,
    /// Reload the page
    Full,
}

/// A reload notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    pub kind: ReloadKind,
    /// URL path of the changed file relative to the served root
    pub path: Option<String>,
}

impl ReloadEvent {
    pub fn css(path: impl Into<String>) -> Self {
        Self { kind: ReloadKind::Css, path: Some(path.into()) }
    }

    pub fn full(path: Option<String>) -> Self {
        Self { kind: ReloadKind::Full, path }
    }

    /// JSON payload sent over the event stream.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"kind":"full","path":null}"#.to_string())
    }
}

/// Cloneable sender side of the reload channel.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to every subscriber.
    pub fn notify(&self, event: ReloadEvent) {
        tracing::debug!(kind = ?event.kind, path = ?event.path, "reload");
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_subscribers_is_noop() {
        let hub = ReloadHub::new();
        hub.notify(ReloadEvent::full(None));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let hub = ReloadHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.clone().subscribe();

        hub.notify(ReloadEvent::css("/css/main.css"));

        assert_eq!(a.recv().await.unwrap(), ReloadEvent::css("/css/main.css"));
        assert_eq!(b.recv().await.unwrap().kind, ReloadKind::Css);
    }

    #[test]
    fn test_json_payload() {
        assert_eq!(ReloadEvent::css("/css/main.css").to_json(), r#"{"kind":"css","path":"/css/main.css"}"#);
        assert_eq!(ReloadEvent::full(None).to_json(), r#"{"kind":"full","path":null}"#);
    }
}
