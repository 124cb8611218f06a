use ravel_types::event::AgentEvent;

/// Receives progress notifications in the order they happen.
///
/// Implementations must not block: `notify` is called inline while a stream
/// is being consumed.
pub trait AgentObserver: Send + Sync {
    fn notify(&self, event: &AgentEvent);
}

impl<F> AgentObserver for F
where
    F: Fn(&AgentEvent) + Send + Sync,
{
    fn notify(&self, event: &AgentEvent) {
        self(event)
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AgentObserver for NoopObserver {
    fn notify(&self, _event: &AgentEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravel_types::event::RunMeta;
    use std::sync::Mutex;

    #[test]
    fn closure_observer_receives_events() {
        let seen = Mutex::new(Vec::new());
        let observer = |event: &AgentEvent| seen.lock().unwrap().push(event.kind());

        observer.notify(&AgentEvent::Error {
            meta: RunMeta::new("assistant"),
            error: "boom".to_string(),
        });

        assert_eq!(*seen.lock().unwrap(), vec!["error"]);
    }
}
