//! Single-slot text input negotiation with the host.
//!
//! The document engine launches an input; the host shows its own editor and
//! answers with `changeInput` (value) or `cancelInput`. The pending
//! continuation is a oneshot sender: completing it consumes it, so a second
//! `changeInput` has nothing left to complete.

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::engine::HostSink;
use crate::model::InputRequest;
use crate::protocol::{EngineMessage, InputCancelReason};

#[derive(Debug, Default)]
pub struct InputSessionManager {
    pending: Option<oneshot::Sender<String>>,
}

impl InputSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts a new input session, cancelling the active one first.
    ///
    /// The returned receiver yields the value entered on the host, or an
    /// error if the session is cancelled or replaced.
    pub fn launch(
        &mut self,
        request: InputRequest,
        host: &mut dyn HostSink,
    ) -> oneshot::Receiver<String> {
        if self.is_active() {
            self.cancel(InputCancelReason::Other, host);
        }

        info!(
            character_type = %request.character_type,
            max_length = request.max_length,
            "Launching host input"
        );
        host.post(EngineMessage::Input {
            character_type: request.character_type,
            max_length: request.max_length,
            value: request.value,
            allowed_characters: request.allowed_characters,
            input_mode: request.input_mode,
            multiline: request.multiline,
        });

        let (tx, rx) = oneshot::channel();
        self.pending = Some(tx);
        rx
    }

    /// Cancellation decided on the engine side; the host is told why.
    pub fn cancel(&mut self, reason: InputCancelReason, host: &mut dyn HostSink) {
        if self.pending.take().is_some() {
            debug!(?reason, "Input session cancelled");
            host.post(EngineMessage::CancelInput { reason });
        }
    }

    /// Host entered a value. Returns `true` if a session was completed.
    pub fn complete(&mut self, value: String) -> bool {
        match self.pending.take() {
            Some(tx) => {
                if tx.send(value).is_err() {
                    debug!("Input completed but nobody awaits the value anymore");
                }
                true
            }
            None => {
                debug!("changeInput without an active input session");
                false
            }
        }
    }

    /// Host closed its editor. The continuation is dropped, never invoked.
    pub fn abandon(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::InputMode;

    fn request(value: &str) -> InputRequest {
        InputRequest {
            character_type: "all".to_string(),
            max_length: 20,
            value: value.to_string(),
            allowed_characters: None,
            input_mode: InputMode::Text,
            multiline: false,
        }
    }

    #[test]
    fn test_complete_delivers_value_once() {
        let mut manager = InputSessionManager::new();
        let mut host: Vec<EngineMessage> = Vec::new();

        let mut rx = manager.launch(request(""), &mut host);
        assert!(manager.is_active());
        assert!(manager.complete("hello".to_string()));
        assert!(!manager.is_active());
        assert_eq!(rx.try_recv().unwrap(), "hello");

        assert!(!manager.complete("again".to_string()));
        assert!(!manager.abandon());
    }

    #[test]
    fn test_relaunch_cancels_before_new_request() {
        let mut manager = InputSessionManager::new();
        let mut host: Vec<EngineMessage> = Vec::new();

        let mut first = manager.launch(request("a"), &mut host);
        let _second = manager.launch(request("b"), &mut host);

        let kinds: Vec<&str> = host.iter().map(EngineMessage::kind).collect();
        assert_eq!(kinds, vec!["input", "cancelInput", "input"]);
        assert_eq!(
            host[1],
            EngineMessage::CancelInput {
                reason: InputCancelReason::Other
            }
        );
        assert!(first.try_recv().is_err());
    }

    #[test]
    fn test_abandon_drops_continuation() {
        let mut manager = InputSessionManager::new();
        let mut host: Vec<EngineMessage> = Vec::new();

        let mut rx = manager.launch(request(""), &mut host);
        assert!(manager.abandon());
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        // Host-side cancel is not echoed back to the host
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn test_engine_cancel_without_session_is_silent() {
        let mut manager = InputSessionManager::new();
        let mut host: Vec<EngineMessage> = Vec::new();
        manager.cancel(InputCancelReason::Other, &mut host);
        assert!(host.is_empty());
    }
}
