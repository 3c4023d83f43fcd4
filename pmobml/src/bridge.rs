//! Entry points of the controller.
//!
//! [`HostBridge`] is the synchronous dispatcher: raw host messages in, at
//! most one reply out. [`spawn_bridge`] wraps it in a tokio task fed by an
//! unbounded mailbox, so host messages, document engine notifications and
//! document requests from any task are handled one at a time, in arrival
//! order. Network fetches are the only operations that leave the task: they
//! run on their own and answer the caller directly.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::Controller;
use crate::model::{DocumentEvent, InputRequest};
use crate::network::{GetResult, IpClient, TransmitResult};
use crate::protocol::{EngineMessage, HostMessage, InputCancelReason};

/// Synchronous dispatcher in front of a [`Controller`].
#[derive(Debug)]
pub struct HostBridge {
    controller: Controller,
}

impl HostBridge {
    pub fn new(controller: Controller) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn into_inner(self) -> Controller {
        self.controller
    }

    pub fn dispatch(&mut self, message: HostMessage) -> Option<EngineMessage> {
        if !matches!(
            message,
            HostMessage::Stream { .. } | HostMessage::StreamBase64 { .. }
        ) {
            debug!(kind = message.kind(), "Host message");
        }
        self.controller.handle_host_message(message)
    }

    /// Parses and dispatches one raw message. Unknown or malformed messages
    /// are dropped.
    pub fn dispatch_json(&mut self, raw: &str) -> Option<EngineMessage> {
        match HostMessage::from_json(raw) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                warn!(error = %e, "Dropping host message");
                None
            }
        }
    }
}

/// Commands accepted by the bridge task.
#[derive(Debug)]
pub enum BridgeCommand {
    Host {
        message: HostMessage,
        reply: Option<oneshot::Sender<Option<EngineMessage>>>,
    },
    Document(DocumentEvent),
    RequestMainAudioStream {
        component_id: u16,
        channel_id: Option<u8>,
        reply: oneshot::Sender<bool>,
    },
    LaunchInput {
        request: InputRequest,
        reply: oneshot::Sender<oneshot::Receiver<String>>,
    },
    CancelInput {
        reason: InputCancelReason,
    },
    Tune {
        original_network_id: u16,
        transport_stream_id: u16,
        service_id: u16,
        reply: oneshot::Sender<bool>,
    },
    StartResidentApp {
        app_name: String,
        ex_info: Vec<String>,
        reply: oneshot::Sender<Option<i32>>,
    },
    GregGet {
        index: u32,
        reply: oneshot::Sender<String>,
    },
    GregSet {
        index: u32,
        value: String,
    },
    IsIpConnected {
        reply: oneshot::Sender<i32>,
    },
    Get {
        uri: String,
        reply: oneshot::Sender<GetResult>,
    },
    Transmit {
        uri: String,
        body: String,
        reply: oneshot::Sender<TransmitResult>,
    },
    Shutdown,
}

/// Cloneable handle on a running bridge task.
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeCommand>,
}

/// Starts the bridge task; it stops on [`BridgeHandle::shutdown`] or when
/// every handle is dropped, and returns the controller.
pub fn spawn_bridge(controller: Controller, ip: Arc<IpClient>) -> (BridgeHandle, JoinHandle<Controller>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(HostBridge::new(controller), ip, rx));
    (BridgeHandle { tx }, handle)
}

async fn run(
    mut bridge: HostBridge,
    ip: Arc<IpClient>,
    mut rx: mpsc::UnboundedReceiver<BridgeCommand>,
) -> Controller {
    info!("Bridge task started");
    while let Some(command) = rx.recv().await {
        let controller = bridge.controller_mut();
        match command {
            BridgeCommand::Host { message, reply } => {
                let answer = bridge.dispatch(message);
                if let Some(reply) = reply {
                    let _ = reply.send(answer);
                }
            }
            BridgeCommand::Document(event) => controller.handle_document_event(event),
            BridgeCommand::RequestMainAudioStream {
                component_id,
                channel_id,
                reply,
            } => {
                let _ = reply.send(controller.request_main_audio_stream(component_id, channel_id));
            }
            BridgeCommand::LaunchInput { request, reply } => {
                let _ = reply.send(controller.launch_input(request));
            }
            BridgeCommand::CancelInput { reason } => controller.cancel_input(reason),
            BridgeCommand::Tune {
                original_network_id,
                transport_stream_id,
                service_id,
                reply,
            } => {
                let _ = reply.send(controller.tune(
                    original_network_id,
                    transport_stream_id,
                    service_id,
                ));
            }
            BridgeCommand::StartResidentApp {
                app_name,
                ex_info,
                reply,
            } => {
                let _ = reply.send(controller.start_resident_app(&app_name, &ex_info));
            }
            BridgeCommand::GregGet { index, reply } => {
                let _ = reply.send(controller.greg_get(index));
            }
            BridgeCommand::GregSet { index, value } => controller.greg_set(index, value),
            BridgeCommand::IsIpConnected { reply } => {
                let _ = reply.send(controller.is_ip_connected());
            }
            BridgeCommand::Get { uri, reply } => {
                // Gate decided now, in message order; the fetch itself runs detached
                let allowed = controller.network_allowed();
                let ip = ip.clone();
                tokio::spawn(async move {
                    let _ = reply.send(ip.get(allowed, &uri).await);
                });
            }
            BridgeCommand::Transmit { uri, body, reply } => {
                let allowed = controller.network_allowed();
                let ip = ip.clone();
                tokio::spawn(async move {
                    let _ = reply.send(ip.transmit(allowed, &uri, body).await);
                });
            }
            BridgeCommand::Shutdown => break,
        }
    }
    info!("Bridge task stopped");
    bridge.into_inner()
}

impl BridgeHandle {
    fn send(&self, command: BridgeCommand) {
        if self.tx.send(command).is_err() {
            warn!("Bridge task is gone, command dropped");
        }
    }

    /// Fire-and-forget host message.
    pub fn post(&self, message: HostMessage) {
        self.send(BridgeCommand::Host {
            message,
            reply: None,
        });
    }

    /// Host message with its reply (`None` for fire-and-forget kinds).
    pub async fn request(&self, message: HostMessage) -> Option<EngineMessage> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::Host {
            message,
            reply: Some(reply),
        });
        rx.await.ok().flatten()
    }

    pub fn document_event(&self, event: DocumentEvent) {
        self.send(BridgeCommand::Document(event));
    }

    pub async fn request_main_audio_stream(&self, component_id: u16, channel_id: Option<u8>) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::RequestMainAudioStream {
            component_id,
            channel_id,
            reply,
        });
        rx.await.unwrap_or(false)
    }

    /// Launches a host input; the outer await returns once the request is
    /// posted, the inner receiver yields the entered value.
    pub async fn launch_input(&self, request: InputRequest) -> Option<oneshot::Receiver<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::LaunchInput { request, reply });
        rx.await.ok()
    }

    pub fn cancel_input(&self, reason: InputCancelReason) {
        self.send(BridgeCommand::CancelInput { reason });
    }

    pub async fn tune(&self, original_network_id: u16, transport_stream_id: u16, service_id: u16) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::Tune {
            original_network_id,
            transport_stream_id,
            service_id,
            reply,
        });
        rx.await.unwrap_or(false)
    }

    pub async fn start_resident_app(&self, app_name: String, ex_info: Vec<String>) -> Option<i32> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::StartResidentApp {
            app_name,
            ex_info,
            reply,
        });
        rx.await.ok().flatten()
    }

    pub async fn greg_get(&self, index: u32) -> String {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::GregGet { index, reply });
        rx.await.unwrap_or_default()
    }

    pub fn greg_set(&self, index: u32, value: String) {
        self.send(BridgeCommand::GregSet { index, value });
    }

    pub async fn is_ip_connected(&self) -> i32 {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::IsIpConnected { reply });
        rx.await.unwrap_or(0)
    }

    pub fn connection_type(&self) -> i32 {
        crate::network::CONNECTION_TYPE
    }

    pub async fn get(&self, uri: impl Into<String>) -> GetResult {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::Get {
            uri: uri.into(),
            reply,
        });
        rx.await.unwrap_or_default()
    }

    pub async fn transmit_text_data_over_ip(
        &self,
        uri: impl Into<String>,
        body: impl Into<String>,
    ) -> TransmitResult {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::Transmit {
            uri: uri.into(),
            body: body.into(),
            reply,
        });
        rx.await.unwrap_or_else(|_| TransmitResult::failed())
    }

    pub fn shutdown(&self) {
        self.send(BridgeCommand::Shutdown);
    }
}
