//! # PMOBml - Data-broadcasting bridge controller
//!
//! Bridges a host shell (which owns the tuner feed and the window) with a
//! broadcast-document engine (BML). The host pushes transport-stream
//! fragments and commands as tagged JSON messages; the controller feeds the
//! demultiplexer, keeps the caption clock and the audio stream table up to
//! date, negotiates text input and reports geometry and service state back.
//!
//! ```text
//!                 HostMessage                     DecodeEvent
//!  host shell ───────────────▶ HostBridge ──▶ Controller ◀──────── Demuxer
//!      ▲                                         │   │
//!      └──────────── EngineMessage ◀─────────────┘   └──▶ DocumentEngine,
//!                                                          CaptionRenderer,
//!                                                          Presentation
//! ```
//!
//! Everything the controller drives is a trait in [`engine`]; the bridge only
//! holds state and routes. All handlers run on one owner: [`bridge::spawn_bridge`]
//! provides the tokio mailbox that serializes them.

pub mod audio;
pub mod bridge;
pub mod clock;
pub mod config_ext;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod geometry;
pub mod greg;
pub mod indicator;
pub mod ingest;
pub mod input;
pub mod model;
pub mod network;
pub mod nvram;
pub mod protocol;
pub mod resident_app;
pub mod session;
pub mod status;

pub use audio::{AudioElementaryStream, AudioEsTable, StreamAddress};
pub use bridge::{spawn_bridge, BridgeCommand, BridgeHandle, HostBridge};
pub use clock::{pcr_to_millis, ClockSynchronizer};
pub use config_ext::{BridgeConfigExt, BridgeSettings};
pub use controller::{Collaborators, Controller};
pub use engine::{
    CaptionRenderer, Demuxer, DocumentEngine, HostSink, Presentation, SystemTimeSource, TimeSource,
};
pub use errors::BridgeError;
pub use geometry::{ContentLayout, VideoRect};
pub use greg::GregRegisters;
pub use indicator::RemoteControlIndicator;
pub use ingest::{IngestStats, StreamFragment, StreamIngest};
pub use input::InputSessionManager;
pub use model::{ComponentPmt, DecodeEvent, DocumentEvent, ExtraFields, InputRequest};
pub use network::{GetResult, IpClient, IpTransport, ReqwestTransport, TransmitResult};
pub use nvram::{FileNvram, MemoryNvram, NvramStore, NvramWriteFlags};
pub use protocol::{EngineMessage, HostMessage, InputCancelReason, InputMode};
pub use resident_app::{start_resident_app, ResidentAppLaunch};
pub use session::{ServiceIds, Session, SessionPhase};
pub use status::StatusIndicator;
