//! Stream ingest: gates transport-stream fragments and feeds the demultiplexer.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, trace};

use crate::engine::Demuxer;
use crate::errors::BridgeError;
use crate::model::DecodeEvent;

/// One fragment pushed by the host, as received on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamFragment {
    Bytes(Vec<u8>),
    Base64(String),
}

impl StreamFragment {
    /// Raw bytes of the fragment.
    ///
    /// Malformed base64 yields [`BridgeError::Protocol`].
    pub fn into_bytes(self) -> Result<Vec<u8>, BridgeError> {
        match self {
            StreamFragment::Bytes(bytes) => Ok(bytes),
            StreamFragment::Base64(text) => STANDARD
                .decode(text.as_bytes())
                .map_err(|e| BridgeError::protocol(format!("invalid base64 fragment: {}", e))),
        }
    }
}

/// Fragment counters, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub forwarded: u64,
    pub suspended: u64,
    pub malformed: u64,
    pub bytes: u64,
}

pub struct StreamIngest {
    demuxer: Box<dyn Demuxer>,
    stats: IngestStats,
}

impl StreamIngest {
    pub fn new(demuxer: Box<dyn Demuxer>) -> Self {
        Self {
            demuxer,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Feeds one fragment to the demultiplexer.
    ///
    /// When `suspended` the fragment is discarded before decoding and the
    /// demultiplexer is not called. `time` is informational only.
    pub fn ingest(
        &mut self,
        fragment: StreamFragment,
        time: Option<f64>,
        suspended: bool,
    ) -> Result<Vec<DecodeEvent>, BridgeError> {
        if suspended {
            self.stats.suspended += 1;
            trace!("Fragment discarded, one-seg content not launched");
            return Ok(Vec::new());
        }

        let bytes = match fragment.into_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.malformed += 1;
                return Err(e);
            }
        };

        self.stats.forwarded += 1;
        self.stats.bytes += bytes.len() as u64;
        let events = self.demuxer.parse(&bytes);
        if !events.is_empty() {
            debug!(
                len = bytes.len(),
                events = events.len(),
                ?time,
                "Fragment decoded"
            );
        }
        Ok(events)
    }
}

impl std::fmt::Debug for StreamIngest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIngest")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
