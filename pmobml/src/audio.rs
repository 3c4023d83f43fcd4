//! Audio elementary stream table and stream-switch resolution.
//!
//! The table is rebuilt from scratch on every PMT. Positions in it are only
//! meaningful for the snapshot that produced them: a host that answers with
//! an index computed against an older PMT may land on another component, or
//! on none. That behavior is part of the host protocol and is kept as is;
//! component ids and PIDs are the stable ways to address a stream.

use tracing::debug;

use crate::errors::BridgeError;
use crate::model::ComponentPmt;
use crate::protocol::EngineMessage;

/// Stream types recognized as audio (MPEG-1/2 audio, AAC, LATM, AC-3, DTS, E-AC-3...).
pub const AUDIO_STREAM_TYPES: [u8; 8] = [0x03, 0x04, 0x0f, 0x11, 0x81, 0x82, 0x83, 0x87];

pub fn is_audio_stream_type(stream_type: u8) -> bool {
    AUDIO_STREAM_TYPES.contains(&stream_type)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioElementaryStream {
    pub component_id: u16,
    pub pid: u16,
    pub stream_type: u8,
    pub data_component_id: Option<u16>,
}

impl From<&ComponentPmt> for AudioElementaryStream {
    fn from(component: &ComponentPmt) -> Self {
        Self {
            component_id: component.component_id,
            pid: component.pid,
            stream_type: component.stream_type,
            data_component_id: component.data_component_id,
        }
    }
}

/// How the host designates the audio stream it switched to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamAddress {
    ComponentId(u16),
    Pid(u16),
    /// Position in the most recent table snapshot.
    Index(i64),
}

impl StreamAddress {
    /// Picks the addressing mode from the optional message fields:
    /// component id first, then PID, then index.
    pub fn from_fields(
        component_id: Option<u16>,
        pid: Option<u16>,
        index: Option<i64>,
    ) -> Option<Self> {
        component_id
            .map(StreamAddress::ComponentId)
            .or(pid.map(StreamAddress::Pid))
            .or(index.map(StreamAddress::Index))
    }
}

#[derive(Clone, Debug, Default)]
pub struct AudioEsTable {
    streams: Vec<AudioElementaryStream>,
    generation: u64,
}

impl AudioEsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the table with the audio components of a PMT, sorted by component id.
    pub fn rebuild(&mut self, components: &[ComponentPmt]) {
        let mut streams: Vec<AudioElementaryStream> = components
            .iter()
            .filter(|c| is_audio_stream_type(c.stream_type))
            .map(AudioElementaryStream::from)
            .collect();
        streams.sort_by_key(|s| s.component_id);

        self.streams = streams;
        self.generation += 1;
        debug!(
            generation = self.generation,
            audio_streams = self.streams.len(),
            "Audio ES table rebuilt"
        );
    }

    pub fn streams(&self) -> &[AudioElementaryStream] {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Number of PMT snapshots seen so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn position_of_component(&self, component_id: u16) -> Option<usize> {
        self.streams
            .iter()
            .position(|s| s.component_id == component_id)
    }

    pub fn position_of_pid(&self, pid: u16) -> Option<usize> {
        self.streams.iter().position(|s| s.pid == pid)
    }

    pub fn get(&self, index: i64) -> Option<&AudioElementaryStream> {
        usize::try_from(index).ok().and_then(|i| self.streams.get(i))
    }

    /// Notification for a switch requested by the document engine.
    ///
    /// `None` when the component is not in the current table: no switch happens.
    pub fn main_audio_stream_request(
        &self,
        component_id: u16,
        channel_id: Option<u8>,
    ) -> Option<EngineMessage> {
        let index = self.position_of_component(component_id)?;
        let stream = &self.streams[index];
        Some(EngineMessage::ChangeMainAudioStream {
            component_id,
            pid: stream.pid,
            index,
            channel_id,
        })
    }

    /// Notification for a switch the document engine already performed.
    pub fn audio_stream_changed(&self, component_id: u16, channel_id: Option<u8>) -> EngineMessage {
        let index = self.position_of_component(component_id);
        EngineMessage::ChangeAudioStream {
            component_id,
            pid: index.map(|i| self.streams[i].pid),
            index: index.map_or(-1, |i| i as i64),
            channel_id,
        }
    }

    /// Resolves a host-side switch to the component id to apply.
    ///
    /// Component ids are passed through untouched; PIDs and indices are looked
    /// up in the current snapshot only.
    pub fn resolve(&self, address: StreamAddress) -> Result<u16, BridgeError> {
        let resolved = match address {
            StreamAddress::ComponentId(component_id) => Some(component_id),
            StreamAddress::Pid(pid) => self
                .position_of_pid(pid)
                .map(|i| self.streams[i].component_id),
            StreamAddress::Index(index) => self.get(index).map(|s| s.component_id),
        };
        resolved.ok_or_else(|| {
            BridgeError::resolution(format!(
                "{:?} not in PMT snapshot #{}",
                address, self.generation
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(component_id: u16, pid: u16, stream_type: u8) -> ComponentPmt {
        ComponentPmt::new(pid, stream_type, component_id, None)
    }

    fn sample_pmt() -> Vec<ComponentPmt> {
        vec![
            component(0x00, 0x0111, 0x02), // video
            component(0x11, 0x0113, 0x0f),
            component(0x30, 0x0130, 0x06), // captions
            component(0x10, 0x0112, 0x0f),
            component(0x12, 0x0114, 0x81),
        ]
    }

    #[test]
    fn test_rebuild_filters_and_sorts() {
        let mut table = AudioEsTable::new();
        table.rebuild(&sample_pmt());

        let ids: Vec<u16> = table.streams().iter().map(|s| s.component_id).collect();
        assert_eq!(ids, vec![0x10, 0x11, 0x12]);
        assert!(table
            .streams()
            .iter()
            .all(|s| is_audio_stream_type(s.stream_type)));
        assert_eq!(table.generation(), 1);
    }

    #[test]
    fn test_rebuild_replaces_previous_snapshot() {
        let mut table = AudioEsTable::new();
        table.rebuild(&sample_pmt());
        table.rebuild(&[component(0x20, 0x0200, 0x11)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.streams()[0].component_id, 0x20);
        assert_eq!(table.generation(), 2);
    }

    #[test]
    fn test_main_audio_stream_request() {
        let mut table = AudioEsTable::new();
        table.rebuild(&sample_pmt());

        assert_eq!(
            table.main_audio_stream_request(0x11, Some(1)),
            Some(EngineMessage::ChangeMainAudioStream {
                component_id: 0x11,
                pid: 0x0113,
                index: 1,
                channel_id: Some(1),
            })
        );
        assert_eq!(table.main_audio_stream_request(0x42, None), None);
    }

    #[test]
    fn test_audio_stream_changed_unknown_component() {
        let table = AudioEsTable::new();
        assert_eq!(
            table.audio_stream_changed(0x10, None),
            EngineMessage::ChangeAudioStream {
                component_id: 0x10,
                pid: None,
                index: -1,
                channel_id: None,
            }
        );
    }

    #[test]
    fn test_address_precedence() {
        assert_eq!(
            StreamAddress::from_fields(Some(0x10), Some(0x0112), Some(0)),
            Some(StreamAddress::ComponentId(0x10))
        );
        assert_eq!(
            StreamAddress::from_fields(None, Some(0x0112), Some(0)),
            Some(StreamAddress::Pid(0x0112))
        );
        assert_eq!(
            StreamAddress::from_fields(None, None, Some(2)),
            Some(StreamAddress::Index(2))
        );
        assert_eq!(StreamAddress::from_fields(None, None, None), None);
    }

    #[test]
    fn test_resolve_by_pid_and_index() {
        let mut table = AudioEsTable::new();
        table.rebuild(&sample_pmt());

        assert_eq!(table.resolve(StreamAddress::Pid(0x0114)).ok(), Some(0x12));
        assert_eq!(table.resolve(StreamAddress::Pid(0x0999)).ok(), None);
        assert_eq!(table.resolve(StreamAddress::Index(0)).ok(), Some(0x10));
        assert_eq!(table.resolve(StreamAddress::Index(3)).ok(), None);
        assert_eq!(table.resolve(StreamAddress::Index(-1)).ok(), None);
        // Component ids are not checked against the table
        assert_eq!(table.resolve(StreamAddress::ComponentId(0x99)).ok(), Some(0x99));

        let miss = table.resolve(StreamAddress::Pid(0x0999));
        assert!(matches!(miss, Err(BridgeError::Resolution(_))));
    }

    #[test]
    fn test_stale_index_resolves_against_latest_snapshot() {
        let mut table = AudioEsTable::new();
        table.rebuild(&sample_pmt());
        // Index 1 designates 0x11 in this snapshot...
        assert_eq!(table.resolve(StreamAddress::Index(1)).ok(), Some(0x11));

        table.rebuild(&[
            component(0x10, 0x0112, 0x0f),
            component(0x12, 0x0114, 0x81),
        ]);
        // ...and another component once the PMT changed.
        assert_eq!(table.resolve(StreamAddress::Index(1)).ok(), Some(0x12));
    }
}
