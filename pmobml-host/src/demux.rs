//! Header-level transport-stream reader.
//!
//! Only the packet headers are looked at: sync byte, PID and the adaptation
//! field, which is enough to recover the PCR. Sections and PES payloads are
//! left to a full demultiplexer.

use pmobml::{DecodeEvent, Demuxer};
use tracing::{debug, trace};

pub const TS_PACKET_SIZE: usize = 188;
const SYNC_BYTE: u8 = 0x47;
/// Sync losses between two debug lines.
const RESYNC_LOG_STEP: u64 = 1000;

#[derive(Debug, Default)]
pub struct PcrDemuxer {
    /// Bytes of an incomplete packet carried over from the previous fragment.
    pending: Vec<u8>,
    packets: u64,
    resyncs: u64,
}

impl PcrDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    fn read_packet(&mut self, packet: &[u8], events: &mut Vec<DecodeEvent>) {
        self.packets += 1;
        let adaptation_field_control = (packet[3] >> 4) & 0x03;
        if adaptation_field_control & 0x02 == 0 {
            return;
        }
        let length = packet[4] as usize;
        // flags byte + 6 PCR bytes
        if length < 7 || packet[5] & 0x10 == 0 {
            return;
        }
        let pcr = &packet[6..12];
        let pcr_base = ((pcr[0] as u64) << 25)
            | ((pcr[1] as u64) << 17)
            | ((pcr[2] as u64) << 9)
            | ((pcr[3] as u64) << 1)
            | ((pcr[4] as u64) >> 7);
        let pcr_extension = (((pcr[4] & 0x01) as u16) << 8) | pcr[5] as u16;
        let pid = (((packet[1] & 0x1f) as u16) << 8) | packet[2] as u16;
        trace!(pid, pcr_base, pcr_extension, "PCR");
        events.push(DecodeEvent::pcr(pcr_base, pcr_extension));
    }
}

/// True when a multiple of `step` lies in `(before, after]`.
fn crossed_step(before: u64, after: u64, step: u64) -> bool {
    after / step > before / step
}

impl Demuxer for PcrDemuxer {
    fn parse(&mut self, fragment: &[u8]) -> Vec<DecodeEvent> {
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.extend_from_slice(fragment);

        let mut events = Vec::new();
        let resyncs_before = self.resyncs;
        let mut offset = 0;
        while buffer.len() - offset >= TS_PACKET_SIZE {
            if buffer[offset] != SYNC_BYTE {
                self.resyncs += 1;
                offset += 1;
                continue;
            }
            let packet = &buffer[offset..offset + TS_PACKET_SIZE];
            self.read_packet(packet, &mut events);
            offset += TS_PACKET_SIZE;
        }
        self.pending = buffer[offset..].to_vec();

        if crossed_step(resyncs_before, self.resyncs, RESYNC_LOG_STEP) {
            debug!(resyncs = self.resyncs, "Lost TS sync repeatedly");
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with_pcr(pcr_base: u64, pcr_extension: u16) -> Vec<u8> {
        let mut packet = vec![0xff; TS_PACKET_SIZE];
        packet[0] = SYNC_BYTE;
        packet[1] = 0x01;
        packet[2] = 0x00;
        packet[3] = 0x20; // adaptation field only
        packet[4] = 183;
        packet[5] = 0x10; // PCR flag
        packet[6] = (pcr_base >> 25) as u8;
        packet[7] = (pcr_base >> 17) as u8;
        packet[8] = (pcr_base >> 9) as u8;
        packet[9] = (pcr_base >> 1) as u8;
        packet[10] = (((pcr_base & 1) as u8) << 7) | 0x7e | ((pcr_extension >> 8) as u8 & 1);
        packet[11] = pcr_extension as u8;
        packet
    }

    #[test]
    fn test_pcr_extracted() {
        let mut demuxer = PcrDemuxer::new();
        let events = demuxer.parse(&packet_with_pcr(900, 150));
        assert_eq!(
            events,
            vec![DecodeEvent::pcr(900, 150)]
        );
    }

    #[test]
    fn test_packet_split_across_fragments() {
        let mut demuxer = PcrDemuxer::new();
        let packet = packet_with_pcr(0x1_2345_6789, 299);
        assert!(demuxer.parse(&packet[..100]).is_empty());
        let events = demuxer.parse(&packet[100..]);
        assert_eq!(
            events,
            vec![DecodeEvent::pcr(0x1_2345_6789, 299)]
        );
        assert_eq!(demuxer.packets(), 1);
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut demuxer = PcrDemuxer::new();
        let mut data = vec![0x00, 0x01, 0x02];
        data.extend(packet_with_pcr(10, 0));
        assert_eq!(demuxer.parse(&data).len(), 1);
        assert_eq!(demuxer.resyncs(), 3);
    }

    #[test]
    fn test_resync_log_only_on_crossing() {
        assert!(crossed_step(999, 1000, RESYNC_LOG_STEP));
        assert!(crossed_step(990, 1500, RESYNC_LOG_STEP));
        // Counter parked on a multiple: no new line per fragment
        assert!(!crossed_step(1000, 1000, RESYNC_LOG_STEP));
        assert!(!crossed_step(1000, 1999, RESYNC_LOG_STEP));
        assert!(!crossed_step(0, 0, RESYNC_LOG_STEP));
    }
}
