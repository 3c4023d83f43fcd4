//! Boundaries of the controller.
//!
//! The controller owns no parser, renderer or window: it drives these
//! collaborators, each behind a trait so the shell can plug its own
//! implementation in (and tests can plug fakes).

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::warn;

use crate::geometry::{ContentLayout, VideoRect};
use crate::model::DecodeEvent;
use crate::protocol::EngineMessage;

/// Transport-stream demultiplexer.
pub trait Demuxer: Send {
    /// Parses one fragment and returns the decode events it completed, in order.
    fn parse(&mut self, fragment: &[u8]) -> Vec<DecodeEvent>;
}

/// Broadcast-document interpreter.
pub trait DocumentEngine: Send {
    /// Receives every decode event after the bridge handled it.
    fn emit_message(&mut self, event: &DecodeEvent);

    /// Delivers a remote-control key (key down then key up).
    fn process_key(&mut self, key_code: u32);

    fn set_main_audio_stream(&mut self, component_id: u16, channel_id: Option<u8>);

    /// Invisibility requested by the current document, `None` when no document is loaded.
    fn content_invisible(&self) -> Option<bool>;
}

/// Caption and PRA audio renderer.
pub trait CaptionRenderer: Send {
    fn push(&mut self, stream_id: u8, data: &[u8], pts: f64);

    /// Sets the renderer timeline, in milliseconds.
    fn update_time(&mut self, time_ms: f64);

    fn show_captions(&mut self);

    fn hide_captions(&mut self);
}

/// Page surface hosting the document, the video hole and the indicators.
pub trait Presentation: Send {
    fn apply_layout(&mut self, layout: &ContentLayout);

    fn set_content_visible(&mut self, visible: bool);

    /// Clips the document so the video shows through.
    fn set_content_clipped(&mut self, clipped: bool);

    fn set_remote_control_indicator(&mut self, visible: bool);

    fn set_status_marks(&mut self, receiving: bool, networking: bool);

    /// Briefly shows the caption on/off label.
    fn flash_caption_status(&mut self, enabled: bool);

    fn set_volume(&mut self, gain: f64);

    /// Video plane rectangle in CSS pixels.
    fn video_rect(&self) -> VideoRect;

    fn device_pixel_ratio(&self) -> f64;

    /// True when the video plane covers the whole document area.
    fn video_fills_viewport(&self) -> bool;
}

/// Outbound half of the host protocol.
pub trait HostSink: Send {
    fn post(&mut self, message: EngineMessage);
}

impl HostSink for mpsc::UnboundedSender<EngineMessage> {
    fn post(&mut self, message: EngineMessage) {
        if let Err(e) = self.send(message) {
            warn!(kind = e.0.kind(), "Host channel closed, dropping message");
        }
    }
}

impl HostSink for Vec<EngineMessage> {
    fn post(&mut self, message: EngineMessage) {
        self.push(message);
    }
}

/// Clock used by the controller for idle timers and live/record detection.
pub trait TimeSource: Send {
    fn now(&self) -> Instant;

    /// Wall clock, milliseconds since the Unix epoch.
    fn wall_clock_ms(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
