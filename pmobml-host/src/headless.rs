//! Collaborators for running the bridge without a document engine or window.
//!
//! They only trace what a real shell would render.

use pmobml::{CaptionRenderer, ContentLayout, DecodeEvent, DocumentEngine, Presentation, VideoRect};
use tracing::{debug, info, trace};

#[derive(Debug, Default)]
pub struct TracingDocument;

impl DocumentEngine for TracingDocument {
    fn emit_message(&mut self, event: &DecodeEvent) {
        trace!(kind = event.kind(), "Decode event");
    }

    fn process_key(&mut self, key_code: u32) {
        debug!(key_code, "Key");
    }

    fn set_main_audio_stream(&mut self, component_id: u16, channel_id: Option<u8>) {
        info!(component_id, ?channel_id, "Main audio stream");
    }

    fn content_invisible(&self) -> Option<bool> {
        None
    }
}

#[derive(Debug, Default)]
pub struct TracingCaptions;

impl CaptionRenderer for TracingCaptions {
    fn push(&mut self, stream_id: u8, data: &[u8], pts: f64) {
        trace!(stream_id, len = data.len(), pts, "PES");
    }

    fn update_time(&mut self, time_ms: f64) {
        trace!(time_ms, "Caption clock");
    }

    fn show_captions(&mut self) {
        info!("Captions on");
    }

    fn hide_captions(&mut self) {
        info!("Captions off");
    }
}

/// Fixed 960x540 page at device pixel ratio 1.
#[derive(Debug)]
pub struct TracingPresentation {
    layout: ContentLayout,
}

impl Default for TracingPresentation {
    fn default() -> Self {
        Self {
            layout: ContentLayout::placeholder(960, 540),
        }
    }
}

impl Presentation for TracingPresentation {
    fn apply_layout(&mut self, layout: &ContentLayout) {
        info!(width = layout.width, height = layout.height, "Layout");
        self.layout = *layout;
    }

    fn set_content_visible(&mut self, visible: bool) {
        debug!(visible, "Content visibility");
    }

    fn set_content_clipped(&mut self, clipped: bool) {
        debug!(clipped, "Content clipping");
    }

    fn set_remote_control_indicator(&mut self, visible: bool) {
        debug!(visible, "Remote-control indicator");
    }

    fn set_status_marks(&mut self, receiving: bool, networking: bool) {
        trace!(receiving, networking, "Status marks");
    }

    fn flash_caption_status(&mut self, enabled: bool) {
        debug!(enabled, "Caption status");
    }

    fn set_volume(&mut self, gain: f64) {
        debug!(gain, "Volume");
    }

    fn video_rect(&self) -> VideoRect {
        VideoRect::new(0.0, 0.0, self.layout.width, self.layout.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }

    fn video_fills_viewport(&self) -> bool {
        true
    }
}
