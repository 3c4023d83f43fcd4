//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pmobml::{
    BridgeSettings, CaptionRenderer, Collaborators, ContentLayout, Controller, DecodeEvent,
    Demuxer, DocumentEngine, EngineMessage, HostMessage, HostSink, MemoryNvram, Presentation,
    ServiceIds, TimeSource, VideoRect,
};

/// Side effects observed on the collaborators, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Demux(usize),
    Emit(String),
    Key(u32),
    SetMainAudio(u16, Option<u8>),
    CaptionPush(u8, f64),
    CaptionTime(f64),
    ShowCaptions,
    HideCaptions,
    Layout(ContentLayout),
    ContentVisible(bool),
    ContentClipped(bool),
    Indicator(bool),
    StatusMarks(bool, bool),
    CaptionFlash(bool),
    Volume(f64),
}

pub type Log = Arc<Mutex<Vec<Call>>>;

/// Demuxer whose fragments are JSON arrays of decode events.
pub struct JsonDemuxer {
    log: Log,
}

impl Demuxer for JsonDemuxer {
    fn parse(&mut self, fragment: &[u8]) -> Vec<DecodeEvent> {
        self.log.lock().push(Call::Demux(fragment.len()));
        serde_json::from_slice(fragment).unwrap_or_default()
    }
}

pub struct FakeDocument {
    log: Log,
    pub invisible: Arc<Mutex<Option<bool>>>,
    pub emitted: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl DocumentEngine for FakeDocument {
    fn emit_message(&mut self, event: &DecodeEvent) {
        self.log.lock().push(Call::Emit(event.kind().to_string()));
        if let Ok(value) = serde_json::to_value(event) {
            self.emitted.lock().push(value);
        }
    }

    fn process_key(&mut self, key_code: u32) {
        self.log.lock().push(Call::Key(key_code));
    }

    fn set_main_audio_stream(&mut self, component_id: u16, channel_id: Option<u8>) {
        self.log
            .lock()
            .push(Call::SetMainAudio(component_id, channel_id));
    }

    fn content_invisible(&self) -> Option<bool> {
        *self.invisible.lock()
    }
}

pub struct FakeCaptions {
    log: Log,
}

impl CaptionRenderer for FakeCaptions {
    fn push(&mut self, stream_id: u8, _data: &[u8], pts: f64) {
        self.log.lock().push(Call::CaptionPush(stream_id, pts));
    }

    fn update_time(&mut self, time_ms: f64) {
        self.log.lock().push(Call::CaptionTime(time_ms));
    }

    fn show_captions(&mut self) {
        self.log.lock().push(Call::ShowCaptions);
    }

    fn hide_captions(&mut self) {
        self.log.lock().push(Call::HideCaptions);
    }
}

pub struct FakePresentation {
    log: Log,
    pub rect: VideoRect,
    pub device_pixel_ratio: f64,
    pub fills_viewport: bool,
}

impl Presentation for FakePresentation {
    fn apply_layout(&mut self, layout: &ContentLayout) {
        self.log.lock().push(Call::Layout(*layout));
    }

    fn set_content_visible(&mut self, visible: bool) {
        self.log.lock().push(Call::ContentVisible(visible));
    }

    fn set_content_clipped(&mut self, clipped: bool) {
        self.log.lock().push(Call::ContentClipped(clipped));
    }

    fn set_remote_control_indicator(&mut self, visible: bool) {
        self.log.lock().push(Call::Indicator(visible));
    }

    fn set_status_marks(&mut self, receiving: bool, networking: bool) {
        self.log.lock().push(Call::StatusMarks(receiving, networking));
    }

    fn flash_caption_status(&mut self, enabled: bool) {
        self.log.lock().push(Call::CaptionFlash(enabled));
    }

    fn set_volume(&mut self, gain: f64) {
        self.log.lock().push(Call::Volume(gain));
    }

    fn video_rect(&self) -> VideoRect {
        self.rect
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    fn video_fills_viewport(&self) -> bool {
        self.fills_viewport
    }
}

#[derive(Clone, Default)]
pub struct SharedHost(pub Arc<Mutex<Vec<EngineMessage>>>);

impl HostSink for SharedHost {
    fn post(&mut self, message: EngineMessage) {
        self.0.lock().push(message);
    }
}

/// Manually driven clock.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<(Instant, i64)>>,
}

impl ManualClock {
    pub fn new(wall_clock_ms: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new((Instant::now(), wall_clock_ms))),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.0 += by;
        state.1 += by.as_millis() as i64;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().0
    }

    fn wall_clock_ms(&self) -> i64 {
        self.state.lock().1
    }
}

pub const WALL_CLOCK_MS: i64 = 1_700_000_000_000;

/// A controller wired to fakes, with handles on everything observable.
pub struct Harness {
    pub controller: Controller,
    pub log: Log,
    pub host: SharedHost,
    pub clock: ManualClock,
    pub nvram: MemoryNvram,
    pub document_invisible: Arc<Mutex<Option<bool>>>,
    /// Decode events as the document engine received them, in JSON.
    pub emitted: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(BridgeSettings::default())
    }

    pub fn with_settings(settings: BridgeSettings) -> Self {
        let (parts, log, host, clock, nvram, document_invisible, emitted) = collaborators();
        let service = ServiceIds {
            network_id: Some(0x7fe0),
            service_id: Some(1024),
        };
        Self {
            controller: Controller::new(settings, service, parts),
            log,
            host,
            clock,
            nvram,
            document_invisible,
            emitted,
        }
    }

    pub fn send(&mut self, message: HostMessage) -> Option<EngineMessage> {
        self.controller.handle_host_message(message)
    }

    /// Pushes a fragment that the fake demuxer decodes to `events`.
    pub fn stream(&mut self, events: &[DecodeEvent]) {
        let data = serde_json::to_vec(events).unwrap();
        self.send(HostMessage::Stream { data, time: None });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().clone()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
        self.host.0.lock().clear();
    }

    pub fn posted(&self) -> Vec<EngineMessage> {
        self.host.0.lock().clone()
    }

    pub fn demux_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Demux(_)))
            .count()
    }
}

pub fn collaborators() -> (
    Collaborators,
    Log,
    SharedHost,
    ManualClock,
    MemoryNvram,
    Arc<Mutex<Option<bool>>>,
    Arc<Mutex<Vec<serde_json::Value>>>,
) {
    let log: Log = Arc::default();
    let host = SharedHost::default();
    let clock = ManualClock::new(WALL_CLOCK_MS);
    let nvram = MemoryNvram::new();
    let document_invisible = Arc::new(Mutex::new(Some(false)));
    let emitted: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();

    let parts = Collaborators {
        demuxer: Box::new(JsonDemuxer { log: log.clone() }),
        document: Box::new(FakeDocument {
            log: log.clone(),
            invisible: document_invisible.clone(),
            emitted: emitted.clone(),
        }),
        captions: Box::new(FakeCaptions { log: log.clone() }),
        presentation: Box::new(FakePresentation {
            log: log.clone(),
            rect: VideoRect::new(0.0, 0.0, 960.0, 540.0),
            device_pixel_ratio: 2.0,
            fills_viewport: false,
        }),
        host: Box::new(host.clone()),
        nvram: Box::new(nvram.clone()),
        time: Box::new(clock.clone()),
    };
    (parts, log, host, clock, nvram, document_invisible, emitted)
}

pub fn audio(component_id: u16, pid: u16) -> pmobml::ComponentPmt {
    pmobml::ComponentPmt::new(pid, 0x0f, component_id, None)
}

pub fn one_seg_data() -> pmobml::ComponentPmt {
    pmobml::ComponentPmt::new(
        0x0140,
        0x0d,
        0x40,
        Some(pmobml::model::C_PROFILE_DATA_COMPONENT_ID),
    )
}
