//! Controller: single owner of the session state and all handlers.
//!
//! Two event sources drive it, host messages and decode events produced
//! by the demultiplexer while a fragment is ingested, plus the notifications
//! of the document engine. Every entry point takes `&mut self`; callers
//! running on a multi-threaded runtime go through [`crate::bridge`], which
//! serializes them through a mailbox.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::audio::{AudioEsTable, StreamAddress};
use crate::clock::ClockSynchronizer;
use crate::config_ext::BridgeSettings;
use crate::engine::{
    CaptionRenderer, Demuxer, DocumentEngine, HostSink, Presentation, TimeSource,
};
use crate::geometry::{ContentLayout, VideoRect};
use crate::greg::GregRegisters;
use crate::indicator::RemoteControlIndicator;
use crate::ingest::{IngestStats, StreamFragment, StreamIngest};
use crate::input::InputSessionManager;
use crate::model::{ComponentPmt, DecodeEvent, DocumentEvent, InputRequest};
use crate::network::CONNECTION_TYPE;
use crate::nvram::{NvramStore, NvramWriteFlags};
use crate::protocol::{EngineMessage, HostMessage, InputCancelReason};
use crate::resident_app::{self, ResidentAppLaunch};
use crate::session::{ServiceIds, Session};
use crate::status::StatusIndicator;

/// External collaborators plugged into a [`Controller`].
pub struct Collaborators {
    pub demuxer: Box<dyn Demuxer>,
    pub document: Box<dyn DocumentEngine>,
    pub captions: Box<dyn CaptionRenderer>,
    pub presentation: Box<dyn Presentation>,
    pub host: Box<dyn HostSink>,
    pub nvram: Box<dyn NvramStore>,
    pub time: Box<dyn TimeSource>,
}

pub struct Controller {
    settings: BridgeSettings,
    session: Session,
    ingest: StreamIngest,
    clock: ClockSynchronizer,
    audio: AudioEsTable,
    input: InputSessionManager,
    indicator: RemoteControlIndicator,
    status: StatusIndicator,
    greg: GregRegisters,
    layout: Option<ContentLayout>,
    document: Box<dyn DocumentEngine>,
    captions: Box<dyn CaptionRenderer>,
    presentation: Box<dyn Presentation>,
    host: Box<dyn HostSink>,
    nvram: Box<dyn NvramStore>,
    time: Box<dyn TimeSource>,
}

impl Controller {
    pub fn new(settings: BridgeSettings, service: ServiceIds, parts: Collaborators) -> Self {
        info!(
            network_id = ?service.network_id,
            service_id = ?service.service_id,
            network_enabled = settings.network_enabled,
            "Bridge controller created"
        );
        Self {
            session: Session::new(service, settings.network_enabled),
            ingest: StreamIngest::new(parts.demuxer),
            clock: ClockSynchronizer::new(settings.caption_latency),
            audio: AudioEsTable::new(),
            input: InputSessionManager::new(),
            indicator: RemoteControlIndicator::new(settings.indicator_timeout),
            status: StatusIndicator::new(),
            greg: GregRegisters::new(),
            layout: None,
            document: parts.document,
            captions: parts.captions,
            presentation: parts.presentation,
            host: parts.host,
            nvram: parts.nvram,
            time: parts.time,
            settings,
        }
    }

    // ---- host messages ----

    /// Handles one host message; returns the reply of request-style messages.
    pub fn handle_host_message(&mut self, message: HostMessage) -> Option<EngineMessage> {
        if !message.is_key() {
            self.expire_indicator();
        }

        match message {
            HostMessage::Stream { data, time } => {
                self.ingest_fragment(StreamFragment::Bytes(data), time)
            }
            HostMessage::StreamBase64 { data, time } => {
                self.ingest_fragment(StreamFragment::Base64(data), time)
            }
            HostMessage::Key { key_code } => self.handle_key(key_code),
            HostMessage::Caption {
                enable,
                show_indicator,
            } => {
                if enable {
                    self.captions.show_captions();
                } else {
                    self.captions.hide_captions();
                }
                if show_indicator {
                    self.presentation.flash_caption_status(enable);
                }
            }
            HostMessage::NvramRead {
                filename,
                structure,
            } => {
                let data = match self.nvram.read(&filename, &structure) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(filename = %filename, error = %e, "NVRAM read failed");
                        None
                    }
                };
                return Some(EngineMessage::NvramRead {
                    filename,
                    structure,
                    data,
                });
            }
            HostMessage::NvramWrite {
                filename,
                structure,
                data,
            } => {
                if let Err(e) =
                    self.nvram
                        .write(&filename, &structure, data, NvramWriteFlags::forced())
                {
                    warn!(filename = %filename, error = %e, "NVRAM write failed");
                }
            }
            HostMessage::Volume { value } => self.presentation.set_volume(value),
            HostMessage::NvramDelete => match self.nvram.delete_all() {
                Ok(removed) => debug!(removed, "NVRAM deleted"),
                Err(e) => warn!(error = %e, "NVRAM delete failed"),
            },
            HostMessage::EnableNetwork { enable } => {
                info!(enable, "Network access toggled by host");
                self.session.network_enabled = enable;
            }
            HostMessage::ChangeInput { value } => {
                self.input.complete(value);
            }
            HostMessage::CancelInput => {
                if self.input.abandon() {
                    debug!("Input cancelled by host");
                }
            }
            HostMessage::MainAudioStreamChanged {
                component_id,
                pid,
                index,
                channel_id,
            } => self.apply_main_audio_stream(component_id, pid, index, channel_id),
            HostMessage::LaunchOneSeg => {
                info!("One-seg content launched");
                self.session.one_seg_launched = true;
                self.presentation.set_content_visible(true);
            }
        }
        None
    }

    fn expire_indicator(&mut self) {
        let now = self.time.now();
        if self.indicator.expire(now, self.session.c_profile()) {
            debug!("Remote-control indicator hidden after idle timeout");
            self.presentation.set_remote_control_indicator(false);
        }
    }

    fn handle_key(&mut self, key_code: u32) {
        self.indicator.key_pressed(self.time.now());
        self.presentation.set_remote_control_indicator(true);
        self.document.process_key(key_code);
    }

    fn ingest_fragment(&mut self, fragment: StreamFragment, time: Option<f64>) {
        let suspended = self.session.ingest_suspended();
        match self.ingest.ingest(fragment, time, suspended) {
            Ok(events) => {
                for event in events {
                    self.handle_decode_event(event);
                }
            }
            Err(e) => debug!(error = %e, "Dropping stream fragment"),
        }
    }

    fn apply_main_audio_stream(
        &mut self,
        component_id: Option<u16>,
        pid: Option<u16>,
        index: Option<i64>,
        channel_id: Option<u8>,
    ) {
        let Some(address) = StreamAddress::from_fields(component_id, pid, index) else {
            debug!("mainAudioStreamChanged without any stream address");
            return;
        };
        match self.audio.resolve(address) {
            Ok(component_id) => {
                debug!(component_id, ?channel_id, "Main audio stream changed by host");
                self.document.set_main_audio_stream(component_id, channel_id);
            }
            Err(e) => debug!(error = %e, "Ignoring mainAudioStreamChanged"),
        }
    }

    // ---- decode events ----

    /// Handles one decode event, then forwards it to the document engine.
    pub fn handle_decode_event(&mut self, event: DecodeEvent) {
        match &event {
            DecodeEvent::Pes {
                stream_id,
                data,
                pts,
                ..
            } => match pts {
                Some(pts) => self.captions.push(*stream_id, data, *pts),
                None => trace!(stream_id, "PES without PTS dropped"),
            },
            DecodeEvent::Pcr {
                pcr_base,
                pcr_extension,
                ..
            } => {
                let previous = self.clock.latest_ms();
                self.clock.record_pcr(*pcr_base, *pcr_extension);
                if let Some(caption_time) = self.clock.caption_time_since(previous) {
                    self.captions.update_time(caption_time);
                }
            }
            DecodeEvent::Pmt { components, .. } => self.handle_pmt(components),
            DecodeEvent::CurrentTime {
                time_unix_millis, ..
            } => {
                let gap = self.time.wall_clock_ms().abs_diff(*time_unix_millis);
                let is_record = Duration::from_millis(gap) >= self.settings.record_threshold;
                if is_record != self.session.is_record {
                    info!(is_record, gap_ms = gap, "Stream clock classification changed");
                }
                self.session.is_record = is_record;
            }
            DecodeEvent::Other(_) => {}
        }
        self.document.emit_message(&event);
    }

    fn handle_pmt(&mut self, components: &[ComponentPmt]) {
        self.audio.rebuild(components);

        let c_profile = components.iter().any(ComponentPmt::is_c_profile);
        if !self.session.decide_profile(c_profile) {
            return;
        }
        info!(c_profile, "First PMT received");

        if c_profile {
            let layout =
                ContentLayout::placeholder(self.settings.one_seg_width, self.settings.one_seg_height);
            self.apply_layout(layout);
            if !self.session.one_seg_launched {
                self.presentation.set_content_visible(false);
            }
            self.indicator.pin_visible();
            self.presentation.set_remote_control_indicator(true);
        }

        let service = self.session.service();
        self.host.post(EngineMessage::ServiceInfo {
            network_id: service.network_id,
            service_id: service.service_id,
            c_profile,
        });
    }

    // ---- document engine notifications ----

    pub fn handle_document_event(&mut self, event: DocumentEvent) {
        match event {
            DocumentEvent::Invisible(requested) => {
                self.presentation.set_content_clipped(requested);
                let invisible = requested || self.presentation.video_fills_viewport();
                self.host.post(EngineMessage::Invisible { invisible });
            }
            DocumentEvent::VideoChanged(rect) => self.report_video_geometry(rect),
            DocumentEvent::Load {
                width,
                height,
                aspect_numerator,
                aspect_denominator,
            } => match ContentLayout::for_document(width, height, aspect_numerator, aspect_denominator)
            {
                Some(layout) if self.layout != Some(layout) => self.apply_layout(layout),
                Some(_) => {}
                None => warn!(
                    width,
                    height, aspect_numerator, aspect_denominator, "Ignoring degenerate document resolution"
                ),
            },
            DocumentEvent::UsedKeyListChanged(groups) => {
                let used_key_list: BTreeMap<String, bool> =
                    groups.into_iter().map(|group| (group, true)).collect();
                self.host.post(EngineMessage::UsedKeyList { used_key_list });
            }
            DocumentEvent::AudioStreamChanged {
                component_id,
                channel_id,
            } => {
                let message = self.audio.audio_stream_changed(component_id, channel_id);
                self.host.post(message);
            }
            DocumentEvent::Url { url, loading } => self.status.set_url(
                url,
                loading,
                self.host.as_mut(),
                self.presentation.as_mut(),
            ),
            DocumentEvent::Receiving(receiving) => self.status.set_receiving(
                receiving,
                self.host.as_mut(),
                self.presentation.as_mut(),
            ),
            DocumentEvent::NetworkingGet(_) => {}
            DocumentEvent::NetworkingPost(active) => self.status.set_networking_post(
                active,
                self.host.as_mut(),
                self.presentation.as_mut(),
            ),
            DocumentEvent::EventName(name) => self.status.set_event_name(
                name,
                self.host.as_mut(),
                self.presentation.as_mut(),
            ),
        }
    }

    fn apply_layout(&mut self, layout: ContentLayout) {
        debug!(
            width = layout.width,
            height = layout.height,
            scale_y = layout.scale_y,
            "Applying content layout"
        );
        self.presentation.apply_layout(&layout);
        self.layout = Some(layout);
        let rect = self.presentation.video_rect();
        self.report_video_geometry(rect);
    }

    /// Posts `videoChanged` for a rectangle in CSS pixels.
    pub fn report_video_geometry(&mut self, rect: VideoRect) {
        let scaled = rect.scaled(self.presentation.device_pixel_ratio());
        let invisible = self.document.content_invisible().unwrap_or(true)
            || self.presentation.video_fills_viewport();
        self.host.post(EngineMessage::VideoChanged {
            left: scaled.left,
            top: scaled.top,
            right: scaled.right,
            bottom: scaled.bottom,
            invisible,
        });
    }

    // ---- requests from the document engine ----

    /// Asks the host to switch the main audio stream.
    ///
    /// Returns `false` (no switch) when the component is not in the current table.
    pub fn request_main_audio_stream(&mut self, component_id: u16, channel_id: Option<u8>) -> bool {
        match self.audio.main_audio_stream_request(component_id, channel_id) {
            Some(message) => {
                self.host.post(message);
                true
            }
            None => {
                debug!(component_id, "Requested audio component not in table");
                false
            }
        }
    }

    pub fn launch_input(&mut self, request: InputRequest) -> oneshot::Receiver<String> {
        self.input.launch(request, self.host.as_mut())
    }

    pub fn cancel_input(&mut self, reason: InputCancelReason) {
        self.input.cancel(reason, self.host.as_mut());
    }

    /// EPG tune request; always accepted.
    pub fn tune(&mut self, original_network_id: u16, transport_stream_id: u16, service_id: u16) -> bool {
        info!(
            original_network_id,
            transport_stream_id, service_id, "Tune requested by document"
        );
        self.host.post(EngineMessage::Tune {
            original_network_id,
            transport_stream_id,
            service_id,
        });
        true
    }

    /// Returns the document-facing result (`None` for NaN).
    pub fn start_resident_app(&mut self, app_name: &str, ex_info: &[String]) -> Option<i32> {
        let launch = resident_app::start_resident_app(app_name, ex_info);
        if let ResidentAppLaunch::StartBrowser(message) = &launch {
            self.host.post(message.clone());
        }
        launch.return_value()
    }

    pub fn greg_get(&self, index: u32) -> String {
        self.greg.get(index).to_string()
    }

    pub fn greg_set(&mut self, index: u32, value: String) {
        self.greg.set(index, value);
    }

    pub fn network_allowed(&self) -> bool {
        self.session.network_allowed()
    }

    pub fn is_ip_connected(&self) -> i32 {
        i32::from(self.network_allowed())
    }

    pub fn connection_type(&self) -> i32 {
        CONNECTION_TYPE
    }

    // ---- inspection ----

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn audio_table(&self) -> &AudioEsTable {
        &self.audio
    }

    pub fn indicator(&self) -> &RemoteControlIndicator {
        &self.indicator
    }

    pub fn status(&self) -> &StatusIndicator {
        &self.status
    }

    pub fn layout(&self) -> Option<ContentLayout> {
        self.layout
    }

    pub fn clock_ms(&self) -> Option<f64> {
        self.clock.latest_ms()
    }

    pub fn ingest_stats(&self) -> IngestStats {
        self.ingest.stats()
    }

    pub fn input_active(&self) -> bool {
        self.input.is_active()
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("session", &self.session)
            .field("audio", &self.audio)
            .field("indicator", &self.indicator)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
