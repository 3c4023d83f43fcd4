//! Typed message sets exchanged with the host shell.
//!
//! Both directions are JSON objects tagged by a `type` field with camelCase
//! field names. [`HostMessage`] is what the host pushes into the bridge,
//! [`EngineMessage`] is what the bridge posts back.
//!
//! ```text
//! host  ──HostMessage──▶  HostBridge ──▶ Controller
//! host  ◀─EngineMessage─  HostSink   ◀── Controller
//! ```
//!
//! Only [`HostMessage::NvramRead`] expects a reply; everything else is
//! fire-and-forget.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::BridgeError;

/// Messages sent by the host shell to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    /// Transport-stream fragment as a JSON array of bytes.
    Stream {
        data: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
    },
    /// Transport-stream fragment as base64 text.
    StreamBase64 {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
    },
    Key {
        key_code: u32,
    },
    Caption {
        enable: bool,
        show_indicator: bool,
    },
    NvramRead {
        filename: String,
        structure: String,
    },
    NvramWrite {
        filename: String,
        structure: String,
        data: Vec<Value>,
    },
    Volume {
        value: f64,
    },
    NvramDelete,
    EnableNetwork {
        enable: bool,
    },
    ChangeInput {
        value: String,
    },
    CancelInput,
    /// Host-side confirmation of an audio switch.
    ///
    /// `component_id` wins when present, then `pid`, then `index`.
    MainAudioStreamChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component_id: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pid: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<u8>,
    },
    LaunchOneSeg,
}

impl HostMessage {
    /// Parses one raw host message.
    ///
    /// Unknown tags and malformed payloads yield [`BridgeError::Protocol`].
    pub fn from_json(raw: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(raw).map_err(|e| BridgeError::protocol(e.to_string()))
    }

    /// Wire tag of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::Stream { .. } => "stream",
            HostMessage::StreamBase64 { .. } => "streamBase64",
            HostMessage::Key { .. } => "key",
            HostMessage::Caption { .. } => "caption",
            HostMessage::NvramRead { .. } => "nvramRead",
            HostMessage::NvramWrite { .. } => "nvramWrite",
            HostMessage::Volume { .. } => "volume",
            HostMessage::NvramDelete => "nvramDelete",
            HostMessage::EnableNetwork { .. } => "enableNetwork",
            HostMessage::ChangeInput { .. } => "changeInput",
            HostMessage::CancelInput => "cancelInput",
            HostMessage::MainAudioStreamChanged { .. } => "mainAudioStreamChanged",
            HostMessage::LaunchOneSeg => "launchOneSeg",
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, HostMessage::Key { .. })
    }

    /// True for the only request-style message.
    pub fn expects_reply(&self) -> bool {
        matches!(self, HostMessage::NvramRead { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputCancelReason {
    /// Another input session replaced this one.
    Other,
    /// The document was unloaded while the input was pending.
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Text,
    Password,
}

/// Messages posted by the bridge to the host shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineMessage {
    /// Video plane rectangle, in device pixels.
    VideoChanged {
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
        invisible: bool,
    },
    Status {
        url: String,
        receiving: bool,
        loading: bool,
    },
    Invisible {
        invisible: bool,
    },
    Tune {
        original_network_id: u16,
        transport_stream_id: u16,
        service_id: u16,
    },
    /// Reply to [`HostMessage::NvramRead`]; `data` is `null` when nothing is stored.
    NvramRead {
        filename: String,
        structure: String,
        data: Option<Vec<Value>>,
    },
    UsedKeyList {
        used_key_list: BTreeMap<String, bool>,
    },
    CancelInput {
        reason: InputCancelReason,
    },
    Input {
        character_type: String,
        max_length: u32,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        allowed_characters: Option<String>,
        input_mode: InputMode,
        multiline: bool,
    },
    /// Audio stream switched by the document; `index` is -1 and `pid`
    /// absent when the component is not in the current table.
    ChangeAudioStream {
        component_id: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pid: Option<u16>,
        index: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<u8>,
    },
    ChangeMainAudioStream {
        component_id: u16,
        pid: u16,
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<u8>,
    },
    ServiceInfo {
        network_id: Option<u16>,
        service_id: Option<u16>,
        c_profile: bool,
    },
    StartBrowser {
        uri: String,
        fullscreen: bool,
    },
}

impl EngineMessage {
    pub fn to_json(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineMessage::VideoChanged { .. } => "videoChanged",
            EngineMessage::Status { .. } => "status",
            EngineMessage::Invisible { .. } => "invisible",
            EngineMessage::Tune { .. } => "tune",
            EngineMessage::NvramRead { .. } => "nvramRead",
            EngineMessage::UsedKeyList { .. } => "usedKeyList",
            EngineMessage::CancelInput { .. } => "cancelInput",
            EngineMessage::Input { .. } => "input",
            EngineMessage::ChangeAudioStream { .. } => "changeAudioStream",
            EngineMessage::ChangeMainAudioStream { .. } => "changeMainAudioStream",
            EngineMessage::ServiceInfo { .. } => "serviceInfo",
            EngineMessage::StartBrowser { .. } => "startBrowser",
        }
    }
}
