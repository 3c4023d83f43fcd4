use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::VideoRect;
use crate::protocol::InputMode;

/// data_component_id of the multimedia coding profile for one-seg (C profile).
pub const C_PROFILE_DATA_COMPONENT_ID: u16 = 0x000d;

/// Fields the bridge does not read, kept so that events reach the document
/// engine as the demultiplexer produced them (`bxmlInfo`, `additionalAribBxmlInfo`, ...).
pub type ExtraFields = Map<String, Value>;

/// One elementary stream entry of a PMT, as reported by the demultiplexer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPmt {
    pub pid: u16,
    pub stream_type: u8,
    pub component_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_component_id: Option<u16>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ComponentPmt {
    pub fn new(pid: u16, stream_type: u8, component_id: u16, data_component_id: Option<u16>) -> Self {
        Self {
            pid,
            stream_type,
            component_id,
            data_component_id,
            extra: ExtraFields::new(),
        }
    }

    pub fn is_c_profile(&self) -> bool {
        self.data_component_id == Some(C_PROFILE_DATA_COMPONENT_ID)
    }
}

/// Decode events produced by the external demultiplexer.
///
/// The bridge reacts to the first four kinds; every event, whatever its kind,
/// is then forwarded to the document engine. Known kinds keep their unread
/// fields in `extra` so the forwarded JSON is the one received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DecodeEvent {
    Pes {
        stream_id: u8,
        data: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pts: Option<f64>,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    Pcr {
        pcr_base: u64,
        pcr_extension: u16,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    Pmt {
        components: Vec<ComponentPmt>,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    CurrentTime {
        time_unix_millis: i64,
        #[serde(flatten)]
        extra: ExtraFields,
    },
    /// Anything else (module downloads, event messages, ...), relayed as is.
    #[serde(untagged)]
    Other(Value),
}

impl DecodeEvent {
    pub fn pes(stream_id: u8, data: Vec<u8>, pts: Option<f64>) -> Self {
        DecodeEvent::Pes {
            stream_id,
            data,
            pts,
            extra: ExtraFields::new(),
        }
    }

    pub fn pcr(pcr_base: u64, pcr_extension: u16) -> Self {
        DecodeEvent::Pcr {
            pcr_base,
            pcr_extension,
            extra: ExtraFields::new(),
        }
    }

    pub fn pmt(components: Vec<ComponentPmt>) -> Self {
        DecodeEvent::Pmt {
            components,
            extra: ExtraFields::new(),
        }
    }

    pub fn current_time(time_unix_millis: i64) -> Self {
        DecodeEvent::CurrentTime {
            time_unix_millis,
            extra: ExtraFields::new(),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            DecodeEvent::Pes { .. } => "pes",
            DecodeEvent::Pcr { .. } => "pcr",
            DecodeEvent::Pmt { .. } => "pmt",
            DecodeEvent::CurrentTime { .. } => "currentTime",
            DecodeEvent::Other(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }
}

/// Parameters of a text-input request raised by the document engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputRequest {
    pub character_type: String,
    pub max_length: u32,
    pub value: String,
    pub allowed_characters: Option<String>,
    pub input_mode: InputMode,
    pub multiline: bool,
}

/// Notifications raised by the document engine towards the bridge.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    /// Document-requested invisibility of the data broadcast plane.
    Invisible(bool),
    /// Video plane moved; rectangle in CSS pixels.
    VideoChanged(VideoRect),
    /// A document was loaded with the given resolution and display aspect ratio.
    Load {
        width: u32,
        height: u32,
        aspect_numerator: u32,
        aspect_denominator: u32,
    },
    /// Key groups used by the current document.
    UsedKeyListChanged(Vec<String>),
    /// The document switched the audio stream itself.
    AudioStreamChanged {
        component_id: u16,
        channel_id: Option<u8>,
    },
    Url {
        url: String,
        loading: bool,
    },
    Receiving(bool),
    NetworkingGet(bool),
    NetworkingPost(bool),
    EventName(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_event_known_kinds() {
        let event: DecodeEvent =
            serde_json::from_value(json!({"type": "pcr", "pcrBase": 900, "pcrExtension": 0}))
                .unwrap();
        assert_eq!(event, DecodeEvent::pcr(900, 0));

        let event: DecodeEvent = serde_json::from_value(json!({
            "type": "pmt",
            "components": [{"pid": 273, "streamType": 15, "componentId": 16}]
        }))
        .unwrap();
        let DecodeEvent::Pmt { components, .. } = event else {
            panic!("expected a PMT event");
        };
        assert_eq!(components[0].data_component_id, None);
    }

    #[test]
    fn test_decode_event_unknown_kind_is_kept() {
        let raw = json!({"type": "moduleDownloaded", "componentId": 64, "moduleId": 0});
        let event: DecodeEvent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(event, DecodeEvent::Other(raw));
        assert_eq!(event.kind(), "moduleDownloaded");
    }

    #[test]
    fn test_c_profile_marker() {
        let component = ComponentPmt::new(0x0140, 0x0d, 0x40, Some(C_PROFILE_DATA_COMPONENT_ID));
        assert!(component.is_c_profile());
    }

    #[test]
    fn test_pmt_keeps_unread_fields() {
        let raw = json!({
            "type": "pmt",
            "programNumber": 1024,
            "components": [{
                "pid": 320,
                "streamType": 13,
                "componentId": 64,
                "dataComponentId": 12,
                "bxmlInfo": {"entryPointFlag": true, "transmissionFormat": 0}
            }]
        });
        let event: DecodeEvent = serde_json::from_value(raw.clone()).unwrap();
        let DecodeEvent::Pmt { components, extra } = &event else {
            panic!("expected a PMT event");
        };
        assert_eq!(components[0].component_id, 64);
        assert!(components[0].extra.contains_key("bxmlInfo"));
        assert_eq!(extra.get("programNumber"), Some(&json!(1024)));
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn test_pes_keeps_unread_fields() {
        let raw = json!({"type": "pes", "streamId": 189, "data": [1, 2], "pts": 90000.0, "pid": 304});
        let event: DecodeEvent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(event.kind(), "pes");
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }
}
