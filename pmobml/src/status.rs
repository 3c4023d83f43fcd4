//! Loading/receiving status reported by the document engine.

use crate::engine::{HostSink, Presentation};
use crate::protocol::EngineMessage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusIndicator {
    url: String,
    loading: bool,
    receiving: bool,
    networking_post: bool,
    event_name: Option<String>,
}

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn set_url(
        &mut self,
        url: String,
        loading: bool,
        host: &mut dyn HostSink,
        presentation: &mut dyn Presentation,
    ) {
        self.url = url;
        self.loading = loading;
        self.publish(host, presentation);
    }

    pub fn set_receiving(
        &mut self,
        receiving: bool,
        host: &mut dyn HostSink,
        presentation: &mut dyn Presentation,
    ) {
        self.receiving = receiving;
        self.publish(host, presentation);
    }

    pub fn set_networking_post(
        &mut self,
        active: bool,
        host: &mut dyn HostSink,
        presentation: &mut dyn Presentation,
    ) {
        self.networking_post = active;
        self.publish(host, presentation);
    }

    pub fn set_event_name(
        &mut self,
        event_name: Option<String>,
        host: &mut dyn HostSink,
        presentation: &mut dyn Presentation,
    ) {
        self.event_name = event_name;
        self.publish(host, presentation);
    }

    fn publish(&self, host: &mut dyn HostSink, presentation: &mut dyn Presentation) {
        host.post(EngineMessage::Status {
            url: self.url.clone(),
            receiving: self.receiving,
            loading: self.loading,
        });
        presentation.set_status_marks(self.receiving, self.networking_post);
    }
}
