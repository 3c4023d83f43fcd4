//! Mutable session flags owned by the controller.

/// Service the bridge was started for, as given by the host at launch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceIds {
    pub network_id: Option<u16>,
    pub service_id: Option<u16>,
}

/// One-time decision taken on the first PMT of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    AwaitingFirstPmt,
    Ready {
        c_profile: bool,
    },
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    pub network_enabled: bool,
    /// Set when the stream clock is far from the wall clock (played-back content).
    pub is_record: bool,
    pub one_seg_launched: bool,
    phase: SessionPhase,
    service: ServiceIds,
}

impl Session {
    pub fn new(service: ServiceIds, network_enabled: bool) -> Self {
        Self {
            network_enabled,
            service,
            ..Self::default()
        }
    }

    pub fn service(&self) -> ServiceIds {
        self.service
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn pmt_decided(&self) -> bool {
        matches!(self.phase, SessionPhase::Ready { .. })
    }

    pub fn c_profile(&self) -> bool {
        matches!(self.phase, SessionPhase::Ready { c_profile: true })
    }

    /// Records the profile seen on the first PMT.
    ///
    /// Returns `false` and leaves the session untouched once a decision exists.
    pub fn decide_profile(&mut self, c_profile: bool) -> bool {
        match self.phase {
            SessionPhase::AwaitingFirstPmt => {
                self.phase = SessionPhase::Ready { c_profile };
                true
            }
            SessionPhase::Ready { .. } => false,
        }
    }

    /// One-seg documents stay dormant until the user asks for them.
    pub fn ingest_suspended(&self) -> bool {
        self.c_profile() && !self.one_seg_launched
    }

    pub fn network_allowed(&self) -> bool {
        self.network_enabled && !self.is_record
    }
}
