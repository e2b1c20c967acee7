//! In-memory session state.
//!
//! Owned by the controller task; every mutation goes through it, so no
//! locking is needed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use fallsight_common::{Connections, Event, EventKind, LinkState, Origin, Payload, StatusUpdate};

/// A link whose state the session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Wireless,
    Serial,
    Dashboard,
}

impl Link {
    pub fn as_str(&self) -> &'static str {
        match self {
            Link::Wireless => "wireless",
            Link::Serial => "serial",
            Link::Dashboard => "dashboard",
        }
    }

    /// Event origins whose records arrive over this link.
    pub fn origins(&self) -> &'static [Origin] {
        match self {
            Link::Wireless => &[Origin::Wireless],
            Link::Serial => &[Origin::Serial, Origin::Synthetic],
            Link::Dashboard => &[Origin::Dashboard],
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    fall_counter: u64,
    links: Connections,
    last_status: Option<StatusUpdate>,
    last_seen: HashMap<Origin, DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest fall sequence number seen or assigned so far.
    pub fn fall_counter(&self) -> u64 {
        self.fall_counter
    }

    /// Record an accepted event and return the version to forward.
    ///
    /// Unnumbered fall alerts get the next sequence number; unnumbered status
    /// updates get the current one. Device-supplied numbers are kept and only
    /// ever move the counter forward.
    pub fn apply(&mut self, event: Event) -> Event {
        self.last_seen.insert(event.origin(), event.received_at());

        let event = match (event.kind(), event.fall_sequence_number()) {
            (EventKind::FallAlert | EventKind::StatusUpdate, Some(seq)) => {
                self.fall_counter = self.fall_counter.max(seq);
                event
            }
            (EventKind::FallAlert, None) => {
                self.fall_counter += 1;
                event.with_fall_sequence_number(self.fall_counter)
            }
            (EventKind::StatusUpdate, None) => event.with_fall_sequence_number(self.fall_counter),
            _ => event,
        };

        if let Payload::StatusUpdate(status) = event.payload() {
            self.last_status = Some(status.clone());
        }

        event
    }

    /// Update a link flag. Returns `true` when the flag changed.
    pub fn set_link(&mut self, link: Link, state: LinkState) -> bool {
        let slot = match link {
            Link::Wireless => &mut self.links.wireless,
            Link::Serial => &mut self.links.serial,
            Link::Dashboard => &mut self.links.dashboard,
        };
        let changed = *slot != state;
        *slot = state;
        changed
    }

    pub fn link(&self, link: Link) -> LinkState {
        match link {
            Link::Wireless => self.links.wireless,
            Link::Serial => self.links.serial,
            Link::Dashboard => self.links.dashboard,
        }
    }

    pub fn connections(&self) -> Connections {
        self.links
    }

    pub fn last_status(&self) -> Option<&StatusUpdate> {
        self.last_status.as_ref()
    }

    /// Arrival time of the newest record received over `link`.
    pub fn last_record(&self, link: Link) -> Option<DateTime<Utc>> {
        link.origins()
            .iter()
            .filter_map(|origin| self.last_seen.get(origin))
            .max()
            .copied()
    }

    /// Status update reflecting the current session, emitted by the bridge.
    ///
    /// Device-reported fields come from the last status snapshot; the fall
    /// count is always the session counter.
    pub fn heartbeat(&self) -> Event {
        let status = StatusUpdate {
            fall_sequence_number: Some(self.fall_counter),
            ..self.last_status.clone().unwrap_or_default()
        };
        Event::new(Origin::Bridge, 0, Payload::StatusUpdate(status))
    }
}
