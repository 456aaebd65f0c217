//! Platforms and their attached parts.
//!
//! A platform is an entity in the battlespace: it carries a type, an
//! optional explicit name and call sign, a lifecycle state, and a list of
//! named parts (sensors, comms, processors) that can be turned on and off.
//! Identity bookkeeping lives in the registry; this module is the entity
//! data itself.

use serde::{Deserialize, Serialize};

use crate::time::SimTime;

// ---------------------------------------------------------------------------
// PlatformIndex
// ---------------------------------------------------------------------------

/// Stable identity of a platform within one kernel instance.
///
/// Indices are assigned monotonically starting at 1 and are never reused,
/// even after the platform is removed. Index 0 is reserved as "no platform".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PlatformIndex(pub u64);

impl PlatformIndex {
    /// The reserved null index.
    pub const NONE: PlatformIndex = PlatformIndex(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for PlatformIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Lifecycle state of a platform within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformState {
    /// Constructed but not yet added to the simulation.
    Detached,
    /// Added and participating.
    Active,
    /// Declared combat-ineffective; still present.
    Broken,
    /// Removed from the simulation.
    Deleted,
}

/// A named subsystem attached to a platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    name: String,
    /// Whether the part powers on when its platform enters the simulation.
    initially_on: bool,
    turned_on: bool,
    operational: bool,
}

impl Part {
    pub fn new(name: impl Into<String>, initially_on: bool) -> Self {
        Self {
            name: name.into(),
            initially_on,
            turned_on: false,
            operational: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initially_on(&self) -> bool {
        self.initially_on
    }

    pub fn is_turned_on(&self) -> bool {
        self.turned_on
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// Power the part on. Returns false when already on or non-operational.
    pub fn turn_on(&mut self) -> bool {
        if self.operational && !self.turned_on {
            self.turned_on = true;
            true
        } else {
            false
        }
    }

    /// Power the part off. Returns false when already off.
    pub fn turn_off(&mut self) -> bool {
        if self.turned_on {
            self.turned_on = false;
            return true;
        }
        false
    }

    /// Change operability. A part going non-operational is forced off.
    /// Returns true when the operational flag actually changed.
    pub fn set_operational(&mut self, operational: bool) -> bool {
        if self.operational == operational {
            return false;
        }
        self.operational = operational;
        if !operational {
            self.turned_on = false;
        }
        true
    }
}

/// An entity in the battlespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    type_name: String,
    name: Option<String>,
    sign: Option<String>,
    state: PlatformState,
    index: PlatformIndex,
    creation_time: SimTime,
    parts: Vec<Part>,
}

impl Platform {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
            sign: None,
            state: PlatformState::Detached,
            index: PlatformIndex::NONE,
            creation_time: SimTime::ZERO,
            parts: Vec::new(),
        }
    }

    /// Give the platform an explicit name instead of a generated one.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a radio call sign.
    pub fn with_sign(mut self, sign: impl Into<String>) -> Self {
        self.sign = Some(sign.into());
        self
    }

    /// Attach a part.
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The platform's name. `None` only before it has been added to a
    /// registry, which assigns a generated default when needed.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sign(&self) -> Option<&str> {
        self.sign.as_deref()
    }

    pub fn state(&self) -> PlatformState {
        self.state
    }

    /// The registry-assigned index; [`PlatformIndex::NONE`] until added.
    pub fn index(&self) -> PlatformIndex {
        self.index
    }

    /// The time at which the platform entered (or will enter) the run.
    pub fn creation_time(&self) -> SimTime {
        self.creation_time
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn part_mut(&mut self, name: &str) -> Option<&mut Part> {
        self.parts.iter_mut().find(|p| p.name == name)
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub(crate) fn set_state(&mut self, state: PlatformState) {
        self.state = state;
    }

    pub(crate) fn set_index(&mut self, index: PlatformIndex) {
        self.index = index;
    }

    pub(crate) fn set_creation_time(&mut self, time: SimTime) {
        self.creation_time = time;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
