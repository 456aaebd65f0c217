//! The platform registry.
//!
//! Owns every platform in the run and hands out stable [`PlatformIndex`]
//! values: slot 0 is reserved, indices grow monotonically, and a removed
//! platform leaves a tombstone behind so its index is never reassigned and
//! its name, type, and call sign stay resolvable after removal.
//!
//! Secondary lookups (by name, by call sign, by type) cover live platforms
//! only. Name uniqueness is enforced among the living; a platform without an
//! explicit name gets a generated `type:n` default.

use std::collections::HashMap;

use crate::platform::{Platform, PlatformIndex, PlatformState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("platform name {0:?} is already in use")]
    DuplicateName(String),
    #[error("no live platform at index {0}")]
    UnknownPlatform(PlatformIndex),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

enum Slot {
    /// Slot 0 only: the null index.
    Reserved,
    Occupied(Box<Platform>),
    /// A removed platform. Identity attributes stay resolvable; the entity
    /// itself is parked here when removal asked to keep it.
    Tombstone {
        name: String,
        type_name: String,
        sign: Option<String>,
        parked: Option<Box<Platform>>,
    },
}

/// Owns all platforms and their identity bookkeeping.
#[derive(Default)]
pub struct PlatformRegistry {
    slots: Vec<Slot>,
    by_name: HashMap<String, PlatformIndex>,
    by_sign: HashMap<String, PlatformIndex>,
    by_type: HashMap<String, Vec<PlatformIndex>>,
    /// Live indices in insertion order, for deterministic iteration.
    live: Vec<PlatformIndex>,
    default_name_counters: HashMap<String, u32>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Reserved],
            ..Self::default()
        }
    }

    /// Add a platform, assigning the next index and a generated name when
    /// none was given. The platform becomes [`PlatformState::Active`].
    pub fn add(&mut self, mut platform: Platform) -> Result<PlatformIndex, RegistryError> {
        let name = match platform.name() {
            Some(name) => {
                if self.by_name.contains_key(name) {
                    return Err(RegistryError::DuplicateName(name.to_string()));
                }
                name.to_string()
            }
            None => self.generate_name(platform.type_name()),
        };
        platform.set_name(name.clone());

        let index = PlatformIndex(self.slots.len() as u64);
        platform.set_index(index);
        platform.set_state(PlatformState::Active);

        self.by_name.insert(name, index);
        if let Some(sign) = platform.sign() {
            // Call signs are advisory; a duplicate takes over the lookup.
            self.by_sign.insert(sign.to_string(), index);
        }
        self.by_type
            .entry(platform.type_name().to_string())
            .or_default()
            .push(index);
        self.live.push(index);
        self.slots.push(Slot::Occupied(Box::new(platform)));
        Ok(index)
    }

    /// Remove the platform at `index`, tombstoning its slot. With
    /// `keep_entity` the platform is parked inside the tombstone and `None`
    /// is returned; otherwise the platform is handed back to the caller.
    pub fn remove(
        &mut self,
        index: PlatformIndex,
        keep_entity: bool,
    ) -> Result<Option<Box<Platform>>, RegistryError> {
        let slot = self
            .slots
            .get_mut(index.0 as usize)
            .ok_or(RegistryError::UnknownPlatform(index))?;
        let mut platform = match std::mem::replace(slot, Slot::Reserved) {
            Slot::Occupied(platform) => platform,
            other => {
                *slot = other;
                return Err(RegistryError::UnknownPlatform(index));
            }
        };
        platform.set_state(PlatformState::Deleted);

        let name = platform.name().unwrap_or_default().to_string();
        self.by_name.remove(&name);
        if let Some(sign) = platform.sign() {
            if self.by_sign.get(sign) == Some(&index) {
                self.by_sign.remove(sign);
            }
        }
        if let Some(of_type) = self.by_type.get_mut(platform.type_name()) {
            of_type.retain(|&i| i != index);
        }
        self.live.retain(|&i| i != index);

        let type_name = platform.type_name().to_string();
        let sign = platform.sign().map(str::to_string);
        let (parked, returned) = if keep_entity {
            (Some(platform), None)
        } else {
            (None, Some(platform))
        };
        *self
            .slots
            .get_mut(index.0 as usize)
            .ok_or(RegistryError::UnknownPlatform(index))? = Slot::Tombstone {
            name,
            type_name,
            sign,
            parked,
        };
        Ok(returned)
    }

    // -- lookups ------------------------------------------------------------

    /// The live platform at `index`, if any. Removed platforms are absent.
    pub fn get(&self, index: PlatformIndex) -> Option<&Platform> {
        match self.slots.get(index.0 as usize)? {
            Slot::Occupied(platform) => Some(platform.as_ref()),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: PlatformIndex) -> Option<&mut Platform> {
        match self.slots.get_mut(index.0 as usize)? {
            Slot::Occupied(platform) => Some(platform.as_mut()),
            _ => None,
        }
    }

    pub fn exists(&self, index: PlatformIndex) -> bool {
        self.get(index).is_some()
    }

    pub fn by_name(&self, name: &str) -> Option<&Platform> {
        self.get(*self.by_name.get(name)?)
    }

    pub fn by_sign(&self, sign: &str) -> Option<&Platform> {
        self.get(*self.by_sign.get(sign)?)
    }

    /// Live indices of platforms of the given type, in insertion order.
    pub fn by_type(&self, type_name: &str) -> &[PlatformIndex] {
        self.by_type.get(type_name).map_or(&[], Vec::as_slice)
    }

    /// The name held by `index`, live or removed.
    pub fn name_of(&self, index: PlatformIndex) -> Option<&str> {
        match self.slots.get(index.0 as usize)? {
            Slot::Occupied(platform) => platform.name(),
            Slot::Tombstone { name, .. } => Some(name),
            Slot::Reserved => None,
        }
    }

    /// The type held by `index`, live or removed.
    pub fn type_of(&self, index: PlatformIndex) -> Option<&str> {
        match self.slots.get(index.0 as usize)? {
            Slot::Occupied(platform) => Some(platform.type_name()),
            Slot::Tombstone { type_name, .. } => Some(type_name),
            Slot::Reserved => None,
        }
    }

    /// The call sign held by `index`, live or removed.
    pub fn sign_of(&self, index: PlatformIndex) -> Option<&str> {
        match self.slots.get(index.0 as usize)? {
            Slot::Occupied(platform) => platform.sign(),
            Slot::Tombstone { sign, .. } => sign.as_deref(),
            Slot::Reserved => None,
        }
    }

    // -- iteration ----------------------------------------------------------

    /// Number of live platforms.
    pub fn count(&self) -> usize {
        self.live.len()
    }

    /// Live indices in insertion order.
    pub fn indices(&self) -> impl Iterator<Item = PlatformIndex> + '_ {
        self.live.iter().copied()
    }

    /// Live platforms in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.live.iter().filter_map(|&index| self.get(index))
    }

    /// The index the next added platform will receive.
    pub fn next_index(&self) -> PlatformIndex {
        PlatformIndex(self.slots.len() as u64)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Tombstone every live platform and clear the lookups, keeping the
    /// index counter so indices stay unique across a reset.
    pub fn reset(&mut self) {
        let live: Vec<PlatformIndex> = self.live.clone();
        for index in live {
            // Live indices always point at occupied slots.
            let _ = self.remove(index, false);
        }
        self.default_name_counters.clear();
    }

    fn generate_name(&mut self, type_name: &str) -> String {
        let counter = self
            .default_name_counters
            .entry(type_name.to_string())
            .or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{type_name}:{counter}");
            if !self.by_name.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_start_at_one() {
        let mut registry = PlatformRegistry::new();
        let a = registry.add(Platform::new("tank")).unwrap();
        assert_eq!(a, PlatformIndex(1));
    }

    #[test]
    fn indices_never_reused_after_removal() {
        let mut registry = PlatformRegistry::new();
        let a = registry.add(Platform::new("tank").with_name("alpha")).unwrap();
        let b = registry.add(Platform::new("tank").with_name("bravo")).unwrap();
        assert_eq!((a, b), (PlatformIndex(1), PlatformIndex(2)));
        registry.remove(a, false).unwrap();
        let c = registry.add(Platform::new("tank").with_name("charlie")).unwrap();
        assert_eq!(c, PlatformIndex(3));
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());
    }

    #[test]
    fn identity_survives_removal() {
        let mut registry = PlatformRegistry::new();
        let index = registry
            .add(Platform::new("awacs").with_name("sentry").with_sign("EYE-1"))
            .unwrap();
        registry.remove(index, false).unwrap();
        assert_eq!(registry.name_of(index), Some("sentry"));
        assert_eq!(registry.type_of(index), Some("awacs"));
        assert_eq!(registry.sign_of(index), Some("EYE-1"));
        assert!(registry.by_name("sentry").is_none());
        assert!(registry.by_sign("EYE-1").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = PlatformRegistry::new();
        registry.add(Platform::new("sam").with_name("battery")).unwrap();
        let err = registry
            .add(Platform::new("sam").with_name("battery"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
    }

    #[test]
    fn name_reusable_after_removal() {
        let mut registry = PlatformRegistry::new();
        let a = registry.add(Platform::new("sam").with_name("battery")).unwrap();
        registry.remove(a, false).unwrap();
        let b = registry.add(Platform::new("sam").with_name("battery")).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.by_name("battery").map(Platform::index), Some(b));
    }

    #[test]
    fn default_names_count_per_type() {
        let mut registry = PlatformRegistry::new();
        registry.add(Platform::new("mig-29")).unwrap();
        registry.add(Platform::new("mig-29")).unwrap();
        registry.add(Platform::new("frigate")).unwrap();
        assert!(registry.by_name("mig-29:1").is_some());
        assert!(registry.by_name("mig-29:2").is_some());
        assert!(registry.by_name("frigate:1").is_some());
    }

    #[test]
    fn generated_name_skips_explicit_collision() {
        let mut registry = PlatformRegistry::new();
        registry.add(Platform::new("drone").with_name("drone:1")).unwrap();
        registry.add(Platform::new("drone")).unwrap();
        assert!(registry.by_name("drone:2").is_some());
    }

    #[test]
    fn by_type_tracks_live_platforms() {
        let mut registry = PlatformRegistry::new();
        let a = registry.add(Platform::new("sub")).unwrap();
        let b = registry.add(Platform::new("sub")).unwrap();
        assert_eq!(registry.by_type("sub"), &[a, b]);
        registry.remove(a, false).unwrap();
        assert_eq!(registry.by_type("sub"), &[b]);
        assert!(registry.by_type("carrier").is_empty());
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut registry = PlatformRegistry::new();
        registry.add(Platform::new("a").with_name("one")).unwrap();
        registry.add(Platform::new("b").with_name("two")).unwrap();
        registry.add(Platform::new("c").with_name("three")).unwrap();
        let names: Vec<_> = registry.iter().filter_map(Platform::name).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }

    #[test]
    fn remove_unknown_index_errors() {
        let mut registry = PlatformRegistry::new();
        let err = registry.remove(PlatformIndex(7), false).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownPlatform(_)));
        // The null index is never a platform.
        assert!(registry.remove(PlatformIndex::NONE, false).is_err());
    }

    #[test]
    fn keep_entity_parks_platform_in_tombstone() {
        let mut registry = PlatformRegistry::new();
        let index = registry.add(Platform::new("cargo")).unwrap();
        let returned = registry.remove(index, true).unwrap();
        assert!(returned.is_none());
        assert!(registry.get(index).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn reset_keeps_index_counter() {
        let mut registry = PlatformRegistry::new();
        registry.add(Platform::new("x")).unwrap();
        registry.add(Platform::new("x")).unwrap();
        registry.reset();
        assert_eq!(registry.count(), 0);
        let next = registry.add(Platform::new("x")).unwrap();
        assert_eq!(next, PlatformIndex(3));
        // Default-name counters restart after a reset.
        assert!(registry.by_name("x:1").is_some());
    }
}
