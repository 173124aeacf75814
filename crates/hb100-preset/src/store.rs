//! The in-memory preset registry.
//!
//! Downloaded bank presets are indexed by slot, imported file presets by
//! name; a preset may appear in both indexes at once (e.g. after an import
//! followed by an upload). Entries are reference-counted [`SharedPreset`]s,
//! so removing a preset from one index never dangles the other.
//!
//! The store is single-threaded by design: it is only ever touched from the
//! engine's thread.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, info};

use hb100_catalog::BANK_SLOTS;

use crate::codec::load_preset_file;
use crate::error::PresetError;
use crate::preset::SharedPreset;
use crate::Result;

/// Registry of presets, indexed by bank slot and by name.
#[derive(Default)]
pub struct PresetStore {
    by_id: BTreeMap<u16, SharedPreset>,
    // Insertion-ordered; lookups are linear but the index holds at most a
    // few hundred entries.
    by_name: Vec<(String, SharedPreset)>,
}

impl PresetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preset under a bank slot, assigning it the slot id.
    ///
    /// Fails with `InvalidArgument` if the slot is out of range or already
    /// occupied.
    pub fn add_by_id(&mut self, preset: SharedPreset, id: u16) -> Result<()> {
        if id < 1 || id as usize > BANK_SLOTS {
            return Err(PresetError::InvalidArgument("slot must be in 1..=200"));
        }
        if self.by_id.contains_key(&id) {
            return Err(PresetError::InvalidArgument("slot already occupied"));
        }
        preset.borrow_mut().id = id;
        self.by_id.insert(id, preset);
        Ok(())
    }

    /// Register a preset under its current name.
    ///
    /// An existing entry with the same name is replaced, keeping its
    /// position in the listing.
    pub fn add_by_name(&mut self, preset: SharedPreset) -> Result<()> {
        let name = preset.borrow().name.clone();
        if name.is_empty() {
            return Err(PresetError::InvalidArgument("preset has no name"));
        }
        if let Some(entry) = self.by_name.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = preset;
        } else {
            self.by_name.push((name, preset));
        }
        Ok(())
    }

    /// Look up a preset by bank slot.
    pub fn find_by_id(&self, id: u16) -> Option<SharedPreset> {
        self.by_id.get(&id).cloned()
    }

    /// Look up a preset by name.
    pub fn find_by_name(&self, name: &str) -> Option<SharedPreset> {
        self.by_name
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    }

    /// Detach a preset from the slot index, returning it. Dropping the
    /// returned handle destroys the preset once no other index holds it.
    pub fn remove_by_id(&mut self, id: u16) -> Option<SharedPreset> {
        self.by_id.remove(&id)
    }

    /// Detach a preset from the name index, returning it.
    pub fn remove_by_name(&mut self, name: &str) -> Option<SharedPreset> {
        let pos = self.by_name.iter().position(|(n, _)| n == name)?;
        Some(self.by_name.remove(pos).1)
    }

    /// Number of slot-indexed entries.
    pub fn bank_len(&self) -> usize {
        self.by_id.len()
    }

    /// Number of name-indexed entries.
    pub fn named_len(&self) -> usize {
        self.by_name.len()
    }

    /// True when neither index holds any preset.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_name.is_empty()
    }

    /// Iterate the full bank in slot order, yielding `None` for empty slots.
    pub fn iter_slots(&self) -> impl Iterator<Item = (u16, Option<SharedPreset>)> + '_ {
        (1..=BANK_SLOTS as u16).map(|slot| (slot, self.by_id.get(&slot).cloned()))
    }

    /// Iterate name-indexed presets in insertion order.
    pub fn iter_named(&self) -> impl Iterator<Item = (&str, SharedPreset)> + '_ {
        self.by_name.iter().map(|(n, p)| (n.as_str(), p.clone()))
    }

    /// Import a preset file (binary or PHB), registering the result by name.
    pub fn import(&mut self, path: impl AsRef<Path>, phb: bool) -> Result<SharedPreset> {
        let path = path.as_ref();
        info!(path = %path.display(), phb, "importing preset file");
        let preset = load_preset_file(path, phb)?;
        debug!(name = %preset.name, "imported preset");
        let shared = preset.into_shared();
        self.add_by_name(shared.clone())?;
        Ok(shared)
    }

    /// Render the listing the `list-presets` command prints: the device
    /// bank in slot order (empty slots as blank rows), then named presets.
    pub fn render_listing(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::from("Device presets:\n");
        if self.by_id.is_empty() {
            out.push_str(" (none)\n");
        } else {
            for (slot, preset) in self.iter_slots() {
                match preset {
                    Some(p) => {
                        let p = p.borrow();
                        let _ = write!(out, " [{:03}] {:<14}", p.id, p.name);
                    }
                    None => {
                        let _ = write!(out, " [000] {:<14}", "");
                    }
                }
                if slot % 3 == 0 {
                    out.push('\n');
                }
            }
        }
        out.push_str("\nNamed presets:\n");
        if self.by_name.is_empty() {
            out.push_str(" (none)\n");
        } else {
            for (i, (name, _)) in self.by_name.iter().enumerate() {
                let _ = write!(out, " [XXX] {name:<14}");
                if (i + 1) % 3 == 0 {
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        out
    }

    /// JSON document describing the store, used as the `list-presets`
    /// completion payload.
    pub fn to_json(&self) -> Value {
        let device: Vec<Value> = self
            .by_id
            .values()
            .map(|p| {
                let p = p.borrow();
                json!({ "id": p.id, "name": p.name })
            })
            .collect();
        let named: Vec<Value> = self
            .by_name
            .iter()
            .map(|(name, _)| json!({ "name": name }))
            .collect();
        json!({ "device": device, "named": named })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::Preset;

    fn preset(name: &str) -> SharedPreset {
        Preset::new(name).into_shared()
    }

    #[test]
    fn add_by_id_assigns_slot_and_rejects_duplicates() {
        let mut store = PresetStore::new();
        let p = preset("One");
        store.add_by_id(p.clone(), 7).unwrap();
        assert_eq!(p.borrow().id, 7);
        assert!(matches!(
            store.add_by_id(preset("Two"), 7),
            Err(PresetError::InvalidArgument(_))
        ));
        assert!(store.add_by_id(preset("Three"), 0).is_err());
        assert!(store.add_by_id(preset("Four"), 201).is_err());
    }

    #[test]
    fn removal_empties_the_slot() {
        let mut store = PresetStore::new();
        store.add_by_id(preset("One"), 7).unwrap();
        let stolen = store.remove_by_id(7);
        assert!(stolen.is_some());
        assert!(store.find_by_id(7).is_none());
        assert!(store.remove_by_id(7).is_none());
    }

    #[test]
    fn both_indexes_share_one_preset() {
        let mut store = PresetStore::new();
        let p = preset("Shared");
        store.add_by_name(p.clone()).unwrap();
        store.add_by_id(p, 3).unwrap();
        // Mutation through one index is visible through the other
        store.find_by_id(3).unwrap().borrow_mut().expressions[0] = 99;
        let via_name = store.find_by_name("Shared").unwrap();
        assert_eq!(via_name.borrow().expressions[0], 99);
        assert_eq!(via_name.borrow().id, 3);
        // Dropping the slot entry leaves the name entry valid
        store.remove_by_id(3);
        assert!(store.find_by_name("Shared").is_some());
    }

    #[test]
    fn add_by_name_replaces_same_name() {
        let mut store = PresetStore::new();
        store.add_by_name(preset("Tone")).unwrap();
        let replacement = preset("Tone");
        replacement.borrow_mut().expressions[5] = 1;
        store.add_by_name(replacement).unwrap();
        assert_eq!(store.named_len(), 1);
        assert_eq!(store.find_by_name("Tone").unwrap().borrow().expressions[5], 1);
    }

    #[test]
    fn unnamed_presets_are_rejected() {
        let mut store = PresetStore::new();
        assert!(matches!(
            store.add_by_name(preset("")),
            Err(PresetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn listing_walks_all_slots() {
        let mut store = PresetStore::new();
        store.add_by_id(preset("Used"), 2).unwrap();
        let rows: Vec<_> = store.iter_slots().collect();
        assert_eq!(rows.len(), BANK_SLOTS);
        assert!(rows[0].1.is_none());
        assert_eq!(rows[1].1.as_ref().unwrap().borrow().name, "Used");
        let text = store.render_listing();
        assert!(text.contains("[002] Used"));
    }

    #[test]
    fn json_listing_shape() {
        let mut store = PresetStore::new();
        store.add_by_id(preset("A"), 1).unwrap();
        store.add_by_name(preset("B")).unwrap();
        let doc = store.to_json();
        assert_eq!(doc["device"][0]["id"], 1);
        assert_eq!(doc["named"][0]["name"], "B");
    }
}
