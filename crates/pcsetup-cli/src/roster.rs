//! Imported computers and their per-computer setting records.

use std::collections::{BTreeMap, HashSet};

use pcsetup_core::{Computer, ConfigurationTree, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Selection state and private settings of one computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRecord {
    pub selected: bool,
    /// Set only by an explicit save; never cleared automatically.
    pub has_custom_settings: bool,
    pub settings: ConfigurationTree,
}

impl SettingRecord {
    /// Record for a computer seen for the first time.
    pub const fn new(common: &ConfigurationTree) -> Self {
        Self {
            selected: true,
            has_custom_settings: false,
            settings: *common,
        }
    }
}

/// The active computer list plus every setting record created so far.
///
/// Records outlive re-imports: a computer that disappears and comes back
/// keeps its selection and customization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    computers: Vec<Computer>,
    records: BTreeMap<String, SettingRecord>,
}

impl Roster {
    /// Replace the active list. Returns how many computers got a new record.
    ///
    /// Duplicate names within one import keep their first occurrence.
    pub fn import_computers(&mut self, computers: Vec<Computer>, common: &ConfigurationTree) -> usize {
        let mut seen = HashSet::new();
        let mut created = 0;
        self.computers = computers
            .into_iter()
            .filter(|pc| {
                let first = seen.insert(pc.computer_name.clone());
                if !first {
                    warn!(computer = %pc.computer_name, "duplicate computer name ignored");
                }
                first
            })
            .collect();
        for pc in &self.computers {
            if !self.records.contains_key(&pc.computer_name) {
                self.records
                    .insert(pc.computer_name.clone(), SettingRecord::new(common));
                created += 1;
            }
        }
        debug!(total = self.computers.len(), created, "computers imported");
        created
    }

    /// Select or deselect one computer. Returns `false` for an unknown name.
    pub fn toggle_selection(&mut self, name: &str, selected: bool) -> bool {
        match self.records.get_mut(name) {
            Some(record) => {
                record.selected = selected;
                true
            }
            None => {
                debug!(computer = %name, "selection change for unknown computer ignored");
                false
            }
        }
    }

    pub fn select_all(&mut self, selected: bool) {
        for pc in &self.computers {
            if let Some(record) = self.records.get_mut(&pc.computer_name) {
                record.selected = selected;
            }
        }
    }

    /// Computers of the active list whose record is selected, in import order.
    pub fn selected_computers(&self) -> impl Iterator<Item = &Computer> + '_ {
        self.computers
            .iter()
            .filter(|pc| self.records.get(&pc.computer_name).is_some_and(|r| r.selected))
    }

    pub fn selected_count(&self) -> usize {
        self.selected_computers().count()
    }

    pub fn computers(&self) -> &[Computer] {
        &self.computers
    }

    pub fn get(&self, name: &str) -> Option<&Computer> {
        self.computers.iter().find(|pc| pc.computer_name == name)
    }

    pub fn record(&self, name: &str) -> Option<&SettingRecord> {
        self.records.get(name)
    }

    pub(crate) fn record_mut(&mut self, name: &str) -> Option<&mut SettingRecord> {
        self.records.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.computers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.computers.is_empty()
    }

    /// Check that the roster can move on to configuration.
    pub fn validate_proceed(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation("Import a CSV file first"));
        }
        if self.selected_computers().next().is_none() {
            return Err(Error::validation("Select at least one computer"));
        }
        Ok(())
    }
}
