//! Configuration overlay: the common tree plus per-computer overrides.
//!
//! A computer uses its own tree only after its settings were explicitly
//! saved. Until then the common tree applies, as it stands at submission
//! time, so later edits to the common tree still reach it.

use pcsetup_core::{ConfigurationTree, SettingGroup, SettingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::roster::{Roster, SettingRecord};

/// Holder of the common/default tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    common: ConfigurationTree,
}

impl Overlay {
    pub const fn common(&self) -> &ConfigurationTree {
        &self.common
    }

    /// Change one toggle of the common tree. Per-computer copies are not
    /// touched.
    pub const fn set_common_toggle(&mut self, key: SettingKey, value: bool) {
        self.common.set(key, value);
    }

    pub const fn set_common_group(&mut self, group: SettingGroup, value: bool) {
        self.common.set_group(group, value);
    }

    /// The tree that will be submitted for a computer with this record.
    pub const fn resolve_effective_config(&self, record: &SettingRecord) -> ConfigurationTree {
        if record.has_custom_settings {
            record.settings
        } else {
            self.common
        }
    }

    /// Effective tree for a computer by name.
    pub fn effective_for(&self, roster: &Roster, name: &str) -> Option<ConfigurationTree> {
        roster
            .record(name)
            .map(|record| self.resolve_effective_config(record))
    }
}

/// Change one toggle in a computer's own tree. Returns `false` for an unknown
/// computer.
///
/// The edit takes effect only once the computer is marked customized.
pub fn set_computer_toggle(roster: &mut Roster, name: &str, key: SettingKey, value: bool) -> bool {
    edit_record(roster, name, |record| record.settings.set(key, value))
}

pub fn set_computer_group(roster: &mut Roster, name: &str, group: SettingGroup, value: bool) -> bool {
    edit_record(roster, name, |record| record.settings.set_group(group, value))
}

/// Commit a computer's own tree (the "save" action). Irreversible.
pub fn mark_customized(roster: &mut Roster, name: &str) -> bool {
    edit_record(roster, name, |record| record.has_custom_settings = true)
}

fn edit_record(roster: &mut Roster, name: &str, edit: impl FnOnce(&mut SettingRecord)) -> bool {
    match roster.record_mut(name) {
        Some(record) => {
            edit(record);
            true
        }
        None => {
            debug!(computer = %name, "settings change for unknown computer ignored");
            false
        }
    }
}
