//! The provisioning configuration tree.
//!
//! A tree is exactly four groups (`os`, `office`, `apps`, `system`), each a
//! fixed set of boolean toggles. Keys are closed enums, so adding a toggle is
//! a compile-time change that every `match` has to acknowledge.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Defines one settings group: the struct of toggles (all enabled by
/// default), its key enum, and typed accessors between the two.
macro_rules! define_setting_group {
    (
        $(#[$meta:meta])*
        $group:ident, $key:ident {
            $( $field:ident => $variant:ident, $label:literal; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        #[allow(clippy::struct_excessive_bools)]
        pub struct $group {
            $( pub $field: bool, )+
        }

        impl Default for $group {
            fn default() -> Self {
                Self { $( $field: true, )+ }
            }
        }

        impl $group {
            pub const fn get(&self, key: $key) -> bool {
                match key {
                    $( $key::$variant => self.$field, )+
                }
            }

            pub const fn set(&mut self, key: $key, value: bool) {
                match key {
                    $( $key::$variant => self.$field = value, )+
                }
            }

            pub const fn set_all(&mut self, value: bool) {
                $( self.$field = value; )+
            }
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $key {
            $( $variant, )+
        }

        impl $key {
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )+ ];

            /// Wire name, identical to the backend option field.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($field), )+
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( stringify!($field) => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

define_setting_group! {
    /// Windows configuration tweaks.
    OsSettings, OsKey {
        setup_desktop_icons => SetupDesktopIcons, "Show standard desktop icons";
        move_vpn_icon => MoveVpnIcon, "Move FortiClient VPN out of the tray overflow";
        disable_ipv6 => DisableIpv6, "Disable IPv6";
        disable_defender => DisableDefender, "Disable Windows Defender firewall";
        unpin_mail_store => UnpinMailStore, "Unpin Mail and Store";
        setup_edge_defaults => SetupEdgeDefaults, "Edge default sites";
        set_edge_as_default => SetEdgeAsDefault, "Edge as default browser";
        setup_default_mail => SetupDefaultMail, "Default programs (mail, web browser)";
        setup_default_pdf => SetupDefaultPdf, "Default programs (.pdf, .pdx)";
    }
}

define_setting_group! {
    /// Microsoft 365 installation and sign-in.
    OfficeSettings, OfficeKey {
        install_office => InstallOffice, "Install (Office Deployment Tool)";
        setup_office_auth => SetupOfficeAuth, "Authentication setup";
        configure_office_apps => ConfigureOfficeApps, "Application settings";
    }
}

define_setting_group! {
    /// Third-party application installs.
    AppSettings, AppKey {
        install_dvd_software => InstallDvdSoftware, "DVD software";
        install_carbon_black => InstallCarbonBlack, "Carbon Black";
        install_forticlient_vpn => InstallForticlientVpn, "FortiClient VPN";
        install_ares_standard => InstallAresStandard, "ARES Standard";
        install_apex_one => InstallApexOne, "TrendMicro Apex One";
        install_virus_buster => InstallVirusBuster, "TrendMicro Virus Buster Cloud";
    }
}

define_setting_group! {
    /// Updates, cleanup and the final restart.
    SystemSettings, SystemKey {
        update_office => UpdateOffice, "Microsoft 365 update";
        update_windows => UpdateWindows, "Windows Update";
        cleanup_system => CleanupSystem, "System and disk cleanup";
        restart_system => RestartSystem, "Restart";
    }
}

/// The four configuration groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingGroup {
    Os,
    Office,
    Apps,
    System,
}

impl SettingGroup {
    pub const ALL: [Self; 4] = [Self::Os, Self::Office, Self::Apps, Self::System];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Os => "os",
            Self::Office => "office",
            Self::Apps => "apps",
            Self::System => "system",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Os => "OS settings",
            Self::Office => "Microsoft 365",
            Self::Apps => "Application installs",
            Self::System => "System updates",
        }
    }

    /// Every key belonging to this group, in display order.
    pub fn keys(self) -> Vec<SettingKey> {
        match self {
            Self::Os => OsKey::ALL.iter().copied().map(SettingKey::Os).collect(),
            Self::Office => OfficeKey::ALL
                .iter()
                .copied()
                .map(SettingKey::Office)
                .collect(),
            Self::Apps => AppKey::ALL.iter().copied().map(SettingKey::Apps).collect(),
            Self::System => SystemKey::ALL
                .iter()
                .copied()
                .map(SettingKey::System)
                .collect(),
        }
    }
}

impl fmt::Display for SettingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SettingGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "unknown settings group '{s}' (expected os, office, apps or system)"
                ))
            })
    }
}

/// A fully qualified toggle: group plus key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    Os(OsKey),
    Office(OfficeKey),
    Apps(AppKey),
    System(SystemKey),
}

impl SettingKey {
    pub const fn group(self) -> SettingGroup {
        match self {
            Self::Os(_) => SettingGroup::Os,
            Self::Office(_) => SettingGroup::Office,
            Self::Apps(_) => SettingGroup::Apps,
            Self::System(_) => SettingGroup::System,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Os(k) => k.name(),
            Self::Office(k) => k.name(),
            Self::Apps(k) => k.name(),
            Self::System(k) => k.name(),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Os(k) => k.label(),
            Self::Office(k) => k.label(),
            Self::Apps(k) => k.label(),
            Self::System(k) => k.label(),
        }
    }

    /// Every key of every group.
    pub fn all() -> impl Iterator<Item = Self> {
        SettingGroup::ALL.into_iter().flat_map(SettingGroup::keys)
    }

    fn in_group(group: SettingGroup, name: &str) -> Option<Self> {
        match group {
            SettingGroup::Os => OsKey::from_name(name).map(Self::Os),
            SettingGroup::Office => OfficeKey::from_name(name).map(Self::Office),
            SettingGroup::Apps => AppKey::from_name(name).map(Self::Apps),
            SettingGroup::System => SystemKey::from_name(name).map(Self::System),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group(), self.name())
    }
}

/// Accepts `group.key` or a bare `key` (key names are unique across groups).
impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let found = match s.split_once('.') {
            Some((group, key)) => Self::in_group(group.parse()?, key),
            None => SettingGroup::ALL
                .into_iter()
                .find_map(|group| Self::in_group(group, s)),
        };
        found.ok_or_else(|| Error::validation(format!("unknown setting '{s}'")))
    }
}

/// The complete four-group configuration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationTree {
    pub os: OsSettings,
    pub office: OfficeSettings,
    pub apps: AppSettings,
    pub system: SystemSettings,
}

impl ConfigurationTree {
    pub const fn get(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::Os(k) => self.os.get(k),
            SettingKey::Office(k) => self.office.get(k),
            SettingKey::Apps(k) => self.apps.get(k),
            SettingKey::System(k) => self.system.get(k),
        }
    }

    pub const fn set(&mut self, key: SettingKey, value: bool) {
        match key {
            SettingKey::Os(k) => self.os.set(k, value),
            SettingKey::Office(k) => self.office.set(k, value),
            SettingKey::Apps(k) => self.apps.set(k, value),
            SettingKey::System(k) => self.system.set(k, value),
        }
    }

    /// Sets every toggle in `group` (the "select all" checkbox).
    pub const fn set_group(&mut self, group: SettingGroup, value: bool) {
        match group {
            SettingGroup::Os => self.os.set_all(value),
            SettingGroup::Office => self.office.set_all(value),
            SettingGroup::Apps => self.apps.set_all(value),
            SettingGroup::System => self.system.set_all(value),
        }
    }

    /// Whether every toggle in `group` is on.
    pub fn group_all_enabled(&self, group: SettingGroup) -> bool {
        group.keys().into_iter().all(|key| self.get(key))
    }

    /// Enabled toggles of `group`, in display order.
    pub fn enabled_keys(&self, group: SettingGroup) -> Vec<SettingKey> {
        group
            .keys()
            .into_iter()
            .filter(|key| self.get(*key))
            .collect()
    }

    /// Flat `option name -> enabled` map, the shape of the backend's
    /// request-wide options record.
    pub fn flatten(&self) -> BTreeMap<&'static str, bool> {
        SettingKey::all()
            .map(|key| (key.name(), self.get(key)))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_tree_enables_everything() {
        let tree = ConfigurationTree::default();
        assert!(SettingKey::all().all(|key| tree.get(key)));
        assert_eq!(SettingKey::all().count(), 22);
    }

    #[test]
    fn key_parses_qualified_and_bare_names() {
        let qualified: SettingKey = "os.disable_ipv6".parse().unwrap();
        let bare: SettingKey = "disable_ipv6".parse().unwrap();
        assert_eq!(qualified, SettingKey::Os(OsKey::DisableIpv6));
        assert_eq!(qualified, bare);
        assert_eq!(qualified.to_string(), "os.disable_ipv6");
    }

    #[test]
    fn key_in_wrong_group_is_rejected() {
        assert!("office.disable_ipv6".parse::<SettingKey>().is_err());
        assert!("nope.disable_ipv6".parse::<SettingKey>().is_err());
        assert!("install_everything".parse::<SettingKey>().is_err());
    }

    #[test]
    fn set_group_only_touches_that_group() {
        let mut tree = ConfigurationTree::default();
        tree.set_group(SettingGroup::Apps, false);
        assert!(tree.enabled_keys(SettingGroup::Apps).is_empty());
        assert!(tree.group_all_enabled(SettingGroup::Os));
        assert!(tree.group_all_enabled(SettingGroup::System));
    }

    #[test]
    fn tree_serializes_as_nested_groups() {
        let mut tree = ConfigurationTree::default();
        tree.set(SettingKey::System(SystemKey::RestartSystem), false);
        let value = serde_json::to_value(tree).unwrap();
        assert_eq!(value["system"]["restart_system"], false);
        assert_eq!(value["os"]["disable_ipv6"], true);
    }

    #[test]
    fn missing_keys_fall_back_to_enabled() {
        let tree: ConfigurationTree =
            serde_json::from_str(r#"{"office": {"install_office": false}}"#).unwrap();
        assert!(!tree.office.install_office);
        assert!(tree.office.setup_office_auth);
        assert!(tree.apps.install_apex_one);
    }

    #[test]
    fn flatten_uses_backend_option_names() {
        let mut tree = ConfigurationTree::default();
        tree.set(SettingKey::Office(OfficeKey::InstallOffice), false);
        let flat = tree.flatten();
        assert_eq!(flat.len(), 22);
        assert_eq!(flat.get("install_office"), Some(&false));
        assert_eq!(flat.get("update_windows"), Some(&true));
    }
}
