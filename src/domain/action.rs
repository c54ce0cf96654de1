//! Protocol action identity
//!
//! Each protocol version carries two closed action enumerations, one per
//! message direction. Dispatch is keyed by `(version, direction, name)` so
//! actions from different versions can never collide, even when they share
//! a name. The per-version tables are constant data resolved at startup.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::version::OcppVersion;

/// Direction a call travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageDirection {
    /// Charge point → central system.
    CentralBound,
    /// Central system → charge point.
    ChargePointBound,
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CentralBound => write!(f, "CS"),
            Self::ChargePointBound => write!(f, "CP"),
        }
    }
}

/// Common capability of every per-version action enumeration.
pub trait ActionName {
    /// The wire name of this action, e.g. `"StartTransaction"`.
    fn name(&self) -> &'static str;
}

/// Dispatch-table key: `(version, direction, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub version: OcppVersion,
    pub direction: MessageDirection,
    pub name: &'static str,
}

impl ActionKey {
    pub fn new(version: OcppVersion, direction: MessageDirection, name: &'static str) -> Self {
        Self {
            version,
            direction,
            name,
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.version.version_string(),
            self.direction,
            self.name
        )
    }
}

/// Resolve an inbound action name against the constant table for
/// `(version, direction)`. Returns `None` for unknown actions — the
/// dispatcher turns that into a `NotImplemented` call error.
pub fn resolve(version: OcppVersion, direction: MessageDirection, name: &str) -> Option<ActionKey> {
    let canonical = match (version, direction) {
        (OcppVersion::V16, MessageDirection::CentralBound) => {
            v16::CentralAction::from_name(name).map(|a| a.name())
        }
        (OcppVersion::V16, MessageDirection::ChargePointBound) => {
            v16::ChargePointAction::from_name(name).map(|a| a.name())
        }
        (OcppVersion::V201, MessageDirection::CentralBound) => {
            v201::CentralAction::from_name(name).map(|a| a.name())
        }
        (OcppVersion::V201, MessageDirection::ChargePointBound) => {
            v201::ChargePointAction::from_name(name).map(|a| a.name())
        }
    };
    canonical.map(|n| ActionKey::new(version, direction, n))
}

macro_rules! action_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl super::ActionName for $name {
            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }
    };
}

/// OCPP 1.6 action tables.
pub mod v16 {
    use super::super::version::OcppVersion;
    use super::{ActionKey, ActionName, MessageDirection};

    action_enum! {
        /// Actions a charge point may send to the central system.
        CentralAction {
            BootNotification => "BootNotification",
            Authorize => "Authorize",
            StartTransaction => "StartTransaction",
            StopTransaction => "StopTransaction",
            Heartbeat => "Heartbeat",
            MeterValues => "MeterValues",
            StatusNotification => "StatusNotification",
            DiagnosticsStatusNotification => "DiagnosticsStatusNotification",
            FirmwareStatusNotification => "FirmwareStatusNotification",
            DataTransfer => "DataTransfer",
        }
    }

    action_enum! {
        /// Actions the central system may send to a charge point.
        ChargePointAction {
            RemoteStartTransaction => "RemoteStartTransaction",
            RemoteStopTransaction => "RemoteStopTransaction",
            Reset => "Reset",
            UnlockConnector => "UnlockConnector",
            GetConfiguration => "GetConfiguration",
            ChangeConfiguration => "ChangeConfiguration",
            ClearCache => "ClearCache",
            ChangeAvailability => "ChangeAvailability",
            TriggerMessage => "TriggerMessage",
            SetChargingProfile => "SetChargingProfile",
        }
    }

    impl CentralAction {
        pub fn key(&self) -> ActionKey {
            ActionKey::new(OcppVersion::V16, MessageDirection::CentralBound, self.name())
        }
    }

    impl ChargePointAction {
        pub fn key(&self) -> ActionKey {
            ActionKey::new(
                OcppVersion::V16,
                MessageDirection::ChargePointBound,
                self.name(),
            )
        }
    }
}

/// OCPP 2.0.1 action tables.
pub mod v201 {
    use super::super::version::OcppVersion;
    use super::{ActionKey, ActionName, MessageDirection};

    action_enum! {
        /// Actions a charging station may send to the CSMS.
        CentralAction {
            BootNotification => "BootNotification",
            Authorize => "Authorize",
            Heartbeat => "Heartbeat",
            StatusNotification => "StatusNotification",
            MeterValues => "MeterValues",
            TransactionEvent => "TransactionEvent",
        }
    }

    action_enum! {
        /// Actions the CSMS may send to a charging station.
        ChargePointAction {
            RequestStartTransaction => "RequestStartTransaction",
            RequestStopTransaction => "RequestStopTransaction",
            Reset => "Reset",
            GetVariables => "GetVariables",
            SetVariables => "SetVariables",
        }
    }

    impl CentralAction {
        pub fn key(&self) -> ActionKey {
            ActionKey::new(OcppVersion::V201, MessageDirection::CentralBound, self.name())
        }
    }

    impl ChargePointAction {
        pub fn key(&self) -> ActionKey {
            ActionKey::new(
                OcppVersion::V201,
                MessageDirection::ChargePointBound,
                self.name(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_action() {
        let key = resolve(
            OcppVersion::V16,
            MessageDirection::CentralBound,
            "StartTransaction",
        )
        .unwrap();
        assert_eq!(key.name, "StartTransaction");
        assert_eq!(key.version, OcppVersion::V16);
    }

    #[test]
    fn resolve_unknown_action() {
        assert!(resolve(
            OcppVersion::V16,
            MessageDirection::CentralBound,
            "SignCertificate"
        )
        .is_none());
    }

    #[test]
    fn shared_names_stay_version_distinct() {
        let a = resolve(
            OcppVersion::V16,
            MessageDirection::CentralBound,
            "BootNotification",
        )
        .unwrap();
        let b = resolve(
            OcppVersion::V201,
            MessageDirection::CentralBound,
            "BootNotification",
        )
        .unwrap();
        assert_ne!(a, b);
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn direction_disambiguates() {
        // StartTransaction is only central-bound in 1.6.
        assert!(resolve(
            OcppVersion::V16,
            MessageDirection::ChargePointBound,
            "StartTransaction"
        )
        .is_none());
    }

    #[test]
    fn tables_have_unique_names() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for a in v16::CentralAction::ALL {
            assert!(seen.insert(a.name()));
        }
        seen.clear();
        for a in v16::ChargePointAction::ALL {
            assert!(seen.insert(a.name()));
        }
    }
}
