//! Well-known remote-configuration keys
//!
//! Reference data for the configuration get/set exchanges: each key is
//! tagged with the feature profile it belongs to and the primitive type
//! its value must parse as. Not mutated at runtime.

/// Feature profile a configuration key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureProfile {
    Core,
    FirmwareManagement,
    LocalAuthListManagement,
    Reservation,
    SmartCharging,
    RemoteTrigger,
}

/// Primitive type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Boolean,
    Integer,
    CommaSeparatedList,
}

macro_rules! configuration_keys {
    ($($variant:ident => ($wire:literal, $profile:ident, $ty:ident)),+ $(,)?) => {
        /// Well-known configuration keys.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ConfigurationKey {
            $($variant),+
        }

        impl ConfigurationKey {
            pub const ALL: &'static [ConfigurationKey] = &[$(ConfigurationKey::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn feature_profile(&self) -> FeatureProfile {
                match self {
                    $(Self::$variant => FeatureProfile::$profile),+
                }
            }

            pub fn key_type(&self) -> KeyType {
                match self {
                    $(Self::$variant => KeyType::$ty),+
                }
            }
        }
    };
}

configuration_keys! {
    AllowOfflineTxForUnknownId => ("AllowOfflineTxForUnknownId", Core, Boolean),
    AuthorizationCacheEnabled => ("AuthorizationCacheEnabled", Core, Boolean),
    AuthorizeRemoteTxRequests => ("AuthorizeRemoteTxRequests", Core, Boolean),
    ClockAlignedDataInterval => ("ClockAlignedDataInterval", Core, Integer),
    ConnectionTimeOut => ("ConnectionTimeOut", Core, Integer),
    ConnectorPhaseRotation => ("ConnectorPhaseRotation", Core, CommaSeparatedList),
    GetConfigurationMaxKeys => ("GetConfigurationMaxKeys", Core, Integer),
    HeartbeatInterval => ("HeartbeatInterval", Core, Integer),
    LocalAuthorizeOffline => ("LocalAuthorizeOffline", Core, Boolean),
    LocalPreAuthorize => ("LocalPreAuthorize", Core, Boolean),
    MeterValuesAlignedData => ("MeterValuesAlignedData", Core, CommaSeparatedList),
    MeterValuesSampledData => ("MeterValuesSampledData", Core, CommaSeparatedList),
    MeterValueSampleInterval => ("MeterValueSampleInterval", Core, Integer),
    NumberOfConnectors => ("NumberOfConnectors", Core, Integer),
    ResetRetries => ("ResetRetries", Core, Integer),
    StopTransactionOnEvSideDisconnect => ("StopTransactionOnEVSideDisconnect", Core, Boolean),
    StopTransactionOnInvalidId => ("StopTransactionOnInvalidId", Core, Boolean),
    StopTxnAlignedData => ("StopTxnAlignedData", Core, CommaSeparatedList),
    StopTxnSampledData => ("StopTxnSampledData", Core, CommaSeparatedList),
    SupportedFeatureProfiles => ("SupportedFeatureProfiles", Core, CommaSeparatedList),
    TransactionMessageAttempts => ("TransactionMessageAttempts", Core, Integer),
    TransactionMessageRetryInterval => ("TransactionMessageRetryInterval", Core, Integer),
    UnlockConnectorOnEvSideDisconnect => ("UnlockConnectorOnEVSideDisconnect", Core, Boolean),
    WebSocketPingInterval => ("WebSocketPingInterval", Core, Integer),
    SupportedFileTransferProtocols => ("SupportedFileTransferProtocols", FirmwareManagement, CommaSeparatedList),
    LocalAuthListEnabled => ("LocalAuthListEnabled", LocalAuthListManagement, Boolean),
    LocalAuthListMaxLength => ("LocalAuthListMaxLength", LocalAuthListManagement, Integer),
    SendLocalListMaxLength => ("SendLocalListMaxLength", LocalAuthListManagement, Integer),
    ReserveConnectorZeroSupported => ("ReserveConnectorZeroSupported", Reservation, Boolean),
    ChargeProfileMaxStackLevel => ("ChargeProfileMaxStackLevel", SmartCharging, Integer),
    ChargingScheduleAllowedChargingRateUnit => ("ChargingScheduleAllowedChargingRateUnit", SmartCharging, CommaSeparatedList),
    ChargingScheduleMaxPeriods => ("ChargingScheduleMaxPeriods", SmartCharging, Integer),
    ConnectorSwitch3to1PhaseSupported => ("ConnectorSwitch3to1PhaseSupported", SmartCharging, Boolean),
    MaxChargingProfilesInstalled => ("MaxChargingProfilesInstalled", SmartCharging, Integer),
}

impl ConfigurationKey {
    /// Whether `value` parses as this key's declared type.
    ///
    /// A comma-separated list accepts any non-empty items; an empty string
    /// is a valid empty list.
    pub fn accepts_value(&self, value: &str) -> bool {
        match self.key_type() {
            KeyType::Boolean => matches!(value, "true" | "false"),
            KeyType::Integer => value.parse::<i64>().is_ok(),
            KeyType::CommaSeparatedList => {
                value.is_empty() || value.split(',').all(|item| !item.trim().is_empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_wire_name() {
        let key = ConfigurationKey::from_name("HeartbeatInterval").unwrap();
        assert_eq!(key, ConfigurationKey::HeartbeatInterval);
        assert_eq!(key.feature_profile(), FeatureProfile::Core);
        assert_eq!(key.key_type(), KeyType::Integer);
        assert!(ConfigurationKey::from_name("NoSuchKey").is_none());
    }

    #[test]
    fn wire_names_roundtrip() {
        for key in ConfigurationKey::ALL {
            assert_eq!(ConfigurationKey::from_name(key.name()), Some(*key));
        }
    }

    #[test]
    fn boolean_values() {
        let key = ConfigurationKey::LocalAuthListEnabled;
        assert!(key.accepts_value("true"));
        assert!(key.accepts_value("false"));
        assert!(!key.accepts_value("yes"));
    }

    #[test]
    fn integer_values() {
        let key = ConfigurationKey::HeartbeatInterval;
        assert!(key.accepts_value("300"));
        assert!(!key.accepts_value("5m"));
    }

    #[test]
    fn list_values() {
        let key = ConfigurationKey::MeterValuesSampledData;
        assert!(key.accepts_value("Energy.Active.Import.Register,Power.Active.Import"));
        assert!(key.accepts_value(""));
        assert!(!key.accepts_value("a,,b"));
    }
}
