//! Per-device configuration.

use crate::{
    interface::{Oversize, HID_INTERFACE_VERSION_MAX},
    HidError, Result,
};

/// Options fixed when a device is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdoConfig {
    /// Collaborator interface version requested at attach.
    pub interface_version: u32,
    /// Fail pending reads when the device leaves D0, not only on
    /// query-stop/query-remove.
    pub drain_on_power_down: bool,
    /// Truncate reports larger than the read buffer instead of failing the
    /// read with [`HidError::BufferTooSmall`].
    pub truncate_oversized_reports: bool,
}

impl Default for FdoConfig {
    fn default() -> Self {
        Self {
            interface_version: HID_INTERFACE_VERSION_MAX,
            drain_on_power_down: false,
            truncate_oversized_reports: true,
        }
    }
}

impl FdoConfig {
    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.interface_version == 0 || self.interface_version > HID_INTERFACE_VERSION_MAX {
            return Err(HidError::InvalidParameter);
        }
        Ok(())
    }

    /// Start from the defaults.
    #[must_use]
    pub fn builder() -> FdoConfigBuilder {
        FdoConfigBuilder::default()
    }

    pub(crate) fn oversize(&self) -> Oversize {
        if self.truncate_oversized_reports {
            Oversize::Truncate
        } else {
            Oversize::Fail
        }
    }
}

/// Builder for [`FdoConfig`].
#[derive(Debug, Default)]
pub struct FdoConfigBuilder {
    config: FdoConfig,
}

impl FdoConfigBuilder {
    /// Collaborator interface version to request.
    #[must_use]
    pub fn interface_version(mut self, version: u32) -> Self {
        self.config.interface_version = version;
        self
    }

    /// Fail pending reads on every transition out of D0.
    #[must_use]
    pub fn drain_on_power_down(mut self, drain: bool) -> Self {
        self.config.drain_on_power_down = drain;
        self
    }

    /// Truncate oversized reports instead of failing the read.
    #[must_use]
    pub fn truncate_oversized_reports(mut self, truncate: bool) -> Self {
        self.config.truncate_oversized_reports = truncate;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<FdoConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preserves_power_down_semantics() {
        let config = FdoConfig::default();
        assert!(!config.drain_on_power_down);
        assert!(config.truncate_oversized_reports);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn builder_sets_fields() {
        let config = FdoConfig::builder()
            .drain_on_power_down(true)
            .truncate_oversized_reports(false)
            .build()
            .expect("valid");
        assert!(config.drain_on_power_down);
        assert_eq!(config.oversize(), Oversize::Fail);
    }

    #[test]
    fn rejects_unknown_interface_version() {
        assert_eq!(
            FdoConfig::builder().interface_version(0).build(),
            Err(HidError::InvalidParameter)
        );
        assert_eq!(
            FdoConfig::builder()
                .interface_version(HID_INTERFACE_VERSION_MAX + 1)
                .build(),
            Err(HidError::InvalidParameter)
        );
    }
}
