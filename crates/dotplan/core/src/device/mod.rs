// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Devices
//!
//! A device is an evaluation target that can take over a subtree of a plan,
//! typically an external store that would rather run a whole query than hand
//! its rows back one scan at a time.
//!
//! ## Support Model
//!
//! Devices are asked about one node at a time, bottom up. A node is only put
//! to the devices once every child is device-supported, and the query carries
//! the device each child was assigned. Whether a device can absorb children
//! assigned elsewhere is its own call.
//!
//! Registration order is preference order: when several devices can take a
//! subtree, the first one registered wins.

pub mod sql;

pub use sql::SqlDevice;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::plan::PlanNode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Device unavailable: {0}")]
    Unavailable(String),
    #[error("Operation not supported: {0}")]
    Unsupported(String),
    #[error("Malformed tree: {0}")]
    MalformedTree(String),
    #[error("Device already registered: {0}")]
    DuplicateDevice(String),
}

impl DeviceError {
    /// Fatal errors abort planning. Every other error only means the node
    /// stays with in-process evaluation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceError::MalformedTree(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSupport {
    Unsupported,
    Supported { translation: Option<String> },
}

impl DeviceSupport {
    pub fn supported() -> Self {
        DeviceSupport::Supported { translation: None }
    }

    pub fn translated(translation: impl Into<String>) -> Self {
        DeviceSupport::Supported { translation: Some(translation.into()) }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, DeviceSupport::Supported { .. })
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Device: Send + Sync {
    /// Decides whether this device can evaluate `node`. `child_devices[i]` is
    /// the device currently assigned to child `i`.
    fn supports(&self, node: &PlanNode, child_devices: &[Option<String>]) -> Result<DeviceSupport, DeviceError>;
}

/// Devices known to the planner, in preference order.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<(String, Arc<dyn Device>)>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, device: Arc<dyn Device>) -> Result<(), DeviceError> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(DeviceError::DuplicateDevice(name));
        }
        self.devices.push((name, device));
        Ok(())
    }

    pub fn with_device(mut self, name: impl Into<String>, device: Arc<dyn Device>) -> Result<Self, DeviceError> {
        self.register(name, device)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|(n, _)| n == name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.devices.get(index).map(|(name, _)| name.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn entries(&self) -> &[(String, Arc<dyn Device>)] {
        &self.devices
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order_and_lookup() {
        let registry = DeviceRegistry::new()
            .with_device("sql", Arc::new(SqlDevice::new()))
            .unwrap()
            .with_device("cache", Arc::new(MockDevice::new()))
            .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["sql", "cache"]);
        assert_eq!(registry.position("cache"), Some(1));
        assert_eq!(registry.name(0), Some("sql"));
        assert_eq!(format!("{registry:?}"), r#"["sql", "cache"]"#);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = DeviceRegistry::new();
        registry.register("sql", Arc::new(SqlDevice::new())).unwrap();
        let err = registry.register("sql", Arc::new(SqlDevice::new())).unwrap_err();
        assert_eq!(err, DeviceError::DuplicateDevice("sql".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_only_malformed_tree_is_fatal() {
        assert!(DeviceError::MalformedTree("x".to_string()).is_fatal());
        assert!(!DeviceError::Unavailable("x".to_string()).is_fatal());
        assert!(!DeviceError::Unsupported("x".to_string()).is_fatal());
    }
}
