//! Shared value types used across the pipeline, config, and CLI.

use serde::{Deserialize, Serialize};

/// A signed WGS84 position in decimal degrees.
///
/// Negative latitude is south, negative longitude is west. Written into
/// EXIF as unsigned sexagesimal plus a hemisphere ref.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude_ref(&self) -> &'static str {
        if self.latitude < 0.0 { "S" } else { "N" }
    }

    pub fn longitude_ref(&self) -> &'static str {
        if self.longitude < 0.0 { "W" } else { "E" }
    }
}

/// Camera make and model of the capturing device.
///
/// Used to backfill `Make`/`Model` when a file lacks them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceInfo {
    pub make: Option<String>,
    pub model: Option<String>,
}

impl DeviceInfo {
    pub fn is_empty(&self) -> bool {
        self.make.is_none() && self.model.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hemisphere_refs_follow_sign() {
        let sydney = GeoLocation::new(-33.8688, 151.2093);
        assert_eq!(sydney.latitude_ref(), "S");
        assert_eq!(sydney.longitude_ref(), "E");

        let nyc = GeoLocation::new(40.7128, -74.0060);
        assert_eq!(nyc.latitude_ref(), "N");
        assert_eq!(nyc.longitude_ref(), "W");
    }

    #[test]
    fn equator_and_meridian_are_north_east() {
        let origin = GeoLocation::new(0.0, 0.0);
        assert_eq!(origin.latitude_ref(), "N");
        assert_eq!(origin.longitude_ref(), "E");
    }

    #[test]
    fn device_info_from_partial_toml() {
        let device: DeviceInfo = toml::from_str(r#"make = "Google""#).unwrap();
        assert_eq!(device.make.as_deref(), Some("Google"));
        assert!(device.model.is_none());
        assert!(!device.is_empty());
        assert!(DeviceInfo::default().is_empty());
    }
}
