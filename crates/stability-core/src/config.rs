use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::export::ExportRequest;
use crate::region::RegionGeometry;
use crate::zonal::AggregationOptions;

/// Run configuration. Defaults reproduce the reference study setup:
/// 10 m scale, best-effort reductions, a one-billion pixel budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Nominal resolution (m) recorded with exports.
    pub scale: f64,
    /// Allow block-approximate region membership on oversized regions.
    pub best_effort: bool,
    /// Pixel budget for reductions and exports.
    pub max_pixels: u64,
    /// Base name of the exported class raster.
    pub export_description: String,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            scale: 10.0,
            best_effort: true,
            max_pixels: 1_000_000_000,
            export_description: "StabilityClass_ROI".to_string(),
        }
    }
}

impl StabilityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0) {
            return Err(Error::InvalidParameter {
                name: "scale",
                value: self.scale.to_string(),
                reason: "must be positive".into(),
            });
        }
        if self.max_pixels == 0 {
            return Err(Error::InvalidParameter {
                name: "max_pixels",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn aggregation(&self) -> AggregationOptions {
        AggregationOptions {
            best_effort: self.best_effort,
            max_pixels: self.max_pixels,
        }
    }

    pub fn export_request(&self, region: &RegionGeometry) -> ExportRequest {
        ExportRequest {
            description: self.export_description.clone(),
            scale: self.scale,
            max_pixels: self.max_pixels,
            region: region.to_def(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: StabilityConfig = serde_json::from_str(r#"{"best_effort": false}"#).unwrap();
        assert!(!cfg.best_effort);
        assert_eq!(cfg.scale, 10.0);
        assert_eq!(cfg.max_pixels, 1_000_000_000);
        assert_eq!(cfg.export_description, "StabilityClass_ROI");
    }

    #[test]
    fn rejects_non_positive_scale() {
        let cfg = StabilityConfig { scale: 0.0, ..StabilityConfig::default() };
        assert!(cfg.validate().is_err());
        assert!(StabilityConfig::default().validate().is_ok());
    }
}
