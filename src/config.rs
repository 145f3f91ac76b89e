use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{SpectrumError, SpectrumResult};

// ---------------------------------------------------------------------------
// Shift search policy
// ---------------------------------------------------------------------------

/// Tunables of the coarse-to-fine cross-correlation search.
///
/// The search only looks at offsets within
/// `max(min_window, window_fraction * span)` of zero (plus a quarter window
/// during refinement), so larger shifts are never found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftSearchConfig {
    /// Coarse half-window as a fraction of the reference wavelength span.
    pub window_fraction: f64,
    /// Lower bound of the coarse half-window, in wavelength units.
    pub min_window: f64,
    /// Number of candidates in the coarse pass.
    pub coarse_steps: usize,
    /// Number of candidates in the fine pass.
    pub fine_steps: usize,
    /// Fine half-window = coarse half-window / `fine_divisor`.
    pub fine_divisor: f64,
}

impl Default for ShiftSearchConfig {
    fn default() -> Self {
        Self {
            window_fraction: 0.05,
            min_window: 0.5,
            coarse_steps: 81,
            fine_steps: 41,
            fine_divisor: 4.0,
        }
    }
}

impl ShiftSearchConfig {
    pub fn validate(&self) -> SpectrumResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.window_fraction) {
            return Err(SpectrumError::InvalidConfig(format!(
                "window_fraction must be positive, got {}",
                self.window_fraction
            )));
        }
        if !positive(self.min_window) {
            return Err(SpectrumError::InvalidConfig(format!(
                "min_window must be positive, got {}",
                self.min_window
            )));
        }
        if !positive(self.fine_divisor) {
            return Err(SpectrumError::InvalidConfig(format!(
                "fine_divisor must be positive, got {}",
                self.fine_divisor
            )));
        }
        if self.coarse_steps < 2 || self.fine_steps < 2 {
            return Err(SpectrumError::InvalidConfig(format!(
                "step counts must be at least 2 (coarse {}, fine {})",
                self.coarse_steps, self.fine_steps
            )));
        }
        Ok(())
    }

    /// Coarse half-window for a reference spanning `span` wavelength units.
    pub fn coarse_window(&self, span: f64) -> f64 {
        self.min_window.max(span * self.window_fraction)
    }

    /// Largest magnitude the search can ever return for this `span`.
    pub fn max_shift(&self, span: f64) -> f64 {
        let window = self.coarse_window(span);
        window + window / self.fine_divisor
    }

    /// Spacing between neighbouring fine candidates.
    pub fn fine_resolution(&self, span: f64) -> f64 {
        let fine_window = self.coarse_window(span) / self.fine_divisor;
        2.0 * fine_window / (self.fine_steps - 1) as f64
    }
}

// ---------------------------------------------------------------------------
// Wavelength window
// ---------------------------------------------------------------------------

/// Closed wavelength interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnrWindow {
    pub low: f64,
    pub high: f64,
}

impl SnrWindow {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Window centred on `center`; the sign of `half_width` is ignored.
    pub fn from_center(center: f64, half_width: f64) -> Self {
        let half = half_width.abs();
        Self {
            low: center - half,
            high: center + half,
        }
    }

    pub fn contains(&self, wavelength: f64) -> bool {
        wavelength >= self.low && wavelength <= self.high
    }
}

// ---------------------------------------------------------------------------
// Application configuration
// ---------------------------------------------------------------------------

/// Settings read from an optional JSON file; CLI flags override them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: ShiftSearchConfig,
    pub snr_window: Option<SnrWindow>,
    pub rest_frame: bool,
    pub reference_index: usize,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text).context("parsing config JSON")?;
        config.search.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let cfg = ShiftSearchConfig::default();
        assert_eq!(cfg.coarse_steps, 81);
        assert_eq!(cfg.fine_steps, 41);
        assert_eq!(cfg.coarse_window(9.0), 0.5);
        assert!((cfg.coarse_window(100.0) - 5.0).abs() < 1e-12);
        assert!((cfg.fine_resolution(9.0) - 0.00625).abs() < 1e-12);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = AppConfig::from_json(r#"{ "search": { "coarse_steps": 21 }, "rest_frame": true }"#)
            .unwrap();
        assert_eq!(cfg.search.coarse_steps, 21);
        assert_eq!(cfg.search.fine_steps, 41);
        assert!(cfg.rest_frame);
        assert_eq!(cfg.reference_index, 0);
        assert!(cfg.snr_window.is_none());
    }

    #[test]
    fn invalid_search_config_is_rejected() {
        assert!(AppConfig::from_json(r#"{ "search": { "fine_steps": 1 } }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "search": { "min_window": -1.0 } }"#).is_err());
    }

    #[test]
    fn window_from_center_is_closed_and_symmetric() {
        let w = SnrWindow::from_center(656.3, -1.0);
        assert!((w.low - 655.3).abs() < 1e-9);
        assert!((w.high - 657.3).abs() < 1e-9);
        assert!(w.contains(w.low));
        assert!(w.contains(w.high));
        assert!(!w.contains(657.4));
    }
}
