// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{
    GAUSSIAN_RELAXATION_YEARS, MASS_BALANCE_TOLERANCE, N_TRAILING_POINTS,
    SATURATION_GUESS_MARGIN,
};
use crate::error::{MfaError, MfaResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Material model to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    Steel,
    Plastics,
    Cement,
}

/// Regression curve used for stock extrapolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrapolationKind {
    /// `y = a·x`, closed-form weighted fit on the trailing points.
    #[serde(alias = "ProportionalExtrapolation")]
    WeightedProportional,
    /// `y = A / (1 + exp(B/x))`
    #[serde(alias = "PehlExtrapolation")]
    Sigmoidal,
    /// `y = A·(1 − exp(−B·x))`
    #[serde(alias = "ExponentialSaturationExtrapolation")]
    Exponential,
    /// `y = A / (1 + exp(−β·(ln x − μ)))`
    #[default]
    #[serde(alias = "LogSigmoidExtrapolation")]
    LogSigmoidal,
    /// `y = A / (1 + exp(−k·(x − x0)))`
    #[serde(alias = "SigmoidExtrapolation")]
    Logistic,
}

/// Lifetime distribution of in-use stocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifetimeKind {
    #[serde(alias = "FixedLifetime")]
    Fixed,
    #[default]
    #[serde(alias = "NormalLifetime")]
    Normal,
    #[serde(alias = "FoldedNormalLifetime")]
    FoldedNormal,
    #[serde(alias = "LogNormalLifetime")]
    LogNormal,
    #[serde(alias = "WeibullLifetime")]
    Weibull,
}

/// Splice between observed history and fitted prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockCorrection {
    #[default]
    GaussianFirstOrder,
    ShiftZerothOrder,
    None,
}

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_class: ModelClass,
    #[serde(default = "default_input_data_path")]
    pub input_data_path: PathBuf,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub customization: Customization,
    #[serde(default)]
    pub stock_extrapolation: StockExtrapolationConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    /// Absolute tolerance of the mass-balance audit (t).
    #[serde(default = "default_mass_balance_tolerance")]
    pub mass_balance_tolerance: f64,
    #[serde(default)]
    pub do_export: ExportConfig,
    /// Passed through untouched; plotting is not part of the engine.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub visualization: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customization {
    #[serde(default)]
    pub stock_extrapolation_class_name: ExtrapolationKind,
    #[serde(default)]
    pub lifetime_model_name: LifetimeKind,
    #[serde(default)]
    pub do_stock_extrapolation_by_category: bool,
    /// Bounds on the fitted per-capita saturation level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation_bound: Option<SaturationBound>,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            stock_extrapolation_class_name: ExtrapolationKind::default(),
            lifetime_model_name: LifetimeKind::default(),
            do_stock_extrapolation_by_category: false,
            saturation_bound: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationBound {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockExtrapolationConfig {
    #[serde(default)]
    pub correction: StockCorrection,
    /// Gaussian relaxation time of the splice (years).
    #[serde(default = "default_relaxation_years")]
    pub relaxation_years: f64,
    /// Trailing historic points used for slope matching.
    #[serde(default = "default_slope_points")]
    pub slope_points: usize,
    /// Replace GDP per capita by its running maximum.
    #[serde(default = "default_true")]
    pub gdppc_accumulation: bool,
    /// `ε` of the log-sigmoid initial guess.
    #[serde(default = "default_guess_saturation_margin")]
    pub guess_saturation_margin: f64,
}

impl Default for StockExtrapolationConfig {
    fn default() -> Self {
        Self {
            correction: StockCorrection::default(),
            relaxation_years: default_relaxation_years(),
            slope_points: default_slope_points(),
            gdppc_accumulation: true,
            guess_saturation_margin: default_guess_saturation_margin(),
        }
    }
}

/// Bounded Levenberg–Marquardt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Relative cost reduction and gradient tolerance.
    #[serde(default = "default_solver_tolerance")]
    pub tolerance: f64,
    /// Relative forward-difference step of the Jacobian.
    #[serde(default = "default_fd_step")]
    pub fd_step: f64,
    /// Initial Marquardt damping.
    #[serde(default = "default_initial_lambda")]
    pub initial_lambda: f64,
    /// Per-iteration step clamp, relative to `max(|x|, 1)`.
    #[serde(default = "default_max_relative_step")]
    pub max_relative_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_solver_tolerance(),
            fd_step: default_fd_step(),
            initial_lambda: default_initial_lambda(),
            max_relative_step: default_max_relative_step(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Whole-system dictionary (npz arrays + dimension JSON).
    #[serde(default = "default_true", alias = "pickle")]
    pub dictionary: bool,
    #[serde(default = "default_true")]
    pub csv: bool,
    #[serde(default = "default_true")]
    pub assumptions: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dictionary: true,
            csv: true,
            assumptions: true,
        }
    }
}

fn default_input_data_path() -> PathBuf {
    PathBuf::from("data")
}
fn default_output_path() -> PathBuf {
    PathBuf::from("output")
}
fn default_mass_balance_tolerance() -> f64 {
    MASS_BALANCE_TOLERANCE
}
fn default_relaxation_years() -> f64 {
    GAUSSIAN_RELAXATION_YEARS
}
fn default_slope_points() -> usize {
    N_TRAILING_POINTS
}
fn default_guess_saturation_margin() -> f64 {
    SATURATION_GUESS_MARGIN
}
fn default_true() -> bool {
    true
}
fn default_max_iterations() -> usize {
    200
}
fn default_solver_tolerance() -> f64 {
    1e-12
}
fn default_fd_step() -> f64 {
    1e-7
}
fn default_initial_lambda() -> f64 {
    1e-3
}
fn default_max_relative_step() -> f64 {
    2.0
}

impl ModelConfig {
    /// Defaults for every optional field.
    pub fn new(model_class: ModelClass) -> Self {
        Self {
            model_class,
            input_data_path: default_input_data_path(),
            output_path: default_output_path(),
            customization: Customization::default(),
            stock_extrapolation: StockExtrapolationConfig::default(),
            solver: SolverConfig::default(),
            mass_balance_tolerance: default_mass_balance_tolerance(),
            do_export: ExportConfig::default(),
            visualization: Value::Null,
        }
    }

    /// Load from a YAML (`.yml`, `.yaml`) or JSON file and validate.
    pub fn from_file(path: impl AsRef<Path>) -> MfaResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MfaResult<()> {
        if !self.mass_balance_tolerance.is_finite() || self.mass_balance_tolerance <= 0.0 {
            return Err(MfaError::ConfigError(
                "mass_balance_tolerance must be finite and > 0".to_string(),
            ));
        }
        validate_stock_extrapolation_config(&self.stock_extrapolation)?;
        validate_solver_config(&self.solver)?;
        if let Some(bound) = self.customization.saturation_bound {
            if !(bound.lower <= bound.upper) {
                return Err(MfaError::ConfigError(format!(
                    "customization.saturation_bound: lower {} exceeds upper {}",
                    bound.lower, bound.upper
                )));
            }
        }
        Ok(())
    }

    /// Configuration values differing from the defaults, as `path = value` pairs.
    pub fn assumptions(&self) -> MfaResult<Vec<(String, String)>> {
        let current = serde_json::to_value(self)?;
        let defaults = serde_json::to_value(Self::new(self.model_class))?;
        let mut out = Vec::new();
        diff_values("", &current, &defaults, &mut out);
        Ok(out)
    }
}

pub fn validate_stock_extrapolation_config(cfg: &StockExtrapolationConfig) -> MfaResult<()> {
    if !cfg.relaxation_years.is_finite() || cfg.relaxation_years <= 0.0 {
        return Err(MfaError::ConfigError(
            "stock_extrapolation.relaxation_years must be finite and > 0".to_string(),
        ));
    }
    if cfg.slope_points < 2 {
        return Err(MfaError::ConfigError(
            "stock_extrapolation.slope_points must be >= 2".to_string(),
        ));
    }
    if !cfg.guess_saturation_margin.is_finite()
        || cfg.guess_saturation_margin <= 0.0
        || cfg.guess_saturation_margin >= 1.0
    {
        return Err(MfaError::ConfigError(
            "stock_extrapolation.guess_saturation_margin must be in (0, 1)".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_solver_config(cfg: &SolverConfig) -> MfaResult<()> {
    if cfg.max_iterations == 0 {
        return Err(MfaError::ConfigError(
            "solver.max_iterations must be >= 1".to_string(),
        ));
    }
    if !cfg.tolerance.is_finite() || cfg.tolerance <= 0.0 {
        return Err(MfaError::ConfigError(
            "solver.tolerance must be finite and > 0".to_string(),
        ));
    }
    if !cfg.fd_step.is_finite() || cfg.fd_step <= 0.0 {
        return Err(MfaError::ConfigError(
            "solver.fd_step must be finite and > 0".to_string(),
        ));
    }
    if !cfg.initial_lambda.is_finite() || cfg.initial_lambda <= 0.0 {
        return Err(MfaError::ConfigError(
            "solver.initial_lambda must be finite and > 0".to_string(),
        ));
    }
    if !cfg.max_relative_step.is_finite() || cfg.max_relative_step <= 0.0 {
        return Err(MfaError::ConfigError(
            "solver.max_relative_step must be finite and > 0".to_string(),
        ));
    }
    Ok(())
}

fn diff_values(prefix: &str, current: &Value, defaults: &Value, out: &mut Vec<(String, String)>) {
    match (current, defaults) {
        (Value::Object(cur), Value::Object(def)) => {
            for (key, value) in cur {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match def.get(key) {
                    Some(d) => diff_values(&path, value, d, out),
                    None => out.push((path, value.to_string())),
                }
            }
        }
        (cur, def) if cur != def => out.push((prefix.to_string(), cur.to_string())),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_with_defaults() {
        let yaml = r#"
model_class: steel
input_data_path: data/steel
customization:
  stock_extrapolation_class_name: LogSigmoidExtrapolation
  lifetime_model_name: LogNormal
do_export:
  pickle: false
"#;
        let cfg: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.model_class, ModelClass::Steel);
        assert_eq!(
            cfg.customization.stock_extrapolation_class_name,
            ExtrapolationKind::LogSigmoidal
        );
        assert_eq!(cfg.customization.lifetime_model_name, LifetimeKind::LogNormal);
        assert!(!cfg.do_export.dictionary);
        assert!(cfg.do_export.csv);
        assert!((cfg.stock_extrapolation.relaxation_years - 50.0).abs() < 1e-12);
        assert_eq!(cfg.stock_extrapolation.slope_points, 5);
        assert!((cfg.mass_balance_tolerance - 1.0).abs() < 1e-12);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_unknown_fitter_is_rejected() {
        let yaml = "model_class: cement\ncustomization:\n  stock_extrapolation_class_name: Spline\n";
        assert!(serde_yaml::from_str::<ModelConfig>(yaml).is_err());
    }

    #[test]
    fn test_from_file_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"model_class": "plastics", "stock_extrapolation": {{"correction": "shift_zeroth_order"}}}}"#
        )
        .unwrap();
        let cfg = ModelConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.model_class, ModelClass::Plastics);
        assert_eq!(
            cfg.stock_extrapolation.correction,
            StockCorrection::ShiftZerothOrder
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = ModelConfig::new(ModelClass::Cement);
        cfg.mass_balance_tolerance = -1.0;
        match cfg.validate() {
            Err(MfaError::ConfigError(msg)) => assert!(msg.contains("mass_balance_tolerance")),
            other => panic!("Unexpected result: {other:?}"),
        }

        let mut cfg = ModelConfig::new(ModelClass::Cement);
        cfg.stock_extrapolation.slope_points = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = ModelConfig::new(ModelClass::Cement);
        cfg.customization.saturation_bound = Some(SaturationBound {
            lower: 3.0,
            upper: 1.0,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_assumptions_list_only_changes() {
        let mut cfg = ModelConfig::new(ModelClass::Steel);
        assert!(cfg.assumptions().unwrap().is_empty());
        cfg.stock_extrapolation.relaxation_years = 30.0;
        cfg.customization.lifetime_model_name = LifetimeKind::Weibull;
        let changes = cfg.assumptions().unwrap();
        let keys: Vec<&str> = changes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(changes.len(), 2, "{changes:?}");
        assert!(keys.contains(&"stock_extrapolation.relaxation_years"));
        assert!(keys.contains(&"customization.lifetime_model_name"));
    }
}
