// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Material Models
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Steel, plastics and cement models built on the MFA core.

pub mod carbon_uptake;
pub mod cement;
pub mod common;
pub mod plastics;
pub mod steel;

pub use common::{run, run_with, MaterialModel, ModelRun};

use mfa_types::config::{ModelClass, ModelConfig};
use mfa_types::error::MfaResult;

/// Run the model named by `config.model_class`.
pub fn run_model(config: &ModelConfig) -> MfaResult<ModelRun> {
    match config.model_class {
        ModelClass::Steel => run::<steel::Steel>(config),
        ModelClass::Plastics => run::<plastics::Plastics>(config),
        ModelClass::Cement => run::<cement::Cement>(config),
    }
}
