// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — MFA Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Process graph, stocks and the system state machine.
//!
//! Dynamic stock models and lifetimes live in [`dsm`] / [`lifetime`],
//! future stock levels in [`stock_extrapolation`], cross-region flows in [`trade`]
//! and their price-elastic variant in [`price_trade`].

pub mod dsm;
pub mod io;
pub mod lifetime;
pub mod parameters;
pub mod price_trade;
pub mod process;
pub mod stock;
pub mod stock_extrapolation;
pub mod system;
pub mod trade;

pub use system::MfaSystem;
