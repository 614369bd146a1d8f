// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — MFA Math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Numerical primitives for the material flow engine.

pub mod blending;
pub mod extrapolation;
pub mod linalg;
pub mod lstsq;
pub mod named_array;

pub use named_array::NamedDimArray;
