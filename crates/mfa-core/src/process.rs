// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Processes and Flows
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Nodes and edges of the material flow graph.
//!
//! Process 0 is always the system environment; it closes the whole-system
//! balance. A flow is a named array between two processes, typed by a
//! subset of the system dimensions.

use mfa_math::NamedDimArray;
use mfa_types::dims::DimensionSet;
use mfa_types::error::{MfaError, MfaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name of the system-environment process.
pub const SYSENV: &str = "sysenv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: usize,
    pub name: String,
}

/// Number the processes in order; the first must be [`SYSENV`].
pub fn make_processes(names: &[&str]) -> MfaResult<Vec<Process>> {
    match names.first() {
        Some(&first) if first == SYSENV => {}
        other => {
            return Err(MfaError::ConfigError(format!(
                "process 0 must be '{SYSENV}', got {other:?}"
            )))
        }
    }
    let mut seen = HashSet::with_capacity(names.len());
    names
        .iter()
        .enumerate()
        .map(|(id, &name)| {
            if !seen.insert(name) {
                return Err(MfaError::ConfigError(format!(
                    "process '{name}' defined twice"
                )));
            }
            Ok(Process {
                id,
                name: name.to_string(),
            })
        })
        .collect()
}

pub fn find_process<'a>(processes: &'a [Process], name: &str) -> MfaResult<&'a Process> {
    processes
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| MfaError::ConfigError(format!("unknown process '{name}'")))
}

/// Canonical flow name.
pub fn flow_name(from: &str, to: &str) -> String {
    format!("{from}_to_{to}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDefinition {
    pub from: String,
    pub to: String,
    pub letters: Vec<char>,
}

impl FlowDefinition {
    pub fn new(from: &str, to: &str, letters: &[char]) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            letters: letters.to_vec(),
        }
    }

    pub fn name(&self) -> String {
        flow_name(&self.from, &self.to)
    }
}

#[derive(Debug, Clone)]
pub struct Flow {
    pub name: String,
    pub from: Process,
    pub to: Process,
    array: NamedDimArray,
}

impl Flow {
    /// Zero-filled flow typed by `def.letters` out of `dims`.
    pub fn from_definition(
        def: &FlowDefinition,
        processes: &[Process],
        dims: &DimensionSet,
    ) -> MfaResult<Self> {
        if def.from == def.to {
            return Err(MfaError::ConfigError(format!(
                "flow '{}' starts and ends at the same process",
                def.name()
            )));
        }
        let from = find_process(processes, &def.from)?.clone();
        let to = find_process(processes, &def.to)?.clone();
        let flow_dims = dims.select(&def.letters)?;
        if flow_dims.time_letter().is_none() {
            return Err(MfaError::DimensionMismatch(format!(
                "flow '{}' has no time dimension in {:?}",
                def.name(),
                def.letters
            )));
        }
        Ok(Self {
            name: def.name(),
            from,
            to,
            array: NamedDimArray::zeros(&flow_dims),
        })
    }

    pub fn values(&self) -> &NamedDimArray {
        &self.array
    }

    pub fn dims(&self) -> &DimensionSet {
        self.array.dims()
    }

    /// Overwrite with `value`, summing out letters the flow does not carry
    /// and broadcasting along those it carries but `value` lacks.
    pub fn set(&mut self, value: &NamedDimArray) -> MfaResult<()> {
        self.array.assign_sum_to(value)
    }

    /// Add `value` (reduced the same way as in [`set`](Self::set)).
    pub fn add(&mut self, value: &NamedDimArray) -> MfaResult<()> {
        let mut delta = NamedDimArray::zeros(self.array.dims());
        delta.assign_sum_to(value)?;
        self.array = self.array.add(&delta)?;
        Ok(())
    }
}
