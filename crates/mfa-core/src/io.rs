// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Input Tables and Export
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Dimension and parameter tables on disk, and result export.
//!
//! Layout under the input directory:
//!
//! ```text
//! dimensions/<file>.csv   one item per row, optional header
//! datasets/<name>.csv     long format: item columns in declared order, value last
//! ```
//!
//! Export writes `mfa.npz` + `mfa_dimensions.json`, per-array CSV files and
//! an assumptions dump under `<output>/export/`.

use crate::system::MfaSystem;
use mfa_math::NamedDimArray;
use mfa_types::config::ModelConfig;
use mfa_types::dims::{DimType, Dimension, DimensionSet, Item};
use mfa_types::error::{MfaError, MfaResult};
use ndarray::{ArrayD, IxDyn};
use ndarray_npy::NpzWriter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDefinition {
    pub letter: char,
    pub name: String,
    pub dtype: DimType,
    /// File stem under `dimensions/`.
    pub file: String,
}

impl DimensionDefinition {
    pub fn new(letter: char, name: &str, dtype: DimType, file: &str) -> Self {
        Self {
            letter,
            name: name.to_string(),
            dtype,
            file: file.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub letters: Vec<char>,
}

impl ParameterDefinition {
    pub fn new(name: &str, letters: &[char]) -> Self {
        Self {
            name: name.to_string(),
            letters: letters.to_vec(),
        }
    }
}

fn load_error(name: &str, message: impl Into<String>) -> MfaError {
    MfaError::ParameterLoadError {
        name: name.to_string(),
        message: message.into(),
    }
}

/// Comma-separated cells with surrounding quotes removed; blank and `#` lines skipped.
fn table_rows(contents: &str) -> impl Iterator<Item = (usize, Vec<String>)> + '_ {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .map(|(i, line)| {
            let cells = line
                .split(',')
                .map(|c| c.trim().trim_matches('"').to_string())
                .collect();
            (i + 1, cells)
        })
}

fn read_table(path: &Path, name: &str) -> MfaResult<String> {
    fs::read_to_string(path)
        .map_err(|e| load_error(name, format!("cannot read '{}': {e}", path.display())))
}

pub fn read_dimension(dir: &Path, def: &DimensionDefinition) -> MfaResult<Dimension> {
    let path = dir.join("dimensions").join(format!("{}.csv", def.file));
    let contents = read_table(&path, &def.name)?;
    let mut items = Vec::new();
    for (n, (line, cells)) in table_rows(&contents).enumerate() {
        let raw = &cells[0];
        let is_header = n == 0
            && (raw.eq_ignore_ascii_case(&def.name)
                || raw.eq_ignore_ascii_case(&def.letter.to_string())
                || def.dtype.parse(raw).is_none());
        if is_header {
            continue;
        }
        let item = def.dtype.parse(raw).ok_or_else(|| {
            load_error(&def.name, format!("line {line}: '{raw}' is not {:?}", def.dtype))
        })?;
        items.push(item);
    }
    Dimension::with_dtype(def.letter, &def.name, def.dtype, items)
        .map_err(|e| load_error(&def.name, e.to_string()))
}

pub fn read_dimensions(dir: &Path, defs: &[DimensionDefinition]) -> MfaResult<DimensionSet> {
    let dims = defs
        .iter()
        .map(|def| read_dimension(dir, def))
        .collect::<MfaResult<Vec<_>>>()?;
    debug!(count = dims.len(), "dimensions read");
    DimensionSet::new(dims)
}

/// Dense parameter from a long-format table; every combination must appear once.
pub fn read_parameter(
    dir: &Path,
    def: &ParameterDefinition,
    dims: &DimensionSet,
) -> MfaResult<NamedDimArray> {
    let name = def.name.as_str();
    let param_dims = dims
        .select(&def.letters)
        .map_err(|e| load_error(name, e.to_string()))?;
    let path = dir.join("datasets").join(format!("{name}.csv"));
    let contents = read_table(&path, name)?;

    let lookups: Vec<HashMap<Item, usize>> = param_dims
        .iter()
        .map(|d| d.items().iter().cloned().enumerate().map(|(i, it)| (it, i)).collect())
        .collect();
    let shape = param_dims.shape();
    let mut values = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
    let n_cols = def.letters.len() + 1;

    for (n, (line, cells)) in table_rows(&contents).enumerate() {
        let last = cells.last().map(String::as_str).unwrap_or("");
        let value = match last.parse::<f64>() {
            Ok(v) => v,
            Err(_) if n == 0 => continue,
            Err(_) => return Err(load_error(name, format!("line {line}: value '{last}' is not numeric"))),
        };
        if cells.len() != n_cols {
            return Err(load_error(
                name,
                format!("line {line}: expected {n_cols} columns, found {}", cells.len()),
            ));
        }
        let mut idx = Vec::with_capacity(n_cols - 1);
        for ((d, lookup), raw) in param_dims.iter().zip(&lookups).zip(&cells) {
            let pos = d
                .dtype
                .parse(raw)
                .and_then(|item| lookup.get(&item).copied())
                .ok_or_else(|| {
                    load_error(name, format!("line {line}: unknown item '{raw}' of '{}'", d.name))
                })?;
            idx.push(pos);
        }
        let slot = &mut values[IxDyn(&idx)];
        if !slot.is_nan() {
            return Err(load_error(name, format!("line {line}: duplicate entry {cells:?}")));
        }
        *slot = value;
    }

    let missing = values.iter().filter(|v| v.is_nan()).count();
    if missing > 0 {
        return Err(load_error(
            name,
            format!("{missing} of {} combinations missing", values.len()),
        ));
    }
    NamedDimArray::from_values(param_dims, values)
}

pub fn read_parameters(
    dir: &Path,
    defs: &[ParameterDefinition],
    dims: &DimensionSet,
) -> MfaResult<BTreeMap<String, NamedDimArray>> {
    let mut out = BTreeMap::new();
    for def in defs {
        out.insert(def.name.clone(), read_parameter(dir, def, dims)?);
    }
    debug!(count = out.len(), "parameters read");
    Ok(out)
}

fn write_long_csv(path: &Path, array: &NamedDimArray) -> MfaResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    let header: Vec<&str> = array.dims().iter().map(|d| d.name.as_str()).collect();
    writeln!(w, "{},value", header.join(","))?;
    let dims: Vec<&Dimension> = array.dims().iter().collect();
    for (idx, value) in array.values().indexed_iter() {
        for (k, d) in dims.iter().enumerate() {
            write!(w, "{},", d.items()[idx[k]])?;
        }
        writeln!(w, "{value}")?;
    }
    w.flush()?;
    Ok(())
}

/// Named arrays of a filled system: flows by name, stocks as `<name>_stock`,
/// `<name>_inflow` and `<name>_outflow`.
pub fn system_arrays(system: &MfaSystem) -> Vec<(String, &NamedDimArray)> {
    let mut out: Vec<(String, &NamedDimArray)> = system
        .flows()
        .iter()
        .map(|f| (f.name.clone(), f.values()))
        .collect();
    for s in system.stocks() {
        out.push((format!("{}_stock", s.name), s.stock()));
        out.push((format!("{}_inflow", s.name), s.inflow()));
        out.push((format!("{}_outflow", s.name), s.outflow()));
    }
    out
}

/// Write the enabled exports; returns the export directory.
pub fn export_system(system: &MfaSystem, config: &ModelConfig) -> MfaResult<PathBuf> {
    let export_dir = config.output_path.join("export");
    fs::create_dir_all(&export_dir)?;
    let arrays = system_arrays(system);

    if config.do_export.dictionary {
        let mut npz = NpzWriter::new(File::create(export_dir.join("mfa.npz"))?);
        for (name, array) in &arrays {
            npz.add_array(name.as_str(), array.values())
                .map_err(|e| MfaError::Npz(format!("{name}: {e}")))?;
        }
        npz.finish().map_err(|e| MfaError::Npz(e.to_string()))?;

        let names: BTreeMap<String, &str> = system
            .dims()
            .iter()
            .map(|d| (d.letter.to_string(), d.name.as_str()))
            .collect();
        let items: BTreeMap<String, &[Item]> = system
            .dims()
            .iter()
            .map(|d| (d.letter.to_string(), d.items()))
            .collect();
        let letters: BTreeMap<&str, String> = arrays
            .iter()
            .map(|(name, a)| (name.as_str(), a.letters().into_iter().collect()))
            .collect();
        let meta = serde_json::json!({
            "system": system.name,
            "dimension_names": names,
            "dimension_items": items,
            "array_dimensions": letters,
        });
        fs::write(
            export_dir.join("mfa_dimensions.json"),
            serde_json::to_string_pretty(&meta)?,
        )?;
    }

    if config.do_export.csv {
        let flow_dir = export_dir.join("flows");
        let stock_dir = export_dir.join("stocks");
        fs::create_dir_all(&flow_dir)?;
        fs::create_dir_all(&stock_dir)?;
        for flow in system.flows() {
            write_long_csv(&flow_dir.join(format!("{}.csv", flow.name)), flow.values())?;
        }
        for (name, array) in arrays.iter().skip(system.flows().len()) {
            write_long_csv(&stock_dir.join(format!("{name}.csv")), array)?;
        }
    }

    if config.do_export.assumptions {
        let mut text = format!("# Assumptions for model run '{}'\n", system.name);
        for (key, value) in config.assumptions()? {
            text.push_str(&format!("{key} = {value}\n"));
        }
        fs::write(export_dir.join("assumptions.txt"), text)?;
    }

    info!(path = %export_dir.display(), arrays = arrays.len(), "export written");
    Ok(export_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FlowDefinition;
    use crate::stock::{StockDefinition, StockKind};
    use mfa_types::config::ModelClass;
    use ndarray_npy::NpzReader;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn defs() -> Vec<DimensionDefinition> {
        vec![
            DimensionDefinition::new('t', "Time", DimType::Int, "time_in_years"),
            DimensionDefinition::new('r', "Region", DimType::Str, "regions"),
        ]
    }

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "dimensions/time_in_years.csv", "Time\n2000\n2001\n2002\n");
        write(tmp.path(), "dimensions/regions.csv", "# region list\nEUR\n\nCHA\n");
        write(
            tmp.path(),
            "datasets/production.csv",
            "time,region,value\n2000,EUR,1\n2001,EUR,2\n2002,EUR,3\n2000,CHA,4\n2001,CHA,5\n2002,\"CHA\",6\n",
        );
        tmp
    }

    #[test]
    fn test_read_dimensions_skips_header_and_comments() {
        let tmp = fixture();
        let dims = read_dimensions(tmp.path(), &defs()).unwrap();
        assert_eq!(dims.get('t').unwrap().len(), 3);
        assert_eq!(dims.get('r').unwrap().items()[1], Item::from("CHA"));
    }

    #[test]
    fn test_read_parameter_long_format() {
        let tmp = fixture();
        let dims = read_dimensions(tmp.path(), &defs()).unwrap();
        let p = read_parameter(tmp.path(), &ParameterDefinition::new("production", &['r', 't']), &dims)
            .unwrap_err();
        // Columns are read in declared order, so ('r', 't') cannot parse "2000" as a region.
        match p {
            MfaError::ParameterLoadError { name, .. } => assert_eq!(name, "production"),
            other => panic!("Unexpected error: {other:?}"),
        }
        let p = read_parameter(tmp.path(), &ParameterDefinition::new("production", &['t', 'r']), &dims)
            .unwrap();
        assert_eq!(p.values()[[2, 1]], 6.0);
        assert_eq!(p.sum(), 21.0);
    }

    #[test]
    fn test_missing_combination_is_error() {
        let tmp = fixture();
        write(tmp.path(), "datasets/gdppc.csv", "2000,EUR,1\n2001,EUR,2\n");
        let dims = read_dimensions(tmp.path(), &defs()).unwrap();
        let err = read_parameter(tmp.path(), &ParameterDefinition::new("gdppc", &['t', 'r']), &dims)
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let tmp = fixture();
        let dims = read_dimensions(tmp.path(), &defs()).unwrap();
        match read_parameter(tmp.path(), &ParameterDefinition::new("absent", &['t']), &dims) {
            Err(MfaError::ParameterLoadError { name, .. }) => assert_eq!(name, "absent"),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    fn fill(sys: &mut MfaSystem) -> MfaResult<()> {
        let production = sys.parameter("production")?.clone();
        sys.set_flow("sysenv", "use", &production)?;
        let stock = sys.stock_mut("in_use")?;
        stock.set_inflow(&production)?;
        stock.compute()
    }

    #[test]
    fn test_export_writes_all_formats() {
        let tmp = fixture();
        let dims = read_dimensions(tmp.path(), &defs()).unwrap();
        let params = read_parameters(
            tmp.path(),
            &[ParameterDefinition::new("production", &['t', 'r'])],
            &dims,
        )
        .unwrap();
        let mut sys = MfaSystem::new("toy", fill);
        sys.init_dims(dims, 't').unwrap();
        sys.load_parameters(params).unwrap();
        sys.build(
            &["sysenv", "use"],
            &[FlowDefinition::new("sysenv", "use", &['t', 'r'])],
            &[StockDefinition::new("in_use", "use", &['t', 'r'], StockKind::SimpleFlowDriven)],
        )
        .unwrap();
        sys.compute().unwrap();

        let mut config = ModelConfig::new(ModelClass::Plastics);
        config.output_path = tmp.path().join("out");
        config.do_export.dictionary = true;
        config.do_export.csv = true;
        config.do_export.assumptions = true;
        let dir = export_system(&sys, &config).unwrap();

        let mut npz = NpzReader::new(File::open(dir.join("mfa.npz")).unwrap()).unwrap();
        let flow: ArrayD<f64> = npz
            .by_name("sysenv_to_use.npy")
            .or_else(|_| npz.by_name("sysenv_to_use"))
            .unwrap();
        assert_eq!(flow.shape(), &[3, 2]);
        let csv = fs::read_to_string(dir.join("flows/sysenv_to_use.csv")).unwrap();
        assert!(csv.starts_with("Time,Region,value"));
        assert!(csv.contains("2002,CHA,6"));
        assert!(dir.join("stocks/in_use_stock.csv").exists());
        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("mfa_dimensions.json")).unwrap())
                .unwrap();
        assert_eq!(meta["array_dimensions"]["in_use_stock"], "tr");
        assert!(fs::read_to_string(dir.join("assumptions.txt")).unwrap().contains("output_path"));
    }
}
