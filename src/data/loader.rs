use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, SpectralDataset, SpectrumData, SpectrumMetadata};

// ---------------------------------------------------------------------------
// Column probes
// ---------------------------------------------------------------------------

/// Candidate names for the wavelength axis, tried in order.
pub const WAVELENGTH_COLUMNS: &[&str] = &["wavelength", "wave", "lambda", "x"];
/// Candidate names for the flux values, tried in order.
pub const FLUX_COLUMNS: &[&str] = &["flux", "y"];
/// Candidate names for the flux uncertainty, tried in order.
pub const UNCERTAINTY_COLUMNS: &[&str] = &["flux_err", "error", "err", "sigma"];

/// Return the index of the first candidate present in `names` (case-insensitive).
pub fn probe_column<S: AsRef<str>>(names: &[S], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|cand| {
        names
            .iter()
            .position(|n| n.as_ref().eq_ignore_ascii_case(cand))
    })
}

/// Indices of the sample columns located in one table.
#[derive(Debug, Clone, Copy)]
struct SampleColumns {
    wave: usize,
    flux: usize,
    err: Option<usize>,
}

impl SampleColumns {
    fn locate<S: AsRef<str>>(names: &[S], source: &str) -> Result<Self> {
        let wave = probe_column(names, WAVELENGTH_COLUMNS)
            .with_context(|| format!("{source}: no wavelength column (tried {WAVELENGTH_COLUMNS:?})"))?;
        let flux = probe_column(names, FLUX_COLUMNS)
            .with_context(|| format!("{source}: no flux column (tried {FLUX_COLUMNS:?})"))?;
        let err = probe_column(names, UNCERTAINTY_COLUMNS);
        Ok(Self { wave, flux, err })
    }

    fn is_sample(&self, idx: usize) -> bool {
        idx == self.wave || idx == self.flux || Some(idx) == self.err
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load spectra from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per spectrum, list columns for the samples
/// * `.json`    – `[{ "wavelength": [...], "flux": [...], ...meta }, ...]`
/// * `.csv`     – sample columns containing semicolon-separated floats
pub fn load_file(path: &Path) -> Result<SpectralDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
        .to_string();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path, &stem),
        "json" => load_json(path, &stem),
        "csv" => load_csv(path, &stem),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    info!("loaded {} spectra from {}", dataset.len(), path.display());
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Row assembly shared by all formats
// ---------------------------------------------------------------------------

fn build_spectrum(
    default_id: String,
    wavelength: Vec<f64>,
    flux: Vec<f64>,
    flux_err: Option<Vec<f64>>,
    cells: BTreeMap<String, MetadataValue>,
) -> Result<SpectrumData> {
    let mut spectrum = SpectrumData::new(
        metadata_from_cells(default_id, cells),
        wavelength,
        flux,
        flux_err,
    )
    .context("sample arrays do not line up")?;

    if spectrum.metadata.wvl_min_nm.is_none() || spectrum.metadata.wvl_max_nm.is_none() {
        if let Some((lo, hi)) = spectrum.wavelength_bounds() {
            spectrum.metadata.wvl_min_nm.get_or_insert(lo);
            spectrum.metadata.wvl_max_nm.get_or_insert(hi);
        }
    }
    Ok(spectrum)
}

/// Move recognised metadata columns into typed fields; keep the rest in `extra`.
fn metadata_from_cells(default_id: String, cells: BTreeMap<String, MetadataValue>) -> SpectrumMetadata {
    let mut meta = SpectrumMetadata::new(default_id);
    for (key, value) in cells {
        match key.to_ascii_lowercase().as_str() {
            "obs_id" | "id" => {
                if let Some(id) = value.as_text() {
                    meta.obs_id = id;
                }
            }
            "target" | "object" => meta.target = value.as_text().unwrap_or_default(),
            "instrument" => meta.instrument = value.as_text().unwrap_or_default(),
            "wvl_min_nm" | "wavelength_min" => meta.wvl_min_nm = value.as_f64(),
            "wvl_max_nm" | "wavelength_max" => meta.wvl_max_nm = value.as_f64(),
            "resolution" | "resolving_power" => meta.resolution = value.as_f64(),
            "snr" | "snr_reported" => meta.snr_reported = value.as_f64(),
            "release_date" => meta.release_date = value.as_text(),
            "access_url" => meta.access_url = value.as_text(),
            "product_type" => meta.product_type = value.as_text(),
            "dp_id" => meta.dp_id = value.as_text(),
            "proposal_id" => meta.proposal_id = value.as_text(),
            "is_public" => {
                if let MetadataValue::Bool(b) = value {
                    meta.is_public = b;
                }
            }
            _ => {
                meta.extra.insert(key, value);
            }
        }
    }
    meta
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON:
///
/// ```json
/// [
///   {
///     "wavelength": [500.0, 500.1, ...],
///     "flux":       [0.98,  0.97,  ...],
///     "flux_err":   [0.01,  0.01,  ...],
///     "obs_id": "ADP.2020-01-01T00:00:00.000",
///     "target": "HD 10700"
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path, stem: &str) -> Result<SpectralDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut spectra = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let keys: Vec<&String> = obj.keys().collect();
        let cols = SampleColumns::locate(&keys, &format!("Row {i}"))?;

        let wave = json_array_to_f64(obj.get(keys[cols.wave]), i, keys[cols.wave])?;
        let flux = json_array_to_f64(obj.get(keys[cols.flux]), i, keys[cols.flux])?;
        let err = cols
            .err
            .map(|k| json_array_to_f64(obj.get(keys[k]), i, keys[k]))
            .transpose()?;

        let cells = keys
            .iter()
            .enumerate()
            .filter(|(k, _)| !cols.is_sample(*k))
            .map(|(_, key)| ((*key).clone(), json_to_metadata(&obj[key.as_str()])))
            .collect();

        let spectrum = build_spectrum(format!("{stem}#{i}"), wave, flux, err, cells)
            .with_context(|| format!("Row {i}"))?;
        spectra.push(spectrum);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| match v {
            JsonValue::Null => Ok(f64::NAN),
            other => other
                .as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number")),
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one spectrum per row.
/// Sample columns hold semicolon-separated floats, e.g. `"500.0;500.1;500.2"`.
/// All other columns are treated as metadata.
fn load_csv(path: &Path, stem: &str) -> Result<SpectralDataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let cols = SampleColumns::locate(&headers, "CSV")?;

    let mut spectra = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let wave = parse_semicolon_floats(cell(cols.wave), row_no, &headers[cols.wave])?;
        let flux = parse_semicolon_floats(cell(cols.flux), row_no, &headers[cols.flux])?;
        let err = match cols.err {
            Some(idx) if !cell(idx).trim().is_empty() => {
                Some(parse_semicolon_floats(cell(idx), row_no, &headers[idx])?)
            }
            _ => None,
        };

        let cells = record
            .iter()
            .enumerate()
            .filter(|(idx, _)| !cols.is_sample(*idx))
            .map(|(idx, value)| (headers[idx].clone(), guess_metadata_type(value)))
            .collect();

        let spectrum = build_spectrum(format!("{stem}#{row_no}"), wave, flux, err, cells)
            .with_context(|| format!("CSV row {row_no}"))?;
        spectra.push(spectrum);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            let tok = tok.trim();
            if tok.eq_ignore_ascii_case("nan") {
                return Ok(f64::NAN);
            }
            tok.parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one spectrum per row.
///
/// Sample columns are List<Float64|Float32> (or LargeList); every other
/// column is metadata (strings, ints, floats, bools).
fn load_parquet(path: &Path, stem: &str) -> Result<SpectralDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut spectra = Vec::new();
    let mut row_offset = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let names: Vec<&String> = schema.fields().iter().map(|f| f.name()).collect();
        let cols = SampleColumns::locate(&names, "Parquet file")?;

        let meta_cols: Vec<(usize, String)> = names
            .iter()
            .enumerate()
            .filter(|(i, _)| !cols.is_sample(*i))
            .map(|(i, name)| (i, (*name).clone()))
            .collect();

        for row in 0..batch.num_rows() {
            let global = row_offset + row;
            let wave = extract_f64_list(batch.column(cols.wave), row)
                .with_context(|| format!("Row {global}: failed to read '{}'", names[cols.wave]))?;
            let flux = extract_f64_list(batch.column(cols.flux), row)
                .with_context(|| format!("Row {global}: failed to read '{}'", names[cols.flux]))?;
            let err = match cols.err {
                Some(idx) if !batch.column(idx).is_null(row) => Some(
                    extract_f64_list(batch.column(idx), row)
                        .with_context(|| format!("Row {global}: failed to read '{}'", names[idx]))?,
                ),
                _ => None,
            };

            let cells = meta_cols
                .iter()
                .map(|(idx, name)| (name.clone(), extract_metadata_value(batch.column(*idx), row)))
                .collect();

            let spectrum = build_spectrum(format!("{stem}#{global}"), wave, flux, err, cells)
                .with_context(|| format!("Row {global}"))?;
            spectra.push(spectrum);
        }
        debug!("parquet batch: {} rows", batch.num_rows());
        row_offset += batch.num_rows();
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    let value = match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| MetadataValue::String(s.value(row).to_string())),
        DataType::LargeUtf8 => Some(MetadataValue::String(
            col.as_string::<i64>().value(row).to_string(),
        )),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| MetadataValue::Integer(i64::from(a.value(row)))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| MetadataValue::Float(f64::from(a.value(row)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| MetadataValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| MetadataValue::Bool(a.value(row))),
        _ => None,
    };
    value.unwrap_or_else(|| MetadataValue::String(format!("{:?}", col.data_type())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rusty_spectra_{}_{name}", std::process::id()))
    }

    #[test]
    fn probes_follow_candidate_order() {
        let names = ["Flux", "LAMBDA", "wave", "sigma"];
        assert_eq!(probe_column(&names, WAVELENGTH_COLUMNS), Some(2));
        assert_eq!(probe_column(&names, FLUX_COLUMNS), Some(0));
        assert_eq!(probe_column(&names, UNCERTAINTY_COLUMNS), Some(3));
        assert_eq!(probe_column(&names, &["missing"]), None);
    }

    #[test]
    fn json_records_are_loaded() {
        let path = temp_path("records.json");
        let text = r#"[
            {"wave": [2.0, 1.0], "flux": [5.0, null], "err": [0.5, 0.5],
             "obs_id": "A", "target": "HD 1", "resolution": 40000, "night": 3},
            {"x": [1.0, 2.0, 3.0], "y": [1.0, 1.0, 1.0]}
        ]"#;
        std::fs::write(&path, text).unwrap();
        let ds = load_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(ds.len(), 2);
        let a = &ds.spectra[0];
        assert_eq!(a.metadata.obs_id, "A");
        assert_eq!(a.metadata.target, "HD 1");
        assert_eq!(a.metadata.resolution, Some(40000.0));
        assert_eq!(a.metadata.wvl_min_nm, Some(1.0));
        assert_eq!(a.metadata.wvl_max_nm, Some(2.0));
        assert!(a.flux[1].is_nan());
        assert_eq!(a.flux_err, Some(vec![0.5, 0.5]));
        assert_eq!(ds.column_names, vec!["night".to_string()]);

        let b = &ds.spectra[1];
        assert!(b.metadata.obs_id.ends_with("records#1"));
        assert!(b.flux_err.is_none());
    }

    #[test]
    fn csv_rows_are_loaded() {
        let path = temp_path("table.csv");
        let text = "obs_id,wavelength,flux,flux_err,instrument\n\
                    s1,\"1;2;3\",\"4;5;6\",\"0.1;0.1;0.1\",HARPS\n\
                    s2,\"1;2\",\"7;8\",,FEROS\n";
        std::fs::write(&path, text).unwrap();
        let ds = load_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.spectra[0].flux, vec![4.0, 5.0, 6.0]);
        assert_eq!(ds.spectra[0].metadata.instrument, "HARPS");
        assert!(ds.spectra[1].flux_err.is_none());
        assert_eq!(ds.spectra[1].metadata.obs_id, "s2");
    }

    #[test]
    fn csv_length_mismatch_is_an_error() {
        let path = temp_path("bad.csv");
        std::fs::write(&path, "wave,flux\n\"1;2;3\",\"4;5\"\n").unwrap();
        let result = load_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn missing_flux_column_is_reported() {
        let path = temp_path("noflux.json");
        std::fs::write(&path, r#"[{"wavelength": [1.0]}]"#).unwrap();
        let err = load_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(format!("{err:#}").contains("no flux column"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(load_file(Path::new("spectra.fits")).is_err());
    }
}
