use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};

use super::model::{MetadataValue, SpectralDataset, SpectrumMetadata};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// Columns absent from the map are not constrained.
pub type FilterState = BTreeMap<String, BTreeSet<MetadataValue>>;

/// Parse `column=value` expressions into a [`FilterState`].
///
/// Values are matched against the dataset's unique values by their displayed
/// text, so `night=3` selects the integer `3`.  Repeating a column ORs the values.
pub fn parse_filters(dataset: &SpectralDataset, exprs: &[String]) -> Result<FilterState> {
    let mut state = FilterState::new();
    for expr in exprs {
        let (col, wanted) = expr
            .split_once('=')
            .with_context(|| format!("filter '{expr}' is not of the form column=value"))?;
        let col = col.trim();
        let wanted = wanted.trim();
        let all_vals = dataset
            .unique_values
            .get(col)
            .with_context(|| format!("unknown metadata column '{col}'"))?;
        let selected = state.entry(col.to_string()).or_default();
        selected.extend(
            all_vals
                .iter()
                .filter(|v| v.to_string() == wanted || v.as_text().as_deref() == Some(wanted))
                .cloned(),
        );
    }
    Ok(state)
}

/// Return indices of spectra that pass all active filters.
///
/// A spectrum passes a column filter when:
/// * The column is not present in `filters` → passes (no constraint)
/// * The filter set for that column is empty → nothing selected → fails
/// * The spectrum's value for that column is in the selected set → passes
pub fn filtered_indices(dataset: &SpectralDataset, filters: &FilterState) -> Vec<usize> {
    dataset
        .spectra
        .iter()
        .enumerate()
        .filter(|(_, sp)| {
            filters.iter().all(|(col, selected)| {
                if selected.is_empty() {
                    return false;
                }
                match sp.metadata.extra.get(col) {
                    Some(val) => selected.contains(val),
                    // Spectrum doesn't have this column → include only if Null is selected
                    None => selected.contains(&MetadataValue::Null),
                }
            })
        })
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Default selection
// ---------------------------------------------------------------------------

/// Records eligible for the next default selection: ticked and not yet
/// consumed by a combination.
pub fn default_selection(records: &[SpectrumMetadata]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, m)| m.selected && !m.used_in_combination)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::SpectrumData;

    fn dataset() -> SpectralDataset {
        let make = |id: &str, night: Option<i64>| {
            let mut meta = SpectrumMetadata::new(id);
            if let Some(n) = night {
                meta.extra.insert("night".into(), MetadataValue::Integer(n));
            }
            SpectrumData::new(meta, vec![1.0], vec![1.0], None).unwrap()
        };
        SpectralDataset::from_spectra(vec![make("a", Some(1)), make("b", Some(2)), make("c", None)])
    }

    #[test]
    fn no_filters_keeps_everything() {
        let ds = dataset();
        assert_eq!(filtered_indices(&ds, &FilterState::new()), vec![0, 1, 2]);
    }

    #[test]
    fn parsed_filter_matches_by_text() {
        let ds = dataset();
        let filters = parse_filters(&ds, &["night=2".to_string()]).unwrap();
        assert_eq!(filtered_indices(&ds, &filters), vec![1]);

        let both = parse_filters(&ds, &["night=1".to_string(), "night=2".to_string()]).unwrap();
        assert_eq!(filtered_indices(&ds, &both), vec![0, 1]);
    }

    #[test]
    fn unmatched_value_hides_everything() {
        let ds = dataset();
        let filters = parse_filters(&ds, &["night=9".to_string()]).unwrap();
        assert!(filtered_indices(&ds, &filters).is_empty());
    }

    #[test]
    fn bad_expressions_are_errors() {
        let ds = dataset();
        assert!(parse_filters(&ds, &["night".to_string()]).is_err());
        assert!(parse_filters(&ds, &["colour=red".to_string()]).is_err());
    }

    #[test]
    fn consumed_records_leave_default_selection() {
        let mut records = vec![
            SpectrumMetadata::new("a"),
            SpectrumMetadata::new("b"),
            SpectrumMetadata::new("c"),
        ];
        records[1].used_in_combination = true;
        records[2].selected = false;
        assert_eq!(default_selection(&records), vec![0]);
    }
}
