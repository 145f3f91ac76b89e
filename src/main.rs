use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use serde::Serialize;

use rusty_spectra::data::filter::{filtered_indices, parse_filters};
use rusty_spectra::data::loader::load_file;
use rusty_spectra::data::{SpectralDataset, SpectrumData, SpectrumMetadata};
use rusty_spectra::processing::{estimate_shift_with, shift_to_velocity, stats::nan_median};
use rusty_spectra::services::DatasetSource;
use rusty_spectra::{AppConfig, Catalog, CombinationResult, SnrWindow, SpectrumCombiner};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "rusty-spectra", version, about = "Align, combine and measure 1-D spectra")]
struct Cli {
    /// JSON configuration file (search policy, SNR window, defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep only spectra whose metadata matches `column=value` (repeatable).
    #[arg(long = "filter", global = true)]
    filters: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the catalogue table.
    List {
        file: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Wavelength shift and radial velocity of every spectrum against the reference.
    Shift {
        file: PathBuf,
        #[arg(long)]
        reference: Option<usize>,
    },
    /// Average all spectra onto the reference grid.
    Combine {
        file: PathBuf,
        /// Align each spectrum to the reference before averaging.
        #[arg(long)]
        rest_frame: bool,
        #[arg(long)]
        reference: Option<usize>,
        /// Write the combined spectrum to a .json or .csv file.
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Median signal-to-noise inside a wavelength window.
    Snr {
        file: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct WindowArgs {
    /// Window centre (same units as the wavelength axis).
    #[arg(long, requires = "half_width")]
    center: Option<f64>,
    /// Window half-width.
    #[arg(long, requires = "center")]
    half_width: Option<f64>,
}

impl WindowArgs {
    fn resolve(&self, config: &AppConfig) -> Option<SnrWindow> {
        match (self.center, self.half_width) {
            (Some(c), Some(h)) => Some(SnrWindow::from_center(c, h)),
            _ => config.snr_window,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    debug!("configuration: {config:?}");

    match cli.command {
        Command::List { ref file, window } => {
            let mut catalog = open_catalog(file, &cli.filters, &config, config.reference_index)?;
            catalog.snr_window = window.resolve(&config);
            if catalog.snr_window.is_some() {
                let all: Vec<usize> = (0..catalog.records.len()).collect();
                catalog.materialise(&all)?;
            }
            print_table(&catalog.records);
        }
        Command::Shift { ref file, reference } => {
            let reference = reference.unwrap_or(config.reference_index);
            let mut catalog = open_catalog(file, &cli.filters, &config, reference)?;
            let all: Vec<usize> = (0..catalog.records.len()).collect();
            let spectra = catalog.materialise(&all)?;
            print_shifts(&spectra, reference, &config)?;
        }
        Command::Combine {
            ref file,
            rest_frame,
            reference,
            ref output,
            window,
        } => {
            let reference = reference.unwrap_or(config.reference_index);
            let mut catalog = open_catalog(file, &cli.filters, &config, reference)?;
            catalog.snr_window = window.resolve(&config);
            let (combined, result) = catalog.combine_selected(rest_frame || config.rest_frame)?;

            println!("{}", combined.metadata.obs_id);
            for (meta, shift) in catalog.records.iter().zip(&result.shifts) {
                println!("  {:<40} shift {:+.5}", meta.obs_id, shift);
            }
            let gaps = result.gaps().len();
            if gaps > 0 {
                println!("  {gaps} grid points are not covered by any input (flux 0)");
            }
            if let Some(snr) = combined.metadata.snr_measured {
                println!("  measured SNR {snr:.1}");
            }
            if let Some(path) = output {
                write_combined(path, &combined, &result)?;
                println!("wrote {}", path.display());
            }
        }
        Command::Snr { ref file, window } => {
            let Some(snr_window) = window.resolve(&config) else {
                bail!("specify --center and --half-width (or snr_window in the config file)");
            };
            let mut catalog = open_catalog(file, &cli.filters, &config, config.reference_index)?;
            catalog.snr_window = Some(snr_window);
            let all: Vec<usize> = (0..catalog.records.len()).collect();
            catalog.materialise(&all)?;
            for meta in &catalog.records {
                match meta.snr_measured {
                    Some(snr) => println!("{:<40} {snr:.2}", meta.obs_id),
                    None => println!("{:<40} unavailable", meta.obs_id),
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_catalog(
    path: &Path,
    filters: &[String],
    config: &AppConfig,
    reference: usize,
) -> Result<Catalog<DatasetSource>> {
    let dataset = load_file(path)?;
    let dataset = apply_filters(dataset, filters)?;
    if dataset.is_empty() {
        bail!("no spectra left in {}", path.display());
    }
    let source = DatasetSource::new(dataset);
    let records = source.records();
    let combiner = SpectrumCombiner::new(config.search, reference);
    Ok(Catalog::new(records, source, combiner))
}

fn apply_filters(dataset: SpectralDataset, exprs: &[String]) -> Result<SpectralDataset> {
    if exprs.is_empty() {
        return Ok(dataset);
    }
    let state = parse_filters(&dataset, exprs)?;
    let keep = filtered_indices(&dataset, &state);
    let spectra = dataset
        .spectra
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, sp)| sp)
        .collect();
    Ok(SpectralDataset::from_spectra(spectra))
}

fn print_table(records: &[SpectrumMetadata]) {
    println!(
        "{:<32} {:<12} {:<16} {:>8} {:>8} {:<12} {:^3} {:>8} {:<20} {:<14}",
        "Target", "Instrument", "Range", "R", "SNR", "Released", "Sel", "SNR meas", "DP id", "Proposal"
    );
    for meta in records {
        let r = meta.display_row();
        println!(
            "{:<32} {:<12} {:<16} {:>8} {:>8} {:<12} {:^3} {:>8} {:<20} {:<14}",
            r[0], r[1], r[2], r[3], r[4], r[5], r[6], r[7], r[8], r[9]
        );
    }
}

fn print_shifts(spectra: &[SpectrumData], reference: usize, config: &AppConfig) -> Result<()> {
    let reference_spectrum = spectra.get(reference).with_context(|| {
        format!("reference index {reference} is out of range for {} spectra", spectra.len())
    })?;
    let pivot = nan_median(&reference_spectrum.wavelength);
    println!("reference: {}", reference_spectrum.metadata.obs_id);
    for sp in spectra {
        let shift = estimate_shift_with(
            &reference_spectrum.wavelength,
            &reference_spectrum.flux,
            &sp.wavelength,
            &sp.flux,
            &config.search,
        )?;
        println!(
            "  {:<40} shift {:+.5}  v {:+.3} km/s",
            sp.metadata.obs_id,
            shift,
            shift_to_velocity(shift, pivot)
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct CombinedOutput<'a> {
    metadata: &'a SpectrumMetadata,
    wavelength: &'a [f64],
    flux: &'a [f64],
    shifts: &'a [f64],
    coverage: &'a [usize],
}

#[derive(Serialize)]
struct CombinedRow {
    wavelength: f64,
    flux: f64,
    coverage: usize,
}

fn write_combined(path: &Path, combined: &SpectrumData, result: &CombinationResult) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => {
            let out = CombinedOutput {
                metadata: &combined.metadata,
                wavelength: &result.wavelength,
                flux: &result.flux,
                shifts: &result.shifts,
                coverage: &result.coverage,
            };
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer_pretty(file, &out).context("writing JSON")?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("creating {}", path.display()))?;
            for ((&wavelength, &flux), &coverage) in
                result.wavelength.iter().zip(&result.flux).zip(&result.coverage)
            {
                writer
                    .serialize(CombinedRow {
                        wavelength,
                        flux,
                        coverage,
                    })
                    .context("writing CSV row")?;
            }
            writer.flush().context("flushing CSV")?;
        }
        other => bail!("Unsupported output extension: .{other}"),
    }
    Ok(())
}
