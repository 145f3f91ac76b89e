use std::sync::Arc;

use arrow::array::{Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Absorption lines (centre nm, sigma nm, depth) of the synthetic star.
const LINES: [(f64, f64, f64); 5] = [
    (486.13, 0.12, 0.55),
    (492.39, 0.05, 0.30),
    (501.84, 0.05, 0.35),
    (516.73, 0.06, 0.45),
    (518.36, 0.06, 0.50),
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Normalised flux with every line Doppler shifted by `velocity` km/s.
fn stellar_flux(wavelengths: &[f64], velocity: f64, continuum: f64, noise: f64, rng: &mut SimpleRng) -> Vec<f64> {
    let factor = 1.0 + velocity / SPEED_OF_LIGHT_KMS;
    wavelengths
        .iter()
        .map(|&wl| {
            let absorption: f64 = LINES
                .iter()
                .map(|&(mu, sigma, depth)| gaussian(wl, mu * factor, sigma, depth))
                .sum();
            continuum * (1.0 - absorption).max(0.0) + rng.gauss(0.0, noise)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn list_array(rows: &[Vec<f64>]) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for &v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    builder.finish()
}

fn main() {
    let mut rng = SimpleRng::new(42);

    // (instrument, start nm, step nm, points, resolving power, snr)
    let setups = [
        ("UVES", 480.0, 0.02, 2000, 42_000.0, 60.0),
        ("HARPS", 481.0, 0.01, 3900, 115_000.0, 90.0),
        ("FEROS", 479.5, 0.03, 1400, 48_000.0, 35.0),
    ];
    let velocities = [-12.0, 0.0, 7.5, 18.0];

    let mut all_wave: Vec<Vec<f64>> = Vec::new();
    let mut all_flux: Vec<Vec<f64>> = Vec::new();
    let mut all_err: Vec<Vec<f64>> = Vec::new();
    let mut all_id: Vec<String> = Vec::new();
    let mut all_instrument: Vec<String> = Vec::new();
    let mut all_resolution: Vec<f64> = Vec::new();
    let mut all_night: Vec<i64> = Vec::new();

    for (night, &velocity) in velocities.iter().enumerate() {
        for &(instrument, start, step, points, resolution, snr) in &setups {
            let wave: Vec<f64> = (0..points).map(|i| start + i as f64 * step).collect();
            let continuum = 1.0 + 0.1 * rng.next_f64();
            let noise = continuum / snr;
            let flux = stellar_flux(&wave, velocity, continuum, noise, &mut rng);

            all_err.push(vec![noise; wave.len()]);
            all_wave.push(wave);
            all_flux.push(flux);
            all_id.push(format!("{instrument}.N{night}.{}", all_id.len()));
            all_instrument.push(instrument.to_string());
            all_resolution.push(resolution);
            all_night.push(night as i64);
        }
    }

    let n_rows = all_id.len();
    let target_array = StringArray::from(vec!["HD 10700"; n_rows]);
    let id_array = StringArray::from(all_id.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    let instrument_array =
        StringArray::from(all_instrument.iter().map(|s| s.as_str()).collect::<Vec<_>>());

    let item = || Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("wavelength", DataType::List(item()), false),
        Field::new("flux", DataType::List(item()), false),
        Field::new("flux_err", DataType::List(item()), false),
        Field::new("obs_id", DataType::Utf8, false),
        Field::new("target", DataType::Utf8, false),
        Field::new("instrument", DataType::Utf8, false),
        Field::new("resolution", DataType::Float64, false),
        Field::new("night", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(list_array(&all_wave)),
            Arc::new(list_array(&all_flux)),
            Arc::new(list_array(&all_err)),
            Arc::new(id_array),
            Arc::new(target_array),
            Arc::new(instrument_array),
            Arc::new(Float64Array::from(all_resolution)),
            Arc::new(Int64Array::from(all_night)),
        ],
    )
    .expect("Failed to create RecordBatch");

    let output_path = "sample_spectra.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!("Wrote {n_rows} spectra ({} setups x {} epochs) to {output_path}", setups.len(), velocities.len());
}
