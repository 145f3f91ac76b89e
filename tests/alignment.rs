//! End-to-end checks of the public numeric API.

use rusty_spectra::processing::{estimate_shift_with, rebin_zero};
use rusty_spectra::{
    combine, estimate_radial_velocity, estimate_shift, measure_snr, rebin, ShiftSearchConfig,
    SnrWindow,
};

fn grid(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Narrow absorption-like dip on a flat continuum.
fn dip(wave: &[f64], centre: f64, sigma: f64) -> Vec<f64> {
    wave.iter()
        .map(|w| 1.0 - 0.6 * (-(w - centre).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect()
}

#[test]
fn rebin_on_own_grid_is_exact() {
    let x = grid(400.0, 0.37, 50);
    let y: Vec<f64> = x.iter().map(|v| (v * 0.1).sin()).collect();
    assert_eq!(rebin(&x, &y, &x, 0.0).unwrap(), y);
}

#[test]
fn rebin_outside_domain_is_fill() {
    let x = grid(10.0, 1.0, 5);
    let y = vec![1.0; 5];
    let out = rebin(&x, &y, &[9.5, 14.5, 100.0, -3.0], 42.0).unwrap();
    assert_eq!(out, vec![42.0, 42.0, 42.0, 42.0]);
}

#[test]
fn spike_offset_scenario() {
    let reference = grid(500.0, 1.0, 10);
    let flux: Vec<f64> = (0..10).map(|i| if i == 5 { 1.0 } else { 0.0 }).collect();
    let shifted: Vec<f64> = reference.iter().map(|w| w + 0.6).collect();

    let shift = estimate_shift(&reference, &flux, &shifted, &flux).unwrap();
    let window = 0.5_f64.max(0.05 * 9.0);
    assert!((shift - 0.6).abs() <= window / 4.0 / 20.0, "shift was {shift}");
}

#[test]
fn reference_in_descending_order_is_sorted_first() {
    let reference = grid(500.0, 1.0, 10);
    let flux: Vec<f64> = (0..10).map(|i| if i == 5 { 1.0 } else { 0.0 }).collect();
    let shifted: Vec<f64> = reference.iter().map(|w| w + 0.6).collect();
    let rev_wave: Vec<f64> = reference.iter().rev().copied().collect();
    let rev_flux: Vec<f64> = flux.iter().rev().copied().collect();

    let shift = estimate_shift(&rev_wave, &rev_flux, &shifted, &flux).unwrap();
    let resolution = ShiftSearchConfig::default().fine_resolution(9.0);
    assert!((shift - 0.6).abs() <= resolution, "shift was {shift}");
}

#[test]
fn dip_is_aligned_to_itself() {
    let wave = grid(500.0, 0.1, 101);
    let flux = dip(&wave, 505.0, 0.3);
    let shift = estimate_shift(&wave, &flux, &wave, &flux).unwrap();
    let resolution = ShiftSearchConfig::default().fine_resolution(10.0);
    assert!(shift.abs() <= resolution, "shift was {shift}");
}

#[test]
fn shift_never_leaves_search_range() {
    let wave = grid(500.0, 0.1, 91);
    let flux = dip(&wave, 504.0, 0.2);
    let far: Vec<f64> = wave.iter().map(|w| w + 3.0).collect();
    let cfg = ShiftSearchConfig::default();
    let shift = estimate_shift_with(&wave, &flux, &far, &flux, &cfg).unwrap();
    assert!(shift.abs() <= cfg.max_shift(9.0) + 1e-12, "shift was {shift}");
}

#[test]
fn radial_velocity_of_aligned_spectra_is_zero() {
    let wave = grid(600.0, 0.05, 200);
    let flux = dip(&wave, 605.0, 0.2);
    let v = estimate_radial_velocity(&wave, &flux, &wave, &flux).unwrap();
    let tolerance = 299_792.458 * ShiftSearchConfig::default().fine_resolution(9.95) / 600.0;
    assert!(v.abs() <= tolerance, "velocity was {v}");
}

#[test]
fn combine_single_and_duplicate_inputs() {
    let wave = grid(500.0, 0.5, 20);
    let flux = dip(&wave, 504.0, 0.7);
    let s = (wave.clone(), flux.clone());

    let one = combine(&[s.clone()], 0, false).unwrap();
    assert_eq!(one.wavelength, wave);
    assert_eq!(one.flux, flux);
    assert_eq!(one.shifts, vec![0.0]);

    let two = combine(&[s.clone(), s], 0, false).unwrap();
    for (a, b) in two.flux.iter().zip(&flux) {
        assert!((a - b).abs() < 1e-12);
    }
    assert_eq!(two.shifts, vec![0.0, 0.0]);
}

#[test]
fn rest_frame_combination_aligns_inputs() {
    let wave = grid(500.0, 0.05, 200);
    let flux = dip(&wave, 505.0, 0.15);
    let moved: Vec<f64> = wave.iter().map(|w| w + 0.25).collect();
    let out = combine(&[(wave.clone(), flux.clone()), (moved, flux.clone())], 0, true).unwrap();

    let resolution = ShiftSearchConfig::default().fine_resolution(9.95);
    assert!(out.shifts[0].abs() <= resolution);
    assert!((out.shifts[1] - 0.25).abs() <= resolution, "shifts {:?}", out.shifts);

    // Around the line centre the aligned average matches the reference.
    let centre = wave.iter().position(|w| (w - 505.0).abs() < 1e-9).unwrap();
    assert!((out.flux[centre] - flux[centre]).abs() < 0.05);
}

#[test]
fn snr_unavailable_without_uncertainty_or_overlap() {
    let wave = grid(500.0, 1.0, 10);
    let flux = vec![1.0; 10];
    let err = vec![0.1; 10];
    assert_eq!(measure_snr(&wave, &flux, None, SnrWindow::new(500.0, 509.0)), Ok(None));
    assert_eq!(measure_snr(&wave, &flux, Some(&err[..]), SnrWindow::new(600.0, 610.0)), Ok(None));
}

#[test]
fn snr_matches_hand_computed_median() {
    let wave = [500.0, 501.0, 502.0, 503.0, 504.0, 505.0];
    let err = [0.1; 6];
    let spectra = [
        [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        [0.5, -1.5, 2.5, f64::NAN, 0.0, 9.0],
        [2.0, 2.0, 4.0, 8.0, 1.0, 1.0],
    ];
    let window = SnrWindow::from_center(502.5, 1.5);
    // In-window samples are 501..504.
    let expected = [35.0, 20.0, 30.0];
    for (flux, want) in spectra.iter().zip(expected) {
        let snr = measure_snr(&wave, flux, Some(&err[..]), window).unwrap().unwrap();
        assert!((snr - want).abs() < 1e-9, "snr {snr}, expected {want}");
    }
}

#[test]
fn rebin_zero_matches_explicit_fill() {
    let x = grid(0.0, 1.0, 4);
    let y = vec![1.0, 2.0, 3.0, 4.0];
    let q = [-1.0, 0.5, 3.0, 3.5];
    assert_eq!(rebin_zero(&x, &y, &q).unwrap(), rebin(&x, &y, &q, 0.0).unwrap());
}
