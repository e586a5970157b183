//! In-place vector kernels used by the native interpreter.

use num_complex::Complex64;
use rustfft::FftPlanner;
use std::collections::TryReserveError;
use std::f64::consts::PI;

/// Largest vector length a zero fill may produce.
pub const MAX_ZERO_FILL_POINTS: usize = 1 << 26;

/// Pads `points` with zeros up to `size`. The allocation is reserved up
/// front so an unsatisfiable size is reported instead of aborting.
pub fn zero_fill(points: &mut Vec<Complex64>, size: usize) -> Result<(), TryReserveError> {
    points.try_reserve_exact(size.saturating_sub(points.len()))?;
    points.resize(size, Complex64::new(0.0, 0.0));
    Ok(())
}

/// Exponential line broadening of `line_broadening` Hz at the given dwell time.
pub fn apply_exponential(points: &mut [Complex64], line_broadening: f64, dwell: f64) {
    for (index, point) in points.iter_mut().enumerate() {
        let time = index as f64 * dwell;
        *point *= (-PI * line_broadening * time).exp();
    }
}

/// Sine-bell apodization from `offset * pi` to `end * pi`, raised to `power`.
pub fn apply_sine_bell(points: &mut [Complex64], offset: f64, end: f64, power: f64) {
    let count = points.len();
    if count == 0 {
        return;
    }
    let span = (count.max(2) - 1) as f64;
    for (index, point) in points.iter_mut().enumerate() {
        let angle = PI * offset + PI * (end - offset) * index as f64 / span;
        *point *= angle.sin().powf(power);
    }
}

/// Zero- and first-order phase correction, both in degrees.
pub fn apply_phase(points: &mut [Complex64], ph0: f64, ph1: f64) {
    let count = points.len().max(1) as f64;
    for (index, point) in points.iter_mut().enumerate() {
        let degrees = ph0 + ph1 * index as f64 / count;
        *point *= Complex64::from_polar(1.0, degrees.to_radians());
    }
}

/// Forward Fourier transform with the zero frequency moved to the centre.
///
/// The first point is halved before the transform to remove the baseline
/// offset it otherwise introduces.
pub fn fourier_transform(points: &mut [Complex64]) {
    if points.is_empty() {
        return;
    }
    points[0] *= 0.5;
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(points.len());
    fft.process(points);
    let half = points.len() / 2;
    points.rotate_left(half);
}

pub fn real_part(points: &mut [Complex64]) {
    for point in points.iter_mut() {
        point.im = 0.0;
    }
}

pub fn scale(points: &mut [Complex64], factor: f64) {
    for point in points.iter_mut() {
        *point *= factor;
    }
}
