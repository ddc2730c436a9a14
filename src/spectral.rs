//! Welch spectral estimation for the time-domain solver.
//!
//! Signals are split into overlapping Hann-windowed segments whose
//! periodograms are averaged. The transfer function between forcing and
//! response is the averaged cross spectrum divided by the averaged input
//! power spectrum, so broadband noise in single segments cancels out.

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::GroundwaveError;

/// Periodic Hann window, suitable for averaged spectral estimates
fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos()))
        .collect()
}

/// One-sided FFTs of all windowed segments of a signal
///
/// Segments start every `nperseg - noverlap` samples; a trailing remainder
/// shorter than a full segment is dropped.
fn segment_spectra(
    signal: &[f64],
    window: &[f64],
    noverlap: usize,
) -> Result<Vec<Vec<Complex<f64>>>, GroundwaveError> {
    let nperseg = window.len();
    if signal.len() < nperseg {
        return Err(GroundwaveError::Solver(format!(
            "Error: {} samples cannot fill a spectral segment of {}\n",
            signal.len(),
            nperseg
        )));
    }
    let step = nperseg - noverlap;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut spectra = Vec::new();
    let mut start = 0usize;
    while start + nperseg <= signal.len() {
        let mut buffer: Vec<Complex<f64>> = signal[start..start + nperseg]
            .iter()
            .zip(window)
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();
        fft.process(&mut buffer);
        buffer.truncate(nperseg / 2 + 1);
        spectra.push(buffer);
        start += step;
    }

    Ok(spectra)
}

/// Density scaling factors for a one-sided spectrum
///
/// Interior bins carry the energy of their negative-frequency twin; the
/// zero and Nyquist bins have none.
fn density_scale(window: &[f64], fs: f64, bins: usize) -> Vec<f64> {
    let win_power: f64 = window.iter().map(|w| w * w).sum();
    let base = 1.0 / (fs * win_power);
    (0..bins)
        .map(|k| {
            if k == 0 || k == bins - 1 {
                base
            } else {
                2.0 * base
            }
        })
        .collect()
}

/// One-sided bin frequencies for a segment length and sampling rate
pub fn bin_frequencies(fs: f64, nperseg: usize) -> Vec<f64> {
    (0..=nperseg / 2).map(|k| k as f64 * fs / nperseg as f64).collect()
}

/// Welch power spectral density estimate of a signal
///
/// # Arguments
/// * `x` - The sampled signal
/// * `fs` - Sampling rate [Hz]
/// * `nperseg` - Samples per segment
/// * `noverlap` - Overlapping samples between adjacent segments
///
/// # Returns
/// The bin frequencies and the PSD estimate per bin
pub fn welch(
    x: &[f64],
    fs: f64,
    nperseg: usize,
    noverlap: usize,
) -> Result<(Vec<f64>, Vec<f64>), GroundwaveError> {
    let window = hann_window(nperseg);
    let spectra = segment_spectra(x, &window, noverlap)?;
    let bins = nperseg / 2 + 1;
    let scale = density_scale(&window, fs, bins);

    let mut psd = vec![0.0; bins];
    for spectrum in &spectra {
        for (k, value) in spectrum.iter().enumerate() {
            psd[k] += value.norm_sqr();
        }
    }
    let count = spectra.len() as f64;
    for (k, p) in psd.iter_mut().enumerate() {
        *p *= scale[k] / count;
    }

    Ok((bin_frequencies(fs, nperseg), psd))
}

/// Welch cross spectral density estimate between two signals
///
/// The convention matches `conj(X) * Y` per segment, so the phase is that
/// of `y` relative to `x`.
pub fn csd(
    x: &[f64],
    y: &[f64],
    fs: f64,
    nperseg: usize,
    noverlap: usize,
) -> Result<(Vec<f64>, Vec<Complex<f64>>), GroundwaveError> {
    let window = hann_window(nperseg);
    let spectra_x = segment_spectra(x, &window, noverlap)?;
    let spectra_y = segment_spectra(y, &window, noverlap)?;
    let segments = spectra_x.len().min(spectra_y.len());
    let bins = nperseg / 2 + 1;
    let scale = density_scale(&window, fs, bins);

    let mut cross = vec![Complex::new(0.0, 0.0); bins];
    for n in 0..segments {
        for k in 0..bins {
            cross[k] += spectra_x[n][k].conj() * spectra_y[n][k];
        }
    }
    for (k, c) in cross.iter_mut().enumerate() {
        *c *= scale[k] / segments as f64;
    }

    Ok((bin_frequencies(fs, nperseg), cross))
}

/// Estimates the transfer function from a forcing trace to a response trace
///
/// Computed as the cross spectrum of response and forcing divided by the
/// forcing power spectrum; the density scaling cancels in the ratio.
///
/// # Arguments
/// * `input` - The forcing trace
/// * `output` - The response trace
/// * `fs` - Sampling rate [Hz]
/// * `nperseg` - Samples per segment
/// * `noverlap` - Overlapping samples between adjacent segments
///
/// # Returns
/// The bin frequencies and the complex transfer estimate per bin
pub fn transfer_function(
    input: &[f64],
    output: &[f64],
    fs: f64,
    nperseg: usize,
    noverlap: usize,
) -> Result<(Vec<f64>, Vec<Complex<f64>>), GroundwaveError> {
    let (frequencies, cross) = csd(output, input, fs, nperseg, noverlap)?;
    let (_, power) = welch(input, fs, nperseg, noverlap)?;

    let transfer = cross
        .iter()
        .zip(&power)
        .map(|(c, p)| *c / *p)
        .collect();

    Ok((frequencies, transfer))
}
