//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! All designs are windowed-sinc (Hamming) with automatically chosen
//! transition bandwidths and filter lengths:
//!   • transition bandwidth = min(max(0.25 * f, 2.0), headroom to band edge)
//!   • filter length N      = ceil(3.3 / trans_bw * sfreq), rounded to odd
//! Highpass and band-stop responses are built by spectral inversion.
use std::f64::consts::PI;

/// Transition bandwidth for a lower band edge at `l_freq` Hz.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn trans_bandwidth_low(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Transition bandwidth for an upper band edge at `h_freq` Hz.
///
/// Bounded by the headroom between the edge and Nyquist.
pub fn trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    let nyq = sfreq / 2.0;
    (0.25 * h_freq).max(2.0).min(nyq - h_freq)
}

/// Compute the number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    // Make odd.
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design a zero-phase highpass FIR filter using a Hamming-windowed sinc.
///
/// Returns the impulse response `h[N]`.
pub fn design_highpass(l_freq: f64, sfreq: f64) -> Vec<f64> {
    let trans_bw = trans_bandwidth_low(l_freq);
    let n = auto_filter_length(trans_bw, sfreq);

    // Midpoint of transition band → firwin cutoff.
    let cutoff_hz = l_freq - trans_bw / 2.0;

    firwin(n, cutoff_hz, sfreq, false)
}

/// Design a zero-phase lowpass FIR filter.
pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Vec<f64> {
    let trans_bw = trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(trans_bw, sfreq);
    let cutoff_hz = h_freq + trans_bw / 2.0;

    firwin(n, cutoff_hz, sfreq, true)
}

/// Design a zero-phase band-pass FIR filter for `l_freq`–`h_freq` Hz.
///
/// Built as the difference of two lowpass designs sharing one length (the
/// longer of the two auto lengths, so the narrower transition dominates).
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Vec<f64> {
    assert!(l_freq < h_freq, "band edges out of order");
    let tb_l = trans_bandwidth_low(l_freq);
    let tb_h = trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(tb_l, sfreq).max(auto_filter_length(tb_h, sfreq));

    let low_cutoff = l_freq - tb_l / 2.0;
    let high_cutoff = h_freq + tb_h / 2.0;

    let lp_high = firwin(n, high_cutoff, sfreq, true);
    let lp_low = firwin(n, low_cutoff, sfreq, true);

    lp_high.iter().zip(lp_low.iter()).map(|(a, b)| a - b).collect()
}

/// Design a zero-phase notch (band-stop) FIR filter centred on `freq` Hz.
///
/// Stop-band width follows MNE's default (`freq / 200`) with a 1 Hz
/// transition on each side.  Band-stop = identity − band-pass.
pub fn design_notch(freq: f64, sfreq: f64) -> Vec<f64> {
    let width = freq / 200.0;
    let trans_bw = 1.0;
    let n = auto_filter_length(trans_bw, sfreq);

    let low_cutoff = freq - width / 2.0 - trans_bw / 2.0;
    let high_cutoff = freq + width / 2.0 + trans_bw / 2.0;

    let lp_high = firwin(n, high_cutoff, sfreq, true);
    let lp_low = firwin(n, low_cutoff, sfreq, true);

    // Spectral inversion of the pass band: h = δ − (lp_high − lp_low).
    let mut h: Vec<f64> = lp_high
        .iter()
        .zip(lp_low.iter())
        .map(|(a, b)| -(a - b))
        .collect();
    h[n / 2] += 1.0;
    h
}

/// Design a lowpass FIR filter using a Hamming-windowed sinc.
///
/// `pass_zero=true` means the DC component passes (lowpass);
/// `pass_zero=false` spectrally inverts to a highpass.
/// `cutoff_hz` is the -6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq / 2.0;
    let fc = cutoff_hz / nyq; // normalised [0, 1]

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc  (L'Hôpital)
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Normalise so sum = 1 (unit DC gain for lowpass).
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        // Highpass by spectral inversion.
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }

    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}
