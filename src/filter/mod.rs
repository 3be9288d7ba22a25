//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc FIR design (highpass, lowpass,
//!   band-pass, notch), matching `mne.filter.create_filter(fir_window='hamming',
//!   phase='zero')`.
//! - [`apply`]: Overlap-add zero-phase convolution, matching MNE's
//!   `_overlap_add_filter` / `_1d_overlap_filter`.

pub mod apply;
pub mod design;

pub use design::{
    auto_filter_length, design_bandpass, design_highpass, design_lowpass, design_notch,
    firwin, hamming, trans_bandwidth_high, trans_bandwidth_low,
};
pub use apply::{apply_fir_zero_phase, filter_1d};
