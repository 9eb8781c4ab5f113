// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![no_std]
#![warn(missing_docs)]
//! Cycle-accurate SID (MOS6581/8580) emulator engine derived from reSID.
//!
//! The crate models the complete signal pipeline of the chip: three waveform
//! oscillators with hard sync and ring modulation, three ADSR envelope
//! generators, the on-chip multimode filter, the C64 board's output filter
//! stage, and resampling from the ~1MHz chip clock to an arbitrary audio
//! sample rate.

#[cfg(all(feature = "alloc", not(feature = "std")))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;
#[cfg(all(feature = "alloc", feature = "std"))]
extern crate std as alloc;

/// R-2R ladder DAC tables.
pub mod dac;
mod data;
/// Envelope generator modeling SID ADSR behavior.
pub mod envelope;
/// External C64 audio output filter.
pub mod external_filter;
/// Internal SID multimode filter implementation.
pub mod filter;
pub mod sampler;
mod sid;
pub mod spline;
/// Core SID synthesizer combining voices, filter, and routing.
pub mod synth;
/// Voice primitives (waveform + envelope).
pub mod voice;
/// Oscillator waveform generator primitives and sync helpers.
pub mod wave;

/// Configuration for constructing a [`Sid`].
#[cfg(all(feature = "alloc", feature = "std"))]
pub use self::sid::SidConfig;

/// SID chip model selection.
///
/// The MOS 6581 was the original SID chip used in early C64s, featuring
/// a distinctive filter with analog imperfections. The MOS 8580 was a
/// later revision with a cleaner, more linear filter response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ChipModel {
    /// Original SID chip (1982) with characteristic analog filter quirks.
    #[default]
    Mos6581,
    /// Revised SID chip (1987) with cleaner, more linear filter.
    Mos8580,
}

/// Clock frequency constants for common C64 configurations.
pub mod clock {
    /// PAL C64 clock frequency (~985 kHz).
    pub const PAL: f64 = 985_248.0;
    /// NTSC C64 clock frequency (~1.02 MHz).
    pub const NTSC: f64 = 1_022_727.0;
}

pub use self::sampler::SamplingMethod;
pub use self::sid::{Sid, State};

/// Error returned when sampling parameters are invalid.
///
/// Configuration is all-or-nothing: on error the previously configured
/// sampling parameters remain in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingError {
    /// Clock frequency must be a positive, finite number of Hz.
    InvalidClockFrequency,
    /// Sample rate must be a positive, finite number of Hz.
    InvalidSampleRate,
    /// Passband edge must lie below the Nyquist frequency.
    InvalidPassband,
}
