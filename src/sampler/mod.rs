// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Audio sampling and resampling for SID output.
//!
//! Converts the ~1MHz chip-rate output stream to the host sample rate with
//! a choice of quality levels, from plain decimation to Kaiser-windowed
//! sinc resampling with fractional-phase kernels.

// Allow cast_lossless: intentional i16->i32 casts for audio sample processing
#![allow(clippy::cast_lossless)]

#[cfg(feature = "alloc")]
mod fir;
mod soft_clip;

#[cfg(feature = "alloc")]
pub use fir::DEFAULT_PASS_FREQ;
pub use soft_clip::soft_clip;

use crate::synth::Synth;
use crate::SamplingError;

use wide::{i16x16, i32x8};

// Resampling constants.
// The error in interpolated lookup is bounded by 1.234/L^2,
// while the error in non-interpolated lookup is bounded by
// 0.7854/L + 0.4113/L^2, see
// http://www-ccrma.stanford.edu/~jos/resample/Choice_Table_Size.html
// For a resolution of 16 bits this yields L >= 285 and L >= 51473,
// respectively.
const FIR_RES_FAST: i32 = 51473;
const FIR_RES_INTERPOLATE: i32 = 285;
const FIR_SHIFT: i32 = 15;
const RING_SIZE: usize = 16384;
const RING_MASK: usize = RING_SIZE - 1;

const FIXP_SHIFT: i32 = 16;
const FIXP_MASK: i32 = 0xffff;

/// Audio sampling/resampling method.
///
/// Controls how SID output is converted to the target sample rate.
/// Methods requiring heap allocation are gated behind the `alloc` feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SamplingMethod {
    /// Nearest-neighbour decimation - fastest but lowest quality.
    #[default]
    Fast,
    /// Linear interpolation between samples.
    Interpolate,
    /// Sinc resampling from a single large kernel table, no fractional
    /// phase interpolation (requires `alloc`).
    #[cfg(feature = "alloc")]
    ResampleFast,
    /// High-quality sinc resampling interpolating between fractional-phase
    /// kernels (requires `alloc`).
    #[cfg(feature = "alloc")]
    Resample,
}

/// Audio sampler wrapping the SID synthesizer.
///
/// Owns a ring buffer of recent chip-rate output samples and a fixed-point
/// sample-time accumulator stepped by `clock_freq / sample_freq` per
/// emitted sample.
#[derive(Clone)]
pub struct Sampler {
    // Dependencies
    /// Underlying SID synthesizer.
    pub synth: Synth,
    // Configuration
    cycles_per_sample: u32,
    #[cfg(feature = "alloc")]
    fir: fir::Fir,
    sampling_method: SamplingMethod,
    // Runtime State
    buffer: [i16; RING_SIZE * 2],
    index: usize,
    offset: i32,
    prev_sample: i16,
}

impl Sampler {
    /// Construct a sampler around a SID synthesizer.
    pub fn new(synth: Synth) -> Self {
        Self {
            synth,
            cycles_per_sample: 0,
            #[cfg(feature = "alloc")]
            fir: fir::Fir::default(),
            sampling_method: SamplingMethod::Fast,
            buffer: [0; RING_SIZE * 2],
            index: 0,
            offset: 0,
            prev_sample: 0,
        }
    }

    /// Set sampling parameters.
    ///
    /// A negative `pass_freq` selects the default passband edge of 20kHz,
    /// clamped to 90% of the Nyquist frequency. `filter_scale` is the
    /// linear passband gain, clamped to [0.9, 1.0].
    ///
    /// Configuration is atomic: on error the previous parameters remain in
    /// effect.
    ///
    /// # Errors
    /// - `SamplingError::InvalidClockFrequency` if `clock_freq` is not a
    ///   positive finite number.
    /// - `SamplingError::InvalidSampleRate` if `sample_freq` is not a
    ///   positive finite number.
    /// - `SamplingError::InvalidPassband` if `pass_freq` exceeds 90% of the
    ///   Nyquist frequency.
    pub fn set_parameters(
        &mut self,
        method: SamplingMethod,
        clock_freq: f64,
        sample_freq: f64,
        pass_freq: f64,
        filter_scale: f64,
    ) -> Result<(), SamplingError> {
        if !clock_freq.is_finite() || clock_freq <= 0.0 {
            return Err(SamplingError::InvalidClockFrequency);
        }
        if !sample_freq.is_finite() || sample_freq <= 0.0 {
            return Err(SamplingError::InvalidSampleRate);
        }
        let pass_freq = if pass_freq < 0.0 {
            // The default passband limit is 0.9*sample_freq/2 for sample
            // frequencies below ~44.1kHz, and 20kHz for higher rates.
            let nyquist_bound = 0.9 * sample_freq / 2.0;
            #[cfg(feature = "alloc")]
            let default = DEFAULT_PASS_FREQ.min(nyquist_bound);
            #[cfg(not(feature = "alloc"))]
            let default = nyquist_bound;
            default
        } else {
            if 2.0 * pass_freq / sample_freq > 0.9 {
                return Err(SamplingError::InvalidPassband);
            }
            pass_freq
        };
        let filter_scale = filter_scale.clamp(0.9, 1.0);

        // Design the kernel bank before touching any state, so that a
        // failing call leaves the sampler fully configured as before.
        #[cfg(feature = "alloc")]
        let new_fir = match method {
            SamplingMethod::Resample | SamplingMethod::ResampleFast => Some(fir::Fir::design(
                method,
                clock_freq,
                sample_freq,
                pass_freq,
                filter_scale,
            )),
            _ => None,
        };
        #[cfg(not(feature = "alloc"))]
        let _ = (pass_freq, filter_scale);

        self.cycles_per_sample =
            (clock_freq / sample_freq * (1 << FIXP_SHIFT) as f64 + 0.5) as u32;
        self.sampling_method = method;
        #[cfg(feature = "alloc")]
        if let Some(new_fir) = new_fir {
            self.fir = new_fir;
        }

        // Clear sample buffer state.
        for sample in self.buffer.iter_mut() {
            *sample = 0;
        }
        self.index = 0;
        self.offset = 0;
        self.prev_sample = 0;
        Ok(())
    }

    /// Reset sampler and underlying synth state.
    pub fn reset(&mut self) {
        self.synth.reset();
        self.index = 0;
        self.offset = 0;
        self.prev_sample = 0;
    }

    /// Clock the sampler for `delta` SID cycles, writing interleaved audio
    /// samples. Returns the number of samples written and the unconsumed
    /// remainder of `delta` once the buffer is full.
    #[inline]
    pub fn clock(&mut self, delta: u32, buffer: &mut [i16], interleave: usize) -> (usize, u32) {
        match self.sampling_method {
            SamplingMethod::Fast => self.clock_fast(delta, buffer, interleave),
            SamplingMethod::Interpolate => self.clock_interpolate(delta, buffer, interleave),
            #[cfg(feature = "alloc")]
            SamplingMethod::ResampleFast => self.clock_resample_fast(delta, buffer, interleave),
            #[cfg(feature = "alloc")]
            SamplingMethod::Resample => self.clock_resample_interpolate(delta, buffer, interleave),
        }
    }

    /// Nearest-neighbour (decimation) sampling.
    #[inline]
    fn clock_fast(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= buffer.len() {
                break;
            }
            self.synth.clock_delta(delta_sample);
            delta -= delta_sample;
            buffer[index * interleave] = self.synth.output();
            index += 1;
            self.update_sample_offset(next_sample_offset);
        }
        if delta > 0 && index < buffer.len() {
            self.synth.clock_delta(delta);
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// Linear interpolation sampling.
    #[inline]
    fn clock_interpolate(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= buffer.len() {
                break;
            }
            for _ in 0..(delta_sample - 1) {
                self.prev_sample = self.synth.output();
                self.synth.clock();
            }
            delta -= delta_sample;
            let sample_now = self.synth.output();
            buffer[index * interleave] = self.prev_sample
                + ((self.offset * (sample_now - self.prev_sample) as i32) >> FIXP_SHIFT) as i16;
            index += 1;
            self.prev_sample = sample_now;
            self.update_sample_offset(next_sample_offset);
        }
        if delta > 0 && index < buffer.len() {
            for _ in 0..(delta - 1) {
                self.synth.clock();
            }
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// High-quality sinc resampling, linearly interpolating between the
    /// two kernel tables bracketing the fractional sample offset.
    #[cfg(feature = "alloc")]
    #[inline]
    fn clock_resample_interpolate(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset2();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= buffer.len() {
                break;
            }

            for _ in 0..delta_sample {
                self.synth.clock();
                let output = self.synth.output();
                self.buffer[self.index] = output;
                self.buffer[self.index + RING_SIZE] = output;
                self.index += 1;
                self.index &= RING_MASK;
            }
            delta -= delta_sample;
            self.update_sample_offset2(next_sample_offset);

            let fir_offset_1 = (self.offset * self.fir.res) >> FIXP_SHIFT;
            let fir_offset_rmd = (self.offset * self.fir.res) & FIXP_MASK;
            let fir_start_1 = (fir_offset_1 * self.fir.n) as usize;
            let fir_end_1 = fir_start_1 + self.fir.n as usize;
            let sample_start_1 = (self.index as i32 - self.fir.n + RING_SIZE as i32) as usize;
            let sample_end_1 = sample_start_1 + self.fir.n as usize;

            // Convolution with filter impulse response.
            let v1 = compute_convolution_fir(
                &self.buffer[sample_start_1..sample_end_1],
                &self.fir.data[fir_start_1..fir_end_1],
            );

            // Use next FIR table, wrapping around to the first FIR table
            // using the previous sample.
            let mut fir_offset_2 = fir_offset_1 + 1;
            let mut sample_start_2 = sample_start_1;
            if fir_offset_2 == self.fir.res {
                fir_offset_2 = 0;
                sample_start_2 -= 1;
            }
            let fir_start_2 = (fir_offset_2 * self.fir.n) as usize;
            let fir_end_2 = fir_start_2 + self.fir.n as usize;
            let sample_end_2 = sample_start_2 + self.fir.n as usize;

            let v2 = compute_convolution_fir(
                &self.buffer[sample_start_2..sample_end_2],
                &self.fir.data[fir_start_2..fir_end_2],
            );

            // Linear interpolation between the two convolutions.
            let mut v = v1 + ((fir_offset_rmd * (v2 - v1)) >> FIXP_SHIFT);
            v >>= FIR_SHIFT;

            // Soft clip for smooth saturation near 16-bit boundaries.
            buffer[index * interleave] = soft_clip(v);
            index += 1;
        }
        if delta > 0 && index < buffer.len() {
            for _ in 0..delta {
                self.synth.clock();
                let output = self.synth.output();
                self.buffer[self.index] = output;
                self.buffer[self.index + RING_SIZE] = output;
                self.index += 1;
                self.index &= RING_MASK;
            }
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// Sinc resampling with a single table lookup per sample; the larger
    /// table resolution stands in for fractional phase interpolation.
    #[cfg(feature = "alloc")]
    #[inline]
    fn clock_resample_fast(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset2();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= buffer.len() {
                break;
            }

            for _ in 0..delta_sample {
                self.synth.clock();
                let output = self.synth.output();
                self.buffer[self.index] = output;
                self.buffer[self.index + RING_SIZE] = output;
                self.index += 1;
                self.index &= RING_MASK;
            }
            delta -= delta_sample;
            self.update_sample_offset2(next_sample_offset);

            let fir_offset = (self.offset * self.fir.res) >> FIXP_SHIFT;
            let fir_start = (fir_offset * self.fir.n) as usize;
            let fir_end = fir_start + self.fir.n as usize;
            let sample_start = (self.index as i32 - self.fir.n + RING_SIZE as i32) as usize;
            let sample_end = sample_start + self.fir.n as usize;

            let mut v = compute_convolution_fir(
                &self.buffer[sample_start..sample_end],
                &self.fir.data[fir_start..fir_end],
            );
            v >>= FIR_SHIFT;

            buffer[index * interleave] = soft_clip(v);
            index += 1;
        }
        if delta > 0 && index < buffer.len() {
            for _ in 0..delta {
                self.synth.clock();
                let output = self.synth.output();
                self.buffer[self.index] = output;
                self.buffer[self.index + RING_SIZE] = output;
                self.index += 1;
                self.index &= RING_MASK;
            }
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    #[inline]
    const fn get_next_sample_offset(&self) -> i32 {
        self.offset + self.cycles_per_sample as i32 + (1 << (FIXP_SHIFT - 1))
    }

    #[inline]
    const fn get_next_sample_offset2(&self) -> i32 {
        self.offset + self.cycles_per_sample as i32
    }

    #[inline]
    const fn update_sample_offset(&mut self, next_sample_offset: i32) {
        self.offset = (next_sample_offset & FIXP_MASK) - (1 << (FIXP_SHIFT - 1));
    }

    #[inline]
    const fn update_sample_offset2(&mut self, next_sample_offset: i32) {
        self.offset = next_sample_offset & FIXP_MASK;
    }
}

/// Dot product of sample window and kernel.
///
/// Uses the wide crate for portable SIMD; LLVM emits vpmaddwd on AVX2.
/// Four accumulators hide instruction latency.
#[inline]
pub fn compute_convolution_fir(sample: &[i16], fir: &[i16]) -> i32 {
    let len = sample.len().min(fir.len());
    let mut ss = &sample[..len];
    let mut fs = &fir[..len];

    let mut v1 = i32x8::ZERO;
    let mut v2 = i32x8::ZERO;
    let mut v3 = i32x8::ZERO;
    let mut v4 = i32x8::ZERO;

    while ss.len() >= 64 {
        let sv1 = i16x16::from(&ss[0..16]);
        let sv2 = i16x16::from(&ss[16..32]);
        let sv3 = i16x16::from(&ss[32..48]);
        let sv4 = i16x16::from(&ss[48..64]);
        let fv1 = i16x16::from(&fs[0..16]);
        let fv2 = i16x16::from(&fs[16..32]);
        let fv3 = i16x16::from(&fs[32..48]);
        let fv4 = i16x16::from(&fs[48..64]);

        v1 += sv1.dot(fv1);
        v2 += sv2.dot(fv2);
        v3 += sv3.dot(fv3);
        v4 += sv4.dot(fv4);

        ss = &ss[64..];
        fs = &fs[64..];
    }

    let combined = v1 + v2 + v3 + v4;
    let mut v = combined.reduce_add();

    for i in 0..ss.len() {
        v += ss[i] as i32 * fs[i] as i32;
    }
    v
}
