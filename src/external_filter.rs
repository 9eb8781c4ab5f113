// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use super::synth::OUTPUT_DIVISOR;
use super::ChipModel;

/// Maximum mixer DC output level at the 16-bit output scale; removed from
/// the signal when the external filter is turned off:
/// ((wave DC + voice DC)*voices + mixer DC)*volume
/// See voice.rs and filter.rs for an explanation of the values.
const MIXER_DC_6581: i32 =
    ((((0x800 - 0x380) + 0x800) * 0xff * 3 - 0xfff * 0xff / 18) >> 7) * 0x0f / OUTPUT_DIVISOR;

// The audio output stage in a Commodore 64 consists of two first-order RC
// filters: a low-pass with 3-dB frequency 16kHz followed by a high-pass
// (DC blocker). The stages are connected with a BJT emitter follower,
// modeled as a unity gain buffer.
//
// A high-pass cutoff of the nominal 1.6Hz would require the signal to
// settle around zero over an impractically long horizon and more state
// bits; a low but not unreasonable load of 1kOhm yields 16Hz instead.
//
// The state space model is discretized with zero order hold. Since the
// low-pass and high-pass corner frequencies are five orders of magnitude
// apart, state values are updated by differences, and each coefficient
// carries its own shift so that ~27 bits of state resolution survive.
const W0LP: f64 = 1.0 / (10e3 * 1e-9);
const W0HP: f64 = 1.0 / (1e3 * 10e-6);

/// Above this step size a fused multi-cycle coefficient set is used.
const MAX_CYCLES: u32 = 10;

/// Default clock frequency (PAL C64).
const DEFAULT_CLOCK_FREQ: f64 = 985_248.0;

/// One discretized coefficient pair, `1 - e^(-w0*T)` in fixed point with a
/// per-coefficient shift.
#[derive(Clone, Copy)]
struct ExternalFilterCoefficients {
    shiftlp: i32,
    shifthp: i32,
    mullp: i64,
    mulhp: i64,
}

impl ExternalFilterCoefficients {
    fn new(w0lp: f64, w0hp: f64, t: f64) -> Self {
        // Cutoff frequency accuracy (4 bits) is traded off for filter state
        // accuracy (27 bits). This is crucial since w0lp and w0hp are so
        // far apart.
        let alpha_lp = 1.0 - libm::exp(-w0lp * t);
        let alpha_hp = 1.0 - libm::exp(-w0hp * t);
        let shiftlp = libm::log2(((1 << 4) - 1) as f64 / alpha_lp) as i32;
        let shifthp = libm::log2(((1 << 4) - 1) as f64 / alpha_hp) as i32;
        ExternalFilterCoefficients {
            shiftlp,
            shifthp,
            mullp: (alpha_lp * (1u64 << shiftlp) as f64 + 0.5) as i64,
            mulhp: (alpha_hp * (1u64 << shifthp) as f64 + 0.5) as i64,
        }
    }
}

/// C64 audio output stage filter.
///
/// Input is the 16-bit mixed chip output, held in 27 bits of state; the
/// output is `(vlp - vhp) >> 11`, back at 16 bits.
#[derive(Clone, Copy)]
pub struct ExternalFilter {
    // Configuration
    enabled: bool,
    mixer_dc: i32,
    // Coefficients for delta_t = 1 and delta_t = MAX_CYCLES.
    t1: ExternalFilterCoefficients,
    tmax: ExternalFilterCoefficients,
    // Runtime State (27 bits)
    /// Low-pass filter state.
    pub vlp: i32,
    /// High-pass filter state.
    pub vhp: i32,
}

impl ExternalFilter {
    /// Create an external filter model for the selected SID chip.
    pub fn new(chip_model: ChipModel) -> Self {
        let mixer_dc = match chip_model {
            ChipModel::Mos6581 => MIXER_DC_6581,
            ChipModel::Mos8580 => 0,
        };
        let mut filter = ExternalFilter {
            enabled: true,
            mixer_dc,
            t1: ExternalFilterCoefficients::new(W0LP, W0HP, 1.0 / DEFAULT_CLOCK_FREQ),
            tmax: ExternalFilterCoefficients::new(
                W0LP,
                W0HP,
                MAX_CYCLES as f64 / DEFAULT_CLOCK_FREQ,
            ),
            vlp: 0,
            vhp: 0,
        };
        filter.reset();
        filter
    }

    /// Enable or disable the external audio filter stage.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Recalculate both coefficient sets for a new chip clock frequency.
    pub fn set_clock_frequency(&mut self, frequency: f64) {
        let t = 1.0 / frequency;
        self.t1 = ExternalFilterCoefficients::new(W0LP, W0HP, t);
        self.tmax = ExternalFilterCoefficients::new(W0LP, W0HP, MAX_CYCLES as f64 * t);
    }

    /// Clock the filter one cycle.
    #[inline]
    pub fn clock(&mut self, vi: i32) {
        // This is handy for testing.
        if !self.enabled {
            self.vlp = (vi - self.mixer_dc) << 11;
            self.vhp = 0;
            return;
        }
        self.step(self.t1, vi);
    }

    /// Clock the filter `delta` cycles with constant input, fusing
    /// MAX_CYCLES at a time through the scaled coefficient set.
    #[inline]
    pub fn clock_delta(&mut self, mut delta: u32, vi: i32) {
        if !self.enabled {
            self.vlp = (vi - self.mixer_dc) << 11;
            self.vhp = 0;
            return;
        }

        while delta != 0 {
            if delta < MAX_CYCLES {
                for _ in 0..delta {
                    self.step(self.t1, vi);
                }
                break;
            }
            self.step(self.tmax, vi);
            delta -= MAX_CYCLES;
        }
    }

    /// Audio output (16 bits): filter state shifted down from 27 bits.
    #[inline]
    pub const fn output(&self) -> i32 {
        ((self.vlp as i64 - self.vhp as i64) >> 11) as i32
    }

    /// Reset internal filter state to zero.
    pub const fn reset(&mut self) {
        self.vlp = 0;
        self.vhp = 0;
    }

    #[inline]
    fn step(&mut self, c: ExternalFilterCoefficients, vi: i32) {
        // Note calculation order: the high-pass update reads the low-pass
        // state before it moves. State updates saturate rather than wrap.
        let dvhp = (c.mulhp * (self.vlp as i64 - self.vhp as i64)) >> c.shifthp;
        let dvlp = (c.mullp * (((vi as i64) << 11) - self.vlp as i64)) >> c.shiftlp;
        self.vhp = self.vhp.saturating_add(dvhp.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
        self.vlp = self.vlp.saturating_add(dvlp.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
    }
}
