// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![allow(clippy::cast_lossless)]

use core::f64;

use super::data::{F0_POINTS_6581, F0_POINTS_8580};
use super::spline::{interpolate, Point, PointPlotter};
use super::ChipModel;

/// The mixer has a small input DC offset. This is found as follows:
///
/// The "zero" output level of the mixer at full volume is 5.44V.
/// The mixer output at volume 0 is 5.94V.
/// Filtering this offset through the ladder gives the constant below,
/// scaled down from 20 to 13 bits like the voice inputs.
const MIXER_DC: i32 = (-0xfff * 0xff / 18) >> 7;

/// Minimum Q factor (~1/√2, critically damped).
const Q_MIN: f64 = 0.707;

/// Maximum cutoff frequency for 1-cycle filter stability (Hz).
const F0_MAX_1CYCLE: f64 = 16000.0;

/// Maximum cutoff frequency for delta-cycle filter stability (Hz).
const F0_MAX_DELTA: f64 = 4000.0;

/// Fixed-point multiplier for 1MHz clock (2^20 / 1_000_000).
const FIXP_SCALE: f64 = 1.048_576;

/// Input level at which the 6581 summer starts to saturate, in the 13-bit
/// voice scale. Three full-scale voices sum well past this point.
const DISTORTION_KNEE_6581: i32 = 0x2400;

/// Routes voices into or around the filter based on the filt register.
///
/// Returns `(filtered_input, non_filtered_output)`.
/// The 16-case match is expanded for performance (avoids bit testing overhead).
#[inline]
pub const fn route_voices(filt: u8, v1: i32, v2: i32, v3: i32, ext: i32) -> (i32, i32) {
    match filt {
        0x0 => (0, v1 + v2 + v3 + ext),
        0x1 => (v1, v2 + v3 + ext),
        0x2 => (v2, v1 + v3 + ext),
        0x3 => (v1 + v2, v3 + ext),
        0x4 => (v3, v1 + v2 + ext),
        0x5 => (v1 + v3, v2 + ext),
        0x6 => (v2 + v3, v1 + ext),
        0x7 => (v1 + v2 + v3, ext),
        0x8 => (ext, v1 + v2 + v3),
        0x9 => (v1 + ext, v2 + v3),
        0xa => (v2 + ext, v1 + v3),
        0xb => (v1 + v2 + ext, v3),
        0xc => (v3 + ext, v1 + v2),
        0xd => (v1 + v3 + ext, v2),
        0xe => (v2 + v3 + ext, v1),
        0xf => (v1 + v2 + v3 + ext, 0),
        _ => (0, v1 + v2 + v3 + ext),
    }
}

/// Mixes filter outputs based on the hp_bp_lp mode register.
///
/// The sum is not weighted; this can be confirmed by sampling sound output
/// for e.g. bandpass, lowpass, and bandpass+lowpass from a real chip.
#[inline]
pub const fn mix_filter_output(vhp: i32, vbp: i32, vlp: i32, hp_bp_lp: u8) -> i32 {
    match hp_bp_lp {
        0x0 => 0,
        0x1 => vlp,
        0x2 => vbp,
        0x3 => vlp + vbp,
        0x4 => vhp,
        0x5 => vlp + vhp,
        0x6 => vbp + vhp,
        0x7 => vlp + vbp + vhp,
        _ => 0,
    }
}

/// The SID filter is modeled with a two-integrator-loop biquadratic filter,
/// which has been confirmed by Bob Yannes to be the actual circuit used in
/// the SID chip.
///
/// Vhp is the output of the summer, Vbp the output of the first integrator,
/// and Vlp the output of the second integrator in the filter circuit. An
/// additional inverter in the feedback from the bandpass output lets the
/// summer operate single-ended; this yields inverted filter outputs with
/// levels independent of Q, matching a real SID.
///
/// The active stages are not op-amps but NMOS inverters biased into their
/// quasi-linear region. On the 6581 the summer visibly saturates for large
/// summed inputs; this is approximated by a piecewise-linear clip with a
/// knee before the input enters the loop. The 8580 input path is linear.
#[derive(Clone)]
pub struct Filter {
    // Configuration
    enabled: bool,
    fc: u16,
    filt: u8,
    res: u8,
    // 6581 input stage saturation.
    distortion: bool,
    // Mode
    voice3_off: bool,
    hp_bp_lp: u8,
    vol: u8,
    // Runtime State
    /// Highpass (summer) state.
    pub vhp: i32,
    /// Bandpass integrator state.
    pub vbp: i32,
    /// Lowpass integrator state.
    pub vlp: i32,
    /// Non-filtered mixer input.
    pub vnf: i32,
    // Cutoff Freq/Res
    mixer_dc: i32,
    q_1024_div: i32,
    w0: i32,
    w0_ceil_1: i32,
    w0_ceil_dt: i32,
    // Cutoff frequency table, interpolated from measured control points.
    f0: [i32; 2048],
}

impl Filter {
    /// Create a filter for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        let f0_points = match chip_model {
            ChipModel::Mos6581 => &F0_POINTS_6581[..],
            ChipModel::Mos8580 => &F0_POINTS_8580[..],
        };
        let mut filter = Filter {
            enabled: true,
            fc: 0,
            filt: 0,
            res: 0,
            distortion: matches!(chip_model, ChipModel::Mos6581),
            voice3_off: false,
            hp_bp_lp: 0,
            vol: 0,
            vhp: 0,
            vbp: 0,
            vlp: 0,
            vnf: 0,
            mixer_dc: MIXER_DC,
            q_1024_div: 0,
            w0: 0,
            w0_ceil_1: 0,
            w0_ceil_dt: 0,
            f0: [0; 2048],
        };
        filter.set_f0(f0_points);
        filter.set_q();
        filter.set_w0();
        filter
    }

    /// Enable or disable the filter (bypasses all routing when disabled).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Filter cutoff low register (3 bits).
    pub const fn get_fc_lo(&self) -> u8 {
        (self.fc & 0x007) as u8
    }

    /// Filter cutoff high register.
    pub const fn get_fc_hi(&self) -> u8 {
        (self.fc >> 3) as u8
    }

    /// Resonance/routing register.
    pub const fn get_res_filt(&self) -> u8 {
        (self.res << 4) | (self.filt & 0x0f)
    }

    /// Mode/volume register.
    pub const fn get_mode_vol(&self) -> u8 {
        let value = if self.voice3_off { 0x80 } else { 0 };
        value | (self.hp_bp_lp << 4) | (self.vol & 0x0f)
    }

    /// Write filter cutoff low register.
    pub fn set_fc_lo(&mut self, value: u8) {
        self.fc = self.fc & 0x7f8 | (value as u16) & 0x007;
        self.set_w0();
    }

    /// Write filter cutoff high register.
    pub fn set_fc_hi(&mut self, value: u8) {
        self.fc = ((value as u16) << 3) & 0x7f8 | self.fc & 0x007;
        self.set_w0();
    }

    /// Write resonance/routing register.
    pub fn set_res_filt(&mut self, value: u8) {
        self.res = (value >> 4) & 0x0f;
        self.filt = value & 0x0f;
        self.set_q();
    }

    /// Write mode/volume register.
    pub fn set_mode_vol(&mut self, value: u8) {
        self.voice3_off = value & 0x80 != 0;
        self.hp_bp_lp = (value >> 4) & 0x07;
        self.vol = value & 0x0f;
    }

    /// Clock the filter one cycle with 20-bit voice inputs.
    #[inline]
    pub fn clock(&mut self, mut voice1: i32, mut voice2: i32, mut voice3: i32, mut ext_in: i32) {
        // Scale each voice down from 20 to 13 bits.
        voice1 >>= 7;
        voice2 >>= 7;
        // NB! Voice 3 is not silenced by voice3off if it is routed through
        // the filter.
        voice3 = if self.voice3_off && self.filt & 0x04 == 0 {
            0
        } else {
            voice3 >> 7
        };
        ext_in >>= 7;

        // This is handy for testing.
        if !self.enabled {
            self.vnf = voice1 + voice2 + voice3 + ext_in;
            self.vhp = 0;
            self.vbp = 0;
            self.vlp = 0;
            return;
        }

        let (vi, vnf) = route_voices(self.filt, voice1, voice2, voice3, ext_in);
        self.vnf = vnf;
        let vi = self.clip_input(vi);

        // delta_t = 1 is converted to seconds given a 1MHz clock by dividing
        // with 1 000 000.

        // Calculate filter outputs.
        // Vhp = Vbp/Q - Vlp - Vi;
        // dVbp = -w0*Vhp*dt;
        // dVlp = -w0*Vbp*dt;
        let dvbp = ((self.w0_ceil_1 as i64 * self.vhp as i64) >> 20) as i32;
        let dvlp = ((self.w0_ceil_1 as i64 * self.vbp as i64) >> 20) as i32;
        self.vbp = self.vbp.saturating_sub(dvbp);
        self.vlp = self.vlp.saturating_sub(dvlp);
        self.update_vhp(vi);
    }

    /// Clock the filter `delta` cycles with constant voice inputs.
    #[inline]
    pub fn clock_delta(
        &mut self,
        mut delta: u32,
        mut voice1: i32,
        mut voice2: i32,
        mut voice3: i32,
        mut ext_in: i32,
    ) {
        // Scale each voice down from 20 to 13 bits.
        voice1 >>= 7;
        voice2 >>= 7;
        if self.voice3_off && self.filt & 0x04 == 0 {
            voice3 = 0;
        } else {
            voice3 >>= 7;
        }
        ext_in >>= 7;

        if !self.enabled {
            self.vnf = voice1 + voice2 + voice3 + ext_in;
            self.vhp = 0;
            self.vbp = 0;
            self.vlp = 0;
            return;
        }

        let (vi, vnf) = route_voices(self.filt, voice1, voice2, voice3, ext_in);
        self.vnf = vnf;
        let vi = self.clip_input(vi);

        // Maximum delta cycles for the filter to work satisfactorily under
        // current cutoff frequency and resonance constraints is
        // approximately 8.
        let mut delta_flt = 8;

        while delta != 0 {
            if delta < delta_flt {
                delta_flt = delta;
            }
            // delta_t is converted to seconds given a 1MHz clock by dividing
            // with 1 000 000. This is done in two operations to avoid
            // integer multiplication overflow.
            let w0_delta_t = (self.w0_ceil_dt * delta_flt as i32) >> 6;
            let dvbp = ((w0_delta_t as i64 * self.vhp as i64) >> 14) as i32;
            let dvlp = ((w0_delta_t as i64 * self.vbp as i64) >> 14) as i32;
            self.vbp = self.vbp.saturating_sub(dvbp);
            self.vlp = self.vlp.saturating_sub(dvlp);
            self.update_vhp(vi);

            delta -= delta_flt;
        }
    }

    /// Current filter output: mode mix plus bypass, scaled by volume.
    #[inline]
    pub fn output(&self) -> i32 {
        if !self.enabled {
            (self.vnf + self.mixer_dc) * self.vol as i32
        } else {
            let vf = mix_filter_output(self.vhp, self.vbp, self.vlp, self.hp_bp_lp);
            (self.vnf + vf + self.mixer_dc) * self.vol as i32
        }
    }

    /// Reset register-controlled state; the cutoff table is kept.
    pub fn reset(&mut self) {
        self.fc = 0;
        self.filt = 0;
        self.res = 0;
        self.voice3_off = false;
        self.hp_bp_lp = 0;
        self.vol = 0;
        self.vhp = 0;
        self.vbp = 0;
        self.vlp = 0;
        self.vnf = 0;
        self.set_w0();
        self.set_q();
    }

    #[inline]
    fn update_vhp(&mut self, vi: i32) {
        let vhp = ((self.vbp as i64 * self.q_1024_div as i64) >> 10)
            - self.vlp as i64
            - vi as i64;
        self.vhp = vhp.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    }

    /// 6581 summer saturation: beyond the knee, input gain drops to 1/2.
    #[inline]
    const fn clip_input(&self, vi: i32) -> i32 {
        if !self.distortion {
            return vi;
        }
        if vi > DISTORTION_KNEE_6581 {
            DISTORTION_KNEE_6581 + ((vi - DISTORTION_KNEE_6581) >> 1)
        } else if vi < -DISTORTION_KNEE_6581 {
            -DISTORTION_KNEE_6581 + ((vi + DISTORTION_KNEE_6581) >> 1)
        } else {
            vi
        }
    }

    fn set_f0(&mut self, f0_points: &[(i32, i32)]) {
        // The control points are few; interpolate them out to the full
        // 2048-entry FC table.
        let mut points = [Point { x: 0.0, y: 0.0 }; 31];
        for (point, &(x, y)) in points.iter_mut().zip(f0_points) {
            *point = Point {
                x: x as f64,
                y: y as f64,
            };
        }
        let mut plotter = PointPlotter::new(&mut self.f0);
        interpolate(&points[..f0_points.len()], &mut plotter, 1.0);
    }

    fn set_q(&mut self) {
        // Q is controlled linearly by res with an approximate range of
        // [0.707, 1.7]. As resonance is increased, the filter must be
        // clocked more often to keep stable.

        // The coefficient 1024 is dispensed of later by right-shifting 10
        // times (2 ^ 10 = 1024).
        self.q_1024_div = (1024.0 / (Q_MIN + 1.0 * self.res as f64 / 15.0)) as i32;
    }

    fn set_w0(&mut self) {
        // Multiply with FIXP_SCALE to facilitate division by 1_000_000 by
        // right-shifting 20 times (2 ^ 20 = 1048576).
        self.w0 = (2.0 * f64::consts::PI * self.f0[self.fc as usize] as f64 * FIXP_SCALE) as i32;

        // Limit f0 to keep the 1-cycle filter stable.
        let w0_max_1 = (2.0 * f64::consts::PI * F0_MAX_1CYCLE * FIXP_SCALE) as i32;
        self.w0_ceil_1 = self.w0.min(w0_max_1);

        // Limit f0 to keep the delta-cycle filter stable.
        let w0_max_dt = (2.0 * f64::consts::PI * F0_MAX_DELTA * FIXP_SCALE) as i32;
        self.w0_ceil_dt = self.w0.min(w0_max_dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The interpolated 6581 cutoff table reproduces the measured points,
    /// including the discontinuity at FC = 0x400.
    #[test]
    fn f0_6581_control_points() {
        let filter = Filter::new(ChipModel::Mos6581);
        assert_eq!(filter.f0[0], 220);
        assert_eq!(filter.f0[1023], 6000);
        assert_eq!(filter.f0[1024], 4600);
        assert_eq!(filter.f0[2047], 18000);
    }

    /// The 8580 table is monotonically non-decreasing (linear mapping).
    #[test]
    fn f0_8580_monotonic() {
        let filter = Filter::new(ChipModel::Mos8580);
        for i in 1..2048 {
            assert!(
                filter.f0[i] >= filter.f0[i - 1],
                "f0[{}]={} < f0[{}]={}",
                i,
                filter.f0[i],
                i - 1,
                filter.f0[i - 1]
            );
        }
    }

    /// Routing matrix sends each source either into the filter or around it,
    /// never both, never dropped.
    #[test]
    fn routing_is_a_partition() {
        let (v1, v2, v3, ext) = (1, 10, 100, 1000);
        for filt in 0x0..=0xf {
            let (vi, vnf) = route_voices(filt, v1, v2, v3, ext);
            assert_eq!(vi + vnf, v1 + v2 + v3 + ext, "filt={:#x}", filt);
        }
    }

    /// Disabled filter accumulates everything on the bypass path.
    #[test]
    fn disabled_bypasses() {
        let mut filter = Filter::new(ChipModel::Mos8580);
        filter.set_enabled(false);
        filter.set_mode_vol(0x0f);
        filter.clock(1 << 7, 2 << 7, 3 << 7, 0);
        assert_eq!(filter.vnf, 6);
        assert_eq!((filter.vhp, filter.vbp, filter.vlp), (0, 0, 0));
        assert_eq!(filter.output(), (6 + MIXER_DC) * 0x0f);
    }

    /// voice3off silences voice 3 only when it bypasses the filter.
    #[test]
    fn voice3_off() {
        let mut filter = Filter::new(ChipModel::Mos8580);
        filter.set_enabled(false);
        filter.set_mode_vol(0x8f);
        filter.clock(0, 0, 100 << 7, 0);
        assert_eq!(filter.vnf, 0);
    }

    /// The 6581 input clip is monotone and linear below the knee.
    #[test]
    fn input_clip_6581() {
        let filter = Filter::new(ChipModel::Mos6581);
        assert_eq!(filter.clip_input(1000), 1000);
        assert_eq!(filter.clip_input(-1000), -1000);
        let above = filter.clip_input(DISTORTION_KNEE_6581 + 1000);
        assert!(above > DISTORTION_KNEE_6581);
        assert!(above < DISTORTION_KNEE_6581 + 1000);
        assert_eq!(filter.clip_input(-(DISTORTION_KNEE_6581 + 1000)), -above);

        let linear = Filter::new(ChipModel::Mos8580);
        assert_eq!(linear.clip_input(1 << 20), 1 << 20);
    }
}
