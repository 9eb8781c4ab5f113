// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![allow(clippy::cast_lossless)]

use super::external_filter::ExternalFilter;
use super::filter::Filter;
use super::sid::reg;
use super::voice::Voice;
use super::wave::Syncable;
use super::ChipModel;

const OUTPUT_RANGE: u32 = 1 << 16;
const OUTPUT_HALF: i32 = (OUTPUT_RANGE >> 1) as i32;

/// Divisor scaling the full mixer range
/// `(waveform * envelope >> 7) * voices * volume * 2` down to 16 bits.
pub(crate) const OUTPUT_DIVISOR: i32 = ((4095 * 255) >> 7) * 3 * 15 * 2 / OUTPUT_RANGE as i32;

/// The three voices, filter and output stage of the chip.
///
/// Voices are held in a fixed array; their ring coupling (1→2→3→1) is
/// expressed through [`Syncable`] borrow bundles handed out per voice, so
/// no voice ever owns a reference to another.
#[derive(Clone)]
pub struct Synth {
    /// External C64 output filter stage.
    pub ext_filter: ExternalFilter,
    /// On-chip multimode filter.
    pub filter: Filter,
    /// The three voices.
    pub voices: [Voice; 3],
    /// External audio input, at the 20-bit voice scale.
    pub ext_in: i32,
    /// Paddle X line, read back through POTX.
    pub pot_x: u8,
    /// Paddle Y line, read back through POTY.
    pub pot_y: u8,
}

// slice::rotate_left is inefficient for small arrays:
// https://github.com/rust-lang/rust/issues/89714
fn rotate3<T>([a, b, c]: [T; 3], i: usize) -> [T; 3] {
    match i {
        0 => [a, b, c],
        1 => [b, c, a],
        2 => [c, a, b],
        _ => panic!("index out of bounds"),
    }
}

impl Synth {
    /// Create a synthesizer for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        Synth {
            ext_filter: ExternalFilter::new(chip_model),
            filter: Filter::new(chip_model),
            voices: [
                Voice::new(chip_model),
                Voice::new(chip_model),
                Voice::new(chip_model),
            ],
            ext_in: 0,
            pot_x: 0xff,
            pot_y: 0xff,
        }
    }

    /// Voice `i` bundled with its sync destination and sync source.
    pub fn syncable_voice(&self, i: usize) -> Syncable<&'_ Voice> {
        let [a, b, c] = &self.voices;
        let [main, sync_dest, sync_source] = rotate3([a, b, c], i);
        Syncable {
            main,
            sync_dest,
            sync_source,
        }
    }

    /// Mutable variant of [`Self::syncable_voice`].
    pub fn syncable_voice_mut(&mut self, i: usize) -> Syncable<&'_ mut Voice> {
        let [a, b, c] = &mut self.voices;
        let [main, sync_dest, sync_source] = rotate3([a, b, c], i);
        Syncable {
            main,
            sync_dest,
            sync_source,
        }
    }

    /// Advance the chip by one cycle.
    pub fn clock(&mut self) {
        // Clock amplitude modulators.
        for voice in self.voices.iter_mut() {
            voice.envelope.clock();
        }
        // Clock oscillators.
        for voice in self.voices.iter_mut() {
            voice.wave.clock();
        }
        // Synchronize oscillators.
        for i in 0..3 {
            self.syncable_voice_mut(i).wave().synchronize();
        }
        // Clock filter.
        self.filter.clock(
            self.syncable_voice(0).output(),
            self.syncable_voice(1).output(),
            self.syncable_voice(2).output(),
            self.ext_in,
        );
        // Clock external filter with the 16-bit scaled mixer output.
        self.ext_filter.clock(self.filter.output() / OUTPUT_DIVISOR);
    }

    /// Advance the chip by `delta` cycles.
    pub fn clock_delta(&mut self, delta: u32) {
        if delta == 0 {
            return;
        }
        // Clock amplitude modulators.
        for voice in self.voices.iter_mut() {
            voice.envelope.clock_delta(delta);
        }
        // Clock and synchronize oscillators in sub-steps bounded by the
        // next accumulator MSB toggle of any sync-relevant voice. The
        // oscillators must be clocked exactly on the cycle an MSB is set
        // high for hard sync and ring modulation to operate correctly.
        let mut delta_osc = delta;
        while delta_osc != 0 {
            let mut delta_min = delta_osc;
            for i in 0..3 {
                let wave = self.syncable_voice(i).wave();
                // Clocking on the MSB is only necessary for an oscillator
                // with freq != 0 whose downstream neighbour uses hard sync
                // or ring modulation.
                if !((wave.sync_dest.get_sync() || wave.sync_dest.get_ring_mod())
                    && wave.main.get_frequency() != 0)
                {
                    continue;
                }
                let freq = wave.main.get_frequency() as u32;
                let acc = wave.main.get_acc();
                // Clock on MSB off if MSB is on, clock on MSB on if MSB is
                // off.
                let delta_acc = if acc & 0x0080_0000 != 0 {
                    0x0100_0000 - acc
                } else {
                    0x0080_0000 - acc
                };
                let mut delta_next = delta_acc / freq;
                if delta_acc % freq != 0 {
                    delta_next += 1;
                }
                if delta_next < delta_min {
                    delta_min = delta_next;
                }
            }
            for voice in self.voices.iter_mut() {
                voice.wave.clock_delta(delta_min);
            }
            for i in 0..3 {
                self.syncable_voice_mut(i).wave().synchronize();
            }
            delta_osc -= delta_min;
        }
        // Clock filter.
        self.filter.clock_delta(
            delta,
            self.syncable_voice(0).output(),
            self.syncable_voice(1).output(),
            self.syncable_voice(2).output(),
            self.ext_in,
        );
        // Clock external filter with the 16-bit scaled mixer output.
        self.ext_filter
            .clock_delta(delta, self.filter.output() / OUTPUT_DIVISOR);
    }

    /// Current audio output sample, clamped to 16 bits.
    pub fn output(&self) -> i16 {
        let sample = self.ext_filter.output();
        if sample >= OUTPUT_HALF {
            (OUTPUT_HALF - 1) as i16
        } else if sample < -OUTPUT_HALF {
            (-OUTPUT_HALF) as i16
        } else {
            sample as i16
        }
    }

    /// Reset all chip state; paddle lines are external and keep their
    /// values.
    pub fn reset(&mut self) {
        self.ext_filter.reset();
        self.filter.reset();
        for voice in self.voices.iter_mut() {
            voice.reset();
        }
        self.ext_in = 0;
    }

    /// Read a register, with `bus_value` standing in for the write-only
    /// addresses.
    pub fn read(&self, reg: u8, bus_value: u8) -> u8 {
        match reg {
            reg::POTX => self.pot_x,
            reg::POTY => self.pot_y,
            reg::OSC3 => self.syncable_voice(2).wave().read_osc(),
            reg::ENV3 => self.voices[2].envelope.read_env(),
            _ => bus_value,
        }
    }

    /// Dispatch a register write to the owning component.
    pub fn write(&mut self, reg: u8, value: u8) {
        match reg {
            reg::FREQLO1 => self.voices[0].wave.set_frequency_lo(value),
            reg::FREQHI1 => self.voices[0].wave.set_frequency_hi(value),
            reg::PWLO1 => self.voices[0].wave.set_pulse_width_lo(value),
            reg::PWHI1 => self.voices[0].wave.set_pulse_width_hi(value),
            reg::CR1 => self.voices[0].set_control(value),
            reg::AD1 => self.voices[0].envelope.set_attack_decay(value),
            reg::SR1 => self.voices[0].envelope.set_sustain_release(value),
            reg::FREQLO2 => self.voices[1].wave.set_frequency_lo(value),
            reg::FREQHI2 => self.voices[1].wave.set_frequency_hi(value),
            reg::PWLO2 => self.voices[1].wave.set_pulse_width_lo(value),
            reg::PWHI2 => self.voices[1].wave.set_pulse_width_hi(value),
            reg::CR2 => self.voices[1].set_control(value),
            reg::AD2 => self.voices[1].envelope.set_attack_decay(value),
            reg::SR2 => self.voices[1].envelope.set_sustain_release(value),
            reg::FREQLO3 => self.voices[2].wave.set_frequency_lo(value),
            reg::FREQHI3 => self.voices[2].wave.set_frequency_hi(value),
            reg::PWLO3 => self.voices[2].wave.set_pulse_width_lo(value),
            reg::PWHI3 => self.voices[2].wave.set_pulse_width_hi(value),
            reg::CR3 => self.voices[2].set_control(value),
            reg::AD3 => self.voices[2].envelope.set_attack_decay(value),
            reg::SR3 => self.voices[2].envelope.set_sustain_release(value),
            reg::FCLO => self.filter.set_fc_lo(value),
            reg::FCHI => self.filter.set_fc_hi(value),
            reg::RESFILT => self.filter.set_res_filt(value),
            reg::MODVOL => self.filter.set_mode_vol(value),
            _ => {}
        }
    }
}
