// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![allow(clippy::cast_lossless)]

use bit_field::BitField;

use super::data::{self, WaveTables};
use super::ChipModel;

const ACC_MASK: u32 = 0x00ff_ffff;
const ACC_BIT19_MASK: u32 = 0x0008_0000;
const ACC_MSB_MASK: u32 = 0x0080_0000;
const SHIFT_MASK: u32 = 0x007f_ffff;
const OUTPUT_MASK: u16 = 0x0fff;

/// A waveform generator and its two ring neighbours.
///
/// The three oscillators form a ring (1→2→3→1) for hard sync and ring
/// modulation. Rather than storing pointers between voices, the owning
/// synthesizer hands out this borrow bundle, so the coupling never forms an
/// ownership cycle.
pub struct Syncable<T> {
    /// The primary object.
    pub main: T,
    /// Neighbour this oscillator syncs.
    pub sync_dest: T,
    /// Neighbour this oscillator is synced by.
    pub sync_source: T,
}

/// SID waveform generator.
///
/// A 24 bit accumulator is the basis for waveform generation. FREQ is added
/// to the accumulator each cycle. The accumulator is held at zero while TEST
/// is set. The noise waveform is taken from intermediate bits of a 23 bit
/// shift register clocked by rising edges of accumulator bit 19.
#[derive(Clone)]
pub struct WaveformGenerator {
    // Configuration
    frequency: u16,
    pulse_width: u16,
    // Control
    waveform: u8,
    ring: bool,
    sync: bool,
    test: bool,
    // Runtime State
    /// 24-bit phase accumulator.
    pub acc: u32,
    /// 23-bit noise shift register, taps at bits 22 and 17.
    pub shift: u32,
    msb_rising: bool,
    // Combined waveform sample tables for this chip model.
    tables: WaveTables,
}

impl WaveformGenerator {
    /// Create a waveform generator for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        let mut wave = WaveformGenerator {
            frequency: 0,
            pulse_width: 0,
            waveform: 0,
            ring: false,
            sync: false,
            test: false,
            acc: 0,
            shift: 0,
            msb_rising: false,
            tables: data::build_wave_tables(chip_model),
        };
        wave.reset();
        wave
    }

    /// Current accumulator value.
    pub const fn get_acc(&self) -> u32 {
        self.acc
    }

    /// Current noise shift register value.
    pub const fn get_shift(&self) -> u32 {
        self.shift
    }

    /// Current frequency word.
    pub const fn get_frequency(&self) -> u16 {
        self.frequency
    }

    /// Frequency register low byte.
    pub const fn get_frequency_lo(&self) -> u8 {
        (self.frequency & 0x00ff) as u8
    }

    /// Frequency register high byte.
    pub const fn get_frequency_hi(&self) -> u8 {
        (self.frequency >> 8) as u8
    }

    /// Pulse width register low byte.
    pub const fn get_pulse_width_lo(&self) -> u8 {
        (self.pulse_width & 0x00ff) as u8
    }

    /// Pulse width register high byte.
    pub const fn get_pulse_width_hi(&self) -> u8 {
        (self.pulse_width >> 8) as u8
    }

    /// Control register bits owned by the waveform generator; the gate bit
    /// belongs to the envelope generator.
    pub fn get_control(&self) -> u8 {
        let mut value = self.waveform << 4;
        value.set_bit(3, self.test);
        value.set_bit(2, self.ring);
        value.set_bit(1, self.sync);
        value
    }

    /// Hard sync enable.
    pub const fn get_sync(&self) -> bool {
        self.sync
    }

    /// Ring modulation enable.
    pub const fn get_ring_mod(&self) -> bool {
        self.ring
    }

    /// Whether the accumulator MSB went 0→1 on the last clocking.
    pub const fn is_msb_rising(&self) -> bool {
        self.msb_rising
    }

    /// Force the accumulator (used by hard sync and state restore).
    pub const fn set_acc(&mut self, value: u32) {
        self.acc = value;
    }

    /// Write frequency register low byte.
    pub const fn set_frequency_lo(&mut self, value: u8) {
        self.frequency = self.frequency & 0xff00 | value as u16;
    }

    /// Write frequency register high byte.
    pub const fn set_frequency_hi(&mut self, value: u8) {
        self.frequency = (value as u16) << 8 | self.frequency & 0x00ff;
    }

    /// Write pulse width register low byte.
    pub const fn set_pulse_width_lo(&mut self, value: u8) {
        self.pulse_width = self.pulse_width & 0x0f00 | value as u16;
    }

    /// Write pulse width register high byte (only 4 bits are used).
    pub const fn set_pulse_width_hi(&mut self, value: u8) {
        self.pulse_width = ((value as u16) << 8) & 0x0f00 | self.pulse_width & 0x00ff;
    }

    /// Write control register (waveform select, test, ring mod, sync).
    pub fn set_control(&mut self, value: u8) {
        self.waveform = (value >> 4) & 0x0f;
        self.ring = value.get_bit(2);
        self.sync = value.get_bit(1);
        let test = value.get_bit(3);
        if test {
            // Test bit set: the accumulator is cleared and the shift
            // register is driven to its reset value. On real hardware the
            // shift register bits instead fade toward zero over roughly
            // $2000 - $4000 cycles; the fade is not modeled.
            self.acc = 0;
            self.shift = 0x007f_fff8;
        } else if self.test {
            // Test bit cleared: the accumulator starts counting from zero.
            self.shift = 0x007f_fff8;
        }
        self.test = test;
    }

    /// Advance the oscillator one cycle.
    #[inline]
    pub fn clock(&mut self) {
        // No operation while the test bit is set.
        if self.test {
            return;
        }
        let acc_prev = self.acc;
        self.acc = (self.acc + self.frequency as u32) & ACC_MASK;
        // MSB rising edge drives hard sync of the downstream neighbour.
        self.msb_rising = acc_prev & ACC_MSB_MASK == 0 && self.acc & ACC_MSB_MASK != 0;
        // Rising edge of bit 19 clocks the noise shift register.
        if acc_prev & ACC_BIT19_MASK == 0 && self.acc & ACC_BIT19_MASK != 0 {
            self.clock_shift_register();
        }
    }

    /// Advance the oscillator `delta` cycles.
    #[inline]
    pub fn clock_delta(&mut self, delta: u32) {
        if self.test {
            return;
        }

        let delta_acc = delta as u64 * self.frequency as u64;
        let acc_next = self.acc as u64 + delta_acc;

        // Bit 19 goes high once per 2^20 added to the accumulator; one more
        // edge occurs if bit 19 flips 0→1 within the remainder interval.
        let shift_period = 1u64 << 20;
        let mut shifts = delta_acc / shift_period;
        let acc_rem = self.acc as u64 + shift_period * shifts;
        if acc_rem & ACC_BIT19_MASK as u64 == 0 && acc_next & ACC_BIT19_MASK as u64 != 0 {
            shifts += 1;
        }
        for _ in 0..shifts {
            self.clock_shift_register();
        }

        let acc_new = (acc_next & ACC_MASK as u64) as u32;
        self.msb_rising = self.acc & ACC_MSB_MASK == 0 && acc_new & ACC_MSB_MASK != 0;
        self.acc = acc_new;
    }

    #[inline]
    fn clock_shift_register(&mut self) {
        // NB! The shift is actually delayed 2 cycles; this is not modeled.
        let bit0 = (self.shift >> 22 ^ self.shift >> 17) & 0x01;
        self.shift = (self.shift << 1) & SHIFT_MASK | bit0;
    }

    /// 12-bit waveform output for the selected waveform combination.
    #[inline]
    pub fn output(&self, sync_source: Option<&WaveformGenerator>) -> u16 {
        match self.waveform {
            0x0 => 0,
            0x1 => self.output_t(sync_source),
            0x2 => self.output_s(),
            0x3 => self.output_st(),
            0x4 => self.output_p(),
            0x5 => self.output_pt(),
            0x6 => self.output_ps(),
            0x7 => self.output_pst(),
            0x8 => self.output_n(),
            // All waveform combinations including noise output zero after a
            // few cycles; the shift register lockup behind this is not
            // modeled.
            _ => 0,
        }
    }

    /// OSC3 register view: upper 8 bits of the waveform output.
    pub fn read_osc(&self, sync_source: Option<&WaveformGenerator>) -> u8 {
        (self.output(sync_source) >> 4) as u8
    }

    /// Reset to power-on state.
    pub const fn reset(&mut self) {
        self.frequency = 0;
        self.pulse_width = 0;
        self.waveform = 0;
        self.ring = false;
        self.sync = false;
        self.test = false;
        self.acc = 0;
        self.shift = 0x007f_fff8;
        self.msb_rising = false;
    }

    // -- Output Functions

    // Triangle:
    // The upper 12 bits of the accumulator are used. The MSB creates the
    // falling edge of the triangle by inverting the lower 11 bits, then the
    // MSB is thrown away and the remainder left-shifted (half resolution,
    // full amplitude). Ring modulation substitutes the MSB with
    // MSB EOR sync_source MSB.
    #[inline]
    fn output_t(&self, sync_source: Option<&WaveformGenerator>) -> u16 {
        let acc = if self.ring {
            self.acc ^ sync_source.map_or(0, |source| source.acc)
        } else {
            self.acc
        };
        let output = if acc & ACC_MSB_MASK != 0 {
            !self.acc
        } else {
            self.acc
        };
        (output >> 11) as u16 & OUTPUT_MASK
    }

    // Sawtooth:
    // The output is identical to the upper 12 bits of the accumulator.
    #[inline]
    fn output_s(&self) -> u16 {
        (self.acc >> 12) as u16
    }

    // Pulse:
    // The upper 12 bits of the accumulator are compared to the pulse width
    // register; output is all ones or all zeros. The test bit holds the
    // pulse output at 0xfff regardless of the pulse width.
    #[inline]
    fn output_p(&self) -> u16 {
        if self.test || (self.acc >> 12) as u16 >= self.pulse_width {
            0x0fff
        } else {
            0x0000
        }
    }

    // Noise:
    // The noise output is taken from intermediate bits of the shift
    // register:
    //
    //                        ----------------------->---------------------
    //                        |                                            |
    //                   ----EOR----                                       |
    //                   |         |                                       |
    //                   2 2 2 1 1 1 1 1 1 1 1 1 1                         |
    // Register bits:    2 1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0 <---
    //                   |   |       |     |   |       |     |   |
    // OSC3 bits  :      7   6       5     4   3       2     1   0
    //
    // Since waveform output is 12 bits the output is left-shifted 4 times.
    #[inline]
    fn output_n(&self) -> u16 {
        ((self.shift & 0x0040_0000) >> 11
            | (self.shift & 0x0010_0000) >> 10
            | (self.shift & 0x0001_0000) >> 7
            | (self.shift & 0x0000_2000) >> 5
            | (self.shift & 0x0000_0800) >> 4
            | (self.shift & 0x0000_0080) >> 1
            | (self.shift & 0x0000_0010) << 1
            | (self.shift & 0x0000_0004) << 2) as u16
    }

    // Combined waveforms:
    // Selected waveforms short circuit each other through the register
    // holding the upper accumulator bits, pulling output bits toward zero
    // in a way that is not a pure AND. The output is approximated by 8-bit
    // sample tables; pulse combinations are additionally ANDed with the
    // pulse comparator output. The accumulator MSB has no effect on
    // combined waveforms including triangle, so the tables can be indexed
    // without considering ring modulation.

    #[inline]
    fn output_st(&self) -> u16 {
        (self.tables.st[(self.acc >> 11) as usize & 0xfff] as u16) << 4
    }

    #[inline]
    fn output_pt(&self) -> u16 {
        ((self.tables.pt[(self.acc >> 11) as usize & 0xfff] as u16) << 4) & self.output_p()
    }

    #[inline]
    fn output_ps(&self) -> u16 {
        ((self.tables.ps[(self.acc >> 12) as usize] as u16) << 4) & self.output_p()
    }

    #[inline]
    fn output_pst(&self) -> u16 {
        ((self.tables.pst[(self.acc >> 11) as usize & 0xfff] as u16) << 4) & self.output_p()
    }
}

impl Syncable<&'_ WaveformGenerator> {
    /// Waveform output with the ring modulation source applied.
    pub fn output(&self) -> u16 {
        self.main.output(Some(self.sync_source))
    }

    /// OSC3 view with the ring modulation source applied.
    pub fn read_osc(&self) -> u8 {
        self.main.read_osc(Some(self.sync_source))
    }
}

impl Syncable<&'_ mut WaveformGenerator> {
    /// Enforce hard sync after all oscillators have been clocked.
    ///
    /// This must be done separately from clocking since the oscillators
    /// operate in parallel, and must happen on the exact cycle the source
    /// MSB rises. A sync source that is itself synced on the same cycle
    /// does not sync its destination; this has been verified by sampling
    /// OSC3.
    pub fn synchronize(&mut self) {
        if self.main.sync
            && self.sync_source.msb_rising
            && !(self.sync_source.sync && self.sync_dest.msb_rising)
        {
            self.main.acc = 0;
        }
    }
}
