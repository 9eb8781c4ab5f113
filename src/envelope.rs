// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![allow(clippy::cast_lossless)]

use bit_field::BitField;

const RATE_COUNTER_MASK: u16 = 0x7fff;
const RATE_COUNTER_MSB_MASK: u16 = 0x8000;

// Rate counter periods are calculated from the Envelope Rates table in
// the Programmer's Reference Guide. The rate counter period is the number
// of cycles between each increment of the envelope counter.
//
// The rate counter is a 15 bit register which is incremented each cycle.
// When the counter reaches the comparison value selected by the current
// ADSR phase, the envelope counter is incremented (attack) or decremented
// (decay/release) and the rate counter is zeroed.
//
// NB! Writing a comparison value lower than the current counter does not
// trigger a step; the counter keeps counting, wraps at 0x8000, and must
// count all the way up to the new value again. This is the infamous ADSR
// delay bug, and it is modeled exactly.
const RATE_COUNTER_PERIOD: [u16; 16] = [
    9,     // 2ms*1.0MHz/256 = 7.81
    32,    // 8ms*1.0MHz/256 = 31.25
    63,    // 16ms*1.0MHz/256 = 62.50
    95,    // 24ms*1.0MHz/256 = 93.75
    149,   // 38ms*1.0MHz/256 = 148.44
    220,   // 56ms*1.0MHz/256 = 218.75
    267,   // 68ms*1.0MHz/256 = 265.63
    313,   // 80ms*1.0MHz/256 = 312.50
    392,   // 100ms*1.0MHz/256 = 390.63
    977,   // 250ms*1.0MHz/256 = 976.56
    1954,  // 500ms*1.0MHz/256 = 1953.13
    3126,  // 800ms*1.0MHz/256 = 3125.00
    3906,  // 1 s*1.0MHz/256 =  3906.25
    11720, // 3 s*1.0MHz/256 = 11718.75
    19532, // 5 s*1.0MHz/256 = 19531.25
    31252, // 8 s*1.0MHz/256 = 31250.00
];

// For decay and release the clock to the envelope counter is sequentially
// divided to create a piecewise linear approximation of an exponential
// discharge. The divider period is a direct function of the current
// envelope counter value, with segment breakpoints at 0x5d, 0x36, 0x1a,
// 0x0e, 0x06 and 0x00.
#[rustfmt::skip]
const EXPONENTIAL_COUNTER_PERIOD: [u8; 256] = [
    /* 0x00: */  1, 30, 30, 30, 30, 30, 30, 16, 16, 16, 16, 16, 16, 16, 16,  8,
    /* 0x10: */  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  4,  4,  4,  4,  4,
    /* 0x20: */  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,  4,
    /* 0x30: */  4,  4,  4,  4,  4,  4,  4,  2,  2,  2,  2,  2,  2,  2,  2,  2,
    /* 0x40: */  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,
    /* 0x50: */  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  2,  1,  1,
    /* 0x60: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0x70: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0x80: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0x90: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0xa0: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0xb0: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0xc0: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0xd0: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0xe0: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
    /* 0xf0: */  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
];

/// Both the low and high 4 bits of the envelope counter are compared to the
/// 4-bit sustain value, as follows from the observable sustain levels.
const SUSTAIN_LEVEL: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

/// Envelope generator state machine.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Attack phase ramping up toward 0xff.
    Attack,
    /// Decay toward sustain, then hold.
    DecaySustain,
    /// Release toward zero after gate off.
    Release,
}

/// SID ADSR envelope generator.
///
/// A 15 bit rate counter divides the clock down to the 8 bit envelope
/// counter according to the selected attack, decay or release rate. A
/// second counter divides decay and release steps further by 1, 2, 4, 8,
/// 16 or 30 depending on the current envelope level, producing the chip's
/// piecewise exponential discharge curve.
#[derive(Clone, Copy)]
pub struct EnvelopeGenerator {
    // Configuration
    attack: u8,
    decay: u8,
    sustain: u8,
    release: u8,
    // Control
    gate: bool,
    // Runtime State
    /// Current ADSR phase.
    pub state: State,
    /// Current envelope output level (0-255).
    pub envelope_counter: u8,
    /// Exponential divider counter.
    pub exponential_counter: u8,
    /// Frozen at zero until the gate cycles off and on again.
    pub hold_zero: bool,
    /// Linear rate counter.
    pub rate_counter: u16,
    /// Linear rate counter period.
    pub rate_counter_period: u16,
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        let mut envelope = Self {
            attack: 0,
            decay: 0,
            sustain: 0,
            release: 0,
            gate: false,
            state: State::Release,
            envelope_counter: 0,
            exponential_counter: 0,
            hold_zero: false,
            rate_counter: 0,
            rate_counter_period: 0,
        };
        envelope.reset();
        envelope
    }
}

impl EnvelopeGenerator {
    /// Packed attack/decay nibble register.
    pub const fn get_attack_decay(&self) -> u8 {
        self.attack << 4 | self.decay
    }

    /// Control register exposing the gate bit.
    pub fn get_control(&self) -> u8 {
        let mut value = 0u8;
        value.set_bit(0, self.gate);
        value
    }

    /// Packed sustain/release nibble register.
    pub const fn get_sustain_release(&self) -> u8 {
        self.sustain << 4 | self.release
    }

    /// Write attack/decay register.
    pub const fn set_attack_decay(&mut self, value: u8) {
        self.attack = (value >> 4) & 0x0f;
        self.decay = value & 0x0f;
        match self.state {
            State::Attack => self.rate_counter_period = RATE_COUNTER_PERIOD[self.attack as usize],
            State::DecaySustain => {
                self.rate_counter_period = RATE_COUNTER_PERIOD[self.decay as usize]
            }
            _ => {}
        }
    }

    /// Write control register (gate).
    ///
    /// Gate edges zero the exponential counter but never the rate counter;
    /// the latter is what surfaces the ADSR delay bug.
    pub fn set_control(&mut self, value: u8) {
        let gate = value.get_bit(0);
        if !self.gate && gate {
            // Gate bit on: Start attack, decay, sustain.
            self.state = State::Attack;
            self.rate_counter_period = RATE_COUNTER_PERIOD[self.attack as usize];
            self.exponential_counter = 0;
            // Switching to attack state unlocks the zero freeze.
            self.hold_zero = false;
        } else if self.gate && !gate {
            // Gate bit off: Start release.
            self.state = State::Release;
            self.rate_counter_period = RATE_COUNTER_PERIOD[self.release as usize];
            self.exponential_counter = 0;
        }
        self.gate = gate;
    }

    /// Write sustain/release register.
    ///
    /// A sustain level written above the current envelope counter is never
    /// chased upward; decay only ever moves the counter down.
    pub const fn set_sustain_release(&mut self, value: u8) {
        self.sustain = (value >> 4) & 0x0f;
        self.release = value & 0x0f;
        if matches!(self.state, State::Release) {
            self.rate_counter_period = RATE_COUNTER_PERIOD[self.release as usize];
        }
    }

    /// Step the envelope counter according to the current ADSR phase.
    #[inline]
    const fn step_envelope(&mut self) {
        match self.state {
            State::Attack => {
                // The counter can flip 0xff to 0x00 by a release to attack
                // transition, landing in the zero freeze below.
                self.envelope_counter = self.envelope_counter.wrapping_add(1);
                if self.envelope_counter == 0xff {
                    self.state = State::DecaySustain;
                    self.rate_counter_period = RATE_COUNTER_PERIOD[self.decay as usize];
                }
            }
            State::DecaySustain => {
                if self.envelope_counter != SUSTAIN_LEVEL[self.sustain as usize] {
                    self.envelope_counter = self.envelope_counter.wrapping_sub(1);
                }
            }
            State::Release => {
                // The counter can flip 0x00 to 0xff by an attack to release
                // transition and keeps counting down from there.
                self.envelope_counter = self.envelope_counter.wrapping_sub(1);
            }
        }
        if self.envelope_counter == 0 {
            self.hold_zero = true;
        }
    }

    /// Clock the envelope generator by one SID cycle.
    #[inline]
    pub fn clock(&mut self) {
        self.rate_counter += 1;
        if self.rate_counter & RATE_COUNTER_MSB_MASK != 0 {
            // 15 bit counter; bit 15 wraps straight into bit 0.
            self.rate_counter += 1;
            self.rate_counter &= RATE_COUNTER_MASK;
        }
        if self.rate_counter != self.rate_counter_period {
            return;
        }
        self.rate_counter = 0;

        // The exponential divider is bypassed during attack.
        self.exponential_counter += 1;
        if self.state != State::Attack
            && self.exponential_counter
                != EXPONENTIAL_COUNTER_PERIOD[self.envelope_counter as usize]
        {
            return;
        }
        self.exponential_counter = 0;

        if self.hold_zero {
            return;
        }
        self.step_envelope();
    }

    /// Clock the envelope by multiple cycles, stepping from one rate counter
    /// match to the next instead of cycle by cycle.
    #[inline]
    pub fn clock_delta(&mut self, mut delta: u32) {
        // Cycles until the next rate counter match; a period at or below the
        // current counter forces a full wrap at 2^15 first.
        let mut rate_step = self.rate_counter_period as i32 - self.rate_counter as i32;
        if rate_step <= 0 {
            rate_step += 0x7fff;
        }

        while delta != 0 {
            if delta < rate_step as u32 {
                self.rate_counter += delta as u16;
                if self.rate_counter & RATE_COUNTER_MSB_MASK != 0 {
                    self.rate_counter += 1;
                    self.rate_counter &= RATE_COUNTER_MASK;
                }
                return;
            }

            self.rate_counter = 0;
            delta -= rate_step as u32;

            self.exponential_counter += 1;
            if self.state == State::Attack
                || self.exponential_counter
                    == EXPONENTIAL_COUNTER_PERIOD[self.envelope_counter as usize]
            {
                self.exponential_counter = 0;
                if !self.hold_zero {
                    self.step_envelope();
                }
            }
            rate_step = self.rate_counter_period as i32;
        }
    }

    /// Current envelope output level (0-255).
    #[inline]
    pub const fn output(&self) -> u8 {
        self.envelope_counter
    }

    /// Alias for `output`, used by ENV3 register reads.
    pub const fn read_env(&self) -> u8 {
        self.envelope_counter
    }

    /// Reset to power-on state (release, counters zeroed, frozen at zero).
    pub const fn reset(&mut self) {
        self.attack = 0;
        self.decay = 0;
        self.sustain = 0;
        self.release = 0;
        self.gate = false;
        self.state = State::Release;
        self.envelope_counter = 0;
        self.exponential_counter = 0;
        self.hold_zero = true;
        self.rate_counter = 0;
        self.rate_counter_period = RATE_COUNTER_PERIOD[self.release as usize];
    }
}
