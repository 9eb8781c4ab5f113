// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![allow(clippy::cast_lossless)]

use super::dac::Dac;
use super::envelope::EnvelopeGenerator;
use super::wave::{Syncable, WaveformGenerator};
use super::ChipModel;

/// The waveform output range is 0x000 to 0xfff, so the "zero"
/// level should ideally have been 0x800. In the measured chip, the
/// waveform output "zero" level was found to be 0x380 (i.e. $d41b
/// = 0x38) at 5.94V.
const WAVE_ZERO_6581: usize = 0x0380;
const WAVE_ZERO_8580: usize = 0x0800;

/// The envelope multiplying D/A converter introduces another DC
/// offset. This is isolated by the following measurements:
///
/// * The "zero" output level of the mixer at full volume is 5.44V.
/// * Routing one voice to the mixer at full volume yields
///   6.75V at maximum voice output (wave = 0xfff, sustain = 0xf)
///   5.94V at "zero" voice output  (wave = any,   sustain = 0x0)
///   5.70V at minimum voice output (wave = 0x000, sustain = 0xf)
/// * The DC offset of one voice is (5.94V - 5.44V) = 0.50V
/// * The dynamic range of one voice is |6.75V - 5.70V| = 1.05V
/// * The DC offset is thus 0.50V/1.05V ~ 1/2 of the dynamic range.
///
/// The scaling of the voice amplitude is not symmetric about y = 0;
/// this follows from the DC level in the waveform output.
const VOICE_DC: i32 = 0x800 * 0xff;

/// A single SID voice combining waveform and envelope generators.
///
/// The waveform and envelope counters drive 12-bit and 8-bit R-2R DACs
/// whose outputs are multiplied; the DAC tables carry the ladder
/// imperfections of the selected chip model.
#[derive(Clone)]
pub struct Voice {
    // Configuration
    wave_zero: i32,
    voice_dc: i32,
    muted: bool,
    // Generators
    pub(crate) envelope: EnvelopeGenerator,
    pub(crate) wave: WaveformGenerator,
    // DACs
    wave_dac: Dac,
    env_dac: Dac,
}

impl Voice {
    /// Create a voice for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        let wave_dac = Dac::for_chip_model(12, chip_model);
        let env_dac = Dac::for_chip_model(8, chip_model);
        let (wave_zero, voice_dc) = match chip_model {
            ChipModel::Mos6581 => (wave_dac.table[WAVE_ZERO_6581] as i32, VOICE_DC),
            // No DC offsets in the MOS8580.
            ChipModel::Mos8580 => (wave_dac.table[WAVE_ZERO_8580] as i32, 0),
        };
        Voice {
            wave_zero,
            voice_dc,
            muted: false,
            envelope: EnvelopeGenerator::default(),
            wave: WaveformGenerator::new(chip_model),
            wave_dac,
            env_dac,
        }
    }

    /// Update envelope and waveform control registers.
    pub fn set_control(&mut self, value: u8) {
        self.envelope.set_control(value);
        self.wave.set_control(value);
    }

    /// Silence this voice in the mix without stopping its generators.
    pub fn set_mute(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Rebuild the DACs with an experimental 2R/R ratio and termination,
    /// for tuning against individual chips.
    pub fn set_dac_tuning(&mut self, r2r_ratio: f64, terminated: bool) {
        self.wave_dac = Dac::new(12, r2r_ratio, terminated);
        self.env_dac = Dac::new(8, r2r_ratio, terminated);
        self.wave_zero = if terminated {
            self.wave_dac.table[WAVE_ZERO_8580] as i32
        } else {
            self.wave_dac.table[WAVE_ZERO_6581] as i32
        };
    }

    /// Amplitude modulated 20-bit waveform output.
    /// Range [-2048*255, 2047*255].
    #[inline]
    pub fn output(&self, sync_source: Option<&WaveformGenerator>) -> i32 {
        if self.muted {
            return 0;
        }
        // Both counters are looked up through their DACs before the
        // multiplying stage, emulating the ladder nonlinearity.
        let wav = self.wave_dac.table[self.wave.output(sync_source) as usize] as i32;
        let env = self.env_dac.table[self.envelope.output() as usize] as i32;
        (wav - self.wave_zero) * env + self.voice_dc
    }

    /// Reset waveform and envelope state.
    pub fn reset(&mut self) {
        self.envelope.reset();
        self.wave.reset();
    }
}

impl Syncable<&'_ Voice> {
    /// Output mixed waveform*envelope for the main voice with sync applied.
    pub fn output(&self) -> i32 {
        self.main.output(Some(&self.sync_source.wave))
    }
}

impl<'a> Syncable<&'a Voice> {
    /// Access waveform generators for sync relationships (immutable).
    pub fn wave(self) -> Syncable<&'a WaveformGenerator> {
        Syncable {
            main: &self.main.wave,
            sync_dest: &self.sync_dest.wave,
            sync_source: &self.sync_source.wave,
        }
    }
}

impl<'a> Syncable<&'a mut Voice> {
    /// Access waveform generators for sync relationships (mutable).
    pub fn wave(self) -> Syncable<&'a mut WaveformGenerator> {
        Syncable {
            main: &mut self.main.wave,
            sync_dest: &mut self.sync_dest.wave,
            sync_source: &mut self.sync_source.wave,
        }
    }
}
