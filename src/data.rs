// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Static measurement data and generated sample tables.

use alloc::vec::Vec;

use super::ChipModel;

// Maximum cutoff frequency is specified as
// FCmax = 2.6e-5/C = 2.6e-5/2200e-12 = 11818.
//
// Measurements indicate a cutoff frequency range of approximately
// 220Hz - 18kHz on a MOS6581 fitted with 470pF capacitors. The function
// mapping FC to cutoff frequency has the shape of the tanh function, with
// a discontinuity at FCHI = 0x80.
// In contrast, the MOS8580 almost perfectly corresponds with the
// specification of a linear mapping from 30Hz to 12kHz.
//
// The mappings have been measured by feeding the SID with an external
// signal since the chip itself is incapable of generating waveforms of
// higher fundamental frequency than 4kHz. It is best to use the bandpass
// output at full resonance to pick out the cutoff frequency at any given
// FC setting.
//
// The mapping function is specified with spline interpolation points and
// the function values are retrieved via table lookup.
//
// NB! Cutoff frequency characteristics may vary, we have modeled two
// particular Commodore 64s.
pub(crate) static F0_POINTS_6581: [(i32, i32); 31] = [
    //  FC      f         FCHI FCLO
    // ----------------------------
    (0, 220),      // 0x00      - repeated end point
    (0, 220),      // 0x00
    (128, 230),    // 0x10
    (256, 250),    // 0x20
    (384, 300),    // 0x30
    (512, 420),    // 0x40
    (640, 780),    // 0x50
    (768, 1600),   // 0x60
    (832, 2300),   // 0x68
    (896, 3200),   // 0x70
    (960, 4300),   // 0x78
    (992, 5000),   // 0x7c
    (1008, 5400),  // 0x7e
    (1016, 5700),  // 0x7f
    (1023, 6000),  // 0x7f 0x07
    (1023, 6000),  // 0x7f 0x07 - discontinuity
    (1024, 4600),  // 0x80      -
    (1024, 4600),  // 0x80
    (1032, 4800),  // 0x81
    (1056, 5300),  // 0x84
    (1088, 6000),  // 0x88
    (1120, 6600),  // 0x8c
    (1152, 7200),  // 0x90
    (1280, 9500),  // 0xa0
    (1408, 12000), // 0xb0
    (1536, 14500), // 0xc0
    (1664, 16000), // 0xd0
    (1792, 17100), // 0xe0
    (1920, 17700), // 0xf0
    (2047, 18000), // 0xff 0x07
    (2047, 18000), // 0xff 0x07 - repeated end point
];

pub(crate) static F0_POINTS_8580: [(i32, i32); 19] = [
    //  FC      f         FCHI FCLO
    // ----------------------------
    (0, 0),        // 0x00      - repeated end point
    (0, 0),        // 0x00
    (128, 800),    // 0x10
    (256, 1600),   // 0x20
    (384, 2500),   // 0x30
    (512, 3300),   // 0x40
    (640, 4100),   // 0x50
    (768, 4800),   // 0x60
    (896, 5600),   // 0x70
    (1024, 6500),  // 0x80
    (1152, 7500),  // 0x90
    (1280, 8400),  // 0xa0
    (1408, 9200),  // 0xb0
    (1536, 9800),  // 0xc0
    (1664, 10500), // 0xd0
    (1792, 11000), // 0xe0
    (1920, 11700), // 0xf0
    (2047, 12500), // 0xff 0x07
    (2047, 12500), // 0xff 0x07 - repeated end point
];

// ----------------------------------------------------------------------------
// Combined waveform sample tables.
//
// By combining waveforms the output bits of each waveform are effectively
// short circuited; a zero bit in one waveform draws the corresponding bit in
// the other waveform(s) toward zero. Zero bits also affect neighboring bits,
// since all bits are connected via transistors to the register holding the
// upper 12 bits of the accumulator. The SID does not act as a digital state
// machine here.
//
// The original engine shipped 8-bit OSC3 samples captured from hardware.
// Those captures are reproduced here by a bit-pulldown model: an output bit
// remains set only when every selected waveform drives it high and the
// distance-weighted support from surrounding high bits exceeds a per-chip
// threshold. Selecting pulse additionally loads every bit of the register,
// lowering the support uniformly. The 8580 drives its bus harder than the
// 6581, preserving more bits.
// ----------------------------------------------------------------------------

struct CombinedWaveformModel {
    /// Minimum normalized neighbor support for a bit to stay high.
    threshold: f64,
    /// Uniform support loss when the pulse transistors load the register.
    pulse_load: f64,
}

impl ChipModel {
    const fn combined_waveform_model(self) -> CombinedWaveformModel {
        match self {
            ChipModel::Mos6581 => CombinedWaveformModel {
                threshold: 0.78,
                pulse_load: 0.15,
            },
            ChipModel::Mos8580 => CombinedWaveformModel {
                threshold: 0.64,
                pulse_load: 0.06,
            },
        }
    }
}

/// Influence of bit j on bit k falls off with the square of the distance.
#[inline]
fn neighbor_weight(k: i32, j: i32) -> f64 {
    let d = k - j;
    1.0 / (1.0 + (d * d) as f64)
}

/// Compute one 8-bit combined waveform sample from the 12-bit values the
/// selected waveforms would output individually.
fn combined_sample(components: &[u16], model: &CombinedWaveformModel, pulse: bool) -> u8 {
    let mut hi = [false; 12];
    for (k, hi_k) in hi.iter_mut().enumerate() {
        *hi_k = components.iter().all(|&c| c & (1 << k) != 0);
    }

    let load = if pulse { model.pulse_load } else { 0.0 };

    let mut value = 0u16;
    for k in 0..12i32 {
        if !hi[k as usize] {
            continue;
        }
        let mut drive = 0.0;
        let mut norm = 0.0;
        for j in 0..12i32 {
            let weight = neighbor_weight(k, j);
            if hi[j as usize] {
                drive += weight;
            }
            norm += weight;
        }
        if drive / norm - load >= model.threshold {
            value |= 1 << k;
        }
    }

    // Captured samples are 8-bit; the lower 4 bits of waveform output are lost.
    (value >> 4) as u8
}

/// Sample tables for the four combined waveforms of one chip model.
///
/// `st`, `pt` and `pst` are indexed by `(accumulator >> 11) & 0xfff`
/// (sampled with FREQ=0x0800); `ps` is indexed by `accumulator >> 12`
/// (sampled with FREQ=0x1000). Pulse combinations are ANDed with the pulse
/// comparator output at lookup time.
#[derive(Clone)]
pub(crate) struct WaveTables {
    pub st: Vec<u8>,
    pub pt: Vec<u8>,
    pub ps: Vec<u8>,
    pub pst: Vec<u8>,
}

pub(crate) fn build_wave_tables(chip_model: ChipModel) -> WaveTables {
    let model = chip_model.combined_waveform_model();

    let mut st = Vec::with_capacity(4096);
    let mut pt = Vec::with_capacity(4096);
    let mut ps = Vec::with_capacity(4096);
    let mut pst = Vec::with_capacity(4096);

    for i in 0..4096u16 {
        // Index i covers accumulator bits [22:11]; the sawtooth sees the
        // upper 12 bits, the triangle the left-shifted 12 bits.
        let saw = i >> 1;
        let tri = i;

        st.push(combined_sample(&[saw, tri], &model, false));
        pt.push(combined_sample(&[tri], &model, true));
        pst.push(combined_sample(&[saw, tri], &model, true));

        // The P+S table is indexed by accumulator bits [23:12] directly.
        ps.push(combined_sample(&[i], &model, true));
    }

    WaveTables { st, pt, ps, pst }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Combined output never sets a bit that plain ANDing would clear.
    #[test]
    fn combined_bounded_by_and() {
        let tables = build_wave_tables(ChipModel::Mos6581);
        for i in 0..4096usize {
            let saw = (i >> 1) as u16;
            let tri = i as u16;
            let and = ((saw & tri) >> 4) as u8;
            assert_eq!(
                tables.st[i] & !and,
                0,
                "st[{:#05x}] = {:#04x} sets bits outside AND {:#04x}",
                i,
                tables.st[i],
                and
            );
        }
    }

    /// The 8580 preserves at least as much output as the 6581.
    #[test]
    fn mos8580_drives_harder() {
        let t6581 = build_wave_tables(ChipModel::Mos6581);
        let t8580 = build_wave_tables(ChipModel::Mos8580);
        let sum = |t: &[u8]| t.iter().map(|&v| v as u32).sum::<u32>();
        assert!(sum(&t8580.st) >= sum(&t6581.st));
        assert!(sum(&t8580.ps) >= sum(&t6581.ps));
    }

    /// Tables are non-trivial: zero at the bottom, non-zero near the top.
    #[test]
    fn tables_nontrivial() {
        for chip_model in [ChipModel::Mos6581, ChipModel::Mos8580] {
            let tables = build_wave_tables(chip_model);
            for table in [&tables.st, &tables.pt, &tables.ps, &tables.pst] {
                assert_eq!(table[0], 0);
                assert!(table.iter().any(|&v| v != 0));
            }
        }
    }
}
