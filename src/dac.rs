// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! R-2R ladder DAC emulation.
//!
//! The SID DACs are built up as follows:
//!
//! ```text
//!          n  n-1      2   1   0    VGND
//!          |   |       |   |   |      |   Termination
//!         2R  2R      2R  2R  2R     2R   only for
//!          |   |       |   |   |      |   MOS 8580
//!      Vo  --R---R--...--R---R--    ---
//! ```
//!
//! All MOS 6581 DACs are missing a termination resistor at bit 0. This
//! causes pronounced errors for the lower 4 - 5 bits, resulting in DAC
//! discontinuities. In addition the 6581 resistors are less than perfectly
//! matched; a good approximation of the actual output is achieved for
//! 2R/R ~ 2.20. The MOS 8580 DACs are correctly terminated and accurately
//! matched (2R/R = 2.00), and do not exhibit any discontinuities.

use alloc::vec::Vec;

use super::ChipModel;

impl ChipModel {
    /// 6581 has imperfect resistor matching, 8580 is ideal.
    pub(crate) const fn r2r_ratio(self) -> f64 {
        match self {
            ChipModel::Mos6581 => 2.20,
            ChipModel::Mos8580 => 2.00,
        }
    }

    /// 6581 DACs lack the termination resistor at bit 0.
    pub(crate) const fn has_termination(self) -> bool {
        matches!(self, ChipModel::Mos8580)
    }
}

/// Parallel resistance: r1 || r2
fn parallel(r1: f64, r2: f64) -> f64 {
    (r1 * r2) / (r1 + r2)
}

/// Computes the open-circuit voltage contribution of a single ladder bit at
/// the output node. The tail resistance below `set_bit` is found by repeated
/// parallel substitution, a single source transformation yields the bit
/// voltage, and the remaining rungs form voltage dividers toward the output.
fn bit_voltage(set_bit: usize, bits: usize, r2: f64, terminated: bool) -> f64 {
    let r = 1.0;
    let mut vn = 1.0;

    // Tail resistance starts at 2R (terminated) or an open circuit.
    let mut rn = if terminated { r2 } else { f64::INFINITY };

    for _ in 0..set_bit {
        rn = if rn == f64::INFINITY {
            r + r2
        } else {
            r + parallel(r2, rn)
        };
    }

    // Source transformation at set_bit.
    if rn == f64::INFINITY {
        rn = r2;
    } else {
        let rn_par = parallel(r2, rn);
        vn *= rn_par / r2;
        rn = rn_par;
    }

    // Walk from set_bit to the MSB, applying voltage dividers.
    for _ in (set_bit + 1)..bits {
        rn += r;
        let i = vn / rn;
        rn = parallel(r2, rn);
        vn = rn * i;
    }

    vn
}

/// DAC lookup tables for a given bit width and ladder geometry.
///
/// `table` holds the output for every input pattern, scaled to
/// `[0, 2^bits - 1]`. `bits` holds the per-bit contributions scaled by
/// `2^4`, sufficient to reconstruct any pattern by superposition.
#[derive(Clone)]
pub struct Dac {
    /// Full pattern lookup table.
    pub table: Vec<u16>,
    /// Single bit values, scaled by 2^4.
    pub bits: Vec<u16>,
}

impl Dac {
    /// Build DAC tables for an R-2R ladder with the given 2R/R ratio and
    /// termination. The builder is pure; call it once at construction time.
    pub fn new(bits: usize, r2r_ratio: f64, terminated: bool) -> Self {
        let vbit: Vec<f64> = (0..bits)
            .map(|bit| bit_voltage(bit, bits, r2r_ratio, terminated))
            .collect();
        let v_sum: f64 = vbit.iter().sum();
        let scale = ((1u32 << bits) - 1) as f64 / v_sum;

        let dac_bits = vbit
            .iter()
            .map(|&v| (v * scale * (1 << 4) as f64 + 0.5) as u16)
            .collect();

        // Voltage for any combination of bits by superposition.
        let table = (0..(1usize << bits))
            .map(|input| {
                let vo: f64 = vbit
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| input & (1 << i) != 0)
                    .map(|(_, &v)| v)
                    .sum();
                (vo * scale + 0.5) as u16
            })
            .collect();

        Dac {
            table,
            bits: dac_bits,
        }
    }

    /// Build DAC tables with the standard geometry of the given chip model.
    pub fn for_chip_model(bits: usize, chip_model: ChipModel) -> Self {
        Self::new(bits, chip_model.r2r_ratio(), chip_model.has_termination())
    }

    /// DAC output for a single input pattern.
    #[inline]
    pub fn output(&self, input: usize) -> u16 {
        self.table[input]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 6581 DAC is non-monotonic due to missing termination and R mismatch.
    #[test]
    fn dac_6581_nonlinear() {
        let dac = Dac::for_chip_model(8, ChipModel::Mos6581);

        let mut is_monotonic = true;
        for i in 1..256 {
            if dac.table[i] <= dac.table[i - 1] {
                is_monotonic = false;
                break;
            }
        }

        assert!(!is_monotonic, "6581 DAC should be non-monotonic");
    }

    /// 8580 DAC is monotonic across the full input range.
    #[test]
    fn dac_8580_linear() {
        let dac = Dac::for_chip_model(8, ChipModel::Mos8580);

        for i in 1..256 {
            assert!(
                dac.table[i] > dac.table[i - 1],
                "8580 DAC should be monotonic: table[{}]={} <= table[{}]={}",
                i,
                dac.table[i],
                i - 1,
                dac.table[i - 1]
            );
        }
    }

    /// Output is scaled so the all-ones pattern hits 2^bits - 1.
    #[test]
    fn dac_full_scale() {
        for chip_model in [ChipModel::Mos6581, ChipModel::Mos8580] {
            let dac = Dac::for_chip_model(12, chip_model);
            assert_eq!(dac.table[0], 0);
            assert_eq!(dac.table[0xfff], 0xfff);
        }
    }

    /// Superposition of the per-bit values reproduces the table entries.
    #[test]
    fn dac_superposition() {
        let dac = Dac::for_chip_model(8, ChipModel::Mos6581);
        for input in [0x01usize, 0x55, 0x80, 0xaa, 0xff] {
            let bitsum: u32 = (0..8)
                .filter(|&bit| input & (1 << bit) != 0)
                .map(|bit| dac.bits[bit] as u32)
                .sum();
            let reconstructed = (bitsum + (1 << 3)) >> 4;
            let diff = (reconstructed as i32 - dac.table[input] as i32).abs();
            assert!(
                diff <= 1,
                "superposition mismatch at {:#04x}: {} vs {}",
                input,
                reconstructed,
                dac.table[input]
            );
        }
    }
}
