// Verify oscillator, LFSR and hard sync behavior of the waveform generator.

use resid::wave::{Syncable, WaveformGenerator};
use resid::ChipModel;

fn new_wave() -> WaveformGenerator {
    let mut gen = WaveformGenerator::new(ChipModel::Mos6581);
    gen.reset();
    gen
}

fn clock_n(gen: &mut WaveformGenerator, n: u32) {
    for _ in 0..n {
        gen.clock();
    }
}

/// LFSR initializes to 0x7ffff8 - specific pattern for SID noise generation.
#[test]
fn shift_register_init_value() {
    let gen = new_wave();
    assert_eq!(gen.get_shift(), 0x007f_fff8);
}

/// Noise is extracted from eight LFSR bits onto output bits 11-4.
#[test]
fn noise_output() {
    let mut gen = new_wave();
    gen.shift = 0x35555f;
    gen.set_control(0x80); // noise waveform

    let out = gen.output(None);
    assert!(out > 0, "Noise should produce non-zero output");
    assert_eq!(out & 0x000f, 0, "Low 4 noise output bits are always clear");
}

/// Noise bit mapping: shift bits 22,20,16,13,11,7,4,2 land on output
/// bits 11,10,9,8,7,6,5,4.
#[test]
fn noise_bit_mapping() {
    let mut gen = new_wave();
    gen.set_control(0x80);

    gen.shift = 0x0040_0000; // bit 22 alone
    assert_eq!(gen.output(None), 0x0800);
    gen.shift = 0x0000_0004; // bit 2 alone
    assert_eq!(gen.output(None), 0x0010);
    gen.shift = 0x0010_0000 | 0x0000_0080; // bits 20 and 7
    assert_eq!(gen.output(None), 0x0400 | 0x0040);
}

/// TEST bit drives the LFSR to its reset pattern and holds it there.
#[test]
fn test_bit_resets_register() {
    let mut gen = new_wave();
    gen.set_frequency_lo(0xff);
    gen.set_frequency_hi(0xff);
    clock_n(&mut gen, 1000);
    assert_ne!(gen.get_shift(), 0x007f_fff8);

    gen.set_control(0x08);
    clock_n(&mut gen, 100);
    assert_eq!(gen.get_shift(), 0x007f_fff8);

    gen.set_control(0x00);
    assert_eq!(gen.get_shift(), 0x007f_fff8);
}

/// TEST bit zeroes and freezes the accumulator.
#[test]
fn test_bit_clears_accumulator() {
    let mut gen = new_wave();
    gen.set_frequency_lo(0xff);
    gen.set_frequency_hi(0xff);
    clock_n(&mut gen, 100);

    assert!(gen.get_acc() != 0);

    gen.set_control(0x08);
    assert_eq!(gen.get_acc(), 0);

    clock_n(&mut gen, 100);
    assert_eq!(gen.get_acc(), 0, "Accumulator must not count under TEST");
}

/// While TEST is asserted the pulse output is held at 0xfff.
#[test]
fn test_bit_holds_pulse_high() {
    let mut gen = new_wave();
    gen.set_pulse_width_hi(0x0f);
    gen.set_pulse_width_lo(0xff);
    gen.set_control(0x48); // pulse + test
    assert_eq!(gen.output(None), 0x0fff);
}

/// Accumulator increments by the frequency value each clock cycle.
#[test]
fn accumulator_increment() {
    let mut gen = new_wave();
    gen.set_frequency_lo(0x01);
    gen.set_frequency_hi(0x00);

    gen.clock();
    assert_eq!(gen.get_acc(), 1);
    gen.clock();
    assert_eq!(gen.get_acc(), 2);

    gen.set_frequency_lo(0x00);
    gen.set_frequency_hi(0x01); // freq = 256
    let before = gen.get_acc();
    gen.clock();
    assert_eq!(gen.get_acc(), before + 256);
}

/// 24-bit accumulator wraps at 0x1000000.
#[test]
fn accumulator_wrap() {
    let mut gen = new_wave();
    gen.set_acc(0x00ff_fffe);
    gen.set_frequency_lo(0x10);
    gen.clock();

    assert_eq!(gen.get_acc(), 0x00_000e);
}

/// LFSR clocks when accumulator bit 19 transitions 0->1.
#[test]
fn shift_register_clock_on_bit19() {
    let mut gen = new_wave();
    let initial = gen.get_shift();

    // Position just below the bit 19 boundary.
    gen.set_acc(0x0007_fff0);
    gen.set_frequency_lo(0x20);
    gen.clock(); // 0x7fff0 + 0x20 = 0x80010, bit 19 rises

    assert_ne!(gen.get_shift(), initial, "LFSR should clock on bit 19 rise");

    let after = gen.get_shift();
    gen.clock(); // bit 19 stays high, no further shift
    assert_eq!(gen.get_shift(), after);
}

/// Batched clocking shifts the LFSR once per bit 19 rising edge.
#[test]
fn clock_delta_matches_clock() {
    let mut a = new_wave();
    let mut b = new_wave();
    for gen in [&mut a, &mut b] {
        gen.set_frequency_lo(0xb1);
        gen.set_frequency_hi(0x19);
    }

    clock_n(&mut a, 5000);
    b.clock_delta(5000);

    assert_eq!(a.get_acc(), b.get_acc());
    assert_eq!(a.get_shift(), b.get_shift());
}

/// Sync bit enables hard sync from another oscillator.
#[test]
fn sync_bit() {
    let mut gen = new_wave();
    assert!(!gen.get_sync());

    gen.set_control(0x02);
    assert!(gen.get_sync());

    gen.set_control(0x00);
    assert!(!gen.get_sync());
}

/// MSB rising edge detection triggers sync to other oscillators.
#[test]
fn msb_rising() {
    let mut gen = new_wave();
    gen.set_acc(0x007f_fff0);
    gen.set_frequency_lo(0x20);
    gen.clock();

    assert!(gen.is_msb_rising(), "Should detect bit 23 transition 0->1");

    gen.clock();
    assert!(!gen.is_msb_rising(), "Flag clears after one cycle");
}

/// Hard sync zeroes the destination accumulator on the source MSB rise.
#[test]
fn hard_sync_zeroes_destination() {
    let mut main = new_wave();
    let mut dest = new_wave();
    let mut source = new_wave();

    main.set_control(0x02); // sync enabled
    main.set_acc(0x0012_3456);
    source.set_acc(0x007f_fff0);
    source.set_frequency_lo(0x20);
    source.clock();
    assert!(source.is_msb_rising());

    let mut syncable = Syncable {
        main: &mut main,
        sync_dest: &mut dest,
        sync_source: &mut source,
    };
    syncable.synchronize();

    assert_eq!(main.get_acc(), 0);
}

/// A sync source that is itself synced on the same cycle does not sync
/// its destination.
#[test]
fn hard_sync_source_synced_same_cycle() {
    let mut main = new_wave();
    let mut dest = new_wave();
    let mut source = new_wave();

    main.set_control(0x02);
    main.set_acc(0x0012_3456);
    source.set_control(0x02); // source is itself a sync destination
    source.set_acc(0x007f_fff0);
    source.set_frequency_lo(0x20);
    source.clock();
    // In the three voice ring, the source's own sync source is this
    // voice's sync destination.
    dest.set_acc(0x007f_fff0);
    dest.set_frequency_lo(0x20);
    dest.clock();
    assert!(dest.is_msb_rising());

    let mut syncable = Syncable {
        main: &mut main,
        sync_dest: &mut dest,
        sync_source: &mut source,
    };
    syncable.synchronize();

    assert_eq!(main.get_acc(), 0x0012_3456, "Sync must be suppressed");
}

/// Verify each waveform type produces expected output characteristics.
macro_rules! test_waveform {
    ($name:ident, $waveform:expr, $check:expr) => {
        #[test]
        fn $name() {
            let mut gen = new_wave();
            gen.set_frequency_hi(0x10);
            gen.set_pulse_width_hi(0x08);
            gen.set_control($waveform << 4);
            clock_n(&mut gen, 100);

            let out = gen.output(None);
            let check: fn(u16) -> bool = $check;
            assert!(check(out), "Waveform {} output {} invalid", $waveform, out);
        }
    };
}

test_waveform!(waveform_triangle, 1, |o| o > 0 && o < 0x0fff);
test_waveform!(waveform_sawtooth, 2, |o| o > 0 && o <= 0x0fff);
test_waveform!(waveform_pulse, 4, |o| o == 0 || o == 0x0fff);
test_waveform!(waveform_noise, 8, |_| true); // any value valid

/// Triangle output reflects at the accumulator MSB.
#[test]
fn triangle_reflects() {
    let mut gen = new_wave();
    gen.set_control(0x10);

    gen.set_acc(0x007f_ffff); // just below the MSB
    assert_eq!(gen.output(None), 0x0fff, "Peak on the rising slope");
    gen.set_acc(0x0080_0000); // just past the MSB
    assert_eq!(gen.output(None), 0x0fff, "Peak on the falling slope");

    gen.set_acc(0x0040_0000); // quarter period, rising
    assert_eq!(gen.output(None), 0x0800);
    gen.set_acc(0x00bf_ffff); // mirrored point on the falling slope
    assert_eq!(gen.output(None), 0x0800);
}

/// Ring modulation substitutes the triangle MSB with the XOR of both
/// accumulator MSBs.
#[test]
fn ring_mod_flips_msb() {
    let mut gen = new_wave();
    let mut source = new_wave();
    gen.set_control(0x14); // triangle + ring mod
    gen.set_acc(0x0040_0000);

    source.set_acc(0x0000_0000);
    let plain = gen.output(Some(&source));
    source.set_acc(0x0080_0000);
    let flipped = gen.output(Some(&source));

    assert_ne!(plain, flipped, "Source MSB must invert the ramp direction");
}

/// Waveform combinations including noise output zero.
#[test]
fn noise_combinations_zero() {
    for waveform in 0x9..=0xf {
        let mut gen = new_wave();
        gen.set_frequency_hi(0x10);
        gen.set_control(waveform << 4);
        clock_n(&mut gen, 1000);
        assert_eq!(gen.output(None), 0, "waveform {:#x}", waveform);
    }
}

/// Combined pulse waveforms are gated by the pulse comparator.
#[test]
fn combined_pulse_gating() {
    let mut gen = new_wave();
    gen.set_pulse_width_hi(0x0f);
    gen.set_pulse_width_lo(0xff); // pulse output low almost everywhere
    gen.set_control(0x60); // pulse + sawtooth
    gen.set_acc(0x0555_5555 & 0x00ff_ffff);
    assert_eq!(gen.output(None), 0, "Pulse low must force combined low");
}
