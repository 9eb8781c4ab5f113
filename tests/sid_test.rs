// Integration tests exercising the complete chip through the register bus.

use resid::{ChipModel, Sid};

/// Construction through SidConfig applies the sampling parameters and
/// filter enables.
#[test]
fn config_construction() {
    use resid::{SamplingMethod, SidConfig};

    let mut sid = Sid::from_config(SidConfig {
        chip_model: ChipModel::Mos8580,
        sampling_method: SamplingMethod::Interpolate,
        clock_freq: resid::clock::NTSC,
        sample_freq: 48_000.0,
        filter_enabled: false,
        ..SidConfig::default()
    });

    // ~21.3 cycles per sample at the NTSC clock.
    let mut buffer = [0i16; 256];
    let (written, remaining) = sid.sample(4_000, &mut buffer, 1);
    assert_eq!(remaining, 0);
    assert!((185..=190).contains(&written), "got {} samples", written);
}

/// Attack rate 0 ramps the envelope to 0xff in 2ms, one rate period per
/// step (between 7 and 10 cycles per step over 255 steps).
#[test]
fn attack_ramp_timing() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x13, 0x0f); // voice3 attack=0, decay=15
    sid.write(0x12, 0x01); // voice3 gate on, no waveform

    let mut cycles = 0u32;
    while sid.read(0x1c) != 0xff {
        sid.clock_delta(2);
        cycles += 2;
        assert!(cycles <= 3000, "Envelope never reached 0xff");
    }

    assert!(
        (255 * 7..=255 * 10 + 2).contains(&cycles),
        "Attack ramp took {} cycles",
        cycles
    );
}

/// ADSR delay bug: shortening the attack period below the current rate
/// counter postpones the next envelope step until the counter wraps at
/// 0x7fff.
#[test]
fn adsr_delay_bug_via_registers() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x13, 0xf0); // voice3 attack=15 (period 31252)
    sid.write(0x12, 0x01); // gate on
    sid.clock_delta(10_000);
    assert_eq!(sid.read(0x1c), 0);

    // Attack 0 selects period 9, far below the rate counter's 10000.
    sid.write(0x13, 0x00);

    // The counter must count up to 0x7fff, wrap, and reach 9 again:
    // 0x7fff - 10000 + 9 = 22776 cycles. No step until then.
    sid.clock_delta(20_000);
    assert_eq!(sid.read(0x1c), 0, "Envelope must wait for rate counter wrap");

    sid.clock_delta(5_000);
    assert!(sid.read(0x1c) > 0, "Envelope must resume after the wrap");
}

/// Hard sync: voice1's MSB rising edge zeroes voice2's accumulator on that
/// exact cycle.
#[test]
fn hard_sync_exact_cycle() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x00, 0x00); // voice1 freq = 0x1000
    sid.write(0x01, 0x10);
    sid.write(0x07, 0x00); // voice2 freq = 0x3000
    sid.write(0x08, 0x30);
    sid.write(0x0b, 0x22); // voice2 sawtooth + sync

    // Voice1 reaches 0x800000 after exactly 0x800000/0x1000 = 2048 cycles.
    sid.clock_delta(2047);
    let state = sid.read_state();
    assert_ne!(state.accumulator[1], 0);

    sid.clock_delta(1);
    let state = sid.read_state();
    assert_eq!(state.accumulator[0], 0x0080_0000);
    // Without sync, voice2 would sit at 2048 * 0x3000 = 0x800000 here.
    assert_eq!(
        state.accumulator[1], 0,
        "Voice2 must be zeroed on voice1's MSB rise"
    );
}

/// The noise LFSR runs a maximal-length sequence: every observed state over
/// a long run is distinct.
#[test]
fn noise_lfsr_distinct_states() {
    use std::collections::HashSet;

    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x00, 0xff); // voice1 freq = 0xffff
    sid.write(0x01, 0xff);
    sid.write(0x04, 0x80); // noise

    // Bit 19 rises roughly every 16 cycles at freq 0xffff, so one million
    // cycles clock the register about 61000 times.
    let mut states = HashSet::new();
    let mut shifts = 0u32;
    let mut last = sid.read_state().shift_register[0];
    states.insert(last);
    for _ in 0..62_500 {
        sid.clock_delta(16);
        let shift = sid.read_state().shift_register[0];
        assert!(shift != 0 && shift < (1 << 23));
        if shift != last {
            shifts += 1;
            last = shift;
        }
        states.insert(shift);
    }

    assert!(shifts >= 60_000, "Expected ~61000 shifts, got {}", shifts);
    assert_eq!(
        states.len() as u32,
        shifts + 1,
        "A maximal-length LFSR must not revisit a state this early"
    );
}

/// Bus value decay: a write is readable back from a write-only register
/// until the bus decays to zero.
#[test]
fn register_bus_decay() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x04, 0xa5);
    assert_eq!(sid.read(0x04), 0xa5);

    sid.clock_delta(8_000);
    assert_eq!(sid.read(0x04), 0xa5, "Bus value must persist before the TTL");

    sid.clock_delta(92_000);
    assert_eq!(sid.read(0x04), 0x00, "Bus value must decay to zero");
}

/// Sweeping the cutoff upward in lowpass mode lets monotonically more
/// high-frequency content of a triangle voice through.
#[test]
fn filter_cutoff_sweep() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x18, 0x1f); // lowpass, vol 15
    sid.write(0x17, 0x01); // route voice1 through the filter
    sid.write(0x00, 0x00); // voice1 freq = 0x1000
    sid.write(0x01, 0x10);
    sid.write(0x05, 0x00); // instant attack
    sid.write(0x06, 0xf0); // sustain at max
    sid.write(0x04, 0x11); // triangle + gate

    // Let the envelope reach sustain before measuring.
    sid.clock_delta(5_000);

    // High-frequency content per step, measured as the mean absolute
    // first difference of the output.
    let mut activity = Vec::new();
    for step in 0..256u32 {
        sid.write(0x16, step as u8); // fc = step << 3
        let mut sum: u64 = 0;
        let mut prev = sid.output();
        for _ in 0..(4096 / 32) {
            sid.clock_delta(32);
            let now = sid.output();
            sum += (now as i64 - prev as i64).unsigned_abs();
            prev = now;
        }
        activity.push(sum);
    }

    let quarter =
        |range: core::ops::Range<usize>| -> u64 { activity[range].iter().sum::<u64>() / 64 };
    let q1 = quarter(0..64);
    let q2 = quarter(64..128);
    let q4 = quarter(192..256);

    assert!(
        q4 > q2 && q2 > q1,
        "High-frequency content must grow with the cutoff: {} {} {}",
        q1,
        q2,
        q4
    );
    assert!(
        q4 > q1 * 2,
        "Fully open filter must pass much more HF than closed: {} vs {}",
        q1,
        q4
    );
}

/// reset() after arbitrary activity restores the documented power-on state.
#[test]
fn reset_is_idempotent() {
    let mut fresh = Sid::new(ChipModel::Mos8580);
    fresh.reset();
    let reference = fresh.read_state();

    let mut sid = Sid::new(ChipModel::Mos8580);
    sid.reset();
    for (reg, value) in [
        (0x00u8, 0xb1u8),
        (0x01, 0x19),
        (0x04, 0x21),
        (0x05, 0x4a),
        (0x0b, 0x81),
        (0x12, 0x15),
        (0x15, 0x07),
        (0x16, 0xc3),
        (0x17, 0xf5),
        (0x18, 0x8f),
    ] {
        sid.write(reg, value);
        sid.clock_delta(997);
    }
    sid.clock_delta(100_000);
    sid.reset();

    assert_eq!(sid.read_state(), reference);
}

/// With freq = 0 the accumulators must not move, whatever the step size.
#[test]
fn zero_frequency_freezes_accumulator() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x00, 0x34);
    sid.write(0x01, 0x12);
    sid.write(0x04, 0x20);
    sid.clock_delta(1000);

    sid.write(0x00, 0x00);
    sid.write(0x01, 0x00);
    let before = sid.read_state().accumulator[0];
    assert_ne!(before, 0);

    for delta in [1u32, 7, 100, 10_000] {
        sid.clock_delta(delta);
        assert_eq!(sid.read_state().accumulator[0], before);
    }
}

/// With TEST asserted, the oscillator is frozen: accumulator zero, LFSR at
/// its reset value, no waveform output.
#[test]
fn test_bit_freezes_voice() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x0e, 0xff); // voice3 freq
    sid.write(0x0f, 0xff);
    sid.write(0x12, 0x80); // noise
    sid.clock_delta(5000);

    sid.write(0x12, 0x08); // test, no waveform
    for delta in [1u32, 9, 1000, 50_000] {
        sid.clock_delta(delta);
        let state = sid.read_state();
        assert_eq!(state.accumulator[2], 0);
        assert_eq!(state.shift_register[2], 0x007f_fff8);
        assert_eq!(sid.read(0x1b), 0, "OSC3 must read zero with no waveform");
    }
}

/// With both filters disabled, the 8580 output is the linear sum of
/// (waveform - zero) * envelope across voices, scaled and offset exactly
/// as documented.
#[test]
fn filters_disabled_linearity() {
    let mixer_dc: i32 = (-0xfff * 0xff / 18) >> 7;
    let divisor: i32 = ((4095 * 255) >> 7) * 3 * 15 * 2 / 65536;

    let mut sid = Sid::new(ChipModel::Mos8580);
    sid.reset();
    sid.set_filter_enabled(false);
    sid.set_external_filter_enabled(false);
    sid.write(0x18, 0x0f); // vol 15
    sid.write(0x0e, 0xb1); // voice3 sawtooth
    sid.write(0x0f, 0x19);
    sid.write(0x13, 0x00); // instant attack
    sid.write(0x14, 0xf0); // sustain at max
    sid.write(0x12, 0x21); // sawtooth + gate

    sid.clock_delta(5_000);
    assert_eq!(sid.read(0x1c), 0xff, "Envelope must sit at sustain");

    for _ in 0..2000 {
        sid.clock_delta(1);
        let state = sid.read_state();
        let saw = (state.accumulator[2] >> 12) as i32;
        let env = sid.read(0x1c) as i32;
        let voice = (saw - 0x800) * env;
        let vnf = voice >> 7;
        let expected = ((vnf + mixer_dc) * 15 / divisor).clamp(-32768, 32767);
        assert_eq!(sid.output() as i32, expected);
    }
}

/// OSC3 reads back the upper 8 bits of voice 3's sawtooth.
#[test]
fn osc3_read_back() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.reset();
    sid.write(0x0e, 0x00);
    sid.write(0x0f, 0x10); // freq = 0x1000
    sid.write(0x12, 0x20); // sawtooth

    sid.clock_delta(256); // accumulator = 0x1000 * 256 = 0x100000
    assert_eq!(sid.read(0x1b), 0x10);
}

/// POT X/Y read the paddle lines, bypassing the bus value.
#[test]
fn pot_read_back() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    assert_eq!(sid.read(0x19), 0xff);
    assert_eq!(sid.read(0x1a), 0xff);

    sid.set_pot_x(0x42);
    sid.set_pot_y(0x17);
    sid.write(0x04, 0xa5); // drives the bus, must not affect the pots
    assert_eq!(sid.read(0x19), 0x42);
    assert_eq!(sid.read(0x1a), 0x17);
    assert_eq!(sid.read(0x1d), 0xa5, "Unmapped read yields the bus value");
}

/// Muting a voice removes it from the mix without touching its state.
#[test]
fn voice_mute() {
    let mixer_dc: i32 = (-0xfff * 0xff / 18) >> 7;
    let divisor: i32 = ((4095 * 255) >> 7) * 3 * 15 * 2 / 65536;

    let mut sid = Sid::new(ChipModel::Mos8580);
    sid.reset();
    sid.set_filter_enabled(false);
    sid.set_external_filter_enabled(false);
    sid.write(0x18, 0x0f);
    sid.write(0x01, 0x19); // voice1 sawtooth at a non-zero frequency
    sid.write(0x06, 0xf0);
    sid.write(0x04, 0x21);
    sid.clock_delta(5_000);

    sid.set_voice_mute(0, true);
    sid.clock_delta(100);
    let muted = sid.output();

    sid.set_voice_mute(0, false);
    sid.clock_delta(100);
    let unmuted = sid.output();

    assert_eq!(muted as i32, mixer_dc * 15 / divisor);
    assert_ne!(muted, unmuted);
}
