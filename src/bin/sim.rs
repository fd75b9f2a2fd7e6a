use mixscope::{AcquisitionSet, Command, Device, FirmwareConfig, LogicSet, WaveformSet};
use mixscope::{FRAME_LEN, HANDSHAKE_MAGIC};
use mixscope::regs::Irq;
use mixscope::sys::sim::SimHardware;

const CONVERSIONS: usize = 200_000;
const SHADOW_EVERY: usize = 100;
const LOGIC_PERIOD: usize = 24;
const COUNTDOWN_AFTER: usize = 400;

fn host_frames() -> Vec<[u8; FRAME_LEN]> {
    let mut frames = vec![Command::Handshake { magic: *HANDSHAKE_MAGIC }.encode()];
    for channel in 0..2 {
        let set = WaveformSet {
            channel,
            gain: channel,
            prescaler: 2,
            period: 7585,
            compare_offset: 2048,
            sample_count: 64,
            phase: 0,
        };
        frames.push(Command::WaveformSet(set).encode());
        // 64 samples of a ramp, two frames
        let table: Vec<u8> = (0..64u16).flat_map(|n| (n * 64).to_le_bytes()).collect();
        for chunk in table.chunks(FRAME_LEN) {
            let mut frame = [0; FRAME_LEN];
            frame[..chunk.len()].copy_from_slice(chunk);
            frames.push(frame);
        }
    }
    frames.push(Command::AcquisitionSet(AcquisitionSet {
        channel: 0,
        mode: 4,
        trigger_mode: 1,
        trigger_level: 2048,
        amp1: 1,
        ..Default::default()
    }).encode());
    frames.push(Command::LogicSet(LogicSet {
        control: 1,
        pin_mask: 0x0001,
        edge: 1,
        period16: 0xffff,
        prescaler16: 1,
        period32: 0x8ca0,
    }).encode());
    frames
}

fn sine(n: usize) -> u16 {
    let phase = n as f32 * std::f32::consts::TAU / 500.0;
    (2048.0 + 1800.0 * phase.sin()) as u16
}

fn main() {
    env_logger::init();

    let mut hw = SimHardware::new();
    for frame in host_frames() {
        hw.push_frame(frame);
    }
    let mut device = Device::new(hw, FirmwareConfig::default()).unwrap_or_else(|e| mixscope::halt(e));
    if let Err(e) = device.startup() {
        mixscope::halt(e)
    }

    let (mut scope_frames, mut logic_frames) = (0, 0);
    let mut logic_samples = 0;
    for n in 0..CONVERSIONS {
        match device.poll() {
            Ok(Some(frame)) => {
                log::trace!("frame {:?}", frame);
                scope_frames += frame.has_scope_data() as usize;
                logic_frames += frame.has_logic_data() as usize;
            }
            Ok(None) => (),
            Err(e) => mixscope::halt(e),
        }

        if device.scope_running() {
            let samples = [sine(n), sine(n + 125)];
            if let Err(e) = device.on_adc_conversion(samples) {
                mixscope::halt(e)
            }
            if let Some((adc, windows)) = device.watchdog() {
                let flags = windows.evaluate(samples[adc.index()]);
                if !flags.is_empty() && device.hardware().irq_enabled(Irq::Adc(adc)) {
                    device.hardware_mut().raise_adc_status(adc, flags);
                    if let Err(e) = device.on_adc_interrupt(adc) {
                        mixscope::halt(e)
                    }
                }
            }
        }
        if n % SHADOW_EVERY == SHADOW_EVERY - 1 {
            device.on_shadow_tick();
        }

        if device.logic_sampling() && n % LOGIC_PERIOD == 0 {
            let port = ((n / (LOGIC_PERIOD * 16)) & 1) as u16 | 0x0100;
            if let Err(e) = device.on_logic_sample(port) {
                mixscope::halt(e)
            }
            if device.logic_phase() == mixscope::Phase::Triggered {
                logic_samples += 1;
                if logic_samples == COUNTDOWN_AFTER / LOGIC_PERIOD {
                    logic_samples = 0;
                    if let Err(e) = device.on_logic_countdown() {
                        mixscope::halt(e)
                    }
                }
            }
        }
    }

    let hw = device.hardware();
    log::info!("{} conversions, {} frames sent ({} with scope data, {} with logic data), {} us busy",
               CONVERSIONS, hw.transmitted().len(), scope_frames, logic_frames, hw.elapsed_us());
    log::info!("scope {:?} at {}, logic {:?} at {}, watching {:?}",
               device.scope_state(), device.scope_cursor(),
               device.logic_phase(), device.logic_cursor(),
               device.watchdog().map(|(adc, _)| adc));
}
