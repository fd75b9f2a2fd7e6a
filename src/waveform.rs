//! Two-channel arbitrary waveform generator.
//!
//! Each channel plays its lookup table through a DAC DMA stream paced by its own timer. The
//! relative phase of the two outputs only holds if both timers are restarted together, so any
//! change to either channel restarts both.

use crate::{FirmwareConfig, GeneratorConfiguration, Result, FRAME_LEN};
use crate::protocol::WaveformSet;
use crate::regs::{DmaStream, Register, Timer};
use crate::regs::gpio::GENERATOR_GAIN;
use crate::regs::tim::Cr1;
use crate::sys::{Hardware, HardwareExt};

const MID_SCALE: u16 = 2048;

/// Lookup table bytes still expected from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Upload {
    channel: usize,
    offset: usize,
    remaining: usize,
}

#[derive(Debug)]
pub struct Generator {
    config: [GeneratorConfiguration; 2],
    tables: [Box<[u16]>; 2],
    upload: Option<Upload>,
}

impl Generator {
    pub fn new(config: &FirmwareConfig) -> Generator {
        Generator {
            config: [Default::default(); 2],
            tables: [
                vec![MID_SCALE; config.lut_capacity].into_boxed_slice(),
                vec![MID_SCALE; config.lut_capacity].into_boxed_slice(),
            ],
            upload: None,
        }
    }

    pub fn configuration(&self, channel: usize) -> &GeneratorConfiguration {
        &self.config[channel]
    }

    pub fn table(&self, channel: usize) -> &[u16] {
        &self.tables[channel][..]
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    /// Outputs mid-scale on both channels.
    pub fn start<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        for channel in 0..2 {
            let config = self.config[channel];
            hw.write_register(Register::TimCcr(Timer::Offset, channel as u8),
                              config.compare_offset as u32)?;
            hw.program_timer(Timer::generator(channel), config.prescaler as u32,
                             config.period as u32)?;
            hw.write_pin(GENERATOR_GAIN[channel], config.high_gain)?;
        }
        hw.modify_cr1(Timer::Offset, |val| val.insert(Cr1::CEN))?;
        self.restart_synchronized(hw)
    }

    /// Applies a `WaveformSet` to `channel` and expects its lookup table next.
    pub fn configure<H: Hardware + ?Sized>(&mut self, hw: &mut H, channel: usize,
                                           set: &WaveformSet) -> Result<()> {
        let capacity = self.tables[channel].len();
        let mut sample_count = set.sample_count;
        if sample_count as usize > capacity {
            log::warn!("generator {}: {} samples requested, table holds {}",
                       channel, sample_count, capacity);
            sample_count = capacity as u16;
        }
        self.config[channel] = GeneratorConfiguration {
            prescaler: set.prescaler,
            period: set.period,
            compare_offset: set.compare_offset,
            sample_count,
            phase: set.phase,
            high_gain: set.gain != 0,
        };
        log::debug!("generator {}: {:?}", channel, self.config[channel]);

        hw.write_register(Register::TimCcr(Timer::Offset, channel as u8), set.compare_offset as u32)?;
        hw.program_timer(Timer::generator(channel), set.prescaler as u32, set.period as u32)?;
        hw.write_pin(GENERATOR_GAIN[channel], set.gain != 0)?;
        self.restart_synchronized(hw)?;

        // short tables are still sent as two full frames
        let remaining = if sample_count < 32 { 128 } else { sample_count as usize * 2 };
        self.upload = Some(Upload { channel, offset: 0, remaining });
        Ok(())
    }

    /// Takes one frame of lookup table bytes. Returns `true` once the whole table has arrived.
    pub fn accept_upload(&mut self, frame: &[u8; FRAME_LEN]) -> bool {
        let Some(mut upload) = self.upload else { return false };
        let table = &mut self.tables[upload.channel][..];
        let take = upload.remaining.min(FRAME_LEN);
        let fits = take.min((table.len() * 2).saturating_sub(upload.offset));
        if fits > 0 {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut table[..]);
            bytes[upload.offset..][..fits].copy_from_slice(&frame[..fits]);
            // samples arrive little-endian
            for sample in &mut table[upload.offset / 2..][..fits / 2] {
                *sample = u16::from_le(*sample);
            }
        }
        upload.offset += take;
        upload.remaining -= take;
        log::trace!("generator {}: {} table bytes left", upload.channel, upload.remaining);
        if upload.remaining == 0 {
            self.upload = None;
            true
        } else {
            self.upload = Some(upload);
            false
        }
    }

    /// Restarts both channels from a common reference so that their phase offset is exact.
    fn restart_synchronized<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        let [a, b] = self.config;

        hw.modify_cr1(Timer::GeneratorA, |val| val.remove(Cr1::CEN))?;
        hw.modify_cr1(Timer::GeneratorB, |val| val.remove(Cr1::CEN))?;

        hw.stop_dma(DmaStream::DacA)?;
        hw.stop_dma(DmaStream::DacB)?;
        hw.start_dma(DmaStream::DacA, a.sample_count as usize)?;
        hw.start_dma(DmaStream::DacB, b.sample_count as usize)?;

        // reset prescaler counters too, or they skew the phase
        hw.force_update(Timer::GeneratorA)?;
        hw.force_update(Timer::GeneratorB)?;

        hw.set_counter(Timer::GeneratorA, a.phase.wrapping_sub(b.period) as u32)?;
        hw.set_counter(Timer::GeneratorB, b.phase.wrapping_sub(a.period) as u32)?;

        let cr1_a = hw.read_cr1(Timer::GeneratorA)? | Cr1::CEN;
        let cr1_b = hw.read_cr1(Timer::GeneratorB)? | Cr1::CEN;
        hw.write_cr1(Timer::GeneratorA, cr1_a)?;
        hw.write_cr1(Timer::GeneratorB, cr1_b)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sys::sim::{Event, SimHardware};

    fn set(channel: u8, period: u16, phase: u16, sample_count: u16) -> WaveformSet {
        WaveformSet {
            channel,
            gain: 0,
            prescaler: 2,
            period,
            compare_offset: 1000 + channel as u16,
            sample_count,
            phase,
        }
    }

    #[test]
    fn test_startup_defaults() {
        let mut hw = SimHardware::new();
        let mut awg = Generator::new(&FirmwareConfig::default());
        awg.start(&mut hw).unwrap();
        assert_eq!(hw.register(Register::TimCcr(Timer::Offset, 0)), 2048);
        assert_eq!(hw.register(Register::TimCcr(Timer::Offset, 1)), 2048);
        assert_eq!(hw.dma_len(DmaStream::DacA), Some(2));
        assert_eq!(hw.dma_len(DmaStream::DacB), Some(2));
        assert_eq!(&awg.table(0)[..2], &[2048, 2048]);
        assert!(Cr1::from_bits_retain(hw.register(Register::TimCr1(Timer::GeneratorA))).contains(Cr1::CEN));
        assert!(Cr1::from_bits_retain(hw.register(Register::TimCr1(Timer::GeneratorB))).contains(Cr1::CEN));
        assert!(!awg.is_uploading());
    }

    #[test]
    fn test_phase_counters() {
        let mut hw = SimHardware::new();
        let mut awg = Generator::new(&FirmwareConfig::default());
        awg.start(&mut hw).unwrap();
        awg.configure(&mut hw, 0, &set(0, 999, 300, 64)).unwrap();
        awg.configure(&mut hw, 1, &set(1, 499, 50, 64)).unwrap();
        assert_eq!(hw.register(Register::TimCnt(Timer::GeneratorA)), (300 - 499) as u16 as u32);
        assert_eq!(hw.register(Register::TimCnt(Timer::GeneratorB)), (50 - 999) as u16 as u32);
        assert_eq!(hw.register(Register::TimArr(Timer::GeneratorA)), 999);
        assert_eq!(hw.register(Register::TimArr(Timer::GeneratorB)), 499);
        assert_eq!(hw.register(Register::TimCcr(Timer::Offset, 1)), 1001);
    }

    #[test]
    fn test_restart_touches_both_channels() {
        let mut hw = SimHardware::new();
        let mut awg = Generator::new(&FirmwareConfig::default());
        awg.start(&mut hw).unwrap();
        hw.clear_events();
        awg.configure(&mut hw, 1, &set(1, 100, 0, 40)).unwrap();
        let events = hw.events();
        let stop_a = events.iter().position(|e| *e == Event::DmaStop(DmaStream::DacA));
        let start_a = events.iter().position(|e| *e == Event::DmaStart(DmaStream::DacA, 2));
        let start_b = events.iter().position(|e| *e == Event::DmaStart(DmaStream::DacB, 40));
        assert!(stop_a.is_some() && stop_a < start_a && start_a < start_b);
        // both enables are the last two writes, back to back
        let n = events.len();
        assert_eq!(events[n - 2], Event::Write(Register::TimCr1(Timer::GeneratorA), Cr1::CEN.bits()));
        assert_eq!(events[n - 1], Event::Write(Register::TimCr1(Timer::GeneratorB), Cr1::CEN.bits()));
    }

    #[test]
    fn test_upload() {
        let mut hw = SimHardware::new();
        let mut awg = Generator::new(&FirmwareConfig::default());
        awg.configure(&mut hw, 0, &set(0, 100, 0, 40)).unwrap();
        assert!(awg.is_uploading());
        let first: [u8; FRAME_LEN] = core::array::from_fn(|n| if n % 2 == 0 { n as u8 } else { 0 });
        assert!(!awg.accept_upload(&first));
        let second = [0x11; FRAME_LEN];
        assert!(awg.accept_upload(&second));
        assert!(!awg.is_uploading());
        assert_eq!(awg.table(0)[0..3], [0, 2, 4]);
        assert_eq!(awg.table(0)[32..40], [0x1111; 8]);
        // bytes past the table length are not taken
        assert_eq!(awg.table(0)[40], MID_SCALE);
        assert!(!awg.accept_upload(&second));
    }

    #[test]
    fn test_short_table_takes_two_frames() {
        let mut hw = SimHardware::new();
        let mut awg = Generator::new(&FirmwareConfig::default());
        awg.configure(&mut hw, 1, &set(1, 100, 0, 4)).unwrap();
        assert!(!awg.accept_upload(&[0; FRAME_LEN]));
        assert!(awg.accept_upload(&[0; FRAME_LEN]));
        assert_eq!(hw.dma_len(DmaStream::DacB), Some(4));
    }

    #[test]
    fn test_sample_count_clamped() {
        let mut hw = SimHardware::new();
        let config = FirmwareConfig { lut_capacity: 40, ..Default::default() };
        let mut awg = Generator::new(&config);
        awg.configure(&mut hw, 0, &set(0, 100, 0, 64)).unwrap();
        assert_eq!(awg.configuration(0).sample_count, 40);
        assert_eq!(hw.dma_len(DmaStream::DacA), Some(40));
        assert!(!awg.accept_upload(&[0xff; FRAME_LEN]));
        assert!(awg.accept_upload(&[0xff; FRAME_LEN]));
        assert_eq!(awg.table(0)[39], 0xffff);
    }

    #[test]
    fn test_upload_into_tiny_table() {
        let mut hw = SimHardware::new();
        let config = FirmwareConfig { lut_capacity: 8, ..Default::default() };
        let mut awg = Generator::new(&config);
        awg.configure(&mut hw, 0, &set(0, 100, 0, 4)).unwrap();
        assert!(!awg.accept_upload(&[1; FRAME_LEN]));
        assert!(awg.accept_upload(&[1; FRAME_LEN]));
        assert_eq!(awg.table(0), &[0x0101; 8]);
    }

    #[test]
    fn test_upload_is_little_endian() {
        let mut hw = SimHardware::new();
        let mut awg = Generator::new(&FirmwareConfig::default());
        awg.configure(&mut hw, 1, &set(1, 100, 0, 32)).unwrap();
        let mut frame = [0; FRAME_LEN];
        frame[..4].copy_from_slice(&[0x34, 0x12, 0xff, 0x0f]);
        assert!(awg.accept_upload(&frame));
        assert_eq!(awg.table(1)[..3], [0x1234, 0x0fff, 0]);
    }
}
