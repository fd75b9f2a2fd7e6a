//! Build-time firmware configuration, and the per-channel settings last applied by commands.

use bitflags::bitflags;

use crate::{Error, Result, FRAME_LEN, NO_DATA, WINDOW};
use crate::regs::gpio::FrontEnd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakePolicy {
    /// Acknowledge a handshake frame only if its magic string matches.
    #[default]
    AckOnMatch,
    /// Acknowledge every handshake frame; a wrong magic string is only logged.
    AlwaysAck,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FirmwareConfig {
    /// Samples per oscilloscope channel buffer.
    pub scope_capacity: usize,
    /// Samples in the logic analyzer buffer.
    pub logic_capacity: usize,
    /// Samples per generator lookup table.
    pub lut_capacity: usize,
    /// Conversions per shadow timer tick.
    pub shadow_step: usize,
    /// Samples acquired after an oscilloscope trigger before acquisition stops.
    pub post_trigger_samples: usize,
    /// Busy-wait after each data frame, so the host keeps up.
    pub transmit_pacing_us: u32,
    /// Busy-wait between restarting the ADCs and unmasking their watchdog interrupts.
    pub watchdog_settle_us: u32,
    pub handshake: HandshakePolicy,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        FirmwareConfig {
            scope_capacity: 30000,
            logic_capacity: 30000,
            lut_capacity: 4096,
            shadow_step: 100,
            post_trigger_samples: 100,
            transmit_pacing_us: 150,
            watchdog_settle_us: 10,
            handshake: Default::default(),
        }
    }
}

impl FirmwareConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, capacity) in [("scope", self.scope_capacity), ("logic", self.logic_capacity)] {
            // cursors are sent as u16 and must never collide with the "no data" marker
            if capacity == 0 || capacity >= NO_DATA as usize {
                return Err(Error::Config(format!(
                    "{} capacity {} must be within 1..{}", name, capacity, NO_DATA)))
            }
            if capacity % WINDOW != 0 {
                return Err(Error::Config(format!(
                    "{} capacity {} is not a multiple of {}", name, capacity, WINDOW)))
            }
        }
        // an upload is never shorter than two frames, i.e. 64 samples
        if self.lut_capacity < FRAME_LEN || self.lut_capacity > u16::MAX as usize {
            return Err(Error::Config(format!(
                "lookup table capacity {} must be within {}..={}",
                self.lut_capacity, FRAME_LEN, u16::MAX)))
        }
        if self.shadow_step == 0 {
            return Err(Error::Config("shadow step must be nonzero".to_owned()))
        }
        if self.post_trigger_samples > self.scope_capacity {
            return Err(Error::Config(format!(
                "post-trigger window {} exceeds buffer capacity {}",
                self.post_trigger_samples, self.scope_capacity)))
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coupling {
    #[default]
    DC,
    AC
}

bitflags! {
    /// Amplifier stages switched into the signal path; more than one may be selected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GainSelect: u8 {
        const X10  = 1<<0;
        const X5   = 1<<1;
        const X2_5 = 1<<2;
        const X1   = 1<<3;
    }
}

/// Settings of one oscilloscope input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelConfiguration {
    pub coupling: Coupling,
    pub attenuated: bool,
    pub gain: GainSelect,
    /// Sampling time code requested by the host. The effective ADC sampling time follows the
    /// sample rate mode; this is kept for reporting.
    pub sample_time: u8,
}

impl ChannelConfiguration {
    pub fn front_end(&self) -> FrontEnd {
        let mut value = FrontEnd::empty();
        value.set(FrontEnd::OFFSET, self.coupling == Coupling::AC);
        value.set(FrontEnd::ATTENUATION, self.attenuated);
        value.set(FrontEnd::AMP10, self.gain.contains(GainSelect::X10));
        value.set(FrontEnd::AMP5, self.gain.contains(GainSelect::X5));
        value.set(FrontEnd::AMP2_5, self.gain.contains(GainSelect::X2_5));
        value.set(FrontEnd::AMP1, self.gain.contains(GainSelect::X1));
        value
    }
}

/// Settings of one generator channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfiguration {
    pub prescaler: u16,
    pub period: u16,
    /// DC offset, as a compare value of the 12-bit offset PWM.
    pub compare_offset: u16,
    /// Samples of the lookup table played back per period.
    pub sample_count: u16,
    /// Counter target aligning this channel against the other one.
    pub phase: u16,
    pub high_gain: bool,
}

impl Default for GeneratorConfiguration {
    fn default() -> Self {
        GeneratorConfiguration {
            prescaler: 3 - 1,
            period: 7585,
            compare_offset: 2048, // mid-scale
            sample_count: 2,
            phase: 0,
            high_gain: false,
        }
    }
}
