use bitflags::bitflags;

/// The two ADCs; ADC1 digitizes oscilloscope channel 0, ADC2 channel 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adc {
    Adc1,
    Adc2,
}

impl Adc {
    pub const ALL: [Adc; 2] = [Adc::Adc1, Adc::Adc2];

    pub fn for_channel(channel: usize) -> Self {
        match channel {
            0 => Adc::Adc1,
            1 => Adc::Adc2,
            _ => unreachable!()
        }
    }

    pub fn index(self) -> usize {
        match self {
            Adc::Adc1 => 0,
            Adc::Adc2 => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Adc::Adc1 => Adc::Adc2,
            Adc::Adc2 => Adc::Adc1,
        }
    }

    /// Analog input the front-end is wired to.
    pub fn input(self) -> u32 {
        match self {
            Adc::Adc1 => 0,
            Adc::Adc2 => 3,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr: u32 {
        const ADEN    = 1<<0;
        const ADDIS   = 1<<1;
        const ADSTART = 1<<2;
        const ADSTP   = 1<<4;
    }
}

bitflags! {
    /// Layout shared by the interrupt enable (IER) and interrupt status (ISR) registers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Isr: u32 {
        /// End of conversion
        const EOC  = 1<<2;
        /// Overrun
        const OVR  = 1<<4;
        /// Analog watchdog 1: 12-bit narrow window around the trigger level
        const AWD1 = 1<<7;
        /// Analog watchdog 2: 8-bit coarse window offset from the trigger level
        const AWD2 = 1<<8;
    }
}

impl Isr {
    pub const WATCHDOGS: Isr = Isr::AWD1.union(Isr::AWD2);
}

/// Packs a 12-bit watchdog 1 window into the TR1 layout (LT1 in 11:0, HT1 in 27:16).
pub fn tr1(low: u16, high: u16) -> u32 {
    (low as u32 & 0xfff) | (high as u32 & 0xfff) << 16
}

/// Packs an 8-bit watchdog 2 window into the TR2 layout (LT2 in 7:0, HT2 in 23:16).
pub fn tr2(low: u8, high: u8) -> u32 {
    low as u32 | (high as u32) << 16
}

/// Places a 3-bit sampling time code into the SMPR field of `input`.
pub fn smpr(input: u32, code: u8) -> u32 {
    ((code & 0b111) as u32) << (3 * input)
}
