use bitflags::bitflags;

/// Hardware timers and the role each one plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// TIM1: PWM compare outputs providing the DC offset of each generator channel
    Offset,
    /// TIM6: sample clock of generator channel A
    GeneratorA,
    /// TIM7: sample clock of generator channel B
    GeneratorB,
    /// TIM8: ADC conversion trigger
    AdcClock,
    /// TIM17: shadow timer, ticks once per shadow step of conversions
    AdcShadow,
    /// TIM5 (32-bit): logic analyzer sample clock, PWM pulse interrupt per sample
    LogicClock,
    /// TIM16: logic analyzer post-trigger countdown
    LogicCountdown,
}

impl Timer {
    pub fn generator(channel: usize) -> Self {
        match channel {
            0 => Timer::GeneratorA,
            1 => Timer::GeneratorB,
            _ => unreachable!()
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Timer::Offset         => "TIM1",
            Timer::GeneratorA     => "TIM6",
            Timer::GeneratorB     => "TIM7",
            Timer::AdcClock       => "TIM8",
            Timer::AdcShadow      => "TIM17",
            Timer::LogicClock     => "TIM5",
            Timer::LogicCountdown => "TIM16",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr1: u32 {
        /// Counter enable
        const CEN  = 1<<0;
        /// Update disable
        const UDIS = 1<<1;
        /// Update request source
        const URS  = 1<<2;
        /// One-pulse mode: counter stops at the next update event
        const OPM  = 1<<3;
        /// Auto-reload preload enable
        const ARPE = 1<<7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dier: u32 {
        /// Update interrupt enable
        const UIE   = 1<<0;
        /// Capture/compare 1 interrupt enable
        const CC1IE = 1<<1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Egr: u32 {
        /// Update generation: reinitializes the counter and the prescaler counter
        const UG = 1<<0;
    }
}
