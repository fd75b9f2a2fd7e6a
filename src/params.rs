//! Mapping of command codes onto timer, ADC and watchdog register values.

use crate::Edge;
use crate::regs::adc::{self, Isr};

/// ADC sampling time, in ADC clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingTime {
    #[default]
    Cycles2_5,
    Cycles6_5,
    Cycles12_5,
    Cycles24_5,
    Cycles47_5,
    Cycles92_5,
    Cycles247_5,
    Cycles640_5,
}

impl SamplingTime {
    pub(crate) fn smpr_code(self) -> u8 {
        self as u8
    }
}

/// Prescaler of the ADC conversion timer; the timer runs from a 250 MHz clock.
pub const ADC_CLOCK_PRESCALER: u16 = 25 - 1;
/// Prescaler of the shadow timer.
pub const SHADOW_PRESCALER: u16 = 500 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRate {
    pub mode: u8,
    pub hz: u32,
    /// Auto-reload value of the ADC conversion timer.
    pub clock_period: u16,
    /// Auto-reload value of the shadow timer; always five times slower than the conversion
    /// timer, which with the prescaler ratio gives one tick per 100 conversions.
    pub shadow_period: u16,
    pub sampling_time: SamplingTime,
}

macro_rules! sample_rates {
    ( $( $mode:literal => $hz:literal, $clock:literal, $shadow:literal, $smp:ident; )+ ) => {
        const SAMPLE_RATES: &[SampleRate] = &[
            $( SampleRate {
                mode: $mode,
                hz: $hz,
                clock_period: $clock - 1,
                shadow_period: $shadow - 1,
                sampling_time: SamplingTime::$smp,
            }, )+
        ];
    }
}

sample_rates! {
     0 => 5_000_000,     2,     10, Cycles2_5;
     1 => 2_000_000,     5,     25, Cycles2_5;
     2 => 1_000_000,    10,     50, Cycles12_5;
     3 =>   500_000,    20,    100, Cycles47_5;
     4 =>   200_000,    50,    250, Cycles92_5;
     5 =>   100_000,   100,    500, Cycles247_5;
     6 =>    50_000,   200,   1000, Cycles640_5;
     7 =>    20_000,   500,   2500, Cycles640_5;
     8 =>    10_000,  1000,   5000, Cycles640_5;
     9 =>     5_000,  2000,  10000, Cycles640_5;
    10 =>     2_000,  5000,  25000, Cycles640_5;
    11 =>     1_000, 10000,  50000, Cycles640_5;
}

impl SampleRate {
    /// Looks up the configuration for `mode`. Codes outside the table select the fastest rate.
    pub fn from_mode(mode: u8) -> &'static SampleRate {
        SAMPLE_RATES.get(mode as usize).unwrap_or(&SAMPLE_RATES[0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    #[default]
    FreeRun,
    Edge(Edge),
}

impl TriggerMode {
    /// Decodes the trigger mode byte; unknown codes free-run.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => TriggerMode::Edge(Edge::Rising),
            2 => TriggerMode::Edge(Edge::Falling),
            _ => TriggerMode::FreeRun,
        }
    }
}

const ADC_MAX: u16 = 0xfff;

/// Threshold windows of the two analog watchdogs for an edge trigger at `level`.
///
/// The narrow window (watchdog 1, 12-bit) is centered on the level. The coarse window (watchdog 2,
/// 8-bit, so the 12-bit thresholds are shifted right by 4) sits below the level for a rising edge
/// and above it for a falling edge. A signal crossing the level in the wanted direction passes
/// through the coarse window first and the narrow window second; that ordering is what tells the
/// two edges apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogWindows {
    pub narrow: (u16, u16),
    pub coarse: (u8, u8),
}

impl WatchdogWindows {
    pub fn new(level: u16, edge: Edge) -> Self {
        let level = level.min(ADC_MAX);
        let narrow = (level.saturating_sub(15), (level + 15).min(ADC_MAX));
        let coarse = match edge {
            Edge::Rising  => (level.saturating_sub(65), level.saturating_sub(35)),
            Edge::Falling => ((level + 35).min(ADC_MAX), (level + 65).min(ADC_MAX)),
        };
        WatchdogWindows {
            narrow,
            coarse: ((coarse.0 >> 4) as u8, (coarse.1 >> 4) as u8),
        }
    }

    pub fn tr1(&self) -> u32 {
        adc::tr1(self.narrow.0, self.narrow.1)
    }

    pub fn tr2(&self) -> u32 {
        adc::tr2(self.coarse.0, self.coarse.1)
    }

    /// Watchdog flags a conversion result of `sample` raises, treating each watchdog as a window
    /// comparator that fires while the sample is inside its window.
    pub fn evaluate(&self, sample: u16) -> Isr {
        let mut flags = Isr::empty();
        if (self.narrow.0..=self.narrow.1).contains(&sample) {
            flags.insert(Isr::AWD1);
        }
        let coarse = (sample.min(ADC_MAX) >> 4) as u8;
        if (self.coarse.0..=self.coarse.1).contains(&coarse) {
            flags.insert(Isr::AWD2);
        }
        flags
    }
}
