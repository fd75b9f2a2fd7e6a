use bitflags::bitflags;

use super::Adc;

/// DMA channels moving samples between memory and the converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmaStream {
    /// GPDMA1 channel 1: lookup table A to DAC channel 1
    DacA,
    /// GPDMA1 channel 2: lookup table B to DAC channel 2
    DacB,
    /// GPDMA2 channel 0: ADC1 to sample buffer A
    AdcA,
    /// GPDMA2 channel 1: ADC2 to sample buffer B
    AdcB,
}

impl DmaStream {
    pub fn adc(adc: Adc) -> Self {
        match adc {
            Adc::Adc1 => DmaStream::AdcA,
            Adc::Adc2 => DmaStream::AdcB,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DmaCr: u32 {
        /// Transfer complete interrupt enable
        const TCIE = 1<<8;
        /// Half transfer interrupt enable
        const HTIE = 1<<9;
    }
}
