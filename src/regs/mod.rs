//! Peripheral registers touched by the firmware core.
//!
//! Only the registers and bits the acquisition, waveform and streaming paths actually use are
//! modelled; clock tree and pin mux setup is done once by board support code and is not visible
//! here.

pub mod tim;
pub mod adc;
pub mod dma;
pub mod gpio;

pub use tim::Timer;
pub use adc::Adc;
pub use dma::DmaStream;
pub use gpio::{Pin, Port};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Timer control register 1
    TimCr1(Timer),
    /// Timer DMA/interrupt enable register
    TimDier(Timer),
    /// Timer event generation register (write-only)
    TimEgr(Timer),
    /// Timer counter
    TimCnt(Timer),
    /// Timer prescaler
    TimPsc(Timer),
    /// Timer auto-reload register
    TimArr(Timer),
    /// Timer capture/compare register; channel is zero-based
    TimCcr(Timer, u8),

    /// ADC control register
    AdcCr(Adc),
    /// ADC interrupt enable register
    AdcIer(Adc),
    /// ADC interrupt and status register (write 1 to clear)
    AdcIsr(Adc),
    /// ADC sampling time register
    AdcSmpr(Adc),
    /// ADC analog watchdog 1 threshold register
    AdcTr1(Adc),
    /// ADC analog watchdog 2 threshold register
    AdcTr2(Adc),

    /// DMA channel control register
    DmaCr(DmaStream),
}

/// Interrupt lines that the firmware masks and unmasks at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Irq {
    Adc(Adc),
}
