use crate::{Error, Result};
use crate::regs::{Register, Irq, Pin, DmaStream, Timer, Adc};
use crate::regs::tim::{Cr1, Dier, Egr};
use crate::regs::adc::{Cr, Isr};
use crate::regs::dma::DmaCr;

pub mod sim;

/// Boundary between the firmware core and the microcontroller.
///
/// A board support crate implements this over the memory-mapped peripherals and the USB CDC
/// class; [`sim::SimHardware`] implements it over an in-memory register file. The frame
/// transport is part of the same trait since it is the only other thing the core talks to.
pub trait Hardware {
    fn read_register(&self, reg: Register) -> Result<u32>;
    fn write_register(&mut self, reg: Register, value: u32) -> Result<()>;

    fn write_pin(&mut self, pin: Pin, high: bool) -> Result<()>;

    /// Starts a circular transfer of `len` half-words on `stream`.
    fn start_dma(&mut self, stream: DmaStream, len: usize) -> Result<()>;
    fn stop_dma(&mut self, stream: DmaStream) -> Result<()>;

    fn set_irq_enabled(&mut self, irq: Irq, enabled: bool) -> Result<()>;

    /// Queues `frame` for the host. Returns [`Error::Busy`] if the previous frame has not been
    /// picked up yet; the frame is then lost.
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;

    /// Fetches the next 64-byte frame from the host, if one has arrived.
    fn receive(&mut self, frame: &mut [u8; crate::FRAME_LEN]) -> Result<bool>;

    fn delay_us(&mut self, us: u32);
}

/// Typed register access on top of [`Hardware`].
pub trait HardwareExt: Hardware {
    fn modify_register<F: FnOnce(u32) -> u32>(&mut self, reg: Register, f: F) -> Result<()> {
        let value = self.read_register(reg)?;
        self.write_register(reg, f(value))
    }

    fn read_cr1(&self, timer: Timer) -> Result<Cr1> {
        Ok(Cr1::from_bits_retain(self.read_register(Register::TimCr1(timer))?))
    }

    fn write_cr1(&mut self, timer: Timer, value: Cr1) -> Result<()> {
        log::trace!("{}.CR1 = {:?}", timer.name(), value);
        self.write_register(Register::TimCr1(timer), value.bits())
    }

    fn modify_cr1<F: FnOnce(&mut Cr1)>(&mut self, timer: Timer, f: F) -> Result<()> {
        let mut value = self.read_cr1(timer)?;
        f(&mut value);
        self.write_cr1(timer, value)
    }

    fn modify_dier<F: FnOnce(&mut Dier)>(&mut self, timer: Timer, f: F) -> Result<()> {
        let mut value = Dier::from_bits_retain(self.read_register(Register::TimDier(timer))?);
        f(&mut value);
        log::trace!("{}.DIER = {:?}", timer.name(), value);
        self.write_register(Register::TimDier(timer), value.bits())
    }

    /// Generates an update event, reloading the prescaler and zeroing the counter.
    fn force_update(&mut self, timer: Timer) -> Result<()> {
        log::trace!("{}.EGR = UG", timer.name());
        self.write_register(Register::TimEgr(timer), Egr::UG.bits())
    }

    fn set_counter(&mut self, timer: Timer, value: u32) -> Result<()> {
        log::trace!("{}.CNT = {}", timer.name(), value);
        self.write_register(Register::TimCnt(timer), value)
    }

    /// Configures timer `timer` for `prescaler + 1` and `period + 1` division.
    fn program_timer(&mut self, timer: Timer, prescaler: u32, period: u32) -> Result<()> {
        log::trace!("{}: PSC = {}, ARR = {}", timer.name(), prescaler, period);
        self.write_register(Register::TimPsc(timer), prescaler)?;
        self.write_register(Register::TimArr(timer), period)
    }

    fn modify_adc_cr<F: FnOnce(&mut Cr)>(&mut self, adc: Adc, f: F) -> Result<()> {
        let mut value = Cr::from_bits_retain(self.read_register(Register::AdcCr(adc))?);
        f(&mut value);
        log::trace!("{:?}.CR = {:?}", adc, value);
        self.write_register(Register::AdcCr(adc), value.bits())
    }

    fn modify_adc_ier<F: FnOnce(&mut Isr)>(&mut self, adc: Adc, f: F) -> Result<()> {
        let mut value = Isr::from_bits_retain(self.read_register(Register::AdcIer(adc))?);
        f(&mut value);
        log::trace!("{:?}.IER = {:?}", adc, value);
        self.write_register(Register::AdcIer(adc), value.bits())
    }

    fn read_adc_status(&self, adc: Adc) -> Result<Isr> {
        Ok(Isr::from_bits_retain(self.read_register(Register::AdcIsr(adc))?))
    }

    /// Clears `flags` in the ADC status register (write 1 to clear).
    fn clear_adc_status(&mut self, adc: Adc, flags: Isr) -> Result<()> {
        self.write_register(Register::AdcIsr(adc), flags.bits())
    }

    fn modify_dma_cr<F: FnOnce(&mut DmaCr)>(&mut self, stream: DmaStream, f: F) -> Result<()> {
        let mut value = DmaCr::from_bits_retain(self.read_register(Register::DmaCr(stream))?);
        f(&mut value);
        log::trace!("{:?}.CR = {:?}", stream, value);
        self.write_register(Register::DmaCr(stream), value.bits())
    }

    /// Sends a frame, treating a busy transport as a dropped frame rather than a failure.
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        match self.transmit(frame) {
            Ok(()) => Ok(()),
            Err(Error::Busy) => {
                log::trace!("transport busy, dropped frame of type {}", frame[0]);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

impl<H: Hardware + ?Sized> HardwareExt for H {}
