//! In-memory stand-in for the microcontroller, used by the tests and the simulation binary.
//!
//! Registers read back what was last written, with two exceptions that the firmware relies on:
//! an update event (`EGR.UG`) zeroes the timer counter, and the ADC status register is write 1
//! to clear. Every side effect is appended to an event log so that tests can check ordering.

use std::collections::{HashMap, VecDeque};

use crate::{Error, Result, FRAME_LEN};
use crate::regs::{Register, Irq, Pin, DmaStream};
use crate::regs::adc::Isr;
use crate::regs::tim::Egr;
use super::Hardware;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(Register, u32),
    Pin(Pin, bool),
    DmaStart(DmaStream, usize),
    DmaStop(DmaStream),
    Irq(Irq, bool),
    Transmit(usize),
    Delay(u32),
}

#[derive(Debug, Default)]
pub struct SimHardware {
    registers: HashMap<Register, u32>,
    pins: HashMap<Pin, bool>,
    dma: HashMap<DmaStream, usize>,
    masked: HashMap<Irq, bool>,
    inbox: VecDeque<[u8; FRAME_LEN]>,
    transmitted: Vec<Vec<u8>>,
    events: Vec<Event>,
    busy: bool,
    failing: Option<Register>,
    elapsed_us: u64,
}

impl SimHardware {
    pub fn new() -> SimHardware {
        Default::default()
    }

    /// Queues a frame as if the host had sent it.
    pub fn push_frame(&mut self, frame: [u8; FRAME_LEN]) {
        self.inbox.push_back(frame);
    }

    /// Makes the transport refuse every frame until cleared.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Makes every later write to `reg` fail, as if the peripheral did not respond.
    pub fn fail_writes_to(&mut self, reg: Register) {
        self.failing = Some(reg);
    }

    /// Sets status bits the way the converter would after a watchdog hit.
    pub fn raise_adc_status(&mut self, adc: crate::regs::Adc, flags: Isr) {
        *self.registers.entry(Register::AdcIsr(adc)).or_default() |= flags.bits();
    }

    pub fn register(&self, reg: Register) -> u32 {
        self.registers.get(&reg).copied().unwrap_or(0)
    }

    pub fn pin(&self, pin: Pin) -> bool {
        self.pins.get(&pin).copied().unwrap_or(false)
    }

    /// Length of the running transfer on `stream`, if any.
    pub fn dma_len(&self, stream: DmaStream) -> Option<usize> {
        self.dma.get(&stream).copied()
    }

    pub fn irq_enabled(&self, irq: Irq) -> bool {
        self.masked.get(&irq).map(|masked| !masked).unwrap_or(true)
    }

    pub fn transmitted(&self) -> &[Vec<u8>] {
        &self.transmitted[..]
    }

    pub fn take_transmitted(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.transmitted)
    }

    pub fn events(&self) -> &[Event] {
        &self.events[..]
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }
}

impl Hardware for SimHardware {
    fn read_register(&self, reg: Register) -> Result<u32> {
        Ok(match reg {
            Register::TimEgr(_) => 0,
            _ => self.register(reg),
        })
    }

    fn write_register(&mut self, reg: Register, value: u32) -> Result<()> {
        if self.failing == Some(reg) {
            return Err(Error::Peripheral("register write not acknowledged"))
        }
        self.events.push(Event::Write(reg, value));
        match reg {
            Register::TimEgr(timer) => {
                if Egr::from_bits_retain(value).contains(Egr::UG) {
                    self.registers.insert(Register::TimCnt(timer), 0);
                }
            }
            Register::AdcIsr(_) => {
                *self.registers.entry(reg).or_default() &= !value;
            }
            Register::TimCnt(_) => {
                // 16-bit counters; TIM5 is 32-bit but never has its counter written directly
                self.registers.insert(reg, value & 0xffff);
            }
            _ => {
                self.registers.insert(reg, value);
            }
        }
        Ok(())
    }

    fn write_pin(&mut self, pin: Pin, high: bool) -> Result<()> {
        self.events.push(Event::Pin(pin, high));
        self.pins.insert(pin, high);
        Ok(())
    }

    fn start_dma(&mut self, stream: DmaStream, len: usize) -> Result<()> {
        self.events.push(Event::DmaStart(stream, len));
        self.dma.insert(stream, len);
        Ok(())
    }

    fn stop_dma(&mut self, stream: DmaStream) -> Result<()> {
        self.events.push(Event::DmaStop(stream));
        self.dma.remove(&stream);
        Ok(())
    }

    fn set_irq_enabled(&mut self, irq: Irq, enabled: bool) -> Result<()> {
        self.events.push(Event::Irq(irq, enabled));
        self.masked.insert(irq, !enabled);
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        if self.busy {
            return Err(Error::Busy)
        }
        self.events.push(Event::Transmit(frame.len()));
        self.transmitted.push(frame.to_vec());
        Ok(())
    }

    fn receive(&mut self, frame: &mut [u8; FRAME_LEN]) -> Result<bool> {
        match self.inbox.pop_front() {
            Some(next) => {
                *frame = next;
                Ok(true)
            }
            None => Ok(false)
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.events.push(Event::Delay(us));
        self.elapsed_us += us as u64;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::regs::{Adc, Timer};
    use crate::sys::HardwareExt;

    #[test]
    fn test_update_event_zeroes_counter() {
        let mut hw = SimHardware::new();
        hw.set_counter(Timer::GeneratorA, 1234).unwrap();
        assert_eq!(hw.register(Register::TimCnt(Timer::GeneratorA)), 1234);
        hw.force_update(Timer::GeneratorA).unwrap();
        assert_eq!(hw.register(Register::TimCnt(Timer::GeneratorA)), 0);
    }

    #[test]
    fn test_adc_status_write_one_to_clear() {
        let mut hw = SimHardware::new();
        hw.raise_adc_status(Adc::Adc2, Isr::AWD1 | Isr::AWD2 | Isr::EOC);
        hw.clear_adc_status(Adc::Adc2, Isr::WATCHDOGS).unwrap();
        assert_eq!(hw.read_adc_status(Adc::Adc2).unwrap(), Isr::EOC);
    }

    #[test]
    fn test_busy_transport_drops() {
        let mut hw = SimHardware::new();
        hw.set_busy(true);
        assert_eq!(hw.transmit(&[5; FRAME_LEN]), Err(Error::Busy));
        assert_eq!(hw.send_frame(&[5; FRAME_LEN]), Ok(()));
        assert!(hw.transmitted().is_empty());
    }

    #[test]
    fn test_injected_failure() {
        let mut hw = SimHardware::new();
        hw.fail_writes_to(Register::TimCr1(Timer::AdcClock));
        assert!(hw.modify_cr1(Timer::AdcClock, |val| val.insert(crate::regs::tim::Cr1::CEN)).is_err());
    }
}
