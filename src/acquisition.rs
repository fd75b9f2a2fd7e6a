//! Oscilloscope and logic analyzer capture.
//!
//! Both engines keep their trigger state, sample buffers and stream cursor here. Interrupt
//! handlers feed them samples and watchdog/timer events; the scheduler polls them once per
//! quantum and reads a window of samples whenever they report data ready.

use crate::{FirmwareConfig, Result, WINDOW};
use crate::{SampleRate, TriggerMode, WatchdogWindows};
use crate::capture::SampleBuffer;
use crate::params::{ADC_CLOCK_PRESCALER, SHADOW_PRESCALER};
use crate::protocol::LogicSet;
use crate::trigger::{self, Actions, Confirm, LogicEvent, LogicTrigger, Phase, Progress};
use crate::trigger::{ScopeEvent, ScopeState};
use crate::regs::{Adc, DmaStream, Irq, Register, Timer};
use crate::regs::adc::{self, Cr, Isr};
use crate::regs::dma::DmaCr;
use crate::regs::tim::{Cr1, Dier};
use crate::sys::{Hardware, HardwareExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EdgeTrigger {
    source: Adc,
    windows: WatchdogWindows,
}

#[derive(Debug)]
pub struct ScopeCapture {
    buffers: [SampleBuffer; 2],
    state: ScopeState,
    trigger: Option<EdgeTrigger>,
    cursor: usize,
    shadow: usize,
    ready: bool,
    running: bool,
    shadow_step: usize,
    post_trigger: usize,
    settle_us: u32,
}

impl ScopeCapture {
    pub fn new(config: &FirmwareConfig) -> ScopeCapture {
        ScopeCapture {
            buffers: [
                SampleBuffer::new(config.scope_capacity),
                SampleBuffer::new(config.scope_capacity),
            ],
            state: ScopeState::NoTrigger,
            trigger: None,
            cursor: 0,
            shadow: 0,
            ready: false,
            running: false,
            shadow_step: config.shadow_step,
            post_trigger: config.post_trigger_samples,
            settle_us: config.watchdog_settle_us,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffers[0].capacity()
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn shadow(&self) -> usize {
        self.shadow
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn clear_ready(&mut self) {
        self.ready = false
    }

    /// The ADC and threshold windows currently armed for an edge trigger.
    pub fn watchdog(&self) -> Option<(Adc, WatchdogWindows)> {
        self.trigger.map(|trigger| (trigger.source, trigger.windows))
    }

    pub fn window(&self, channel: usize) -> [u16; WINDOW] {
        self.buffers[channel].window(self.cursor)
    }

    pub fn advance(&mut self) {
        self.cursor += WINDOW;
    }

    /// Starts the conversion clock and the shadow timer. Done once; the clocks keep running
    /// while the converters are stopped and restarted.
    pub fn start_clocks<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        hw.modify_cr1(Timer::AdcClock, |val| val.insert(Cr1::CEN))?;
        hw.modify_dier(Timer::AdcShadow, |val| val.insert(Dier::UIE))?;
        hw.modify_cr1(Timer::AdcShadow, |val| val.insert(Cr1::CEN))?;
        Ok(())
    }

    pub fn set_sample_rate<H: Hardware + ?Sized>(&mut self, hw: &mut H, mode: u8)
            -> Result<&'static SampleRate> {
        let rate = SampleRate::from_mode(mode);
        if rate.mode != mode {
            log::debug!("sample rate mode {} out of range, using mode {}", mode, rate.mode);
        }
        hw.program_timer(Timer::AdcClock, ADC_CLOCK_PRESCALER as u32, rate.clock_period as u32)?;
        hw.program_timer(Timer::AdcShadow, SHADOW_PRESCALER as u32, rate.shadow_period as u32)?;
        for adc in Adc::ALL {
            hw.write_register(Register::AdcSmpr(adc),
                adc::smpr(adc.input(), rate.sampling_time.smpr_code()))?;
        }
        log::debug!("sample rate {} Hz, sampling time {:?}", rate.hz, rate.sampling_time);
        Ok(rate)
    }

    pub fn stop<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        for adc in Adc::ALL {
            hw.stop_dma(DmaStream::adc(adc))?;
            hw.modify_adc_cr(adc, |val| val.remove(Cr::ADSTART))?;
        }
        self.running = false;
        Ok(())
    }

    /// Restarts capture into empty buffers with all counters at zero.
    pub fn start<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        for adc in Adc::ALL {
            hw.start_dma(DmaStream::adc(adc), self.capacity())?;
            hw.clear_adc_status(adc, Isr::WATCHDOGS)?;
        }
        hw.set_counter(Timer::AdcClock, 0)?;
        hw.set_counter(Timer::AdcShadow, 0)?;
        for buffer in self.buffers.iter_mut() {
            buffer.clear();
        }
        self.cursor = 0;
        self.shadow = 0;
        self.ready = false;
        for adc in Adc::ALL {
            hw.modify_adc_cr(adc, |val| val.insert(Cr::ADEN | Cr::ADSTART))?;
        }
        self.running = true;
        Ok(())
    }

    /// Selects the trigger mode. Capture must be stopped.
    pub fn arm<H: Hardware + ?Sized>(&mut self, hw: &mut H, mode: TriggerMode, channel: usize,
                                     level: u16) -> Result<()> {
        match mode {
            TriggerMode::FreeRun => {
                for adc in Adc::ALL {
                    hw.modify_adc_ier(adc, |val| val.remove(Isr::WATCHDOGS))?;
                    hw.clear_adc_status(adc, Isr::WATCHDOGS)?;
                    hw.modify_dma_cr(DmaStream::adc(adc), |val| val.insert(DmaCr::TCIE | DmaCr::HTIE))?;
                }
                self.trigger = None;
                self.state = ScopeState::NoTrigger;
                log::debug!("scope free-running");
            }
            TriggerMode::Edge(edge) => {
                let source = Adc::for_channel(channel);
                let windows = WatchdogWindows::new(level, edge);
                for adc in Adc::ALL {
                    hw.modify_dma_cr(DmaStream::adc(adc), |val| val.remove(DmaCr::TCIE | DmaCr::HTIE))?;
                }
                hw.write_register(Register::AdcTr1(source), windows.tr1())?;
                hw.write_register(Register::AdcTr2(source), windows.tr2())?;
                hw.modify_adc_ier(source.other(), |val| val.remove(Isr::WATCHDOGS))?;
                hw.modify_adc_ier(source, |val| val.insert(Isr::WATCHDOGS))?;
                for adc in Adc::ALL {
                    hw.clear_adc_status(adc, Isr::WATCHDOGS)?;
                }
                hw.set_irq_enabled(Irq::Adc(source), true)?;
                self.trigger = Some(EdgeTrigger { source, windows });
                self.state = ScopeState::PreTrigger(Confirm::Idle);
                log::debug!("scope armed for {:?} edge at {} on {:?}, windows {:?}",
                            edge, level, source, windows);
            }
        }
        Ok(())
    }

    /// DMA path: one conversion result from each ADC.
    pub fn on_conversion<H: Hardware + ?Sized>(&mut self, hw: &mut H, samples: [u16; 2])
            -> Result<()> {
        if !self.running {
            return Ok(())
        }
        let mut wrapped = false;
        for (buffer, sample) in self.buffers.iter_mut().zip(samples) {
            wrapped |= buffer.push(sample);
        }
        // transfer complete interrupt is only enabled when free-running
        if wrapped && self.state == ScopeState::NoTrigger {
            log::trace!("scope buffer full");
            self.stop(hw)?;
        }
        Ok(())
    }

    pub fn on_shadow_tick(&mut self) {
        self.shadow = (self.shadow + self.shadow_step).min(self.capacity());
    }

    pub fn on_adc_interrupt<H: Hardware + ?Sized>(&mut self, hw: &mut H, adc: Adc) -> Result<()> {
        let status = hw.read_adc_status(adc)?;
        if self.trigger.map(|trigger| trigger.source) == Some(adc) {
            if status.contains(Isr::AWD2) {
                self.step(hw, ScopeEvent::WatchdogCoarse)?;
            }
            if status.contains(Isr::AWD1) {
                self.step(hw, ScopeEvent::WatchdogNarrow)?;
            }
        }
        hw.clear_adc_status(adc, status & Isr::WATCHDOGS)
    }

    pub fn poll<H: Hardware + ?Sized>(&mut self, hw: &mut H, paused: bool) -> Result<()> {
        let progress = Progress {
            cursor: self.cursor,
            shadow: self.shadow,
            capacity: self.capacity(),
            post_trigger: self.post_trigger,
            paused,
        };
        self.step(hw, ScopeEvent::Poll(progress))
    }

    fn step<H: Hardware + ?Sized>(&mut self, hw: &mut H, event: ScopeEvent) -> Result<()> {
        let (state, actions) = trigger::scope_step(self.state, event);
        if state != self.state {
            log::debug!("scope {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.apply(hw, actions)
    }

    fn apply<H: Hardware + ?Sized>(&mut self, hw: &mut H, actions: Actions) -> Result<()> {
        if actions.contains(Actions::MASK_WATCHDOG) {
            if let Some(trigger) = self.trigger {
                hw.set_irq_enabled(Irq::Adc(trigger.source), false)?;
            }
        }
        if actions.contains(Actions::RESET_COUNTERS) {
            self.cursor = 0;
            self.shadow = 0;
            self.ready = false;
        }
        if actions.contains(Actions::STOP) {
            self.stop(hw)?;
        }
        if actions.contains(Actions::RESTART) {
            self.start(hw)?;
        }
        if actions.contains(Actions::REARM_WATCHDOG) {
            if let Some(trigger) = self.trigger {
                hw.delay_us(self.settle_us);
                hw.clear_adc_status(trigger.source, Isr::WATCHDOGS)?;
                hw.modify_adc_ier(trigger.source, |val| val.insert(Isr::WATCHDOGS))?;
                hw.set_irq_enabled(Irq::Adc(trigger.source), true)?;
            }
        }
        if actions.contains(Actions::MARK_READY) {
            self.ready = true;
        }
        Ok(())
    }
}

/// Capture clock and countdown settings used until the first `LogicSet`.
const DEFAULT_TIMING: LogicSet = LogicSet {
    control: 0,
    pin_mask: 0,
    edge: 0,
    period16: 0xffff,
    prescaler16: 1,
    period32: 0x8ca0,
};

#[derive(Debug)]
pub struct LogicCapture {
    buffer: SampleBuffer,
    phase: Phase,
    trigger: LogicTrigger,
    previous: u16,
    sampling: bool,
    cursor: usize,
    ready: bool,
}

impl LogicCapture {
    pub fn new(config: &FirmwareConfig) -> LogicCapture {
        LogicCapture {
            buffer: SampleBuffer::new(config.logic_capacity),
            phase: Phase::NoTrigger,
            trigger: Default::default(),
            previous: 0,
            sampling: false,
            cursor: 0,
            ready: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn clear_ready(&mut self) {
        self.ready = false
    }

    pub fn window(&self) -> [u16; WINDOW] {
        self.buffer.window(self.cursor)
    }

    pub fn advance(&mut self) {
        self.cursor += WINDOW;
    }

    /// Programs the default timing; the analyzer stays idle.
    pub fn init<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        Self::program_timers(hw, &DEFAULT_TIMING)?;
        self.phase = Phase::NoTrigger;
        Ok(())
    }

    pub fn configure<H: Hardware + ?Sized>(&mut self, hw: &mut H, set: &LogicSet) -> Result<()> {
        self.stop_clock(hw)?;
        self.stop_countdown(hw)?;
        self.trigger = LogicTrigger::new(set.pin_mask, set.edge);
        if self.trigger.edge.is_none() {
            log::warn!("logic trigger edge code {} not recognized, trigger will not fire", set.edge);
        }
        self.ready = false;
        if set.control == 1 {
            Self::program_timers(hw, set)?;
            self.cursor = 0;
            self.previous = 0;
            self.buffer.zero();
            self.start_clock(hw)?;
            self.phase = Phase::PreTrigger;
            log::debug!("logic analyzer armed, mask {:#06x} edge {:?}",
                        self.trigger.mask, self.trigger.edge);
        } else {
            self.phase = Phase::NoTrigger;
            log::debug!("logic analyzer stopped");
        }
        Ok(())
    }

    /// Capture clock interrupt: `port` is the value just read from the logic input port.
    pub fn on_sample<H: Hardware + ?Sized>(&mut self, hw: &mut H, port: u16) -> Result<()> {
        if !self.sampling {
            return Ok(())
        }
        let event = LogicEvent::Sample { previous: self.previous, current: port };
        self.step(hw, event)?;
        self.buffer.push(port);
        self.previous = port;
        Ok(())
    }

    /// Countdown timer update interrupt: the post-trigger window has elapsed.
    pub fn on_countdown<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        self.step(hw, LogicEvent::CountdownElapsed)
    }

    pub fn poll<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        let event = LogicEvent::Poll { cursor: self.cursor, capacity: self.buffer.capacity() };
        self.step(hw, event)
    }

    fn step<H: Hardware + ?Sized>(&mut self, hw: &mut H, event: LogicEvent) -> Result<()> {
        let (phase, actions) = trigger::logic_step(self.phase, &self.trigger, event);
        if phase != self.phase {
            log::debug!("logic {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;

        if actions.contains(Actions::START_COUNTDOWN) {
            hw.set_counter(Timer::LogicCountdown, 0)?;
            hw.modify_dier(Timer::LogicCountdown, |val| val.insert(Dier::UIE))?;
            hw.modify_cr1(Timer::LogicCountdown, |val| val.insert(Cr1::CEN | Cr1::OPM))?;
        }
        if actions.contains(Actions::STOP) {
            self.stop_clock(hw)?;
            self.stop_countdown(hw)?;
        }
        if actions.contains(Actions::RESET_COUNTERS) {
            self.cursor = 0;
            self.ready = false;
        }
        if actions.contains(Actions::RESTART) {
            self.buffer.zero();
            self.cursor = 0;
            self.ready = false;
            self.previous = 0;
            self.start_clock(hw)?;
        }
        if actions.contains(Actions::MARK_READY) {
            self.ready = true;
        }
        Ok(())
    }

    fn program_timers<H: Hardware + ?Sized>(hw: &mut H, timing: &LogicSet) -> Result<()> {
        hw.program_timer(Timer::LogicCountdown, timing.prescaler16 as u32, timing.period16 as u32)?;
        hw.program_timer(Timer::LogicClock, 0, timing.period32)?;
        // sample on the compare match halfway through the period
        hw.write_register(Register::TimCcr(Timer::LogicClock, 0), timing.period32 / 2)
    }

    fn start_clock<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        hw.modify_dier(Timer::LogicClock, |val| val.insert(Dier::CC1IE))?;
        hw.modify_cr1(Timer::LogicClock, |val| val.insert(Cr1::CEN))?;
        self.sampling = true;
        Ok(())
    }

    fn stop_clock<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        hw.modify_dier(Timer::LogicClock, |val| val.remove(Dier::CC1IE))?;
        hw.modify_cr1(Timer::LogicClock, |val| val.remove(Cr1::CEN))?;
        self.sampling = false;
        Ok(())
    }

    fn stop_countdown<H: Hardware + ?Sized>(&mut self, hw: &mut H) -> Result<()> {
        hw.modify_dier(Timer::LogicCountdown, |val| val.remove(Dier::UIE))?;
        hw.modify_cr1(Timer::LogicCountdown, |val| val.remove(Cr1::CEN | Cr1::OPM))
    }
}
