use crate::{ChannelConfiguration, FirmwareConfig, GeneratorConfiguration, Result, FRAME_LEN};
use crate::{DataFrame, Phase, ScopeState, TriggerMode, WatchdogWindows};
use crate::acquisition::{LogicCapture, ScopeCapture};
use crate::waveform::Generator;
use crate::regs::Adc;
use crate::regs::gpio::FrontEnd;
use crate::sys::Hardware;

/// The whole instrument: oscilloscope, logic analyzer and waveform generator behind one host link.
///
/// Interrupt handlers call the `on_*` methods; the main loop calls [`Device::poll`] repeatedly.
#[derive(Debug)]
pub struct Device<H: Hardware> {
    pub(crate) hw: H,
    pub(crate) config: FirmwareConfig,
    pub(crate) channels: [ChannelConfiguration; 2],
    pub(crate) scope: ScopeCapture,
    pub(crate) logic: LogicCapture,
    pub(crate) generator: Generator,
    /// Set while a frame from the host is being handled; no data frames go out meanwhile.
    pub(crate) paused: bool,
}

impl<H: Hardware> Device<H> {
    pub fn new(hw: H, config: FirmwareConfig) -> Result<Device<H>> {
        config.validate()?;
        Ok(Device {
            scope: ScopeCapture::new(&config),
            logic: LogicCapture::new(&config),
            generator: Generator::new(&config),
            channels: Default::default(),
            paused: false,
            hw,
            config,
        })
    }

    /// Brings every subsystem to its power-on state. Any peripheral failure is returned as is;
    /// the caller is expected to [`halt`](crate::halt).
    pub fn startup(&mut self) -> Result<()> {
        // analog front-ends in their default state
        for channel in 0..2 {
            self.apply_front_end(channel)?;
        }

        // sampling timers at the fastest rate; they run from here on
        self.scope.set_sample_rate(&mut self.hw, 0)?;
        self.scope.start_clocks(&mut self.hw)?;

        // free-running acquisition
        self.scope.arm(&mut self.hw, TriggerMode::FreeRun, 0, 0)?;
        self.scope.start(&mut self.hw)?;

        // both generators at mid-scale
        self.generator.start(&mut self.hw)?;

        // logic analyzer timers programmed but idle until enabled by the host
        self.logic.init(&mut self.hw)?;

        log::debug!("startup complete");
        Ok(())
    }

    /// One iteration of the main loop: handles a frame from the host if one has arrived, then
    /// runs one scheduling quantum.
    pub fn poll(&mut self) -> Result<Option<DataFrame>> {
        let mut frame = [0; FRAME_LEN];
        if self.hw.receive(&mut frame)? {
            self.handle_frame(&frame)?;
        }
        self.run_quantum()
    }

    pub(crate) fn apply_front_end(&mut self, channel: usize) -> Result<()> {
        let front_end = self.channels[channel].front_end();
        log::trace!("channel {} front-end {:?}", channel, front_end);
        for &(flag, pin) in FrontEnd::pins(channel) {
            self.hw.write_pin(pin, front_end.contains(flag))?;
        }
        Ok(())
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn channel_configuration(&self, channel: usize) -> &ChannelConfiguration {
        &self.channels[channel]
    }

    pub fn generator_configuration(&self, channel: usize) -> &GeneratorConfiguration {
        self.generator.configuration(channel)
    }

    pub fn scope_state(&self) -> ScopeState {
        self.scope.state()
    }

    pub fn scope_cursor(&self) -> usize {
        self.scope.cursor()
    }

    pub fn logic_phase(&self) -> Phase {
        self.logic.phase()
    }

    pub fn logic_cursor(&self) -> usize {
        self.logic.cursor()
    }

    /// Whether the logic capture clock is running, i.e. whether sample interrupts would fire.
    pub fn logic_sampling(&self) -> bool {
        self.logic.is_sampling()
    }

    /// Whether the ADCs are converting, i.e. whether conversion results would arrive.
    pub fn scope_running(&self) -> bool {
        self.scope.is_running()
    }

    /// The ADC watched for an edge trigger and its threshold windows, if a trigger is armed.
    pub fn watchdog(&self) -> Option<(Adc, WatchdogWindows)> {
        self.scope.watchdog()
    }

    /// ADC DMA: one conversion result per channel.
    pub fn on_adc_conversion(&mut self, samples: [u16; 2]) -> Result<()> {
        self.scope.on_conversion(&mut self.hw, samples)
    }

    /// Shadow timer update interrupt.
    pub fn on_shadow_tick(&mut self) {
        self.scope.on_shadow_tick()
    }

    /// ADC interrupt (analog watchdog hit).
    pub fn on_adc_interrupt(&mut self, adc: Adc) -> Result<()> {
        self.scope.on_adc_interrupt(&mut self.hw, adc)
    }

    /// Logic capture clock compare interrupt; `port` is the sampled input port.
    pub fn on_logic_sample(&mut self, port: u16) -> Result<()> {
        self.logic.on_sample(&mut self.hw, port)
    }

    /// Logic post-trigger countdown update interrupt.
    pub fn on_logic_countdown(&mut self) -> Result<()> {
        self.logic.on_countdown(&mut self.hw)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Confirm, Error};
    use crate::regs::{DmaStream, Pin, Port, Register, Timer};
    use crate::regs::tim::{Cr1, Dier};
    use crate::sys::sim::SimHardware;

    #[test]
    fn test_invalid_config_rejected() {
        let config = FirmwareConfig { shadow_step: 0, ..Default::default() };
        assert!(matches!(Device::new(SimHardware::new(), config), Err(Error::Config(_))));
    }

    #[test]
    fn test_startup() {
        let mut device = Device::new(SimHardware::new(), FirmwareConfig::default()).unwrap();
        device.startup().unwrap();
        let hw = device.hardware();
        assert_eq!(hw.register(Register::TimArr(Timer::AdcClock)), 1);
        assert_eq!(hw.register(Register::TimArr(Timer::AdcShadow)), 9);
        assert!(Cr1::from_bits_retain(hw.register(Register::TimCr1(Timer::AdcShadow))).contains(Cr1::CEN));
        assert!(Dier::from_bits_retain(hw.register(Register::TimDier(Timer::AdcShadow))).contains(Dier::UIE));
        assert_eq!(hw.dma_len(DmaStream::AdcA), Some(30000));
        assert_eq!(hw.dma_len(DmaStream::DacB), Some(2));
        assert_eq!(hw.register(Register::TimArr(Timer::LogicClock)), 0x8ca0);
        assert!(!hw.pin(Pin::new(Port::D, 2)));
        assert_eq!(device.scope_state(), ScopeState::NoTrigger);
        assert_eq!(device.logic_phase(), Phase::NoTrigger);
        assert!(device.scope_running());
        assert!(!device.logic_sampling());
        assert!(!device.is_paused());
    }

    #[test]
    fn test_startup_fails_fast() {
        let mut hw = SimHardware::new();
        hw.fail_writes_to(Register::TimArr(Timer::AdcClock));
        let mut device = Device::new(hw, FirmwareConfig::default()).unwrap();
        assert!(matches!(device.startup(), Err(Error::Peripheral(_))));
        // nothing after the failing step ran
        assert_eq!(device.hardware().dma_len(DmaStream::AdcA), None);
    }

    #[test]
    fn test_watchdog_exposed_when_armed() {
        let mut device = Device::new(SimHardware::new(), FirmwareConfig::default()).unwrap();
        device.startup().unwrap();
        assert_eq!(device.watchdog(), None);
        device.scope.stop(&mut device.hw).unwrap();
        device.scope.arm(&mut device.hw, TriggerMode::Edge(crate::Edge::Rising), 1, 3000).unwrap();
        assert_eq!(device.watchdog().map(|(adc, _)| adc), Some(Adc::Adc2));
        assert_eq!(device.scope_state(), ScopeState::PreTrigger(Confirm::Idle));
    }

    #[test]
    fn test_poll_acks_before_data() {
        let config = FirmwareConfig { scope_capacity: 64, shadow_step: 8, post_trigger_samples: 16,
                                      ..Default::default() };
        let mut device = Device::new(SimHardware::new(), config).unwrap();
        device.startup().unwrap();
        for n in 0..8 {
            device.on_adc_conversion([n, n]).unwrap();
        }
        device.on_shadow_tick();
        let handshake = crate::Command::Handshake { magic: *crate::HANDSHAKE_MAGIC };
        device.hardware_mut().push_frame(handshake.encode());

        let frame = device.poll().unwrap().unwrap();
        assert_eq!(frame.scope_cursor, 0);
        assert!(!device.is_paused());
        let sent = device.hardware_mut().take_transmitted();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[0][..9], b"\0STMAWG23");
        assert_eq!(DataFrame::decode(sent[1].as_slice().try_into().unwrap()), Some(frame));

        // no frame queued and no new samples since the last window
        let frame = device.poll().unwrap();
        assert_eq!(frame, None);
        assert!(device.hardware().transmitted().is_empty());
    }
}
