pub mod sys;
pub mod regs;
mod config;
mod params;
mod protocol;
mod trigger;
mod capture;
mod acquisition;
mod waveform;
mod device;
mod command;
mod scheduler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The host is not accepting frames right now; the frame was dropped.
    Busy,
    UnknownPacket(u8),
    Peripheral(&'static str),
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Busy =>
                write!(f, "transport busy"),
            Self::UnknownPacket(tag) =>
                write!(f, "unknown packet type {}", tag),
            Self::Peripheral(what) =>
                write!(f, "peripheral failure: {}", what),
            Self::Config(reason) =>
                write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> =
    core::result::Result<T, Error>;

/// Stops the firmware after an unrecoverable error. Only a power cycle gets the device back.
pub fn halt(error: Error) -> ! {
    log::error!("halting: {}", error);
    loop {
        std::hint::spin_loop();
    }
}

pub use config::{
    HandshakePolicy,
    Coupling,
    GainSelect,
    ChannelConfiguration,
    GeneratorConfiguration,
    FirmwareConfig,
};

pub use params::{
    SamplingTime,
    SampleRate,
    TriggerMode,
    WatchdogWindows,
};

pub use protocol::{
    FRAME_LEN,
    WINDOW,
    NO_DATA,
    ACK_STRING,
    HANDSHAKE_MAGIC,
    Command,
    WaveformSet,
    AcquisitionSet,
    LogicSet,
    DataFrame,
};

pub use trigger::{
    Edge,
    Phase,
    Confirm,
    ScopeState,
};

pub use device::Device;

pub use command::Response;
