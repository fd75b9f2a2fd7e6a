use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    B,
    C,
    D,
    E,
    G,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pin {
    pub port: Port,
    pub index: u8,
}

impl Pin {
    pub const fn new(port: Port, index: u8) -> Pin {
        Pin { port, index }
    }
}

/// Gain select of the generator output amplifier, per channel.
pub const GENERATOR_GAIN: [Pin; 2] = [
    Pin::new(Port::E, 13),
    Pin::new(Port::E, 12),
];

bitflags! {
    /// Oscilloscope analog front-end controls of one channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrontEnd: u8 {
        /// AC/DC coupling relay
        const OFFSET      = 1<<0;
        /// Input attenuator
        const ATTENUATION = 1<<1;
        /// 1:10 amplifier select
        const AMP10       = 1<<2;
        /// 1:5 amplifier select
        const AMP5        = 1<<3;
        /// 1:2.5 amplifier select
        const AMP2_5      = 1<<4;
        /// 1:1 amplifier select
        const AMP1        = 1<<5;
    }
}

impl FrontEnd {
    const CH1_PINS: [(FrontEnd, Pin); 6] = [
        (FrontEnd::OFFSET,      Pin::new(Port::D, 2)),
        (FrontEnd::ATTENUATION, Pin::new(Port::D, 1)),
        (FrontEnd::AMP10,       Pin::new(Port::D, 0)),
        (FrontEnd::AMP5,        Pin::new(Port::C, 12)),
        (FrontEnd::AMP2_5,      Pin::new(Port::C, 11)),
        (FrontEnd::AMP1,        Pin::new(Port::C, 10)),
    ];

    const CH2_PINS: [(FrontEnd, Pin); 6] = [
        (FrontEnd::OFFSET,      Pin::new(Port::E, 7)),
        (FrontEnd::ATTENUATION, Pin::new(Port::G, 1)),
        (FrontEnd::AMP10,       Pin::new(Port::G, 0)),
        (FrontEnd::AMP5,        Pin::new(Port::B, 10)),
        (FrontEnd::AMP2_5,      Pin::new(Port::E, 15)),
        (FrontEnd::AMP1,        Pin::new(Port::E, 14)),
    ];

    /// Every front-end control of `channel` together with the pin driving it.
    pub fn pins(channel: usize) -> &'static [(FrontEnd, Pin); 6] {
        match channel {
            0 => &Self::CH1_PINS,
            1 => &Self::CH2_PINS,
            _ => unreachable!()
        }
    }
}
