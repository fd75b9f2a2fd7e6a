//! Host link framing. Every frame is 64 bytes in both directions; multi-byte fields are packed
//! little-endian.

use crate::{Error, Result};

pub const FRAME_LEN: usize = 64;
/// Samples per subsystem carried in one data frame.
pub const WINDOW: usize = 8;
/// Cursor value meaning "no data for this subsystem in this frame".
pub const NO_DATA: u16 = 40000;

pub const ACK_STRING: &[u8; 8] = b"STMAWG23";
pub const HANDSHAKE_MAGIC: &[u8; 4] = b"INIT";
const NOPACKET: &[u8] = b"nopacket\0";

const TAG_HANDSHAKE: u8 = 0;
const TAG_WAVEFORM_SET: u8 = 1;
const TAG_ACQUISITION_SET: u8 = 2;
const TAG_LOGIC_SET: u8 = 3;
const TAG_ACK: u8 = 0;
const TAG_DATA: u8 = 5;

struct Reader<'a> {
    frame: &'a [u8; FRAME_LEN],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(frame: &'a [u8; FRAME_LEN]) -> Self {
        // skip the tag
        Reader { frame, offset: 1 }
    }

    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0; N];
        bytes.copy_from_slice(&self.frame[self.offset..][..N]);
        self.offset += N;
        bytes
    }

    fn u8(&mut self) -> u8 {
        u8::from_le_bytes(self.bytes())
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.bytes())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.bytes())
    }
}

struct Writer {
    frame: [u8; FRAME_LEN],
    offset: usize,
}

impl Writer {
    fn new(tag: u8) -> Self {
        let mut frame = [0; FRAME_LEN];
        frame[0] = tag;
        Writer { frame, offset: 1 }
    }

    fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.frame[self.offset..][..bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        self
    }

    fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    fn finish(&self) -> [u8; FRAME_LEN] {
        self.frame
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveformSet {
    pub channel: u8,
    pub gain: u8,
    pub prescaler: u16,
    pub period: u16,
    pub compare_offset: u16,
    pub sample_count: u16,
    pub phase: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionSet {
    pub channel: u8,
    pub mode: u8,
    pub trigger_mode: u8,
    pub trigger_level: u16,
    pub sample_time: u8,
    pub offset: u8,
    pub attenuation: u8,
    pub amp10: u8,
    pub amp5: u8,
    pub amp2_5: u8,
    pub amp1: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogicSet {
    /// One (re)starts the logic analyzer, anything else stops it.
    pub control: u8,
    pub pin_mask: u16,
    /// 0 for falling edge, 1 for rising edge.
    pub edge: u16,
    /// Period of the post-trigger countdown timer.
    pub period16: u16,
    /// Prescaler of the post-trigger countdown timer.
    pub prescaler16: u16,
    /// Period of the capture clock.
    pub period32: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Handshake { magic: [u8; 4] },
    WaveformSet(WaveformSet),
    AcquisitionSet(AcquisitionSet),
    LogicSet(LogicSet),
}

impl Command {
    pub fn decode(frame: &[u8; FRAME_LEN]) -> Result<Command> {
        let mut r = Reader::new(frame);
        Ok(match frame[0] {
            TAG_HANDSHAKE =>
                Command::Handshake { magic: r.bytes() },
            TAG_WAVEFORM_SET =>
                Command::WaveformSet(WaveformSet {
                    channel: r.u8(),
                    gain: r.u8(),
                    prescaler: r.u16(),
                    period: r.u16(),
                    compare_offset: r.u16(),
                    sample_count: r.u16(),
                    phase: r.u16(),
                }),
            TAG_ACQUISITION_SET =>
                Command::AcquisitionSet(AcquisitionSet {
                    channel: r.u8(),
                    mode: r.u8(),
                    trigger_mode: r.u8(),
                    trigger_level: r.u16(),
                    sample_time: r.u8(),
                    offset: r.u8(),
                    attenuation: r.u8(),
                    amp10: r.u8(),
                    amp5: r.u8(),
                    amp2_5: r.u8(),
                    amp1: r.u8(),
                }),
            TAG_LOGIC_SET =>
                Command::LogicSet(LogicSet {
                    control: r.u8(),
                    pin_mask: r.u16(),
                    edge: r.u16(),
                    period16: r.u16(),
                    prescaler16: r.u16(),
                    period32: r.u32(),
                }),
            tag => return Err(Error::UnknownPacket(tag))
        })
    }

    /// Builds the frame a host would send for this command.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        match self {
            Command::Handshake { magic } =>
                Writer::new(TAG_HANDSHAKE)
                    .bytes(magic)
                    .finish(),
            Command::WaveformSet(set) =>
                Writer::new(TAG_WAVEFORM_SET)
                    .u8(set.channel)
                    .u8(set.gain)
                    .u16(set.prescaler)
                    .u16(set.period)
                    .u16(set.compare_offset)
                    .u16(set.sample_count)
                    .u16(set.phase)
                    .finish(),
            Command::AcquisitionSet(set) =>
                Writer::new(TAG_ACQUISITION_SET)
                    .u8(set.channel)
                    .u8(set.mode)
                    .u8(set.trigger_mode)
                    .u16(set.trigger_level)
                    .u8(set.sample_time)
                    .u8(set.offset)
                    .u8(set.attenuation)
                    .u8(set.amp10)
                    .u8(set.amp5)
                    .u8(set.amp2_5)
                    .u8(set.amp1)
                    .finish(),
            Command::LogicSet(set) =>
                Writer::new(TAG_LOGIC_SET)
                    .u8(set.control)
                    .u16(set.pin_mask)
                    .u16(set.edge)
                    .u16(set.period16)
                    .u16(set.prescaler16)
                    .u32(set.period32)
                    .finish(),
        }
    }
}

pub(crate) fn ack_frame() -> [u8; FRAME_LEN] {
    Writer::new(TAG_ACK).bytes(ACK_STRING).finish()
}

pub(crate) fn nopacket_frame() -> [u8; FRAME_LEN] {
    let mut frame = [0; FRAME_LEN];
    frame[..NOPACKET.len()].copy_from_slice(NOPACKET);
    frame
}

/// One outgoing data frame: the stream cursors and a window of each sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrame {
    pub scope_cursor: u16,
    pub logic_cursor: u16,
    pub channel_a: [u16; WINDOW],
    pub channel_b: [u16; WINDOW],
    pub logic: [u16; WINDOW],
}

impl DataFrame {
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut w = Writer::new(TAG_DATA);
        w.u16(self.scope_cursor).u16(self.logic_cursor);
        for window in [&self.channel_a, &self.channel_b, &self.logic] {
            for &sample in window {
                w.u16(sample);
            }
        }
        w.finish()
    }

    /// Parses a frame produced by [`DataFrame::encode`]; returns `None` for any other frame type.
    pub fn decode(frame: &[u8; FRAME_LEN]) -> Option<DataFrame> {
        if frame[0] != TAG_DATA {
            return None
        }
        let mut r = Reader::new(frame);
        let scope_cursor = r.u16();
        let logic_cursor = r.u16();
        let mut window = || -> [u16; WINDOW] { core::array::from_fn(|_| r.u16()) };
        let channel_a = window();
        let channel_b = window();
        let logic = window();
        Some(DataFrame { scope_cursor, logic_cursor, channel_a, channel_b, logic })
    }

    pub fn has_scope_data(&self) -> bool {
        self.scope_cursor != NO_DATA
    }

    pub fn has_logic_data(&self) -> bool {
        self.logic_cursor != NO_DATA
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_waveform_set_layout() {
        let mut frame = [0; FRAME_LEN];
        frame[..13].copy_from_slice(&[
            1, // tag
            1, // channel
            1, // gain
            0x02, 0x00, // prescaler
            0xa1, 0x1d, // period
            0x00, 0x08, // compare offset
            0x40, 0x00, // sample count
            0x34, 0x12, // phase
        ]);
        assert_eq!(Command::decode(&frame), Ok(Command::WaveformSet(WaveformSet {
            channel: 1,
            gain: 1,
            prescaler: 2,
            period: 7585,
            compare_offset: 2048,
            sample_count: 64,
            phase: 0x1234,
        })));
    }

    #[test]
    fn test_acquisition_set_layout() {
        let mut frame = [0; FRAME_LEN];
        frame[..14].copy_from_slice(&[2, 0, 3, 1, 0x00, 0x08, 5, 1, 0, 1, 0, 0, 1, 0]);
        let Ok(Command::AcquisitionSet(set)) = Command::decode(&frame) else { panic!() };
        assert_eq!(set.mode, 3);
        assert_eq!(set.trigger_mode, 1);
        assert_eq!(set.trigger_level, 2048);
        assert_eq!(set.sample_time, 5);
        assert_eq!((set.offset, set.attenuation, set.amp10, set.amp5, set.amp2_5, set.amp1),
                   (1, 0, 1, 0, 0, 1));
    }

    #[test]
    fn test_logic_set_layout() {
        let set = LogicSet {
            control: 1,
            pin_mask: 0x0004,
            edge: 1,
            period16: 1000,
            prescaler16: 1,
            period32: 0x8ca0,
        };
        let frame = Command::LogicSet(set).encode();
        assert_eq!(&frame[..14], &[3, 1, 4, 0, 1, 0, 0xe8, 0x03, 1, 0, 0xa0, 0x8c, 0, 0]);
        assert!(frame[14..].iter().all(|&byte| byte == 0));
        assert_eq!(Command::decode(&frame), Ok(Command::LogicSet(set)));
    }

    #[test]
    fn test_unknown_tag() {
        let mut frame = [0; FRAME_LEN];
        frame[0] = 7;
        assert_eq!(Command::decode(&frame), Err(Error::UnknownPacket(7)));
    }

    #[test]
    fn test_ack_frame() {
        let frame = ack_frame();
        assert_eq!(&frame[..9], b"\0STMAWG23");
        assert!(frame[9..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_nopacket_frame() {
        let frame = nopacket_frame();
        assert_eq!(&frame[..9], b"nopacket\0");
        assert_eq!(frame.len(), FRAME_LEN);
    }

    #[test]
    fn test_data_frame_layout() {
        let data = DataFrame {
            scope_cursor: 16,
            logic_cursor: NO_DATA,
            channel_a: [0x0102; WINDOW],
            channel_b: [0x0304; WINDOW],
            logic: [0; WINDOW],
        };
        let frame = data.encode();
        assert_eq!(frame[0], 5);
        assert_eq!(&frame[1..5], &[16, 0, 0x40, 0x9c]);
        assert_eq!(&frame[5..7], &[0x02, 0x01]);
        assert_eq!(&frame[21..23], &[0x04, 0x03]);
        // 53 bytes of fields, then padding
        assert!(frame[53..].iter().all(|&byte| byte == 0));
        assert_eq!(DataFrame::decode(&frame), Some(data));
        assert!(!data.has_logic_data());
        assert!(DataFrame::decode(&ack_frame()).is_none());
    }
}
