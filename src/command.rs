//! Handling of frames received from the host.

use crate::{Error, Result, FRAME_LEN, HANDSHAKE_MAGIC};
use crate::{AcquisitionSet, ChannelConfiguration, Command, Coupling, GainSelect, HandshakePolicy};
use crate::{LogicSet, TriggerMode, WaveformSet};
use crate::device::Device;
use crate::protocol::{ack_frame, nopacket_frame};
use crate::sys::{Hardware, HardwareExt};

/// What was sent back to the host for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ack,
    /// The frame had an unknown type; a `nopacket` frame was sent.
    Diagnostic,
    /// Nothing was sent: a lookup table upload is still in progress, or a handshake did not
    /// match and the policy requires a match.
    Silent,
}

impl<H: Hardware> Device<H> {
    /// Handles one frame from the host and sends the response for it.
    ///
    /// Data frames are held back for the whole duration, including the response.
    pub fn handle_frame(&mut self, frame: &[u8; FRAME_LEN]) -> Result<Response> {
        self.paused = true;
        let result = self.dispatch(frame)
            .and_then(|response| self.respond(response).map(|()| response));
        self.paused = false;
        result
    }

    fn respond(&mut self, response: Response) -> Result<()> {
        match response {
            Response::Ack => self.hw.send_frame(&ack_frame()),
            Response::Diagnostic => self.hw.send_frame(&nopacket_frame()),
            Response::Silent => Ok(()),
        }
    }

    fn dispatch(&mut self, frame: &[u8; FRAME_LEN]) -> Result<Response> {
        if self.generator.is_uploading() {
            return Ok(match self.generator.accept_upload(frame) {
                true => Response::Ack,
                false => Response::Silent,
            })
        }

        let command = match Command::decode(frame) {
            Ok(command) => command,
            Err(Error::UnknownPacket(tag)) => {
                log::warn!("unknown packet type {}", tag);
                return Ok(Response::Diagnostic)
            }
            Err(error) => return Err(error),
        };
        log::debug!("{:?}", command);
        match command {
            Command::Handshake { magic } => Ok(self.handshake(&magic)),
            Command::WaveformSet(set) => self.waveform_set(&set),
            Command::AcquisitionSet(set) => self.acquisition_set(&set),
            Command::LogicSet(set) => self.logic_set(&set),
        }
    }

    fn handshake(&mut self, magic: &[u8; 4]) -> Response {
        let matched = magic == HANDSHAKE_MAGIC;
        if !matched {
            log::warn!("handshake magic {:02x?} does not match", magic);
        }
        match (self.config.handshake, matched) {
            (HandshakePolicy::AlwaysAck, _) | (HandshakePolicy::AckOnMatch, true) => Response::Ack,
            (HandshakePolicy::AckOnMatch, false) => Response::Silent,
        }
    }

    fn waveform_set(&mut self, set: &WaveformSet) -> Result<Response> {
        let channel = set.channel as usize;
        if channel > 1 {
            log::warn!("waveform set for channel {} ignored", channel);
            return Ok(Response::Ack)
        }
        self.generator.configure(&mut self.hw, channel, set)?;
        Ok(Response::Ack)
    }

    fn acquisition_set(&mut self, set: &AcquisitionSet) -> Result<Response> {
        let channel = set.channel as usize;
        if channel > 1 {
            log::warn!("acquisition set for channel {} ignored", channel);
            return Ok(Response::Ack)
        }

        let mut gain = GainSelect::empty();
        gain.set(GainSelect::X10, set.amp10 != 0);
        gain.set(GainSelect::X5, set.amp5 != 0);
        gain.set(GainSelect::X2_5, set.amp2_5 != 0);
        gain.set(GainSelect::X1, set.amp1 != 0);
        self.channels[channel] = ChannelConfiguration {
            coupling: if set.offset != 0 { Coupling::AC } else { Coupling::DC },
            attenuated: set.attenuation != 0,
            gain,
            sample_time: set.sample_time,
        };
        self.apply_front_end(channel)?;

        if set.trigger_mode > 2 {
            log::warn!("trigger mode {} not recognized, free-running", set.trigger_mode);
        }
        self.scope.stop(&mut self.hw)?;
        self.scope.set_sample_rate(&mut self.hw, set.mode)?;
        self.scope.arm(&mut self.hw, TriggerMode::from_code(set.trigger_mode), channel,
                       set.trigger_level)?;
        self.scope.start(&mut self.hw)?;
        Ok(Response::Ack)
    }

    fn logic_set(&mut self, set: &LogicSet) -> Result<Response> {
        self.logic.configure(&mut self.hw, set)?;
        Ok(Response::Ack)
    }
}
