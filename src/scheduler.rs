use crate::{DataFrame, Result, NO_DATA, WINDOW};
use crate::device::Device;
use crate::sys::{Hardware, HardwareExt};

impl<H: Hardware> Device<H> {
    /// Advances both trigger state machines and sends at most one data frame.
    ///
    /// A subsystem without data has its cursor field set to [`NO_DATA`] and a zeroed window.
    /// The cursor of every subsystem included in the frame advances by one window, whether or
    /// not the transport accepted the frame.
    pub fn run_quantum(&mut self) -> Result<Option<DataFrame>> {
        self.scope.poll(&mut self.hw, self.paused)?;
        self.logic.poll(&mut self.hw)?;

        let scope_ready = self.scope.is_ready();
        let logic_ready = self.logic.is_ready();
        if self.paused || !(scope_ready || logic_ready) {
            return Ok(None)
        }

        let mut frame = DataFrame {
            scope_cursor: NO_DATA,
            logic_cursor: NO_DATA,
            channel_a: [0; WINDOW],
            channel_b: [0; WINDOW],
            logic: [0; WINDOW],
        };
        if scope_ready {
            frame.scope_cursor = self.scope.cursor() as u16;
            frame.channel_a = self.scope.window(0);
            frame.channel_b = self.scope.window(1);
            self.scope.advance();
        }
        if logic_ready {
            frame.logic_cursor = self.logic.cursor() as u16;
            frame.logic = self.logic.window();
            self.logic.advance();
        }
        self.hw.send_frame(&frame.encode())?;

        self.scope.clear_ready();
        self.logic.clear_ready();
        self.hw.delay_us(self.config.transmit_pacing_us);
        Ok(Some(frame))
    }
}
