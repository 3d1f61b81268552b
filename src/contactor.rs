//! Contactor output driver
//!
//! The relay hardware energizes the contactor on a LOW line level. That
//! inversion stays inside this module: callers reason only in terms of the
//! boolean "energized" and never see electrical levels.

use crate::error::Result;
use crate::logging::get_logger;
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};

/// Physical (or mocked) contactor output line
pub trait ContactorOutput: Send {
    /// Set the contactor state
    fn drive(&mut self, energized: bool) -> Result<()>;
}

/// Contactor driven through the Linux GPIO character device
pub struct GpioContactor {
    handle: LineHandle,
    logger: crate::logging::StructuredLogger,
}

impl GpioContactor {
    /// Request the output line, initialized to the de-energized (open) level
    pub fn new(chip_path: &str, line_offset: u32) -> Result<Self> {
        let mut chip = Chip::new(chip_path)?;
        let line = chip.get_line(line_offset)?;
        // Relay is energize-on-low, so open = high
        let handle = line.request(LineRequestFlags::OUTPUT, 1, "thermae")?;
        let logger = get_logger("contactor");
        logger.info(&format!(
            "Contactor line {}:{} initialized open",
            chip_path, line_offset
        ));
        Ok(Self { handle, logger })
    }
}

impl ContactorOutput for GpioContactor {
    fn drive(&mut self, energized: bool) -> Result<()> {
        let level = level_for(energized);
        self.handle.set_value(level)?;
        self.logger.debug(&format!(
            "Contactor {} (line level {})",
            if energized { "energized" } else { "open" },
            level
        ));
        Ok(())
    }
}

/// Map the energized semantic to the electrical level of the relay input
fn level_for(energized: bool) -> u8 {
    if energized { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energize_on_low_inversion() {
        assert_eq!(level_for(true), 0);
        assert_eq!(level_for(false), 1);
    }
}
