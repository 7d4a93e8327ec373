//! SSD1306 OLED display wrapper.

use crate::error::Error;
use defmt::warn;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

/// Type alias for the concrete display driver.
///
/// Generic over the I²C implementation so callers pass in their HAL's
/// I²C peripheral.
pub type Display<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Bring up the panel at 128×64, unrotated.
///
/// The frame buffer starts blank and every redraw clears it first, so
/// nothing is pushed until the first [`flush`]. A panel that does not
/// answer is reported once; drawing keeps working and flushes fail.
pub fn init<I2C>(i2c: I2C) -> Display<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    let mut panel = Ssd1306::new(
        I2CDisplayInterface::new(i2c),
        DisplaySize128x64,
        DisplayRotation::Rotate0,
    )
    .into_buffered_graphics_mode();
    if let Err(e) = panel.init() {
        warn!("Display: SSD1306 not responding: {}", defmt::Debug2Format(&e));
    }
    panel
}

/// Push the frame buffer to the panel.
pub fn flush<I2C>(display: &mut Display<I2C>) -> Result<(), Error>
where
    I2C: embedded_hal::i2c::I2c,
{
    display.flush().map_err(|_| Error::Display)
}
