use std::sync::{Arc, Mutex};

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use romi_traits::{AnalogInput, HwResult};

use crate::error::{HwError, Result};

const SPI_CLOCK_HZ: u32 = 1_000_000;

/// 8-channel 10-bit SPI ADC shared by the line sensor array.
#[derive(Clone)]
pub struct Mcp3008 {
    spi: Arc<Mutex<Spi>>,
}

impl Mcp3008 {
    pub fn new() -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self {
            spi: Arc::new(Mutex::new(spi)),
        })
    }

    pub fn channel(&self, channel: u8) -> Mcp3008Channel {
        Mcp3008Channel {
            adc: self.clone(),
            channel: channel & 0x07,
        }
    }

    fn sample(&self, channel: u8) -> Result<u16> {
        let tx = [0x01, (0x08 | channel) << 4, 0x00];
        let mut rx = [0u8; 3];
        let spi = self
            .spi
            .lock()
            .map_err(|_| HwError::Spi("adc lock poisoned".into()))?;
        spi.transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok((u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]))
    }
}

/// One single-ended ADC input.
pub struct Mcp3008Channel {
    adc: Mcp3008,
    channel: u8,
}

impl AnalogInput for Mcp3008Channel {
    fn read(&mut self) -> HwResult<u16> {
        Ok(self.adc.sample(self.channel)?)
    }
}
