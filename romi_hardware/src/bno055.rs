use rppal::i2c::I2c;
use romi_traits::{HwResult, RegisterBus};
use tracing::trace;

use crate::error::{HwError, Result};

/// Register transport for an orientation sensor on a Linux I2C bus.
pub struct I2cRegisterBus {
    i2c: I2c,
    scratch: Vec<u8>,
}

impl I2cRegisterBus {
    pub fn new(bus: u8, address: u8) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(u16::from(address))
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(Self {
            i2c,
            scratch: Vec::with_capacity(32),
        })
    }
}

impl RegisterBus for I2cRegisterBus {
    fn read(&mut self, reg: u8, buf: &mut [u8]) -> HwResult<()> {
        self.i2c
            .write_read(&[reg], buf)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        trace!(reg, len = buf.len(), "i2c read");
        Ok(())
    }

    fn write(&mut self, reg: u8, data: &[u8]) -> HwResult<()> {
        self.scratch.clear();
        self.scratch.push(reg);
        self.scratch.extend_from_slice(data);
        let n = self
            .i2c
            .write(&self.scratch)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        if n != self.scratch.len() {
            return Err(Box::new(HwError::I2c(format!(
                "short write: {n} of {} bytes",
                self.scratch.len()
            ))));
        }
        trace!(reg, len = data.len(), "i2c write");
        Ok(())
    }
}
