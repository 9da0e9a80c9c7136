use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

use super::{BLOCK_SIZE, PAGE_SIZE, READ_SIZE};

/// NOR flash emulated in RAM
///
/// Programming can only clear bits, like the real thing, so writing without erasing first
/// corrupts data.
pub struct RamFlash<const SIZE: usize> {
    memory: [u8; SIZE],
}

impl<const SIZE: usize> RamFlash<SIZE> {
    /// A fully erased device
    pub const fn new() -> Self {
        Self {
            memory: [0xFF; SIZE],
        }
    }

    /// Flip the bits of the byte at `offset`
    pub fn corrupt(&mut self, offset: usize) {
        self.memory[offset] = !self.memory[offset];
    }
}

impl<const SIZE: usize> Default for RamFlash<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> ErrorType for RamFlash<SIZE> {
    type Error = NorFlashErrorKind;
}

impl<const SIZE: usize> ReadNorFlash for RamFlash<SIZE> {
    const READ_SIZE: usize = READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;

        let offset = offset as usize;
        bytes.copy_from_slice(&self.memory[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl<const SIZE: usize> NorFlash for RamFlash<SIZE> {
    const WRITE_SIZE: usize = PAGE_SIZE;
    const ERASE_SIZE: usize = BLOCK_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;

        self.memory[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;

        let offset = offset as usize;
        for (cell, byte) in self.memory[offset..offset + bytes.len()].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        Ok(())
    }
}
