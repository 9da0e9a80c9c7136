//! # Storage
//!
//! The last 8 KiB of program flash, reserved in `memory.x`, exposed as an
//! [`embedded_storage`] NOR flash for the watch's filesystem.
//!
//! Flash on the stm32l0 is erased a 128 byte page at a time and programmed a word at a time.
//! Erased flash reads as zero. The program and erase registers are locked again after every
//! operation.

use core::ptr;

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use stm32l0::stm32l0x3::FLASH;

use crate::system::System;

/// Start of the storage region
pub const START: u32 = 0x0800_E000;

/// Size of the storage region (bytes)
pub const SIZE: usize = 8 * 1024;

/// Erase granularity (bytes)
pub const PAGE_SIZE: usize = 128;

const PEKEY1: u32 = 0x89AB_CDEF;
const PEKEY2: u32 = 0x0203_0405;
const PRGKEY1: u32 = 0x8C9D_AEBF;
const PRGKEY2: u32 = 0x1314_1516;

// PECR bits
const PELOCK: u32 = 1 << 0;
const PRGLOCK: u32 = 1 << 1;
const PROG: u32 = 1 << 3;
const ERASE: u32 = 1 << 9;

// SR bits
const BSY: u32 = 1 << 0;
const EOP: u32 = 1 << 1;
const WRPERR: u32 = 1 << 8;
const ERRORS: u32 = WRPERR
    | 1 << 9 // PGAERR
    | 1 << 10 // SIZERR
    | 1 << 13 // RDERR
    | 1 << 16 // NOTZEROERR
    | 1 << 17; // FWWERR

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    OutOfBounds,
    NotAligned,
    /// The region is write protected
    WriteProtected,
    /// The flash interface flagged an error while programming or erasing
    Programming(u32),
}

impl NorFlashError for Error {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            Error::WriteProtected | Error::Programming(_) => NorFlashErrorKind::Other,
        }
    }
}

pub struct Storage(FLASH);

impl Storage {
    pub fn configure(flash: FLASH, sys: &mut System) -> Self {
        sys.enable_flash_clk();
        Self(flash)
    }

    fn check(offset: u32, len: usize, align: usize) -> Result<(), Error> {
        if offset as usize % align != 0 || len % align != 0 {
            return Err(Error::NotAligned);
        }

        if offset as usize + len > SIZE {
            return Err(Error::OutOfBounds);
        }

        Ok(())
    }

    /// Run `f` with the program memory unlocked
    fn unlocked(&mut self, f: impl FnOnce(&FLASH) -> Result<(), Error>) -> Result<(), Error> {
        let flash = &self.0;

        if flash.pecr.read().bits() & PELOCK != 0 {
            flash.pekeyr.write(|w| unsafe { w.bits(PEKEY1) });
            flash.pekeyr.write(|w| unsafe { w.bits(PEKEY2) });
        }
        flash.prgkeyr.write(|w| unsafe { w.bits(PRGKEY1) });
        flash.prgkeyr.write(|w| unsafe { w.bits(PRGKEY2) });

        let result = f(flash);

        // Lock again
        flash
            .pecr
            .modify(|r, w| unsafe { w.bits(r.bits() | PRGLOCK | PELOCK) });

        result
    }

    /// Wait for the current operation, clearing and returning any error
    fn wait(flash: &FLASH) -> Result<(), Error> {
        while flash.sr.read().bits() & BSY != 0 {}

        let sr = flash.sr.read().bits();
        // Write one to clear
        flash.sr.write(|w| unsafe { w.bits(sr & (ERRORS | EOP)) });

        match sr & ERRORS {
            0 => Ok(()),
            WRPERR => Err(Error::WriteProtected),
            errors => Err(Error::Programming(errors)),
        }
    }
}

impl ErrorType for Storage {
    type Error = Error;
}

impl ReadNorFlash for Storage {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        Self::check(offset, bytes.len(), Self::READ_SIZE)?;

        for (i, byte) in bytes.iter_mut().enumerate() {
            let address = START + offset + i as u32;
            // Safety: inside the storage region, which is plain memory mapped flash
            *byte = unsafe { ptr::read_volatile(address as *const u8) };
        }

        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl NorFlash for Storage {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if to < from {
            return Err(Error::OutOfBounds);
        }
        Self::check(from, (to - from) as usize, Self::ERASE_SIZE)?;

        self.unlocked(|flash| {
            // Page erase mode
            flash
                .pecr
                .modify(|r, w| unsafe { w.bits(r.bits() | ERASE | PROG) });

            let mut result = Ok(());
            for page in (from..to).step_by(PAGE_SIZE) {
                // Writing any word of a page erases it
                // Safety: page aligned and inside the storage region
                unsafe { ptr::write_volatile((START + page) as *mut u32, 0) };

                result = Self::wait(flash);
                if result.is_err() {
                    break;
                }
            }

            flash
                .pecr
                .modify(|r, w| unsafe { w.bits(r.bits() & !(ERASE | PROG)) });
            result
        })
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        Self::check(offset, bytes.len(), Self::WRITE_SIZE)?;

        self.unlocked(|flash| {
            for (i, chunk) in bytes.chunks_exact(4).enumerate() {
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                let address = START + offset + (i * 4) as u32;

                // Safety: word aligned and inside the storage region
                unsafe { ptr::write_volatile(address as *mut u32, word) };
                Self::wait(flash)?;
            }

            Ok(())
        })
    }
}
