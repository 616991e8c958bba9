#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod error;
mod get;
mod internal;
pub mod platform;
mod raw;
mod set;

pub use get::Get;
pub use raw::Block;
pub use set::Set;

extern crate alloc;

use crate::error::Error;
use crate::platform::{Platform, WORD_SIZE};
use crate::raw::{HEADER_FIRST_RECORD_OFFSET, MIN_BLOCK_SIZE};

#[derive(Debug, Clone, PartialEq)]
pub struct PastStatistics {
    pub current_block: Block,
    /// Incremented by every garbage collection.
    pub generation: u32,
    pub records: RecordStatistics,
    pub bytes: ByteStatistics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordStatistics {
    pub live: u32,
    pub erased: u32,
}

/// Usage of the current block in bytes, record headers and padding included. Together with the 8
/// byte block header the three values add up to the block size.
#[derive(Debug, Clone, PartialEq)]
pub struct ByteStatistics {
    pub live: u32,
    /// Occupied by erased records until the next garbage collection.
    pub reclaimable: u32,
    pub free: u32,
}

/// Key-value store spread over two equally sized blocks of EEPROM. Records are appended to the
/// current block, once it is full the live records are compacted into the other block.
///
/// Keys are 32-bit integers, `0x00000000` and `0xFFFFFFFF` are reserved. Values are arbitrary,
/// non-empty byte sequences.
pub struct Past<T: Platform> {
    pub(crate) hal: T,
    pub(crate) blocks: [u32; 2],
    pub(crate) block_size: u32,
    pub(crate) initialized: bool,
    pub(crate) faulted: bool,

    // set by init / format
    pub(crate) current: Block,
    pub(crate) generation: u32,
    pub(crate) end_address: u32,
}

impl<T: Platform> Past<T> {
    /// Checks the block layout and runs [`Past::init`].
    ///
    /// Both blocks have `block_size` bytes and start at the word aligned addresses in `blocks`.
    /// If neither block holds a valid past, both are formatted.
    pub fn new(blocks: [u32; 2], block_size: u32, hal: T) -> Result<Past<T>, Error> {
        if !block_size.is_multiple_of(WORD_SIZE as u32) || block_size < MIN_BLOCK_SIZE {
            return Err(Error::InvalidBlockSize);
        }

        let [first, second] = blocks;
        if !first.is_multiple_of(WORD_SIZE as u32) || !second.is_multiple_of(WORD_SIZE as u32) {
            return Err(Error::InvalidBlockAddress);
        }
        let (Some(first_end), Some(second_end)) =
            (first.checked_add(block_size), second.checked_add(block_size))
        else {
            return Err(Error::InvalidBlockAddress);
        };
        if first < second_end && second < first_end {
            return Err(Error::InvalidBlockAddress);
        }

        let mut past = Self {
            hal,
            blocks,
            block_size,
            initialized: false,
            faulted: false,
            current: Block::First,
            generation: 0,
            end_address: first + HEADER_FIRST_RECORD_OFFSET,
        };

        past.init()?;
        Ok(past)
    }

    /// Selects the current block and repairs whatever an interrupted operation left behind:
    /// 1. A partially written record after the last complete one is dropped by a garbage collection
    /// 2. A record superseded by a newer copy but not yet erased is erased
    ///
    /// Has to be called again after an operation returned [`Error::FlashError`].
    pub fn init(&mut self) -> Result<(), Error> {
        self.initialized = false;
        self.faulted = false;

        self.recover()?;
        self.initialized = true;
        Ok(())
    }

    /// Copies the value of `key` into `buf` and returns its length.
    pub fn read(&mut self, key: u32, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        let result = self.read_record(key, buf);
        self.track_fault(result)
    }

    /// Length of the value of `key` in bytes.
    pub fn len(&mut self, key: u32) -> Result<usize, Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        let result = self.record_len(key);
        self.track_fault(result)
    }

    pub fn contains(&mut self, key: u32) -> Result<bool, Error> {
        match self.len(key) {
            Ok(_) => Ok(true),
            Err(Error::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get a value from the store.
    ///
    /// Supported types are u32, String and Vec<u8>.
    pub fn get<R>(&mut self, key: u32) -> Result<R, Error>
    where
        Past<T>: Get<R>,
    {
        Get::get(self, key)
    }

    /// Write a value, replacing any previous value of `key`.
    ///
    /// A garbage collection is run first if the current block lacks the space for the value.
    pub fn write(&mut self, key: u32, value: &[u8]) -> Result<(), Error> {
        self.write_parts(key, &[value])
    }

    /// Set a value and write it to the store
    ///
    /// Type support:
    ///  * u32: saved as 4 bytes little-endian
    ///  * &str, &CStr: saved including a null terminator
    ///  * &[u8]: saved as is
    pub fn set<R>(&mut self, key: u32, value: R) -> Result<(), Error>
    where
        Past<T>: Set<R>,
    {
        Set::set(self, key, value)
    }

    /// Erase a key. Its space is reclaimed by the next garbage collection.
    pub fn erase(&mut self, key: u32) -> Result<(), Error> {
        self.check_writable()?;

        let result = self.erase_record(key);
        self.track_fault(result)
    }

    /// Erase both blocks and start over with an empty store.
    pub fn format(&mut self) -> Result<(), Error> {
        self.initialized = false;
        self.faulted = false;

        let result = self.format_blocks();
        if result.is_ok() {
            self.initialized = true;
        }
        self.track_fault(result)
    }

    /// Compact the live records into the other block, regardless of the free space left.
    pub fn garbage_collect(&mut self) -> Result<(), Error> {
        self.check_writable()?;

        let result = self.compact();
        self.track_fault(result)
    }

    /// Returns usage statistics of the current block
    pub fn statistics(&mut self) -> Result<PastStatistics, Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        let result = self.collect_statistics();
        self.track_fault(result)
    }

    pub(crate) fn write_parts(&mut self, key: u32, parts: &[&[u8]]) -> Result<(), Error> {
        self.check_writable()?;

        let result = self.write_record(key, parts);
        self.track_fault(result)
    }

    fn check_writable(&self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.faulted {
            return Err(Error::FlashError);
        }
        Ok(())
    }

    fn track_fault<R>(&mut self, result: Result<R, Error>) -> Result<R, Error> {
        if let Err(Error::FlashError) = result {
            self.faulted = true;
        }
        result
    }
}
