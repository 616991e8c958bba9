use crate::error::Error;
use crate::platform::{Platform, WORD_SIZE};
use crate::raw::{
    Block, BlockHeader, ERASED_WORD, HEADER_FIRST_RECORD_OFFSET, HEADER_GENERATION_OFFSET, MAGIC,
    RECORD_DATA_OFFSET, RECORD_HEADER_SIZE, RECORD_SIZE_OFFSET, RecordHeader, ReservedKey,
    payload_words, record_span, unpack_word,
};
use crate::{ByteStatistics, Past, PastStatistics, RecordStatistics};
#[cfg(feature = "defmt")]
use defmt::trace;
#[cfg(feature = "defmt")]
use defmt::warn;

/// Outcome of a linear scan through the current block.
#[derive(Debug, PartialEq, Copy, Clone)]
pub(crate) enum Scan {
    /// Address of the first record carrying the key.
    Found(u32),
    /// The key is not present, the address is the start of free space.
    End(u32),
    /// A record with an impossible size was found at the address.
    Corrupted(u32),
}

impl<T> Past<T>
where
    T: Platform,
{
    #[inline(always)]
    fn read_word(&mut self, address: u32) -> Result<u32, Error> {
        self.hal.read_word(address).map_err(|_| Error::FlashError)
    }

    #[inline(always)]
    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Error> {
        self.hal
            .program_word(address, value)
            .map_err(|_| Error::FlashError)
    }

    pub(crate) fn block_base(&self, block: Block) -> u32 {
        self.blocks[block.index()]
    }

    fn current_base(&self) -> u32 {
        self.block_base(self.current)
    }

    fn current_limit(&self) -> u32 {
        self.current_base() + self.block_size
    }

    pub(crate) fn remaining_size(&self) -> u32 {
        self.current_limit() - self.end_address
    }

    fn load_block_header(&mut self, block: Block) -> Result<BlockHeader, Error> {
        let base = self.block_base(block);
        Ok(BlockHeader {
            magic: self.read_word(base)?,
            generation: self.read_word(base + HEADER_GENERATION_OFFSET)?,
        })
    }

    /// Loads the header of a record found by a scan and makes sure its payload stays inside the
    /// current block.
    fn load_record_header(&mut self, address: u32) -> Result<RecordHeader, Error> {
        let header = RecordHeader {
            key: self.read_word(address)?,
            size: self.read_word(address + RECORD_SIZE_OFFSET)?,
        };

        match address.checked_add(record_span(header.size)) {
            Some(next) if header.size != 0 && next <= self.current_limit() => Ok(header),
            _ => Err(Error::CorruptedData),
        }
    }

    pub(crate) fn find_record(&mut self, key: u32) -> Result<Scan, Error> {
        let first = self.current_base() + HEADER_FIRST_RECORD_OFFSET;
        self.scan_from(first, key)
    }

    /// Walks the records starting at `address` until `key` or the end marker is found. Erased
    /// records never match a user key but are still stepped over using their size.
    fn scan_from(&mut self, mut address: u32, key: u32) -> Result<Scan, Error> {
        let limit = self.current_limit();

        while address < limit {
            let record_key = self.read_word(address)?;

            #[cfg(feature = "debug-logs")]
            println!("  internal: scan: found {record_key:#010x} at {address:#010x}");

            if record_key == key {
                return Ok(Scan::Found(address));
            }
            if record_key == ReservedKey::End as u32 {
                return Ok(Scan::End(address));
            }
            if limit - address < RECORD_HEADER_SIZE {
                return Ok(Scan::Corrupted(address));
            }

            let size = self.read_word(address + RECORD_SIZE_OFFSET)?;
            if size == 0 {
                return Ok(Scan::Corrupted(address));
            }
            match address.checked_add(record_span(size)) {
                Some(next) if next <= limit => address = next,
                _ => return Ok(Scan::Corrupted(address)),
            }
        }

        // completely filled block, there is no room left for the end marker
        Ok(Scan::End(limit))
    }

    pub(crate) fn read_record(&mut self, key: u32, buf: &mut [u8]) -> Result<usize, Error> {
        #[cfg(feature = "defmt")]
        trace!("read_record: {:#010x}", key);

        let address = self.find_live_record(key)?;
        let header = self.load_record_header(address)?;
        let size = header.size as usize;
        if buf.len() < size {
            return Err(Error::BufferTooSmall(size));
        }

        let data = &mut buf[..size];
        for word_index in 0..header.data_words() as usize {
            let word =
                self.read_word(address + RECORD_DATA_OFFSET + (word_index * WORD_SIZE) as u32)?;
            unpack_word(data, word_index, word);
        }

        Ok(size)
    }

    pub(crate) fn record_len(&mut self, key: u32) -> Result<usize, Error> {
        let address = self.find_live_record(key)?;
        let header = self.load_record_header(address)?;
        Ok(header.size as usize)
    }

    fn find_live_record(&mut self, key: u32) -> Result<u32, Error> {
        if ReservedKey::is_reserved(key) {
            return Err(Error::ReservedKey);
        }

        match self.find_record(key)? {
            Scan::Found(address) => Ok(address),
            Scan::End(_) => Err(Error::KeyNotFound),
            Scan::Corrupted(_) => Err(Error::CorruptedData),
        }
    }

    /// Appends a new record for `key` and afterwards erases the previous one, if any.
    ///
    /// The key word is written last, a record interrupted before that still reads as free space
    /// and is dropped by the next `init`.
    pub(crate) fn write_record(&mut self, key: u32, parts: &[&[u8]]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_record: {:#010x}", key);

        #[cfg(feature = "debug-logs")]
        println!("internal: write_record {key:#010x}");

        if ReservedKey::is_reserved(key) {
            return Err(Error::ReservedKey);
        }

        let size = parts.iter().map(|part| part.len()).sum::<usize>();
        if size == 0 {
            return Err(Error::EmptyValue);
        }
        let size = u32::try_from(size).map_err(|_| Error::OutOfSpace)?;
        let span = record_span(size);

        // would not even fit into a freshly collected block
        if span > self.block_size - HEADER_FIRST_RECORD_OFFSET {
            return Err(Error::OutOfSpace);
        }

        if self.remaining_size() < span {
            self.compact()?;
            if self.remaining_size() < span {
                return Err(Error::OutOfSpace);
            }
        }

        let previous = match self.find_record(key)? {
            Scan::Found(address) => Some(address),
            Scan::End(_) => None,
            Scan::Corrupted(_) => return Err(Error::CorruptedData),
        };

        let address = self.end_address;
        for (word_index, word) in payload_words(parts).enumerate() {
            self.program_word(
                address + RECORD_DATA_OFFSET + (word_index * WORD_SIZE) as u32,
                word,
            )?;
        }
        self.program_word(address + RECORD_SIZE_OFFSET, size)?;
        self.program_word(address, key)?;

        self.end_address = address + span;

        if let Some(previous) = previous {
            self.erase_record_at(previous)?;
        }

        Ok(())
    }

    pub(crate) fn erase_record(&mut self, key: u32) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase_record: {:#010x}", key);

        #[cfg(feature = "debug-logs")]
        println!("internal: erase_record {key:#010x}");

        let address = self.find_live_record(key)?;
        self.erase_record_at(address)
    }

    /// Zeroes the payload and marks the record as invalid. The size is kept so that scans can still
    /// step over the record.
    fn erase_record_at(&mut self, address: u32) -> Result<(), Error> {
        let header = self.load_record_header(address)?;

        for word_index in 0..header.data_words() {
            self.program_word(
                address + RECORD_DATA_OFFSET + word_index * WORD_SIZE as u32,
                ERASED_WORD,
            )?;
        }
        self.program_word(address, ReservedKey::Invalid as u32)
    }

    fn zero_block(&mut self, block: Block) -> Result<(), Error> {
        #[cfg(feature = "debug-logs")]
        println!("internal: zero_block {block}");

        let base = self.block_base(block);
        for address in (base..base + self.block_size).step_by(WORD_SIZE) {
            self.program_word(address, ERASED_WORD)?;
        }

        Ok(())
    }

    pub(crate) fn format_blocks(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("format_blocks");

        #[cfg(feature = "debug-logs")]
        println!("internal: format_blocks");

        self.zero_block(Block::First)?;
        self.zero_block(Block::Second)?;

        self.current = Block::First;
        self.generation = 0;
        self.end_address = self.current_base() + HEADER_FIRST_RECORD_OFFSET;

        let base = self.current_base();
        self.program_word(base + HEADER_GENERATION_OFFSET, self.generation)?;
        // the magic is written last, an interrupted format leaves both blocks invalid
        self.program_word(base, MAGIC)
    }

    /// Copies all live records into the other block and makes it the current one.
    pub(crate) fn compact(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("compact");

        #[cfg(feature = "debug-logs")]
        println!(
            "internal: compact: {} -> {}",
            self.current,
            self.current.other()
        );

        let source = self.current;
        let target = source.other();

        self.zero_block(target)?;
        let end_address = self.copy_records(source, target)?;

        // The counter is not expected to wrap, a block survives far less erase cycles.
        let generation = self.generation.wrapping_add(1);
        let target_base = self.block_base(target);
        self.program_word(target_base + HEADER_GENERATION_OFFSET, generation)?;
        self.program_word(target_base, MAGIC)?;

        self.current = target;
        self.generation = generation;
        self.end_address = end_address;

        // starts with the magic, once that is gone the stale copy can't be picked up again
        self.zero_block(source)
    }

    /// Returns the end address in the target block.
    fn copy_records(&mut self, source: Block, target: Block) -> Result<u32, Error> {
        let source_base = self.block_base(source);
        let limit = source_base + self.block_size;
        let mut src = source_base + HEADER_FIRST_RECORD_OFFSET;
        let mut dst = self.block_base(target) + HEADER_FIRST_RECORD_OFFSET;

        while src < limit {
            let key = self.read_word(src)?;
            if key == ReservedKey::End as u32 {
                break;
            }
            if limit - src < RECORD_HEADER_SIZE {
                break;
            }

            let header = RecordHeader {
                key,
                size: self.read_word(src + RECORD_SIZE_OFFSET)?,
            };
            let next = match src.checked_add(record_span(header.size)) {
                Some(next) if header.size != 0 && next <= limit => next,
                _ => {
                    #[cfg(feature = "defmt")]
                    warn!("copy_records: dropping everything after {:#010x}", src);

                    #[cfg(feature = "debug-logs")]
                    println!("internal: copy_records: corrupted {header:?} at {src:#010x}");

                    break;
                }
            };

            if !header.is_erased() {
                for offset in (0..header.aligned_size()).step_by(WORD_SIZE) {
                    let word = self.read_word(src + RECORD_DATA_OFFSET + offset)?;
                    self.program_word(dst + RECORD_DATA_OFFSET + offset, word)?;
                }
                self.program_word(dst + RECORD_SIZE_OFFSET, header.size)?;
                self.program_word(dst, header.key)?;
                dst += record_span(header.size);
            }

            src = next;
        }

        Ok(dst)
    }

    /// Selects the current block, formats the blocks if neither is valid and cleans up after
    /// interrupted writes.
    pub(crate) fn recover(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("recover");

        #[cfg(feature = "debug-logs")]
        println!("internal: recover");

        let first = self.load_block_header(Block::First)?;
        let second = self.load_block_header(Block::Second)?;

        #[cfg(feature = "debug-logs")]
        println!("internal: recover: first: {first:?}, second: {second:?}");

        match (first.is_valid(), second.is_valid()) {
            (true, true) => {
                if second.generation > first.generation {
                    self.current = Block::Second;
                    self.generation = second.generation;
                } else {
                    self.current = Block::First;
                    self.generation = first.generation;
                }
            }
            (true, false) => {
                self.current = Block::First;
                self.generation = first.generation;
            }
            (false, true) => {
                self.current = Block::Second;
                self.generation = second.generation;
            }
            (false, false) => {
                #[cfg(feature = "defmt")]
                warn!("recover: no valid block, formatting");

                self.format_blocks()?;
            }
        }

        match self.find_record(ReservedKey::End as u32)? {
            Scan::Found(address) | Scan::End(address) => {
                self.end_address = address;
                if !self.is_erased_from(address)? {
                    #[cfg(feature = "defmt")]
                    warn!("recover: interrupted write at {:#010x}", address);

                    #[cfg(feature = "debug-logs")]
                    println!("internal: recover: interrupted write at {address:#010x}");

                    self.compact()?;
                }
            }
            Scan::Corrupted(address) => {
                #[cfg(feature = "defmt")]
                warn!("recover: corrupted record at {:#010x}", address);

                #[cfg(feature = "debug-logs")]
                println!("internal: recover: corrupted record at {address:#010x}");

                self.end_address = address;
                self.compact()?;
            }
        }

        self.erase_stale_duplicates()
    }

    fn is_erased_from(&mut self, address: u32) -> Result<bool, Error> {
        for address in (address..self.current_limit()).step_by(WORD_SIZE) {
            if self.read_word(address)? != ERASED_WORD {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// A write appends the new record before the old one is erased. If power is lost in between,
    /// the key exists twice and a forward scan would return the older value, so every record that
    /// has a newer copy further down the block is erased here.
    fn erase_stale_duplicates(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase_stale_duplicates");

        let mut address = self.current_base() + HEADER_FIRST_RECORD_OFFSET;
        while address < self.end_address {
            let header = self.load_record_header(address)?;
            let next = address + record_span(header.size);

            if !header.is_erased() {
                if matches!(self.scan_from(next, header.key)?, Scan::Found(_)) {
                    #[cfg(feature = "defmt")]
                    warn!("erase_stale_duplicates: superseded record at {:#010x}", address);

                    #[cfg(feature = "debug-logs")]
                    println!("internal: erase_stale_duplicates: superseded {header:?} at {address:#010x}");

                    self.erase_record_at(address)?;
                }
            }

            address = next;
        }

        Ok(())
    }

    pub(crate) fn collect_statistics(&mut self) -> Result<PastStatistics, Error> {
        let mut records = RecordStatistics { live: 0, erased: 0 };
        let mut bytes = ByteStatistics {
            live: 0,
            reclaimable: 0,
            free: self.remaining_size(),
        };

        let mut address = self.current_base() + HEADER_FIRST_RECORD_OFFSET;
        while address < self.end_address {
            let header = self.load_record_header(address)?;
            let span = record_span(header.size);
            if header.is_erased() {
                records.erased += 1;
                bytes.reclaimable += span;
            } else {
                records.live += 1;
                bytes.live += span;
            }
            address += span;
        }

        Ok(PastStatistics {
            current_block: self.current,
            generation: self.generation,
            records,
            bytes,
        })
    }
}
