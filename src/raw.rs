use crate::platform::{WORD_SIZE, align_word};
use core::cmp::min;
use core::fmt::{Debug, Formatter};

/// ASCII "past" read as a big-endian word.
pub(crate) const MAGIC: u32 = u32::from_be_bytes(*b"past");

pub(crate) const HEADER_GENERATION_OFFSET: u32 = 4;
pub(crate) const HEADER_FIRST_RECORD_OFFSET: u32 = 8;

pub(crate) const RECORD_SIZE_OFFSET: u32 = 4;
pub(crate) const RECORD_DATA_OFFSET: u32 = 8;
pub(crate) const RECORD_HEADER_SIZE: u32 = RECORD_DATA_OFFSET;

/// Smallest usable block: the block header plus one sentinel.
pub(crate) const MIN_BLOCK_SIZE: u32 = HEADER_FIRST_RECORD_OFFSET + RECORD_HEADER_SIZE;

pub(crate) const ERASED_WORD: u32 = 0;

const _: () = assert!(WORD_SIZE == 4, "the block layout is defined in 32-bit words");

/// Key words with a special meaning. Every other value is a user key.
#[derive(strum::FromRepr, strum::Display, Debug, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub(crate) enum ReservedKey {
    // Same as erased space, marks the end of the records in a block.
    End = 0x0000_0000,

    // A record that was erased or superseded and will be dropped by the next garbage collection.
    Invalid = 0xFFFF_FFFF,
}

impl ReservedKey {
    pub(crate) fn is_reserved(key: u32) -> bool {
        Self::from_repr(key).is_some()
    }
}

/// One of the two blocks.
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Block {
    First = 0,
    Second = 1,
}

impl Block {
    pub(crate) fn other(self) -> Block {
        match self {
            Block::First => Block::Second,
            Block::Second => Block::First,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[derive(Copy, Clone, PartialEq)]
pub(crate) struct BlockHeader {
    pub(crate) magic: u32,
    pub(crate) generation: u32,
}

impl BlockHeader {
    pub(crate) fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }
}

impl Debug for BlockHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        if self.is_valid() {
            f.write_fmt(format_args!(
                "BlockHeader {{ generation: {} }}",
                self.generation
            ))
        } else {
            f.write_fmt(format_args!(
                "BlockHeader {{ magic: 0x{:0>8x} (invalid) }}",
                self.magic
            ))
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct RecordHeader {
    pub(crate) key: u32,
    pub(crate) size: u32,
}

impl RecordHeader {
    pub(crate) fn is_erased(&self) -> bool {
        self.key == ReservedKey::Invalid as u32
    }

    /// Payload size rounded up to whole words.
    pub(crate) fn aligned_size(&self) -> u32 {
        align_word(self.size)
    }

    pub(crate) fn data_words(&self) -> u32 {
        self.aligned_size() / WORD_SIZE as u32
    }
}

impl Debug for RecordHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let key = self.key;
        let size = self.size;
        match ReservedKey::from_repr(key) {
            Some(reserved) => f.write_fmt(format_args!(
                "RecordHeader {{ key: {reserved}, size: {size} }}"
            )),
            None => f.write_fmt(format_args!(
                "RecordHeader {{ key: 0x{key:0>8x}, size: {size} }}"
            )),
        }
    }
}

/// Bytes a record with `payload_len` bytes of payload occupies in a block.
pub(crate) fn record_span(payload_len: u32) -> u32 {
    RECORD_HEADER_SIZE.saturating_add(align_word(payload_len))
}

/// Packs the concatenated parts into little-endian words. A trailing partial word is padded with
/// zero bytes in its most significant bytes.
pub(crate) fn payload_words<'a>(parts: &'a [&'a [u8]]) -> impl Iterator<Item = u32> + 'a {
    let mut bytes = parts.iter().flat_map(|part| part.iter().copied()).peekable();
    core::iter::from_fn(move || {
        bytes.peek()?;
        let mut buf = [0u8; WORD_SIZE];
        for (dst, src) in buf.iter_mut().zip(&mut bytes) {
            *dst = src;
        }
        Some(u32::from_le_bytes(buf))
    })
}

/// Inverse of [`payload_words`] for the word at `word_index`, dropping any padding beyond `dst`.
pub(crate) fn unpack_word(dst: &mut [u8], word_index: usize, word: u32) {
    let start = word_index * WORD_SIZE;
    let end = min(start + WORD_SIZE, dst.len());
    dst[start..end].copy_from_slice(&word.to_le_bytes()[..end - start]);
}
