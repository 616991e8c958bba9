use thiserror::Error;

/// Errors that can occur during past operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. A caller would usually only need to handle `KeyNotFound`
/// and `OutOfSpace`, the remaining errors are either programming errors or hardware faults.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Both blocks must have the same, word aligned size large enough for the block header and
    /// the end marker.
    #[error("invalid block size")]
    InvalidBlockSize,

    /// Block addresses have to be word aligned and the blocks must not overlap.
    #[error("invalid block address")]
    InvalidBlockAddress,

    /// The store was never initialized or the last initialization failed.
    #[error("not initialized")]
    NotInitialized,

    /// The internal error value is returned from the provided `impl Platform`. Once returned, the
    /// store refuses further modifications until `init` succeeds.
    #[error("internal flash error")]
    FlashError,

    /// The keys `0x00000000` and `0xFFFFFFFF` are reserved for the block structure.
    #[error("reserved key")]
    ReservedKey,

    /// Empty values can't be stored, erase the key instead.
    #[error("empty value")]
    EmptyValue,

    /// Key not found. Either no value has been written yet or it was erased.
    #[error("key not found")]
    KeyNotFound,

    /// The provided buffer can't hold the stored value. Reports the stored length.
    #[error("buffer too small, value has {0} bytes")]
    BufferTooSmall(usize),

    /// The stored value has a different length than the requested type.
    #[error("value size mismatch: {0} bytes")]
    ValueSizeMismatch(usize),

    /// A record with an impossible size was found or a string is not valid.
    #[error("corrupted data")]
    CorruptedData,

    /// The block is full and garbage collection doesn't help.
    #[error("out of space")]
    OutOfSpace,
}
