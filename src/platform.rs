use embedded_storage::{ReadStorage, Storage};

/// Word level access to the medium backing a [`crate::Past`].
///
/// Addresses are absolute byte addresses and always word aligned. The erased state of the medium
/// is all zeroes, so "erasing" a word is programming it to `0`. See README.md for an example
/// implementation.
pub trait Platform {
    type Error;

    /// Reads one word. Must not have side effects.
    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error>;

    /// Programs one word. Programming a word to the value it already holds is a no-op.
    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error>;
}

impl<T: Platform> Platform for &mut T {
    type Error = T::Error;

    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error> {
        T::read_word(self, address)
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        T::program_word(self, address, value)
    }
}

pub const WORD_SIZE: usize = 4;

/// Adapter for EEPROM-style storage which can transparently overwrite single bytes, e.g. the data
/// EEPROM of the STM32L0 series.
///
/// Words are stored little-endian.
pub struct StorageMedium<S> {
    inner: S,
}

impl<S> StorageMedium<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Storage> Platform for StorageMedium<S> {
    type Error = <S as ReadStorage>::Error;

    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error> {
        let mut buf = [0u8; WORD_SIZE];
        self.inner.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        // EEPROM cells wear on every program cycle
        if self.read_word(address)? == value {
            return Ok(());
        }
        self.inner.write(address, &value.to_le_bytes())
    }
}

/// Rounds a payload size up to the next word boundary.
#[inline(always)]
pub(crate) const fn align_word(size: u32) -> u32 {
    size.saturating_add(WORD_SIZE as u32 - 1) & !(WORD_SIZE as u32 - 1)
}

#[cfg(test)]
mod tests {
    use super::align_word;

    #[test]
    fn align_word_rounds_up() {
        assert_eq!(align_word(0), 0);
        assert_eq!(align_word(1), 4);
        assert_eq!(align_word(3), 4);
        assert_eq!(align_word(4), 4);
        assert_eq!(align_word(5), 8);
        assert_eq!(align_word(u32::MAX - 2), u32::MAX & !3);
    }
}
