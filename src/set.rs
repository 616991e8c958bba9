use crate::error::Error;
use crate::platform::Platform;
use crate::Past;
use core::ffi::CStr;

pub trait Set<T> {
    fn set(&mut self, key: u32, value: T) -> Result<(), Error>;
}

impl<T, S: Set<T>> Set<T> for &mut S {
    fn set(&mut self, key: u32, value: T) -> Result<(), Error> {
        (*self).set(key, value)
    }
}

impl<T: Platform> Set<u32> for Past<T> {
    fn set(&mut self, key: u32, value: u32) -> Result<(), Error> {
        self.write_parts(key, &[&value.to_le_bytes()])
    }
}

impl<T: Platform> Set<&[u8]> for Past<T> {
    fn set(&mut self, key: u32, value: &[u8]) -> Result<(), Error> {
        self.write_parts(key, &[value])
    }
}

/// Stored up to the first null byte, followed by a null terminator.
impl<T: Platform> Set<&str> for Past<T> {
    fn set(&mut self, key: u32, value: &str) -> Result<(), Error> {
        let bytes = value.as_bytes();
        let len = bytes.iter().position(|&b| b == b'\0').unwrap_or(bytes.len());
        self.write_parts(key, &[&bytes[..len], b"\0"])
    }
}

impl<T: Platform> Set<&CStr> for Past<T> {
    fn set(&mut self, key: u32, value: &CStr) -> Result<(), Error> {
        self.write_parts(key, &[value.to_bytes_with_nul()])
    }
}
