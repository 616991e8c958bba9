//! The `Get<T>` trait and its implementation in this module allows providing a single generic,
//! overloaded function `get<T>()` for all supported types of the driver.

use crate::error::Error;
use crate::platform::Platform;
use crate::Past;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::mem::size_of;

pub trait Get<T> {
    fn get(&mut self, key: u32) -> Result<T, Error>;
}

impl<T, G: Get<T>> Get<T> for &mut G {
    fn get(&mut self, key: u32) -> Result<T, Error> {
        (*self).get(key)
    }
}

impl<T: Platform> Get<u32> for Past<T> {
    fn get(&mut self, key: u32) -> Result<u32, Error> {
        let len = self.len(key)?;
        if len != size_of::<u32>() {
            return Err(Error::ValueSizeMismatch(len));
        }

        let mut buf = [0u8; size_of::<u32>()];
        self.read(key, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl<T: Platform> Get<Vec<u8>> for Past<T> {
    fn get(&mut self, key: u32) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; self.len(key)?];
        let len = self.read(key, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }
}

/// Strings are stored C style, everything from the first null byte on is ignored.
impl<T: Platform> Get<String> for Past<T> {
    fn get(&mut self, key: u32) -> Result<String, Error> {
        let buf: Vec<u8> = self.get(key)?;
        let end = buf
            .iter()
            .position(|&b| b == b'\0')
            .ok_or(Error::CorruptedData)?;

        let str = core::str::from_utf8(&buf[..end]).map_err(|_| Error::CorruptedData)?;
        Ok(str.to_string())
    }
}
