#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::{ReadStorage, Storage};
use past::platform::Platform;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;

pub const WORD_SIZE: usize = 4;
pub const MAGIC: u32 = 0x7061_7374;
pub const BLOCK_HEADER_SIZE: u32 = 8;
pub const RECORD_HEADER_SIZE: u32 = 8;

/// Base address of the fake EEPROM, a second block follows directly after the first.
pub const BASE_ADDRESS: u32 = 0x0808_0000;

#[derive(Default, Clone)]
pub struct Eeprom {
    pub base: u32,
    pub words: Vec<u32>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { address: u32 },
    Program { address: u32, value: u32 },
}

impl Eeprom {
    /// Two blocks of `block_size` bytes, erased.
    pub fn new(block_size: u32) -> Self {
        Self::new_at(BASE_ADDRESS, block_size)
    }

    /// Two blocks of `block_size` bytes starting at `base`, erased.
    pub fn new_at(base: u32, block_size: u32) -> Self {
        Self {
            base,
            words: vec![0u32; 2 * block_size as usize / WORD_SIZE],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    /// Fails every read and program once `fail_after_operation` operations went through.
    pub fn new_with_fault(block_size: u32, fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new(block_size)
        }
    }

    pub fn blocks(block_size: u32) -> [u32; 2] {
        [BASE_ADDRESS, BASE_ADDRESS + block_size]
    }

    pub fn len(&self) -> usize {
        self.words.len() * WORD_SIZE
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    /// Fail after `count` further operations.
    pub fn fail_in(&mut self, count: usize) {
        self.fail_after_operation = self.operations.len() + count;
    }

    pub fn word(&self, address: u32) -> u32 {
        self.words[self.index(address)]
    }

    pub fn set_word(&mut self, address: u32, value: u32) {
        let index = self.index(address);
        self.words[index] = value;
    }

    pub fn programs(&self) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Program { .. }))
            .cloned()
            .collect()
    }

    pub fn clear_operations(&mut self) {
        self.operations.clear();
        self.disable_faults();
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn index(&self, address: u32) -> usize {
        assert!(address.is_multiple_of(WORD_SIZE as u32));
        (address - self.base) as usize / WORD_SIZE
    }
}

#[derive(Debug)]
pub struct EepromError;

impl Platform for Eeprom {
    type Error = EepromError;

    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error> {
        if self.operations.len() >= self.fail_after_operation {
            println!("    eeprom: FAULT");
            return Err(EepromError);
        }
        self.operations.push(Operation::Read { address });

        Ok(self.word(address))
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        println!(
            "    eeprom: program: 0x{address:08X} = 0x{value:08X} #{:>3}",
            self.operations.len()
        );

        if self.operations.len() >= self.fail_after_operation {
            println!("    eeprom: FAULT");
            return Err(EepromError);
        }
        self.operations.push(Operation::Program { address, value });

        self.set_word(address, value);
        Ok(())
    }
}

/// An `Eeprom` that stays reachable while a `Past` owns a handle to it, so tests can modify the
/// medium behind the back of a running store.
#[derive(Default, Clone)]
pub struct SharedEeprom(Rc<RefCell<Eeprom>>);

impl SharedEeprom {
    pub fn new(eeprom: Eeprom) -> Self {
        Self(Rc::new(RefCell::new(eeprom)))
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Eeprom> {
        self.0.borrow_mut()
    }
}

impl Platform for SharedEeprom {
    type Error = EepromError;

    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error> {
        self.0.borrow_mut().read_word(address)
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        self.0.borrow_mut().program_word(address, value)
    }
}

/// Byte addressed storage, used through `past::platform::StorageMedium`.
pub struct ByteStorage {
    pub buf: Vec<u8>,
    pub writes: usize,
}

impl ByteStorage {
    pub fn new(len: usize) -> Self {
        Self {
            buf: vec![0u8; len],
            writes: 0,
        }
    }
}

impl ReadStorage for ByteStorage {
    type Error = EepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        let end = offset + bytes.len();
        if end > self.buf.len() {
            return Err(EepromError);
        }
        bytes.copy_from_slice(&self.buf[offset..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl Storage for ByteStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        let end = offset + bytes.len();
        if end > self.buf.len() {
            return Err(EepromError);
        }
        self.writes += 1;
        self.buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}
