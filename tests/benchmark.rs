use crate::common::Operation::{Program, Read};
use crate::common::{BASE_ADDRESS, Eeprom, MAGIC, Operation, WORD_SIZE};
use past::Past;
use pretty_assertions::assert_eq;

mod common;

const BLOCK_SIZE: u32 = 64;
const FIRST: u32 = BASE_ADDRESS;
const SECOND: u32 = BASE_ADDRESS + BLOCK_SIZE;

fn reads(from: u32, to: u32) -> impl Iterator<Item = Operation> {
    (from..to).step_by(WORD_SIZE).map(|address| Read { address })
}

fn zeroes(from: u32, to: u32) -> impl Iterator<Item = Operation> {
    (from..to)
        .step_by(WORD_SIZE)
        .map(|address| Program { address, value: 0 })
}

fn header_reads() -> Vec<Operation> {
    vec![
        Read { address: FIRST },
        Read { address: FIRST + 4 },
        Read { address: SECOND },
        Read {
            address: SECOND + 4,
        },
    ]
}

#[test]
fn single_u32() {
    let mut eeprom = Eeprom::new(BLOCK_SIZE);

    let mut past = Past::new(Eeprom::blocks(BLOCK_SIZE), BLOCK_SIZE, &mut eeprom).unwrap();
    past.set(1, 0xAAu32).unwrap();

    let mut ops = header_reads();
    // format
    ops.extend(zeroes(FIRST, FIRST + BLOCK_SIZE));
    ops.extend(zeroes(SECOND, SECOND + BLOCK_SIZE));
    ops.push(Program {
        address: FIRST + 4,
        value: 0,
    });
    ops.push(Program {
        address: FIRST,
        value: MAGIC,
    });
    // end marker, then the check for leftovers of an interrupted write
    ops.push(Read { address: FIRST + 8 });
    ops.extend(reads(FIRST + 8, FIRST + BLOCK_SIZE));
    // write: lookup, payload, size, key
    ops.push(Read { address: FIRST + 8 });
    ops.push(Program {
        address: FIRST + 16,
        value: 0xAA,
    });
    ops.push(Program {
        address: FIRST + 12,
        value: 4,
    });
    ops.push(Program {
        address: FIRST + 8,
        value: 1,
    });

    assert_eq!(eeprom.operations, ops);
    eeprom.operations.clear();

    let mut past = Past::new(Eeprom::blocks(BLOCK_SIZE), BLOCK_SIZE, &mut eeprom).unwrap();
    assert_eq!(past.get::<u32>(1).unwrap(), 0xAA);

    let mut ops = header_reads();
    // skip the record, find the end marker, check the rest
    ops.push(Read { address: FIRST + 8 });
    ops.push(Read {
        address: FIRST + 12,
    });
    ops.push(Read {
        address: FIRST + 20,
    });
    ops.extend(reads(FIRST + 20, FIRST + BLOCK_SIZE));
    // duplicate check of the only record
    ops.push(Read { address: FIRST + 8 });
    ops.push(Read {
        address: FIRST + 12,
    });
    ops.push(Read {
        address: FIRST + 20,
    });
    // get: length, then lookup again and copy
    for _ in 0..2 {
        ops.push(Read { address: FIRST + 8 });
        ops.push(Read { address: FIRST + 8 });
        ops.push(Read {
            address: FIRST + 12,
        });
    }
    ops.push(Read {
        address: FIRST + 16,
    });

    assert_eq!(eeprom.operations, ops);
}
