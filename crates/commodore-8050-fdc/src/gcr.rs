//! GCR ROM for the 8050 read/write data path.
//!
//! The controller runs every 10-bit word through a 2 KiB lookup ROM:
//! read words are decoded to nibbles plus a validity flag, and data-latch
//! bytes are encoded to GCR for the write shift register.
//!
//! Commodore GCR maps every 4 bits to a 5-bit pattern with at most two
//! consecutive zeros. Bit 2 of each code always equals bit 2 of its
//! nibble, so the ROM never stores it: the read packing and the write
//! word assembly take those two bits straight from the ROM address.
//!
//! # ROM layout
//!
//! | Address            | Meaning                                        |
//! |--------------------|------------------------------------------------|
//! | `$000-$3FF`        | read: 10-bit word from the read shift register |
//! | `$400-$7FF`        | write: `(PI & $F0) << 1 \| MODE << 4 \| PI & $0F` |
//!
//! Read output: bits 0-1 = low nibble bits 0-1, bit 2 = low nibble bit 3,
//! bit 3 = word valid, bits 4-5 = high nibble bits 0-1, bit 6 = high
//! nibble bit 3.
//!
//! Write output: bits 0-1 = low code bits 0-1, bits 2-3 = low code bits
//! 3-4, bits 4-5 = high code bits 0-1, bits 6-7 = high code bits 3-4.
//! With MODE set the output is `$FF`, which turns a `$FF` latch into ten
//! one bits (a sync run).

/// 4-bit to 5-bit GCR encoding table.
pub const GCR_ENCODE: [u8; 16] = [
    0x0A, 0x0B, 0x12, 0x13, 0x0E, 0x0F, 0x16, 0x17,
    0x09, 0x19, 0x1A, 0x1B, 0x0D, 0x1D, 0x1E, 0x15,
];

/// 5-bit to 4-bit GCR decoding table. Invalid codes map to `0xFF`.
pub const GCR_DECODE: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // 00-07: invalid
    0xFF, 0x08, 0x00, 0x01, 0xFF, 0x0C, 0x04, 0x05, // 08-0F
    0xFF, 0xFF, 0x02, 0x03, 0xFF, 0x0F, 0x06, 0x07, // 10-17
    0xFF, 0x09, 0x0A, 0x0B, 0xFF, 0x0D, 0x0E, 0xFF, // 18-1F
];

/// ROM address bit selecting the write half.
pub const WRITE_HALF: u16 = 0x400;

/// Read output bit flagging a valid 10-bit GCR word.
pub const VALID: u8 = 0x08;

/// 10-bit word mask shared by the read and write shift registers.
pub const WORD_MASK: u16 = 0x3FF;

/// The generated 2 KiB GCR ROM.
pub static GCR_ROM: [u8; 2048] = build_rom();

const fn bit(value: u16, n: u32) -> u8 {
    ((value >> n) & 1) as u8
}

const fn read_entry(word: u16) -> u8 {
    let hi = GCR_DECODE[((word >> 5) & 0x1F) as usize];
    let lo = GCR_DECODE[(word & 0x1F) as usize];
    if hi == 0xFF || lo == 0xFF {
        return 0x00;
    }
    let hi = hi as u16;
    let lo = lo as u16;
    (lo & 0x03) as u8
        | (bit(lo, 3) << 2)
        | VALID
        | (((hi & 0x03) as u8) << 4)
        | (bit(hi, 3) << 6)
}

const fn write_entry(index: u16) -> u8 {
    if index & 0x10 != 0 {
        return 0xFF;
    }
    let hi = GCR_ENCODE[((index >> 5) & 0x0F) as usize] as u16;
    let lo = GCR_ENCODE[(index & 0x0F) as usize] as u16;
    (lo & 0x03) as u8
        | (((lo >> 3) & 0x03) as u8) << 2
        | (((hi & 0x03) as u8) << 4)
        | (((hi >> 3) & 0x03) as u8) << 6
}

const fn build_rom() -> [u8; 2048] {
    let mut rom = [0u8; 2048];
    let mut addr = 0;
    while addr < 0x400 {
        rom[addr] = read_entry(addr as u16);
        rom[addr | WRITE_HALF as usize] = write_entry(addr as u16);
        addr += 1;
    }
    rom
}

/// ROM index for a write-mode lookup of the data latch.
#[must_use]
pub fn write_index(pi: u8, mode_sel: bool) -> u16 {
    let pi = u16::from(pi);
    ((pi & 0xF0) << 1) | (u16::from(mode_sel) << 4) | (pi & 0x0F)
}

/// Look up a ROM byte. `write` selects the write half.
#[must_use]
pub fn lookup(index: u16, write: bool) -> u8 {
    let addr = (index & WORD_MASK) | if write { WRITE_HALF } else { 0 };
    GCR_ROM[addr as usize]
}

/// Assemble the 10-bit write word from a write-half ROM byte and its index.
#[must_use]
pub fn encode_word(e: u8, i: u16) -> u16 {
    let e = u16::from(e);
    let lo = (e & 0x03) | (((i >> 2) & 1) << 2) | (((e >> 2) & 0x03) << 3);
    let hi = ((e >> 4) & 0x03) | (((i >> 7) & 1) << 2) | (((e >> 6) & 0x03) << 3);
    (hi << 5) | lo
}

/// Host-visible data byte packed from a ROM byte `e` and its index `i`.
///
/// Bit 7 = e6, bit 6 = i7, bits 5-4 = e5-e4, bit 3 = e2, bit 2 = i2,
/// bits 1-0 = e1-e0. For a valid read word this is the decoded byte.
#[must_use]
pub fn pack_read(e: u8, i: u16) -> u8 {
    let i = i as u8;
    (((e >> 6) & 1) << 7) | (((i >> 7) & 1) << 6) | (e & 0x33) | (((e >> 2) & 1) << 3) | (i & 0x04)
}

/// GCR-encode a byte into a 10-bit word (high nibble first).
#[must_use]
pub fn encode_byte(byte: u8) -> u16 {
    (u16::from(GCR_ENCODE[(byte >> 4) as usize]) << 5) | u16::from(GCR_ENCODE[(byte & 0x0F) as usize])
}
