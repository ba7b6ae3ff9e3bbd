//! # Bit-level Utilities
//!
//! MSB-first bitstream reading, shared by every codec parser in
//! [`crate::demux::parser`].
//!
//! ```rust
//! use robotv_core::utils::BitReader;
//!
//! let data = [0b10110011u8];
//! let mut reader = BitReader::new(&data);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

pub use bits::BitReader;
