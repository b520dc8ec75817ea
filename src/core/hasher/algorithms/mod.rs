//! Hash algorithm implementations.

mod crc32;
mod md5sum;

pub use crc32::Crc32Hasher;
pub use md5sum::Md5Hasher;
