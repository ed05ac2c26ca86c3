mod error;
mod point_buffer;
mod scan_reader;

pub use self::error::*;
pub use self::point_buffer::*;
pub use self::scan_reader::*;
