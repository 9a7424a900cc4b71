pub mod ecef;
pub mod geodesy;
pub mod matrix;
pub mod precision;
pub mod vec;
pub mod zone;

pub use ecef::*;
pub use geodesy::*;
pub use matrix::*;
pub use precision::*;
pub use vec::*;
pub use zone::*;
