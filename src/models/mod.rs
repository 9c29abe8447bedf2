pub mod complaint;
pub mod enums;

pub use complaint::*;
pub use enums::*;
