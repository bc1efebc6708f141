pub mod candidate;
pub mod enums;
pub mod record;

pub use candidate::*;
pub use enums::*;
pub use record::*;
