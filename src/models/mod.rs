pub mod feature;
pub mod prediction;
pub mod segment;
pub mod user;

pub use feature::*;
pub use prediction::*;
pub use segment::*;
pub use user::*;
