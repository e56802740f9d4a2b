pub mod autoplay;
pub mod compare;
pub mod sink;

pub use autoplay::*;
pub use compare::*;
pub use sink::*;
