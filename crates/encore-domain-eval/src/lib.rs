pub mod comparator;
pub mod feedback;
pub mod grading;
pub mod judge;
pub mod scoring;

pub use comparator::*;
pub use feedback::*;
pub use grading::*;
pub use judge::*;
pub use scoring::*;
