pub mod courses;
pub mod system;

pub use courses::*;
pub use system::*;
