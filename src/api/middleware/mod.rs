pub mod dev;
pub mod trace;

pub use dev::*;
pub use trace::*;
