mod atomic;
mod interface;
mod lock;
mod wait;

pub use atomic::*;
pub use interface::*;
pub use lock::*;
