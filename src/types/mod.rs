pub mod layout;
pub mod packet;
pub mod session;
pub mod stats;

pub use layout::*;
pub use packet::*;
pub use session::*;
pub use stats::*;
