mod loopdev;
mod mount;
mod partition;

pub use loopdev::*;
pub use mount::*;
pub use partition::*;
