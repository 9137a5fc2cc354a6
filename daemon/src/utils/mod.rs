pub use event::*;
pub use task_pool::*;
pub use util::*;

#[macro_use]
pub mod event;
mod task_pool;
mod util;
