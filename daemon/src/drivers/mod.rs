mod driver;
mod graceful_shutdown;
mod poller;

pub use driver::Driver;
pub use graceful_shutdown::GracefulShutdown;
pub use poller::PollerDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drivers {
    Poller,
}
