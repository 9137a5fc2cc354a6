use crate::app::run_app;

mod app;
mod cache;
pub mod config;
mod cooldown;
mod drivers;
mod normalize;
mod poller;
mod session;
mod store;
mod upstream;
#[macro_use]
mod utils;

fn init_logger() {
    if std::env::var_os("RUST_LOG").is_none() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    pretty_env_logger::init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    run_app().await
}
