#[macro_use]
extern crate tracing;

mod app;
mod logging;

pub use app::App;
pub use logging::init_logging;
pub use stickypipe_config::Args;

pub fn init_errors() -> color_eyre::Result<()> {
    color_eyre::install()
}
