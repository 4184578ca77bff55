pub mod config;
pub mod logging;
pub mod midi;
pub mod render;
pub mod resources;
pub mod runtime;
pub mod state;
pub mod ui;

pub use runtime::app::run;
