mod app;
mod command;
mod effects;
pub mod logging;
mod render;

pub use app::run;
