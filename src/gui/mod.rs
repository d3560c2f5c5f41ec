pub mod app;
pub mod pane_view;

#[cfg(test)]
mod app_test;

pub use app::*;
