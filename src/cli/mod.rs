pub mod list;
pub mod refresh;
pub mod serve;
pub mod setup;
pub mod show;
pub mod ui;
