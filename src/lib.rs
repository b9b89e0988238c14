pub mod adb;
pub mod config;
pub mod game_automation;
pub mod template_matching;

pub use adb::AdbBackend;
pub use game_automation::StepEngine;
