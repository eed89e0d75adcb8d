// UI module - session shell and controller
//
// This module contains:
// - commands: the command grammar shared by the shell and `acsm exec`
// - SessionController: one method per operator action
// - Shell: reads command lines and prints session events

pub mod commands;
pub mod controller;
pub mod shell;

pub use commands::{SessionCommand, parse_line};
pub use controller::{SaveSummary, SessionController};
pub use shell::{Flow, Shell};
