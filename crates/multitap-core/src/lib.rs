pub mod config;
pub mod highlight;
pub mod ipc;
pub mod keypad;
pub mod typing;
