// Library root: the draft engine and everything the app wires around it.

pub mod catalog;
pub mod db;
pub mod draft;
pub mod loadout;
pub mod protocol;
pub mod scoring;
pub mod settings;
pub mod ws_server;
