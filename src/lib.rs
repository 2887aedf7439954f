pub mod cli;
pub mod config;
pub mod configgen;
pub mod conflict;
pub mod mods;
pub mod names;
pub mod reslot;
pub mod scan;
pub mod slot;
pub mod vanilla;
