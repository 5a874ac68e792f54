pub mod modules;
pub mod runs;
