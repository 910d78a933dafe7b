//! Hardware initialisation and timer helpers.

pub mod hw_init;
pub mod hw_timer;
