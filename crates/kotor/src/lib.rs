//! Command line front end over the `kotor_*` libraries.

pub mod commands;
