pub mod cli;
pub mod loopback;
