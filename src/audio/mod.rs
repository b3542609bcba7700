pub mod device;
pub mod engine;
pub mod host;
pub mod jack;
pub mod ports;
pub mod processor;
