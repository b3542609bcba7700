pub mod chain;
pub mod design;
pub mod stages;
