//! Drivers shipped with Stacks.

pub mod demo;
pub mod noils;
pub mod sample;

pub use demo::DemoDriver;
pub use noils::NoIlsDriver;
pub use sample::SampleDriver;
