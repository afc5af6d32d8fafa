//! Hardware capability traits.

pub mod pin_port;

pub use pin_port::{Level, NumberingMode, Pin, PinPort, PortError, PwmChannel};
