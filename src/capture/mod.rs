pub mod cancel;
pub mod channel;
pub mod controller;
pub mod recorder;
