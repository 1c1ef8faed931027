pub mod hosts;
pub mod status;
pub mod sweep;
pub mod sync;
