pub mod format;
pub mod serve;
pub mod show;
pub mod status;
pub mod sync;
