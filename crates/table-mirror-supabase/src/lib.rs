pub mod error_body;
pub mod source;

pub use error_body::PostgrestError;
pub use source::{SupabaseConfig, SupabaseSource};
