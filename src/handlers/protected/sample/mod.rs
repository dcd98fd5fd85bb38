pub mod records;

// Re-export handler functions for use in routing
pub use records::get as records_get;
pub use records::post as records_post;
