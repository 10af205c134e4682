pub mod client;
pub mod repository;
pub mod router;

pub use client::*;
pub use repository::*;
pub use router::*;
