pub mod facilitator;
pub mod middleware;
pub mod pricing;

pub use facilitator::*;
pub use middleware::*;
pub use pricing::*;
