//! Lookup and store bookkeeping, free of any I/O.

mod closest_nodes;
mod iterative_query;
mod put_query;

pub use closest_nodes::ClosestNodes;
pub use iterative_query::LookupTrace;
pub(crate) use iterative_query::{IterativeQuery, RoundOutcome};
pub use put_query::{PutError, StoreReport};
pub(crate) use put_query::PutQuery;
