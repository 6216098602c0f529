pub mod embed;
pub mod filter;
pub mod http;
pub mod operators;
pub mod query;
pub mod values;

pub use self::embed::{EmbeddedResource, find_embed_mut};
pub use self::filter::{Filter, OrderSpec};
pub use self::http::{HttpMethod, HttpRequest, RestRequest};
pub use self::operators::{CountMode, LogicalOp, NullsOrder, Operation, Operator, SingleMode};
pub use self::query::{Body, Column, Query, Row};
pub use self::values::{Value, is_numeric};
