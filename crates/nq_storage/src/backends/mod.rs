pub mod elastic;
pub mod table;

pub use elastic::{ElasticConfig, ElasticFields, ElasticStore};
pub use table::{TableConfig, TableFormat, TableStore};
