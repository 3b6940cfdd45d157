//! # qfilter
//!
//! > **Query strings in, parameterized SQL out.**
//!
//! qfilter reads the flat parameters of a list endpoint and builds the
//! `select`, `from`, `where` and `order by` clauses for it. Values never
//! reach the SQL text; they come back as named bind parameters (`:name`).
//!
//! ## Quick Example
//!
//! ```rust
//! use qfilter::prelude::*;
//!
//! let params = parse_query_string("_from=users&name__icont=ann&_order=-id")?;
//! let q = translate(&params, &FilterOptions::default())?;
//!
//! assert_eq!(
//!     q.sql,
//!     r#"select * from "users" where upper("name") like upper(:name__icont) order by "id" desc"#
//! );
//! assert_eq!(q.data["name__icont"], "%ann%");
//! # Ok::<(), qfilter::QfilterError>(())
//! ```
//!
//! ## Keys
//!
//! | Key             | Meaning                               |
//! |-----------------|---------------------------------------|
//! | `_select`       | Comma list of columns, default `*`    |
//! | `_from`         | Source relation                       |
//! | `_order`        | Comma list, `-col` for descending     |
//! | `field__op`     | Filter `field` with operator `op`     |
//! | `field`         | Equality filter                       |

pub mod config;
pub mod error;
pub mod ident;
pub mod operators;
pub mod query_string;
pub mod translator;

pub use error::{QfilterError, QfilterResult};
pub use translator::{translate, FilterOptions, FilterQuery, Params};

pub mod prelude {
    pub use crate::config::FilterConfig;
    pub use crate::error::*;
    pub use crate::operators::{
        Builtin, FilterKey, Operator, OperatorRegistry, OperatorSource, Predicate, TemplateOperator,
        ValueTransform,
    };
    pub use crate::query_string::{parse_query_string, parse_query_string_typed};
    pub use crate::translator::{translate, FilterOptions, FilterQuery, Params};
}
