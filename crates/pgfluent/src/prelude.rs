//! Common imports.
//!
//! ```ignore
//! use pgfluent::prelude::*;
//! ```

pub use crate::{
    Connection, ConnectionConfig, Executor, Filter, FromValue, IntoArgs, PartialScan, Record,
    ScanError, SqlError, SqlResult, Transaction, TransactionOptions, Value,
};
