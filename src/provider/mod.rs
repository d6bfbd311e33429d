//! Data provider module
//!
//! Sources materialize records; the provider guards access behind its
//! load state.

mod data_provider;
mod source;

pub use data_provider::DataProvider;
pub use source::{DataSource, FileFormat, FileSource, InlineSource, LoadedData};
