//! Source connectors
//!
//! Every source is a [`StatisticsConnector`] parameterised by a
//! [`SourceDialect`]: the dialect knows endpoint shapes and payload mapping,
//! the connector owns the fetcher and applies the shared failure policy.

pub mod aemet;
mod connector;
mod dialect;
pub mod eurostat;
pub mod ine;
pub mod parse;

pub use aemet::{AemetConnector, AemetDialect};
pub use connector::{ConnectorSettings, StatisticsConnector};
pub use dialect::{RawDataset, SourceDialect, SourceRequest, series_fields};
pub use eurostat::{EurostatConnector, EurostatDialect};
pub use ine::{IneConnector, IneDialect, VariableFilter};
