//! Transformation steps for the quarry market-data pipeline.
//!
//! Each step reads raw vendor files (or already-built artifacts) and
//! writes one Parquet artifact under `db/`, going through the atomic
//! publish discipline in `quarry_core::publish`. The [`fetch`] module
//! holds the downloaders that populate `data_sources/` in the first
//! place; they are plain HTTP tools and never touch the build outputs.

pub mod archive;
pub mod fetch;
pub mod paths;

mod block_aggs;
mod daily_aggs;
mod insider_trades;
mod market_cap;
mod prices;
mod tickers;

pub use paths::DataPaths;

use quarry_core::{ConfigError, Registry};

/// Register every pipeline step, in pipeline order.
pub fn register_all(registry: &mut Registry, paths: &DataPaths) -> Result<(), ConfigError> {
    tickers::register(registry, paths)?;
    prices::register(registry, paths)?;
    daily_aggs::register(registry, paths)?;
    block_aggs::register(registry, paths)?;
    market_cap::register(registry, paths)?;
    insider_trades::register(registry, paths)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_steps_form_a_valid_pipeline() {
        let mut registry = Registry::new();
        let paths = DataPaths::new(".");
        register_all(&mut registry, &paths).unwrap();

        assert_eq!(registry.len(), 6);
        registry.validate().unwrap();

        let targets: Vec<_> = registry.steps().iter().map(|s| s.target.as_str()).collect();
        assert_eq!(
            targets,
            [
                "tickers",
                "prices",
                "daily_aggs",
                "hundred_day_aggs",
                "market_cap",
                "insider_trades"
            ]
        );
    }
}
