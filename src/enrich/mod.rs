// src/enrich/mod.rs

pub mod geocode;
pub mod reward;

use crate::error::Result;
use crate::model::{PharmacyRecord, RewardTable};
use futures::{stream, StreamExt};
use tracing::info;

pub use geocode::{resolve, Geocoder, HttpGeocoder, RetryPolicy};
pub use reward::apply_reward;

#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub retry: RetryPolicy,
    /// Geocode lookups allowed in flight at once. 1 means strictly one record at a time.
    pub concurrency: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: 1,
        }
    }
}

/// Geocode and score every record, in order.
///
/// Lookups run ahead by at most `opts.concurrency` records; results are applied
/// in input order and the first failure returns immediately, dropping any lookups
/// still in flight. Records after the failing one are left untouched.
#[tracing::instrument(level = "info", skip_all, fields(total = records.len()))]
pub async fn enrich_all<G: Geocoder>(
    records: &mut [PharmacyRecord],
    geocoder: &G,
    tables: &[RewardTable],
    opts: &EnrichOptions,
) -> Result<()> {
    let total = records.len();
    let retry = &opts.retry;
    let addresses: Vec<String> = records.iter().map(|r| r.address.clone()).collect();

    let mut coords = stream::iter(addresses)
        .map(move |address| async move { resolve(geocoder, &address, retry).await })
        .buffered(opts.concurrency.max(1));

    for (i, record) in records.iter_mut().enumerate() {
        if i % 100 == 0 || i + 1 == total {
            info!("{}/{} records", i, total);
        }
        let Some(found) = coords.next().await else {
            break;
        };
        let c = found?;
        record.lat = c.latitude;
        record.lon = c.longitude;
        apply_reward(record, tables)?;
    }

    info!("enriched {} records", total);
    Ok(())
}
