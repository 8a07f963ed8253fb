//! Bounded random sampling of proxy records

use crate::proxy::country::CountryFilter;
use crate::proxy::models::ProxyRecord;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Default number of records in a subscription
pub const DEFAULT_PROXY_COUNT: usize = 5;

/// Hard ceiling for the number of records in a subscription
pub const MAX_PROXY_COUNT: usize = 50;

/// Sampler bounds
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    pub default_count: usize,
    pub max_count: usize,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_PROXY_COUNT,
            max_count: MAX_PROXY_COUNT,
        }
    }
}

impl Sampler {
    pub fn new(default_count: usize, max_count: usize) -> Self {
        Self {
            default_count,
            max_count: max_count.max(1),
        }
    }

    /// Resolve a requested limit to `[1, max_count]`, using the default when absent
    pub fn clamp_limit(&self, requested: Option<i64>) -> usize {
        let n = requested.unwrap_or(self.default_count as i64);
        n.clamp(1, self.max_count as i64) as usize
    }

    /// Uniform sample without replacement of up to `n` records
    pub fn sample<R: Rng + ?Sized>(
        &self,
        records: &[ProxyRecord],
        n: usize,
        rng: &mut R,
    ) -> Vec<ProxyRecord> {
        let mut shuffled = records.to_vec();
        shuffled.shuffle(rng);
        shuffled.truncate(n);
        shuffled
    }

    /// Filter by country, falling back to the whole list when nothing matches,
    /// then sample `requested` (clamped) records.
    pub fn select<R: Rng + ?Sized>(
        &self,
        records: &[ProxyRecord],
        country: &str,
        requested: Option<i64>,
        rng: &mut R,
    ) -> Vec<ProxyRecord> {
        let filter = CountryFilter::new(country);
        let filtered: Vec<ProxyRecord> = records
            .iter()
            .filter(|r| filter.accepts(&r.country))
            .cloned()
            .collect();

        let pool = if filtered.is_empty() {
            if !filter.is_empty() {
                debug!(
                    "No records match country {:?}, sampling from all {}",
                    filter.wanted(),
                    records.len()
                );
            }
            records
        } else {
            &filtered
        };

        self.sample(pool, self.clamp_limit(requested), rng)
    }
}
