use serde::{Deserialize, Serialize};
use signal_core::{FlagInsert, FlagStore};

use crate::gating::FlagCandidate;

/// Counts from one flag-creation batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCreation {
    pub attempted: usize,
    pub created: usize,
    pub skipped_open: usize,
    pub failed: usize,
}

/// Persist candidates, keeping at most one OPEN flag per ticker.
///
/// A store error on one candidate is logged and the batch continues.
pub async fn create_flags<S>(store: &S, candidates: &[FlagCandidate]) -> FlagCreation
where
    S: FlagStore + ?Sized,
{
    let mut result = FlagCreation {
        attempted: candidates.len(),
        ..Default::default()
    };

    if candidates.is_empty() {
        tracing::info!("No flags to create");
        return result;
    }

    tracing::info!("Creating {} trading flags...", candidates.len());

    for candidate in candidates {
        match store.insert_flag_if_absent(&candidate.flag).await {
            Ok(FlagInsert::Created(id)) => {
                result.created += 1;
                tracing::info!(
                    "Created flag {} for {} (ticker_id {})",
                    id,
                    candidate.symbol,
                    candidate.flag.ticker_id
                );
            }
            Ok(FlagInsert::AlreadyOpen) => {
                result.skipped_open += 1;
                tracing::info!(
                    "Skipping {}: open flag already exists for ticker_id {}",
                    candidate.symbol,
                    candidate.flag.ticker_id
                );
            }
            Err(e) => {
                result.failed += 1;
                tracing::error!("Error creating flag for {}: {}", candidate.symbol, e);
            }
        }
    }

    tracing::info!(
        "Successfully created {}/{} flags",
        result.created,
        result.attempted
    );
    result
}
