use orb_client::domain::BackfillStatus;

use crate::retry::{poll_until, PollPolicy, PollTimeout};

use super::{BackfillApi, BackfillError};

/// Revert every backfill left `pending` by an earlier run, then wait until
/// none is still in flight. Returns how many reverts were requested.
///
/// A revert that fails is logged and skipped; the wait still covers it since
/// the backfill stays `pending`.
pub async fn revert_pending_backfills<A>(api: &A, policy: &PollPolicy) -> Result<usize, BackfillError>
where
    A: BackfillApi + ?Sized,
{
    let existing = api.list_backfills().await.map_err(BackfillError::List)?;
    let pending: Vec<_> = existing
        .iter()
        .filter(|b| b.status == BackfillStatus::Pending)
        .collect();

    if pending.is_empty() {
        tracing::info!(existing = existing.len(), "no pending backfills to revert");
    }

    let mut reverted = 0usize;
    for backfill in pending {
        tracing::info!(backfill_id = %backfill.id, "reverting pending backfill");
        match api.revert_backfill(&backfill.id).await {
            Ok(_) => {
                reverted += 1;
                metrics::counter!("backfill_reverted_total").increment(1);
            }
            Err(e) => {
                tracing::error!(backfill_id = %backfill.id, error = %e, "failed to revert backfill");
            }
        }
    }

    if !existing.iter().any(|b| b.status.is_in_flight()) {
        return Ok(0);
    }

    poll_until(policy, |attempt| async move {
        let backfills = api.list_backfills().await?;
        let in_flight = backfills.iter().filter(|b| b.status.is_in_flight()).count();
        if in_flight == 0 {
            return Ok::<_, orb_client::OrbError>(Some(()));
        }
        if attempt == 0 {
            tracing::info!(in_flight, "waiting for in-flight backfills to settle");
        }
        Ok(None)
    })
    .await
    .map_err(|PollTimeout { attempts }| BackfillError::ReconcileTimeout { attempts })?;

    tracing::info!(reverted, "no backfills in flight");
    Ok(reverted)
}
