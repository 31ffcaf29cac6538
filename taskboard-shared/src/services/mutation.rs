//! Identifier fallback for single-task mutations
//!
//! A task id supplied by a caller may be stored either verbatim or as an
//! object id. Mutations try each scoped candidate in order and stop at the
//! first one that affects a document:
//!
//! ```text
//! Unattempted -> TriedVerbatim -> Matched(Verbatim)
//!                              -> TriedHexDecoded -> Matched(HexDecoded)
//!                                                 -> NotFound
//!                              -> NotFound            (no second candidate)
//! ```
//!
//! A store error at any step ends the protocol immediately.

use std::future::Future;
use tracing::debug;

use crate::auth::authorization::ScopedCandidate;
use crate::store::filter::Filter;
use crate::store::identifier::CandidateKind;
use crate::store::StoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Unattempted,
    TriedVerbatim,
    TriedHexDecoded,
    Matched(CandidateKind),
    NotFound,
}

impl FallbackState {
    fn record(self, kind: CandidateKind, affected: u64) -> Self {
        if affected > 0 {
            return FallbackState::Matched(kind);
        }
        match kind {
            CandidateKind::Verbatim => FallbackState::TriedVerbatim,
            CandidateKind::HexDecoded => FallbackState::TriedHexDecoded,
        }
    }

    /// The candidate that matched, if the protocol ended in `Matched`
    pub fn matched(self) -> Option<CandidateKind> {
        match self {
            FallbackState::Matched(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Applies `apply` to each candidate filter until one affects a document
///
/// `apply` returns the matched (update) or deleted (delete) count. The
/// result is always a terminal state: `Matched` or `NotFound`.
pub async fn run_fallback<F, Fut>(candidates: &[ScopedCandidate], mut apply: F) -> StoreResult<FallbackState>
where
    F: FnMut(Filter) -> Fut,
    Fut: Future<Output = StoreResult<u64>>,
{
    let mut state = FallbackState::Unattempted;

    for candidate in candidates {
        let affected = apply(candidate.filter.clone()).await?;
        state = state.record(candidate.kind, affected);
        debug!(candidate = candidate.kind.as_str(), affected, state = ?state, "Mutation candidate tried");

        if state.matched().is_some() {
            return Ok(state);
        }
    }

    Ok(FallbackState::NotFound)
}
