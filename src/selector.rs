//! Bounded-retry selection of assets that are not in the history window.
//!
//! Each attempt pulls one batch from a [`Catalog`], drops everything the
//! history already holds and picks among the survivors. A collision costs one
//! attempt; a catalog failure ends the selection at once. Running out of
//! attempts is [`ShortsError::Exhausted`], never a silent reuse.

use crate::catalog::{Catalog, ClipCandidate, Quote};
use crate::error::{ShortsError, ShortsResult};
use crate::history::History;
use crate::logi;
use rand::Rng;

pub const MAX_QUOTE_ATTEMPTS: u32 = 10;
pub const MAX_CLIP_ATTEMPTS: u32 = 5;

/// What a candidate is checked against.
#[derive(Debug, Clone, Copy)]
pub enum Exclusion<'a> {
    /// Accept the first candidate fetched.
    Disabled,
    History(&'a History),
}

impl Exclusion<'_> {
    pub fn quote_used(&self, quote: &Quote) -> bool {
        match self {
            Exclusion::Disabled => false,
            Exclusion::History(history) => history.contains_quote(&quote.content),
        }
    }

    pub fn clip_used(&self, clip: &ClipCandidate) -> bool {
        match self {
            Exclusion::Disabled => false,
            Exclusion::History(history) => history.contains_clip(clip.id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    pub kind: &'static str,
    pub max_attempts: u32,
}

impl SelectionPolicy {
    pub const QUOTES: SelectionPolicy = SelectionPolicy {
        kind: "quote",
        max_attempts: MAX_QUOTE_ATTEMPTS,
    };

    pub const CLIPS: SelectionPolicy = SelectionPolicy {
        kind: "clip",
        max_attempts: MAX_CLIP_ATTEMPTS,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selected<T> {
    pub item: T,
    /// Attempts spent, including the successful one.
    pub attempts: u32,
}

/// One attempt without the transport: filter `batch` and let `pick` choose.
pub fn pick_fresh<T, F, P>(batch: Vec<T>, is_used: F, pick: P) -> Option<T>
where
    F: Fn(&T) -> bool,
    P: FnOnce(Vec<T>) -> Option<T>,
{
    let fresh: Vec<T> = batch.into_iter().filter(|item| !is_used(item)).collect();
    if fresh.is_empty() {
        return None;
    }
    pick(fresh)
}

pub async fn select<C, F, P>(
    catalog: &mut C,
    policy: SelectionPolicy,
    is_used: F,
    mut pick: P,
) -> ShortsResult<Selected<C::Item>>
where
    C: Catalog + ?Sized,
    F: Fn(&C::Item) -> bool,
    P: FnMut(Vec<C::Item>) -> Option<C::Item>,
{
    for attempt in 1..=policy.max_attempts {
        let batch = catalog.fetch(attempt).await?;
        let fetched = batch.len();

        if let Some(item) = pick_fresh(batch, &is_used, &mut pick) {
            return Ok(Selected { item, attempts: attempt });
        }

        logi(format!(
            "  No unused {} among {} fetched, retrying ({}/{})...",
            policy.kind, fetched, attempt, policy.max_attempts
        ));
    }

    Err(ShortsError::Exhausted {
        kind: policy.kind,
        attempts: policy.max_attempts,
    })
}

pub async fn select_quote<C>(catalog: &mut C, exclusion: Exclusion<'_>) -> ShortsResult<Selected<Quote>>
where
    C: Catalog<Item = Quote> + ?Sized,
{
    select(
        catalog,
        SelectionPolicy::QUOTES,
        |quote| exclusion.quote_used(quote),
        |fresh| fresh.into_iter().next(),
    )
    .await
}

pub async fn select_clip<C, R>(
    catalog: &mut C,
    exclusion: Exclusion<'_>,
    rng: &mut R,
) -> ShortsResult<Selected<ClipCandidate>>
where
    C: Catalog<Item = ClipCandidate> + ?Sized,
    R: Rng + ?Sized,
{
    select(
        catalog,
        SelectionPolicy::CLIPS,
        |clip| exclusion.clip_used(clip),
        |fresh| choose_clip(fresh, rng),
    )
    .await
}

/// Uniform pick among downloadable portrait clips, falling back to any
/// downloadable clip when the batch has no portrait one.
pub fn choose_clip<R: Rng + ?Sized>(fresh: Vec<ClipCandidate>, rng: &mut R) -> Option<ClipCandidate> {
    let (mut portrait, mut landscape): (Vec<_>, Vec<_>) = fresh
        .into_iter()
        .filter(|clip| clip.best_variant().is_some())
        .partition(ClipCandidate::is_portrait);

    let pool = if portrait.is_empty() {
        &mut landscape
    } else {
        &mut portrait
    };
    if pool.is_empty() {
        return None;
    }

    let idx = rng.gen_range(0..pool.len());
    Some(pool.swap_remove(idx))
}
