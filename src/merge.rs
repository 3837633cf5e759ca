//! Field-level merge of provider contributions into a catalog entry.
//!
//! The merge is pure and never fails: an absent or mismatched source field is
//! "no contribution", not an error. Locked fields are untouched regardless of
//! policy or source value.
//!
//! Per-field rules:
//! - scalar, `replace_data`: target takes the source value whenever the
//!   source has one; absent source values never blank an existing target.
//! - scalar, fill-missing: target takes the source value only when the
//!   target is currently empty.
//! - lists (genres, studios, cast, artists): replaced wholesale when the
//!   source list is non-empty and either `replace_data` is set or the target
//!   list is empty; never partially unioned.
//! - kind-specific attributes follow the scalar rule, after shared fields,
//!   and only when the source payload variant matches the entry's kind.

use crate::catalog::{CatalogEntry, KindAttributes, LockedField, PartialRecord};

/// Controls whether present source values overwrite present target values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    pub replace_data: bool,
}

impl MergePolicy {
    /// Present source values overwrite unlocked target values (later-wins).
    pub fn replace() -> Self {
        Self { replace_data: true }
    }

    /// Source values only fill currently-empty target fields.
    pub fn fill_missing() -> Self {
        Self {
            replace_data: false,
        }
    }
}

/// Merge one provider's partial record into `target` under the entry's locks.
///
/// Returns the updated entry. Evaluated once per provider, in provider
/// priority order; under [`MergePolicy::replace`] a later provider overwrites
/// an earlier one for unlocked scalar fields.
pub fn merge(mut target: CatalogEntry, source: &PartialRecord, policy: MergePolicy) -> CatalogEntry {
    let replace = policy.replace_data;
    let locks = target.locks.clone();
    let locked = |field: LockedField| locks.contains(&field);

    if !locked(LockedField::Name) {
        merge_scalar(&mut target.name, &source.name, replace);
    }
    if !locked(LockedField::Overview) {
        merge_scalar(&mut target.overview, &source.overview, replace);
    }
    if !locked(LockedField::Runtime) {
        merge_scalar(&mut target.runtime_minutes, &source.runtime_minutes, replace);
    }
    if !locked(LockedField::OfficialRating) {
        merge_scalar(&mut target.official_rating, &source.official_rating, replace);
    }

    // Ratings and dates have no operator lock.
    merge_scalar(&mut target.community_rating, &source.community_rating, replace);
    merge_scalar(&mut target.vote_count, &source.vote_count, replace);
    merge_scalar(&mut target.premiere_date, &source.premiere_date, replace);

    if !locked(LockedField::Genres) {
        merge_list(&mut target.genres, &source.genres, replace);
    }
    if !locked(LockedField::Studios) {
        merge_list(&mut target.studios, &source.studios, replace);
    }
    if !locked(LockedField::Cast) {
        merge_list(&mut target.cast, &source.cast, replace);
    }

    // External ids are always unioned; a provider knowing an id is never
    // wrong to record, and ids carry no lock.
    for (provider, id) in &source.provider_ids {
        if !id.is_empty() {
            target.provider_ids.insert(provider.clone(), id.clone());
        }
    }

    // Kind-specific fields merge after the shared fields, and only when the
    // source payload is for the same kind as the entry.
    if let Some(attrs) = &source.attributes {
        if attrs.kind() == target.kind {
            merge_attributes(&mut target.attributes, attrs, replace);
        }
    }

    target
}

/// Scalar rule: present source values land per policy; empty strings count
/// as absent.
fn merge_scalar<T: Clone + Emptiness>(target: &mut Option<T>, source: &Option<T>, replace: bool) {
    let Some(value) = source else { return };
    if value.is_empty_value() {
        return;
    }
    if replace || target.as_ref().map_or(true, Emptiness::is_empty_value) {
        *target = Some(value.clone());
    }
}

/// List rule: wholesale replacement only, never a partial union.
fn merge_list(target: &mut Vec<String>, source: &[String], replace: bool) {
    if source.is_empty() {
        return;
    }
    if replace || target.is_empty() {
        *target = source.to_vec();
    }
}

fn merge_attributes(target: &mut KindAttributes, source: &KindAttributes, replace: bool) {
    match (target, source) {
        (
            KindAttributes::Series { status, end_date },
            KindAttributes::Series {
                status: src_status,
                end_date: src_end,
            },
        ) => {
            merge_scalar(status, src_status, replace);
            merge_scalar(end_date, src_end, replace);
        }
        (
            KindAttributes::Season { season_number },
            KindAttributes::Season {
                season_number: src_number,
            },
        ) => {
            merge_scalar(season_number, src_number, replace);
        }
        (
            KindAttributes::Album { artists },
            KindAttributes::Album {
                artists: src_artists,
            },
        ) => {
            merge_list(artists, src_artists, replace);
        }
        (
            KindAttributes::Song { artists, album },
            KindAttributes::Song {
                artists: src_artists,
                album: src_album,
            },
        ) => {
            merge_list(artists, src_artists, replace);
            merge_scalar(album, src_album, replace);
        }
        (
            KindAttributes::Game {
                system,
                players_supported,
            },
            KindAttributes::Game {
                system: src_system,
                players_supported: src_players,
            },
        ) => {
            merge_scalar(system, src_system, replace);
            merge_scalar(players_supported, src_players, replace);
        }
        // Caller guarantees matching variants; anything else is no-op.
        _ => {}
    }
}

/// "Empty" for merge purposes: blank strings behave like absent values so a
/// provider emitting `""` never blanks a real value.
trait Emptiness {
    fn is_empty_value(&self) -> bool;
}

impl Emptiness for String {
    fn is_empty_value(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Emptiness for u32 {
    fn is_empty_value(&self) -> bool {
        false
    }
}

impl Emptiness for f64 {
    fn is_empty_value(&self) -> bool {
        false
    }
}

impl Emptiness for crate::catalog::SeriesStatus {
    fn is_empty_value(&self) -> bool {
        false
    }
}
