//! Canonical catalog record types.
//!
//! A [`CatalogEntry`] is the single merged-truth representation of one media
//! item. Kind-specific attributes live in the [`KindAttributes`] tagged
//! payload rather than a subtype hierarchy; merge logic dispatches on the tag.
//! The entry is owned by the external catalog store -- the core only reads it
//! and returns a rewritten copy per refresh.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of catalog entry. Closed set; providers declare which kinds they
/// support and the registry filters on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A TV series (show).
    Series,
    /// A season within a series.
    Season,
    /// A music album.
    Album,
    /// A single audio track.
    Song,
    /// A video game.
    Game,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Series => write!(f, "series"),
            Self::Season => write!(f, "season"),
            Self::Album => write!(f, "album"),
            Self::Song => write!(f, "song"),
            Self::Game => write!(f, "game"),
        }
    }
}

/// Type of artwork slot on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Primary poster/cover image.
    Primary,
    /// Background/backdrop image.
    Backdrop,
    /// Thumbnail image.
    Thumb,
    /// Banner image.
    Banner,
    /// Logo image.
    Logo,
    /// Disc art image.
    Disc,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backdrop => write!(f, "backdrop"),
            Self::Thumb => write!(f, "thumb"),
            Self::Banner => write!(f, "banner"),
            Self::Logo => write!(f, "logo"),
            Self::Disc => write!(f, "disc"),
        }
    }
}

/// A field that an operator can freeze against future merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockedField {
    Name,
    Overview,
    Genres,
    Studios,
    Cast,
    Runtime,
    OfficialRating,
}

/// Airing status of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Continuing,
    Ended,
}

/// Kind-specific attribute payload, selected by the entry's [`EntryKind`].
///
/// Merge logic checks that source and target payloads carry the same variant
/// before applying kind-specific rules; a mismatched payload contributes
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KindAttributes {
    Series {
        status: Option<SeriesStatus>,
        /// ISO-8601 date the series ended; only meaningful when `status` is
        /// [`SeriesStatus::Ended`].
        end_date: Option<String>,
    },
    Season {
        season_number: Option<u32>,
    },
    Album {
        artists: Vec<String>,
    },
    Song {
        artists: Vec<String>,
        album: Option<String>,
    },
    Game {
        /// Platform identifier (e.g. "SNES", "PlayStation 2").
        system: Option<String>,
        players_supported: Option<u32>,
    },
}

impl KindAttributes {
    /// Empty payload for the given kind.
    pub fn empty(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Series => Self::Series {
                status: None,
                end_date: None,
            },
            EntryKind::Season => Self::Season {
                season_number: None,
            },
            EntryKind::Album => Self::Album {
                artists: Vec::new(),
            },
            EntryKind::Song => Self::Song {
                artists: Vec::new(),
                album: None,
            },
            EntryKind::Game => Self::Game {
                system: None,
                players_supported: None,
            },
        }
    }

    /// The kind tag this payload belongs to.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Series { .. } => EntryKind::Series,
            Self::Season { .. } => EntryKind::Season,
            Self::Album { .. } => EntryKind::Album,
            Self::Song { .. } => EntryKind::Song,
            Self::Game { .. } => EntryKind::Game,
        }
    }
}

/// Selected artwork for one image slot: who supplied it and a content
/// fingerprint the store can compare against its downloaded copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTag {
    /// Name of the provider that supplied the winning candidate.
    pub provider: String,
    /// Opaque fingerprint of the candidate (sha256 hex of the url).
    pub fingerprint: String,
    /// Source url of the candidate.
    pub url: String,
}

/// The canonical record for one media item.
///
/// Owned by the external catalog store; [`crate::refresh::RefreshOrchestrator`]
/// takes it by value and returns the rewritten copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable identity assigned by the catalog store.
    pub id: String,
    /// Kind tag selecting the [`KindAttributes`] variant.
    pub kind: EntryKind,
    /// External provider IDs keyed by provider name (e.g. `{"tmdb": "1399"}`).
    pub provider_ids: HashMap<String, String>,

    /// Display name.
    pub name: Option<String>,
    /// Synopsis / overview text.
    pub overview: Option<String>,
    /// Genre labels.
    pub genres: Vec<String>,
    /// Studios / networks / labels.
    pub studios: Vec<String>,
    /// Cast and crew names.
    pub cast: Vec<String>,
    /// Community / audience rating.
    pub community_rating: Option<f64>,
    /// Number of community votes behind the rating.
    pub vote_count: Option<u32>,
    /// Runtime in minutes.
    pub runtime_minutes: Option<u32>,
    /// Premiere / release date as an ISO-8601 string (YYYY-MM-DD).
    pub premiere_date: Option<String>,
    /// Parental guidance rating (e.g. "TV-14").
    pub official_rating: Option<String>,

    /// Kind-specific attributes.
    pub attributes: KindAttributes,

    /// Selected artwork per image slot.
    pub images: HashMap<ImageKind, ImageTag>,
    /// Fields the operator has frozen against merges.
    pub locks: HashSet<LockedField>,
    /// When this entry last completed a refresh; the `since` input to
    /// provider change monitors.
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    /// Create an empty entry of the given kind.
    pub fn new<S: Into<String>>(id: S, kind: EntryKind) -> Self {
        Self {
            id: id.into(),
            kind,
            provider_ids: HashMap::new(),
            name: None,
            overview: None,
            genres: Vec::new(),
            studios: Vec::new(),
            cast: Vec::new(),
            community_rating: None,
            vote_count: None,
            runtime_minutes: None,
            premiere_date: None,
            official_rating: None,
            attributes: KindAttributes::empty(kind),
            images: HashMap::new(),
            locks: HashSet::new(),
            last_refreshed: None,
        }
    }

    /// Look up an external id by provider name.
    pub fn provider_id(&self, provider: &str) -> Option<&str> {
        self.provider_ids.get(provider).map(String::as_str)
    }

    /// Whether the given field is frozen by the operator.
    pub fn is_locked(&self, field: LockedField) -> bool {
        self.locks.contains(&field)
    }
}

/// A provider's partial view of an entry: only the fields the source knows
/// about are populated. Absent fields contribute nothing during merge.
///
/// Deserializes with every field optional, which is also the sidecar
/// descriptor file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialRecord {
    pub name: Option<String>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub cast: Vec<String>,
    pub community_rating: Option<f64>,
    pub vote_count: Option<u32>,
    pub runtime_minutes: Option<u32>,
    pub premiere_date: Option<String>,
    pub official_rating: Option<String>,
    /// External ids contributed by the source (always unioned into the
    /// target, never subject to locks).
    pub provider_ids: HashMap<String, String>,
    /// Kind-specific contribution; ignored when the variant does not match
    /// the target entry's kind.
    pub attributes: Option<KindAttributes>,
}

impl PartialRecord {
    /// `true` when the record carries no contribution at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.overview.is_none()
            && self.genres.is_empty()
            && self.studios.is_empty()
            && self.cast.is_empty()
            && self.community_rating.is_none()
            && self.vote_count.is_none()
            && self.runtime_minutes.is_none()
            && self.premiere_date.is_none()
            && self.official_rating.is_none()
            && self.provider_ids.is_empty()
            && self.attributes.is_none()
    }
}
