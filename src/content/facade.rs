use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identity of a facade (display device or wall).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacadeId(pub u64);

impl fmt::Display for FacadeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FacadeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(FacadeId)
    }
}

impl From<u64> for FacadeId {
    fn from(id: u64) -> Self {
        FacadeId(id)
    }
}

/// Facade record as maintained by the administrative side. Read-only here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Facade {
    pub id: FacadeId,

    #[serde(default)]
    pub name: String,

    /// Grid geometry in cells
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub columns: u32,

    /// Pixel geometry of the whole facade
    #[serde(default)]
    pub width_px: u32,
    #[serde(default)]
    pub height_px: u32,
}

/// Known facades, keyed by id.
///
/// An empty directory is open: every facade id is accepted. Once any facade
/// is registered, only registered ids may be published to or attached.
#[derive(Clone, Debug, Default)]
pub struct FacadeDirectory {
    facades: BTreeMap<FacadeId, Facade>,
}

impl FacadeDirectory {
    pub fn new(facades: impl IntoIterator<Item = Facade>) -> Self {
        Self {
            facades: facades.into_iter().map(|f| (f.id, f)).collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.facades.is_empty()
    }

    pub fn accepts(&self, id: FacadeId) -> bool {
        self.is_open() || self.facades.contains_key(&id)
    }

    pub fn get(&self, id: FacadeId) -> Option<&Facade> {
        self.facades.get(&id)
    }

    /// Registered facades in id order
    pub fn iter(&self) -> impl Iterator<Item = &Facade> {
        self.facades.values()
    }

    pub fn len(&self) -> usize {
        self.facades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facades.is_empty()
    }
}
