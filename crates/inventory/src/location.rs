use serde::{Deserialize, Serialize};

/// Kind of location stock is held at.
///
/// Required whenever a transfer names its source; there is no implied default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Store,
    Warehouse,
    Headquarters,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Store => "store",
            LocationType::Warehouse => "warehouse",
            LocationType::Headquarters => "headquarters",
        }
    }
}

impl core::fmt::Display for LocationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
