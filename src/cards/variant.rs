use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Finish of a printed card. Scryfall prices each finish separately.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Nonfoil,
    Foil,
    Etched,
    Gilded,
}

impl Variant {
    pub fn is_foil(&self) -> bool {
        !matches!(self, Variant::Nonfoil)
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Nonfoil
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nonfoil => write!(f, "nonfoil"),
            Variant::Foil => write!(f, "foil"),
            Variant::Etched => write!(f, "etched"),
            Variant::Gilded => write!(f, "gilded"),
        }
    }
}

impl FromStr for Variant {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nonfoil" => Ok(Variant::Nonfoil),
            "foil" => Ok(Variant::Foil),
            "etched" => Ok(Variant::Etched),
            "gilded" => Ok(Variant::Gilded),
            _ => Err(()),
        }
    }
}
