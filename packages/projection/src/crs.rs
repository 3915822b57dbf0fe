//! Reference system identifiers and their PROJ.4 definitions.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ProjectionError;

/// WGS84 geographic (longitude/latitude in degrees).
pub const EPSG_WGS84: u32 = 4326;
/// NAD83 geographic.
pub const EPSG_NAD83: u32 = 4269;
/// Web Mercator (spherical Mercator).
pub const EPSG_WEB_MERCATOR: u32 = 3857;

const WGS84_DEF: &str = "+proj=longlat +datum=WGS84 +no_defs";
const NAD83_DEF: &str = "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs";
const WEB_MERCATOR_DEF: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";
const CONUS_ALBERS_DEF: &str = "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 \
     +x_0=0 +y_0=0 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs";
const TEXAS_CENTRIC_ALBERS_DEF: &str = "+proj=aea +lat_0=18 +lon_0=-100 +lat_1=27.5 +lat_2=35 \
     +x_0=1500000 +y_0=6000000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs";

/// A coordinate reference system.
///
/// Either a well-known EPSG code or a raw PROJ.4 definition string. Parsed
/// from `"EPSG:<code>"` or from a string starting with `+proj=`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// An EPSG registry code.
    Epsg(u32),
    /// A PROJ.4 definition string.
    Proj(Arc<str>),
}

impl Crs {
    /// WGS84 geographic, the system all incoming queries use.
    pub const WGS84: Self = Self::Epsg(EPSG_WGS84);

    /// Returns the PROJ.4 definition for this reference system.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UnsupportedCrs`] for EPSG codes that are
    /// not in the built-in table.
    pub fn definition(&self) -> Result<Cow<'static, str>, ProjectionError> {
        match self {
            Self::Epsg(code) => {
                epsg_definition(*code).ok_or_else(|| ProjectionError::UnsupportedCrs(self.to_string()))
            }
            Self::Proj(def) => Ok(Cow::Owned(def.to_string())),
        }
    }

    /// Whether coordinates in this system are angular (degrees).
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        match self {
            Self::Epsg(code) => matches!(*code, EPSG_WGS84 | EPSG_NAD83),
            Self::Proj(def) => ["longlat", "latlong", "lonlat", "latlon"]
                .iter()
                .any(|name| def.contains(&format!("+proj={name}"))),
        }
    }

    /// Whether this is WGS84 geographic.
    #[must_use]
    pub fn is_wgs84(&self) -> bool {
        *self == Self::WGS84
    }
}

fn epsg_definition(code: u32) -> Option<Cow<'static, str>> {
    let def = match code {
        EPSG_WGS84 => Cow::Borrowed(WGS84_DEF),
        EPSG_NAD83 => Cow::Borrowed(NAD83_DEF),
        EPSG_WEB_MERCATOR => Cow::Borrowed(WEB_MERCATOR_DEF),
        5070 => Cow::Borrowed(CONUS_ALBERS_DEF),
        3083 => Cow::Borrowed(TEXAS_CENTRIC_ALBERS_DEF),
        32601..=32660 => Cow::Owned(format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            code - 32600
        )),
        32701..=32760 => Cow::Owned(format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        )),
        26901..=26923 => Cow::Owned(format!(
            "+proj=utm +zone={} +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            code - 26900
        )),
        _ => return None,
    };
    Some(def)
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Proj(def) => f.write_str(def),
        }
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.starts_with('+') {
            return Ok(Self::Proj(Arc::from(s)));
        }

        let code = s
            .split_once(':')
            .filter(|(authority, _)| authority.eq_ignore_ascii_case("epsg"))
            .and_then(|(_, code)| code.trim().parse::<u32>().ok())
            .ok_or_else(|| ProjectionError::UnsupportedCrs(s.to_string()))?;

        Ok(Self::Epsg(code))
    }
}

impl TryFrom<String> for Crs {
    type Error = ProjectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}
