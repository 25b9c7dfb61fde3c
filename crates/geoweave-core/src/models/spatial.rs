//! Spatial references and bounding boxes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GeoweaveError, Result};

/// A coordinate reference system identified by authority and code, e.g. `EPSG:4326`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpatialReference {
    pub authority: String,
    pub code: u32,
}

impl SpatialReference {
    pub fn new(authority: impl Into<String>, code: u32) -> Self {
        Self {
            authority: authority.into(),
            code,
        }
    }

    /// WGS 84
    pub fn wgs84() -> Self {
        Self::new("EPSG", 4326)
    }

    /// The `AUTHORITY:CODE` form used on the wire
    pub fn srs_string(&self) -> String {
        format!("{}:{}", self.authority, self.code)
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl FromStr for SpatialReference {
    type Err = GeoweaveError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GeoweaveError::InvalidSpatialReference {
            value: s.to_string(),
        };

        let (authority, code) = s.trim().split_once(':').ok_or_else(invalid)?;
        if authority.is_empty() {
            return Err(invalid());
        }
        let code = code.parse::<u32>().map_err(|_| invalid())?;

        Ok(Self::new(authority.to_uppercase(), code))
    }
}

impl Serialize for SpatialReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.srs_string())
    }
}

impl<'de> Deserialize<'de> for SpatialReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate2D {
    pub x: f64,
    pub y: f64,
}

impl Coordinate2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned bounding box with `lower_left <= upper_right` on both axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "BoundingBoxDict")]
pub struct BoundingBox2D {
    lower_left_coordinate: Coordinate2D,
    upper_right_coordinate: Coordinate2D,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundingBoxDict {
    lower_left_coordinate: Coordinate2D,
    upper_right_coordinate: Coordinate2D,
}

impl BoundingBox2D {
    pub fn new(lower_left: Coordinate2D, upper_right: Coordinate2D) -> Result<Self> {
        let finite = [lower_left.x, lower_left.y, upper_right.x, upper_right.y]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(GeoweaveError::InvalidBoundingBox {
                reason: "coordinates must be finite".to_string(),
            });
        }
        if lower_left.x > upper_right.x || lower_left.y > upper_right.y {
            return Err(GeoweaveError::InvalidBoundingBox {
                reason: format!(
                    "lower left ({}, {}) exceeds upper right ({}, {})",
                    lower_left.x, lower_left.y, upper_right.x, upper_right.y
                ),
            });
        }
        Ok(Self {
            lower_left_coordinate: lower_left,
            upper_right_coordinate: upper_right,
        })
    }

    pub fn from_bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        Self::new(Coordinate2D::new(min_x, min_y), Coordinate2D::new(max_x, max_y))
    }

    /// The whole WGS 84 world extent
    pub fn world() -> Self {
        Self {
            lower_left_coordinate: Coordinate2D::new(-180.0, -90.0),
            upper_right_coordinate: Coordinate2D::new(180.0, 90.0),
        }
    }

    pub fn lower_left(&self) -> Coordinate2D {
        self.lower_left_coordinate
    }

    pub fn upper_right(&self) -> Coordinate2D {
        self.upper_right_coordinate
    }

    pub fn width(&self) -> f64 {
        self.upper_right_coordinate.x - self.lower_left_coordinate.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right_coordinate.y - self.lower_left_coordinate.y
    }

    /// `minx,miny,maxx,maxy` as used in query parameters
    pub fn as_bbox_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.lower_left_coordinate.x,
            self.lower_left_coordinate.y,
            self.upper_right_coordinate.x,
            self.upper_right_coordinate.y
        )
    }
}

impl TryFrom<BoundingBoxDict> for BoundingBox2D {
    type Error = GeoweaveError;

    fn try_from(dict: BoundingBoxDict) -> Result<Self> {
        Self::new(dict.lower_left_coordinate, dict.upper_right_coordinate)
    }
}

/// Description of a spatial reference as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReferenceSpecification {
    pub name: String,
    pub spatial_reference: SpatialReference,
    #[serde(default)]
    pub proj_string: String,
    pub extent: BoundingBox2D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_labels: Option<(String, String)>,
}
