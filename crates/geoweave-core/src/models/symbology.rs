//! Layer symbology as stored in a project.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `[r, g, b, a]` with every channel in `0..=255`
pub type RgbaColor = [u8; 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub value: f64,
    pub color: RgbaColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Colorizer {
    LinearGradient {
        breakpoints: Vec<Breakpoint>,
        no_data_color: RgbaColor,
        over_color: RgbaColor,
        under_color: RgbaColor,
    },
    LogarithmicGradient {
        breakpoints: Vec<Breakpoint>,
        no_data_color: RgbaColor,
        over_color: RgbaColor,
        under_color: RgbaColor,
    },
    Palette {
        colors: IndexMap<String, RgbaColor>,
        no_data_color: RgbaColor,
        default_color: RgbaColor,
    },
    Rgba,
}

impl Colorizer {
    /// A black-to-white gradient over `[min, max]`
    pub fn grayscale(min: f64, max: f64) -> Self {
        Self::LinearGradient {
            breakpoints: vec![
                Breakpoint {
                    value: min,
                    color: [0, 0, 0, 255],
                },
                Breakpoint {
                    value: max,
                    color: [255, 255, 255, 255],
                },
            ],
            no_data_color: [0, 0, 0, 0],
            over_color: [255, 255, 255, 255],
            under_color: [0, 0, 0, 255],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RasterColorizer {
    SingleBand { band: u32, band_colorizer: Colorizer },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NumberParam {
    Static {
        value: f64,
    },
    Derived {
        attribute: String,
        factor: f64,
        default_value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ColorParam {
    Static { color: RgbaColor },
    Derived { attribute: String, colorizer: Colorizer },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub width: NumberParam,
    pub color: ColorParam,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            width: NumberParam::Static { value: 1.0 },
            color: ColorParam::Static {
                color: [0, 0, 0, 255],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSymbology {
    pub attribute: String,
    pub fill_color: ColorParam,
    pub stroke: Stroke,
}

/// How a layer is drawn; the variant determines whether the layer is raster or vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Symbology {
    Raster {
        opacity: f64,
        raster_colorizer: RasterColorizer,
    },
    Point {
        radius: NumberParam,
        fill_color: ColorParam,
        stroke: Stroke,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<TextSymbology>,
    },
    Line {
        stroke: Stroke,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<TextSymbology>,
        #[serde(default)]
        auto_simplified: bool,
    },
    Polygon {
        fill_color: ColorParam,
        stroke: Stroke,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<TextSymbology>,
        #[serde(default)]
        auto_simplified: bool,
    },
}

impl Symbology {
    /// Grayscale raster symbology for band 0
    pub fn default_raster() -> Self {
        Self::Raster {
            opacity: 1.0,
            raster_colorizer: RasterColorizer::SingleBand {
                band: 0,
                band_colorizer: Colorizer::grayscale(0.0, 255.0),
            },
        }
    }

    pub fn default_point() -> Self {
        Self::Point {
            radius: NumberParam::Static { value: 10.0 },
            fill_color: ColorParam::Static {
                color: [255, 255, 255, 255],
            },
            stroke: Stroke::default(),
            text: None,
        }
    }

    pub fn default_line() -> Self {
        Self::Line {
            stroke: Stroke::default(),
            text: None,
            auto_simplified: true,
        }
    }

    pub fn default_polygon() -> Self {
        Self::Polygon {
            fill_color: ColorParam::Static {
                color: [255, 255, 255, 255],
            },
            stroke: Stroke::default(),
            text: None,
            auto_simplified: true,
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Raster { .. })
    }
}
