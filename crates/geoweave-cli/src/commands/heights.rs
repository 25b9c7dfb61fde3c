//! Heights command implementation

use crate::cli::{HeightsArgs, Viewport};
use crate::output::OutputWriter;
use crate::output_types::HeightsOutput;
use anyhow::{Context, Result};
use geoweave_session::{LayoutMetrics, LayoutService, ViewportClass};

pub fn execute(args: HeightsArgs, output: &OutputWriter) -> Result<()> {
    let metrics = LayoutMetrics {
        rem_px: args.rem,
        viewport: match args.viewport {
            Viewport::Desktop => ViewportClass::Desktop,
            Viewport::HandsetPortrait => ViewportClass::HandsetPortrait,
            Viewport::HandsetLandscape => ViewportClass::HandsetLandscape,
        },
        ..LayoutMetrics::default()
    };
    let layout = LayoutService::new(metrics);

    if let Some(percentage) = args.percentage {
        layout
            .set_layer_detail_view_height_percentage(percentage)
            .context("Invalid --percentage")?;
    }
    layout.set_layer_detail_view_visibility(!args.detail_hidden);

    let heights = HeightsOutput {
        total_height: args.total,
        detail_view_height: layout.detail_view_height(args.total),
        map_height: layout.map_height(args.total),
        min_bar_height: metrics.min_bar_height(),
        toolbar_height: metrics.toolbar_height(),
        detail_view_visible: layout.layer_detail_view_visibility(),
        percentage: layout.layer_detail_view_height_percentage(),
    };

    if output.is_json() {
        output.result(heights)?;
    } else {
        let detail_view = if heights.detail_view_visible {
            format!("{} px ({:.0}%)", heights.detail_view_height, heights.percentage * 100.0)
        } else {
            format!("{} px (collapsed)", heights.detail_view_height)
        };
        output.fields(
            "Layout Heights",
            &[
                ("Total", format!("{} px", heights.total_height)),
                ("Map", format!("{} px", heights.map_height)),
                ("Detail view", detail_view),
                ("Minimal bar", format!("{} px", heights.min_bar_height)),
                ("Toolbar", format!("{} px", heights.toolbar_height)),
            ],
        );
    }

    Ok(())
}
