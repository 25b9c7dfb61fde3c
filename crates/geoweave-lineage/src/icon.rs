//! Identicons for operator types.

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const GRID: usize = 5;

fn fnv1a(value: &str) -> u64 {
    value.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// A mirrored 5x5 pattern in a color derived from `name`, as an SVG data URL
pub fn create_icon_data_url(name: &str) -> String {
    let hash = fnv1a(name);
    let hue = hash % 360;

    let mut cells = String::new();
    let mut bit = 16;
    for column in 0..GRID.div_ceil(2) {
        for row in 0..GRID {
            let filled = (hash >> bit) & 1 == 1;
            bit += 1;
            if !filled {
                continue;
            }
            cells.push_str(&format!("<rect x='{}' y='{}' width='1' height='1'/>", column, row));
            let mirrored = GRID - 1 - column;
            if mirrored != column {
                cells.push_str(&format!("<rect x='{}' y='{}' width='1' height='1'/>", mirrored, row));
            }
        }
    }

    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 {grid} {grid}' shape-rendering='crispEdges'><g fill='hsl({hue},65%,45%)'>{cells}</g></svg>",
        grid = GRID,
    );
    format!("data:image/svg+xml;utf8,{}", percent_encode(&svg))
}

fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '<' => encoded.push_str("%3C"),
            '>' => encoded.push_str("%3E"),
            '#' => encoded.push_str("%23"),
            '%' => encoded.push_str("%25"),
            '"' => encoded.push_str("%22"),
            ' ' => encoded.push_str("%20"),
            _ => encoded.push(c),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icons_are_deterministic() {
        assert_eq!(
            create_icon_data_url("GdalSource"),
            create_icon_data_url("GdalSource")
        );
        assert_ne!(
            create_icon_data_url("GdalSource"),
            create_icon_data_url("Expression")
        );
    }

    #[test]
    fn test_icon_is_svg_data_url() {
        let url = create_icon_data_url("Reprojection");
        assert!(url.starts_with("data:image/svg+xml;utf8,%3Csvg"));
        assert!(!url.contains('<'));
        assert!(!url.contains(' '));
    }
}
