//! Urban and rural-reference mask construction.
//!
//! Rasterizes classified land-cover polygons onto the working grid and
//! resolves the two layers into disjoint masks: cells claimed by both
//! layers stay rural, and rural cells within a buffer distance of the
//! urban footprint are dropped so the reference area is never
//! thermally contaminated by adjacent built-up cells.

use crate::algebra::{mask_count, mask_difference};
use crate::error::Result;
use calura_core::vector::FeatureCollection;
use calura_core::{GridGeometry, Raster};
use geo::{BoundingRect, Contains};
use geo_types::{Geometry, Point};
use tracing::debug;

/// Buffer distance (map units) kept between the urban footprint and the
/// rural-reference mask
pub const URBAN_BUFFER_DISTANCE: f64 = 100.0;

/// The two disjoint land-cover masks
#[derive(Debug, Clone)]
pub struct LandCoverMasks {
    pub urban: Raster<u8>,
    pub rural: Raster<u8>,
}

/// Build disjoint urban and rural-reference masks on the target grid.
///
/// Empty input layers produce all-false masks; downstream stages treat
/// a fully empty urban or rural mask as fatal.
pub fn build_masks(
    urban_features: &FeatureCollection,
    rural_features: &FeatureCollection,
    geometry: &GridGeometry,
    buffer_distance: f64,
) -> Result<LandCoverMasks> {
    let urban_raw = rasterize(urban_features, geometry);
    let rural_raw = rasterize(rural_features, geometry);

    // Shared cells stay rural
    let urban = mask_difference(&urban_raw, &rural_raw)?;

    let radius_cells = (buffer_distance / geometry.transform.cell_size()).ceil() as usize;
    let buffered = dilate(&urban, radius_cells);
    let rural = mask_difference(&rural_raw, &buffered)?;

    debug!(
        urban_cells = mask_count(&urban),
        rural_cells = mask_count(&rural),
        buffer_cells = radius_cells,
        "land-cover masks built"
    );

    Ok(LandCoverMasks { urban, rural })
}

/// Rasterize a feature collection onto the grid.
///
/// A cell is set when its centre falls inside any feature polygon;
/// overlapping polygons dissolve into one mask.
pub fn rasterize(features: &FeatureCollection, geometry: &GridGeometry) -> Raster<u8> {
    let mut mask: Raster<u8> = Raster::new(geometry.rows, geometry.cols);
    mask.set_transform(geometry.transform);
    mask.set_crs(geometry.crs.clone());

    for feature in features.iter() {
        match &feature.geometry {
            Some(Geometry::Polygon(poly)) => burn_polygon(&mut mask, poly),
            Some(Geometry::MultiPolygon(mp)) => {
                for poly in &mp.0 {
                    burn_polygon(&mut mask, poly);
                }
            }
            _ => {}
        }
    }

    mask
}

fn burn_polygon(mask: &mut Raster<u8>, poly: &geo_types::Polygon<f64>) {
    let bbox = match poly.bounding_rect() {
        Some(b) => b,
        None => return,
    };

    let rows = mask.rows();
    let cols = mask.cols();

    // Pixel range covered by the polygon's bounding box (north-up grid:
    // max_y maps to the smallest row index)
    let (c0, r0) = mask.geo_to_pixel(bbox.min().x, bbox.max().y);
    let (c1, r1) = mask.geo_to_pixel(bbox.max().x, bbox.min().y);

    let row_start = r0.floor().max(0.0) as usize;
    let row_end = (r1.ceil() as isize).clamp(0, rows as isize) as usize;
    let col_start = c0.floor().max(0.0) as usize;
    let col_end = (c1.ceil() as isize).clamp(0, cols as isize) as usize;

    for row in row_start..row_end {
        for col in col_start..col_end {
            let (x, y) = mask.pixel_to_geo(col, row);
            if poly.contains(&Point::new(x, y)) {
                unsafe { mask.set_unchecked(row, col, 1) };
            }
        }
    }
}

/// Grow a mask by a disk of the given cell radius.
///
/// The window is clamped at the raster edge, so border cells buffer
/// with their in-bounds neighbourhood.
pub fn dilate(mask: &Raster<u8>, radius_cells: usize) -> Raster<u8> {
    if radius_cells == 0 {
        return mask.clone();
    }

    let (rows, cols) = mask.shape();
    let r = radius_cells as isize;
    let r_sq = (radius_cells * radius_cells) as isize;

    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r_sq {
                offsets.push((dr, dc));
            }
        }
    }

    let mut out = mask.like_filled(0u8);
    for row in 0..rows {
        for col in 0..cols {
            if unsafe { mask.get_unchecked(row, col) } == 0 {
                continue;
            }
            for &(dr, dc) in &offsets {
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                    unsafe { out.set_unchecked(nr as usize, nc as usize, 1) };
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use calura_core::vector::{AttributeValue, Feature};
    use calura_core::{Crs, GeoTransform};
    use geo_types::polygon;

    // 20x20 grid of 30 m cells covering x: 0..600, y: 0..600
    fn grid() -> GridGeometry {
        GridGeometry {
            rows: 20,
            cols: 20,
            transform: GeoTransform::new(0.0, 600.0, 30.0, -30.0),
            crs: Some(Crs::utm(32, true)),
        }
    }

    fn rect_feature(min_x: f64, min_y: f64, max_x: f64, max_y: f64, tag: &str) -> Feature {
        let poly = polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
            (x: min_x, y: min_y),
        ];
        let mut f = Feature::new(Geometry::Polygon(poly));
        f.set_property("landuse", AttributeValue::String(tag.to_string()));
        f
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        let mut fc = FeatureCollection::new();
        for f in features {
            fc.push(f);
        }
        fc
    }

    #[test]
    fn test_rasterize_pixel_centers() {
        // Covers x: 0..90 → pixel centres 15, 45, 75 → cols 0..2
        let fc = collection(vec![rect_feature(0.0, 0.0, 90.0, 600.0, "residential")]);
        let mask = rasterize(&fc, &grid());

        for row in 0..20 {
            assert_eq!(mask.get(row, 0).unwrap(), 1);
            assert_eq!(mask.get(row, 2).unwrap(), 1);
            assert_eq!(mask.get(row, 3).unwrap(), 0);
        }
    }

    #[test]
    fn test_rasterize_dissolves_overlaps() {
        let fc = collection(vec![
            rect_feature(0.0, 0.0, 90.0, 600.0, "residential"),
            rect_feature(30.0, 0.0, 150.0, 600.0, "industrial"),
        ]);
        let mask = rasterize(&fc, &grid());

        assert_eq!(mask.get(10, 0).unwrap(), 1);
        assert_eq!(mask.get(10, 4).unwrap(), 1);
        assert_eq!(mask_count(&mask), 5 * 20);
    }

    #[test]
    fn test_rasterize_empty_collection() {
        let mask = rasterize(&FeatureCollection::new(), &grid());
        assert_eq!(mask_count(&mask), 0);
    }

    #[test]
    fn test_shared_cells_stay_rural() {
        // Urban and rural overlap on x: 60..90 (col 2)
        let urban = collection(vec![rect_feature(0.0, 0.0, 90.0, 600.0, "residential")]);
        let rural = collection(vec![rect_feature(60.0, 0.0, 600.0, 600.0, "farmland")]);

        let masks = build_masks(&urban, &rural, &grid(), 0.0).unwrap();
        assert_eq!(masks.urban.get(10, 1).unwrap(), 1);
        assert_eq!(masks.urban.get(10, 2).unwrap(), 0);
        assert_eq!(masks.rural.get(10, 2).unwrap(), 1);
    }

    #[test]
    fn test_buffer_carves_corridor() {
        // Urban cols 0..5 (x: 0..180), rural cols 10..19 (x: 300..600).
        // 100 m buffer = 4 cells: no rural cell within it survives.
        let urban = collection(vec![rect_feature(0.0, 0.0, 180.0, 600.0, "residential")]);
        let rural = collection(vec![rect_feature(240.0, 0.0, 600.0, 600.0, "farmland")]);

        let masks = build_masks(&urban, &rural, &grid(), URBAN_BUFFER_DISTANCE).unwrap();

        // Rural cells at cols 8-9 are inside the buffer and removed
        assert_eq!(masks.rural.get(10, 8).unwrap(), 0);
        assert_eq!(masks.rural.get(10, 9).unwrap(), 0);
        assert_eq!(masks.rural.get(10, 10).unwrap(), 1);

        // Masks are disjoint
        for row in 0..20 {
            for col in 0..20 {
                let both = masks.urban.get(row, col).unwrap() == 1
                    && masks.rural.get(row, col).unwrap() == 1;
                assert!(!both, "masks overlap at ({}, {})", row, col);
            }
        }
    }

    #[test]
    fn test_dilate_disk() {
        let mut mask: Raster<u8> = Raster::new(9, 9);
        mask.set_transform(GeoTransform::new(0.0, 270.0, 30.0, -30.0));
        mask.set(4, 4, 1).unwrap();

        let grown = dilate(&mask, 2);
        assert_eq!(grown.get(4, 4).unwrap(), 1);
        assert_eq!(grown.get(4, 6).unwrap(), 1);
        assert_eq!(grown.get(2, 4).unwrap(), 1);
        // Corner of the square, outside the disk
        assert_eq!(grown.get(2, 2).unwrap(), 0);
        assert_eq!(grown.get(4, 7).unwrap(), 0);
    }
}
