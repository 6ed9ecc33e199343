//! Fitting a viewport to a bounding box on a Web Mercator map.
//!
//! Pixel math works on a 512 px tile pyramid: at zoom `z` the world is
//! `512 * 2^z` pixels wide. Boxes are fitted at [`FIT_BASE_ZOOM`] and the
//! zoom is then adjusted by the ratio of box size to viewport size.

use std::f64::consts::PI;

use flowmap_flow_models::LocationNode;
use flowmap_state_models::{MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL, ViewState};

const TILE_SIZE: f64 = 512.0;
const FIT_BASE_ZOOM: f64 = MAX_ZOOM_LEVEL;
const MAX_SIN_LAT: f64 = 0.9999;

/// `[west, south, east, north]` in degrees.
pub type BBox = [f64; 4];

/// The box [`default_viewport`] frames.
pub const WORLD_BBOX: BBox = [-180.0, -70.0, 180.0, 70.0];

/// Fraction of each viewport edge left empty when framing locations.
pub const DEFAULT_PADDING: f64 = 0.05;

/// World pixel coordinates of `[lon, lat]` at `zoom`.
fn project([lon, lat]: [f64; 2], zoom: f64) -> [f64; 2] {
    let size = TILE_SIZE * zoom.exp2();
    let d = size / 2.0;
    let bc = size / 360.0;
    let cc = size / (2.0 * PI);
    let f = lat.to_radians().sin().clamp(-MAX_SIN_LAT, MAX_SIN_LAT);
    let x = d + lon * bc;
    let y = d - 0.5 * ((1.0 + f) / (1.0 - f)).ln() * cc;
    [x.clamp(0.0, size), y.clamp(0.0, size)]
}

/// `[lon, lat]` of world pixel coordinates at `zoom`.
fn unproject([x, y]: [f64; 2], zoom: f64) -> [f64; 2] {
    let size = TILE_SIZE * zoom.exp2();
    let d = size / 2.0;
    let bc = size / 360.0;
    let cc = size / (2.0 * PI);
    let lon = (x - d) / bc;
    let lat = (2.0 * ((y - d) / -cc).exp().atan() - 0.5 * PI).to_degrees();
    [lon, lat]
}

/// Center `[lon, lat]` and unclamped zoom framing `bbox` in a viewport of
/// `[width, height]` pixels.
///
/// The zoom is infinite or NaN when the box or the viewport has no extent.
#[must_use]
pub fn fit_bounds(bbox: BBox, [width, height]: [f64; 2]) -> ([f64; 2], f64) {
    let [west, south, east, north] = bbox;
    let bottom_left = project([west, south], FIT_BASE_ZOOM);
    let top_right = project([east, north], FIT_BASE_ZOOM);
    let box_width = top_right[0] - bottom_left[0];
    let box_height = bottom_left[1] - top_right[1];
    let center_px = [
        bottom_left[0] + box_width / 2.0,
        top_right[1] + box_height / 2.0,
    ];

    let ratio = (box_width / width).max(box_height / height);
    let zoom = FIT_BASE_ZOOM - ratio.log2();

    (unproject(center_px, FIT_BASE_ZOOM), zoom)
}

/// Viewport of `[width, height]` framing `bbox`, zoom clamped to the
/// allowed range.
#[must_use]
pub fn initial_viewport([width, height]: [f64; 2], bbox: BBox) -> ViewState {
    let ([longitude, latitude], zoom) = fit_bounds(bbox, [width, height]);
    let zoom = if zoom.is_nan() {
        MIN_ZOOM_LEVEL
    } else {
        zoom.clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL)
    };
    ViewState::new(width, height, latitude, longitude, zoom)
}

/// Zero-sized viewport framing [`WORLD_BBOX`].
#[must_use]
pub fn default_viewport() -> ViewState {
    initial_viewport([0.0, 0.0], WORLD_BBOX)
}

/// Parses a `west,south,east,north` string. Anything other than four
/// finite numbers is rejected.
#[must_use]
pub fn parse_bbox(value: &str) -> Option<BBox> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<_>>()?;
    <[f64; 4]>::try_from(parts).ok()
}

/// Bounding box of the nodes' centroids, `None` when there are no nodes.
#[must_use]
pub fn bounds_of<N: LocationNode>(nodes: &[N]) -> Option<BBox> {
    nodes.iter().map(LocationNode::centroid).fold(None, |acc, [lon, lat]| {
        Some(match acc {
            None => [lon, lat, lon, lat],
            Some([w, s, e, n]) => [w.min(lon), s.min(lat), e.max(lon), n.max(lat)],
        })
    })
}

/// Viewport of `[width, height]` framing all node centroids, with
/// `padding` (a fraction of each edge) left empty.
///
/// Falls back to zoom 1 centered on `(0, 0)` when no finite zoom frames
/// the nodes: no nodes, a single point, or a viewport with no extent.
#[must_use]
pub fn viewport_for_locations<N: LocationNode>(
    nodes: &[N],
    [width, height]: [f64; 2],
    padding: f64,
) -> ViewState {
    let usable = 1.0 - 2.0 * padding.clamp(0.0, 0.49);
    let fitted = bounds_of(nodes).map(|bbox| fit_bounds(bbox, [width * usable, height * usable]));

    match fitted {
        Some(([longitude, latitude], zoom)) if zoom.is_finite() => ViewState::new(
            width,
            height,
            latitude,
            longitude,
            zoom.clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL),
        ),
        _ => {
            log::debug!("No finite zoom frames {} locations, using fallback", nodes.len());
            ViewState::new(width, height, 0.0, 0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use flowmap_flow_models::Location;
    use flowmap_state_models::{MAX_PITCH, MIN_PITCH};

    use super::*;

    const EPS: f64 = 1e-6;

    fn location(id: &str, lon: f64, lat: f64) -> Location {
        Location {
            id: id.to_owned(),
            lon,
            lat,
            name: id.to_owned(),
        }
    }

    #[test]
    fn project_and_unproject_are_inverse() {
        for ll in [[0.0, 0.0], [13.4, 52.5], [-122.4, 37.8], [151.2, -33.9]] {
            let back = unproject(project(ll, 5.0), 5.0);
            assert!((back[0] - ll[0]).abs() < EPS, "{back:?} vs {ll:?}");
            assert!((back[1] - ll[1]).abs() < EPS, "{back:?} vs {ll:?}");
        }
    }

    #[test]
    fn whole_world_at_zoom_zero_fits_one_tile() {
        let ([lon, lat], zoom) = fit_bounds([-180.0, -85.0, 180.0, 85.0], [512.0, 512.0]);
        assert!(lon.abs() < EPS);
        assert!(lat.abs() < 1e-3);
        assert!(zoom.abs() < 1e-2, "zoom = {zoom}");
    }

    #[test]
    fn doubling_the_viewport_adds_one_zoom_level() {
        let bbox = [0.0, 0.0, 10.0, 10.0];
        let (_, small) = fit_bounds(bbox, [400.0, 400.0]);
        let (_, large) = fit_bounds(bbox, [800.0, 800.0]);
        assert!((large - small - 1.0).abs() < EPS);
    }

    #[test]
    fn default_viewport_is_centered_and_zoomed_out() {
        let v = default_viewport();
        assert!(v.longitude.abs() < EPS);
        assert!(v.latitude.abs() < EPS);
        assert!(v.zoom.abs() < EPS);
        assert!(v.width.abs() < EPS);
        assert!((v.altitude - 1.5).abs() < EPS);
        assert!((v.min_pitch - MIN_PITCH).abs() < EPS);
        assert!((v.max_pitch - MAX_PITCH).abs() < EPS);
    }

    #[test]
    fn single_location_falls_back() {
        let v = viewport_for_locations(&[location("A", 13.4, 52.5)], [800.0, 600.0], DEFAULT_PADDING);
        assert!((v.zoom - 1.0).abs() < EPS);
        assert!(v.latitude.abs() < EPS);
        assert!(v.longitude.abs() < EPS);
        assert!((v.width - 800.0).abs() < EPS);
        assert!((v.max_zoom - 20.0).abs() < EPS);
        assert!(v.bearing.abs() < EPS);
    }

    #[test]
    fn no_locations_fall_back() {
        let v = viewport_for_locations::<Location>(&[], [800.0, 600.0], DEFAULT_PADDING);
        assert!((v.zoom - 1.0).abs() < EPS);
    }

    #[test]
    fn locations_are_framed_around_their_center() {
        let nodes = [location("A", 0.0, 0.0), location("B", 10.0, 10.0)];
        let v = viewport_for_locations(&nodes, [800.0, 600.0], DEFAULT_PADDING);
        assert!((v.longitude - 5.0).abs() < EPS);
        assert!(v.latitude > 4.9 && v.latitude < 5.1);
        assert!(v.zoom > 3.0 && v.zoom < 6.0, "zoom = {}", v.zoom);

        let unpadded = viewport_for_locations(&nodes, [800.0, 600.0], 0.0);
        assert!(unpadded.zoom > v.zoom);
    }

    #[test]
    fn parses_bbox_strings() {
        assert_eq!(parse_bbox("-10, 20,30,40"), Some([-10.0, 20.0, 30.0, 40.0]));
        assert_eq!(parse_bbox("1,2,3"), None);
        assert_eq!(parse_bbox("1,2,3,x"), None);
        assert_eq!(parse_bbox("1,2,3,4,5"), None);
    }
}
