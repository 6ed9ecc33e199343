//! Packing locations and flows into typed attribute buffers.
//!
//! Buffers are flat `Vec`s of `f32` / `u8` components with a fixed
//! per-entry component count, the layout a GPU renderer uploads directly.
//! [`LayersData`] is an owned value: handing it to another context moves
//! the buffers, the producer keeps nothing.

use std::collections::HashMap;

use bytemuck::Pod;
use flowmap_flow::calc_location_totals;
use flowmap_flow_models::{Flow, LocationNode};
use serde::{Deserialize, Serialize};

use crate::colors::{FlowMapColors, Rgba};
use crate::scales::FlowScales;

/// One typed attribute array and its per-entry component count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerAttribute<T> {
    pub value: Vec<T>,
    pub size: usize,
}

impl<T> LayerAttribute<T> {
    const fn with_size(size: usize) -> Self {
        Self {
            value: Vec::new(),
            size,
        }
    }

    /// Number of entries (`value.len() / size`).
    #[must_use]
    pub fn entries(&self) -> usize {
        self.value.len().checked_div(self.size).unwrap_or(0)
    }
}

impl<T: Pod> LayerAttribute<T> {
    /// Raw bytes of the buffer, for zero-copy upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleAttributes {
    pub get_position: LayerAttribute<f32>,
    pub get_color: LayerAttribute<u8>,
    pub get_radius: LayerAttribute<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CirclesLayerAttributes {
    pub length: usize,
    pub attributes: CircleAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAttributes {
    pub get_source_position: LayerAttribute<f32>,
    pub get_target_position: LayerAttribute<f32>,
    pub get_thickness: LayerAttribute<f32>,
    pub get_color: LayerAttribute<u8>,
    pub get_endpoint_offsets: LayerAttribute<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinesLayerAttributes {
    pub length: usize,
    pub attributes: LineAttributes,
}

/// Buffers for the circle and line layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayersData {
    pub circle_attributes: CirclesLayerAttributes,
    pub line_attributes: LinesLayerAttributes,
    /// Flows left out of the line buffers because an endpoint id did not
    /// resolve to a location.
    pub skipped_flows: usize,
}

impl LayersData {
    /// Whether every attribute holds exactly `length * size` components.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let circles = &self.circle_attributes;
        let c = &circles.attributes;
        let lines = &self.line_attributes;
        let l = &lines.attributes;

        [
            c.get_position.entries() == circles.length,
            c.get_color.entries() == circles.length,
            c.get_radius.entries() == circles.length,
            l.get_source_position.entries() == lines.length,
            l.get_target_position.entries() == lines.length,
            l.get_thickness.entries() == lines.length,
            l.get_color.entries() == lines.length,
            l.get_endpoint_offsets.entries() == lines.length,
        ]
        .iter()
        .all(|ok| *ok)
    }
}

/// How location circles are colored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircleColoring {
    /// Every circle gets the incoming color.
    #[default]
    Uniform,
    /// Incoming color where incoming exceeds outgoing, outgoing color where
    /// outgoing exceeds incoming, inner color when balanced.
    ByNetFlow,
}

#[allow(clippy::cast_possible_truncation)]
fn push_position(buffer: &mut LayerAttribute<f32>, [lon, lat]: [f64; 2]) {
    buffer.value.extend_from_slice(&[lon as f32, lat as f32]);
}

#[allow(clippy::cast_possible_truncation)]
fn push_scalar(buffer: &mut LayerAttribute<f32>, value: f64) {
    buffer.value.push(value as f32);
}

fn push_color(buffer: &mut LayerAttribute<u8>, color: Rgba) {
    buffer.value.extend_from_slice(&color);
}

/// Builds circle and line buffers.
///
/// Circles follow `nodes` order, one per node. Lines follow `flows` order,
/// one per flow whose origin and destination both resolve to a node; the
/// others are counted in [`LayersData::skipped_flows`].
#[must_use]
pub fn prepare_layers_data<N: LocationNode>(
    nodes: &[N],
    flows: &[Flow],
    colors: &FlowMapColors,
    circle_coloring: CircleColoring,
) -> LayersData {
    let totals = calc_location_totals(flows);
    let centroids: HashMap<&str, [f64; 2]> =
        nodes.iter().map(|n| (n.id(), n.centroid())).collect();
    let max_abs_totals: HashMap<&str, f64> = nodes
        .iter()
        .map(|n| (n.id(), totals.max_abs_total(n.id())))
        .collect();
    let max_abs_total = max_abs_totals.values().copied().fold(0.0, f64::max);
    let scales = FlowScales::new(max_abs_total, flows, colors);
    let circle_colors = colors.location_circles();

    let mut circles = CircleAttributes {
        get_position: LayerAttribute::with_size(2),
        get_color: LayerAttribute::with_size(4),
        get_radius: LayerAttribute::with_size(1),
    };
    for node in nodes {
        push_position(&mut circles.get_position, node.centroid());
        let color = match circle_coloring {
            CircleColoring::Uniform => circle_colors.incoming,
            CircleColoring::ByNetFlow => {
                let t = totals.get(node.id());
                if t.incoming > t.outgoing {
                    circle_colors.incoming
                } else if t.outgoing > t.incoming {
                    circle_colors.outgoing
                } else {
                    circle_colors.inner
                }
            }
        };
        push_color(&mut circles.get_color, color);
        push_scalar(
            &mut circles.get_radius,
            scales.radius.scale(max_abs_totals.get(node.id()).copied().unwrap_or(0.0)),
        );
    }

    let mut lines = LineAttributes {
        get_source_position: LayerAttribute::with_size(2),
        get_target_position: LayerAttribute::with_size(2),
        get_thickness: LayerAttribute::with_size(1),
        get_color: LayerAttribute::with_size(4),
        get_endpoint_offsets: LayerAttribute::with_size(2),
    };
    let mut skipped_flows = 0;
    for flow in flows {
        let (Some(&source), Some(&target)) = (
            centroids.get(flow.origin.as_str()),
            centroids.get(flow.dest.as_str()),
        ) else {
            log::debug!(
                "Skipping flow {} -> {}: endpoint is not a known location",
                flow.origin,
                flow.dest
            );
            skipped_flows += 1;
            continue;
        };
        let radius_of = |id: &str| {
            scales
                .radius
                .scale(max_abs_totals.get(id).copied().unwrap_or(0.0))
        };

        push_position(&mut lines.get_source_position, source);
        push_position(&mut lines.get_target_position, target);
        push_scalar(&mut lines.get_thickness, scales.thickness.scale(flow.count.abs()));
        push_color(&mut lines.get_color, scales.color.color(flow.magnitude()));
        push_scalar(&mut lines.get_endpoint_offsets, radius_of(&flow.origin));
        push_scalar(&mut lines.get_endpoint_offsets, radius_of(&flow.dest));
    }

    if skipped_flows > 0 {
        log::warn!("Skipped {skipped_flows} flows referencing unknown locations");
    }

    LayersData {
        circle_attributes: CirclesLayerAttributes {
            length: nodes.len(),
            attributes: circles,
        },
        line_attributes: LinesLayerAttributes {
            length: flows.len() - skipped_flows,
            attributes: lines,
        },
        skipped_flows,
    }
}

#[cfg(test)]
mod tests {
    use flowmap_flow_models::{ClusterNode, Location};

    use crate::colors::ColorSettings;

    use super::*;

    const EPS: f32 = 1e-6;

    fn location(id: &str, lon: f64, lat: f64) -> Location {
        Location {
            id: id.to_owned(),
            lon,
            lat,
            name: id.to_owned(),
        }
    }

    fn flow(origin: &str, dest: &str, count: f64) -> Flow {
        Flow {
            origin: origin.to_owned(),
            dest: dest.to_owned(),
            count,
            time: None,
        }
    }

    fn build(nodes: &[Location], flows: &[Flow]) -> LayersData {
        prepare_layers_data(nodes, flows, &FlowMapColors::default(), CircleColoring::Uniform)
    }

    #[test]
    fn buffers_match_declared_lengths() {
        let nodes = vec![location("A", 0.0, 0.0), location("B", 10.0, 10.0)];
        let data = build(&nodes, &[flow("A", "B", 8.0), flow("B", "A", 2.0)]);

        assert_eq!(data.circle_attributes.length, 2);
        assert_eq!(data.line_attributes.length, 2);
        assert_eq!(data.skipped_flows, 0);
        assert!(data.is_consistent());
        assert_eq!(
            data.line_attributes.attributes.get_source_position.value,
            vec![0.0, 0.0, 10.0, 10.0]
        );
    }

    #[test]
    fn unknown_destination_is_skipped() {
        let nodes = vec![location("A", 0.0, 0.0), location("B", 10.0, 10.0)];
        let data = build(&nodes, &[flow("A", "B", 1.0), flow("A", "Z", 5.0)]);

        assert_eq!(data.line_attributes.length, 1);
        assert_eq!(data.skipped_flows, 1);
        assert!(data.is_consistent());
        assert_eq!(
            data.line_attributes.attributes.get_target_position.value,
            vec![10.0, 10.0]
        );
    }

    #[test]
    fn largest_location_gets_full_radius_and_offsets_match() {
        let nodes = vec![location("A", 0.0, 0.0), location("B", 1.0, 1.0)];
        let data = build(&nodes, &[flow("A", "B", 4.0)]);

        let radii = &data.circle_attributes.attributes.get_radius.value;
        assert!((radii[0] - 15.0).abs() < EPS);
        assert!((radii[1] - 15.0).abs() < EPS);

        let offsets = &data.line_attributes.attributes.get_endpoint_offsets.value;
        assert_eq!(offsets.len(), 2);
        assert!((offsets[0] - radii[0]).abs() < EPS);
        assert!((offsets[1] - radii[1]).abs() < EPS);

        let thickness = &data.line_attributes.attributes.get_thickness.value;
        assert!((thickness[0] - 0.5).abs() < EPS);
    }

    #[test]
    fn uniform_coloring_uses_incoming_color() {
        let nodes = vec![location("A", 0.0, 0.0), location("B", 1.0, 1.0)];
        let colors = FlowMapColors::default();
        let data = prepare_layers_data(
            &nodes,
            &[flow("A", "B", 1.0)],
            &colors,
            CircleColoring::Uniform,
        );
        let incoming = colors.location_circles().incoming;

        assert_eq!(
            data.circle_attributes.attributes.get_color.value,
            [incoming, incoming].concat()
        );
    }

    #[test]
    fn net_flow_coloring_distinguishes_senders() {
        let nodes = vec![
            location("A", 0.0, 0.0),
            location("B", 1.0, 1.0),
            location("C", 2.0, 2.0),
        ];
        let colors = FlowMapColors::new(&ColorSettings {
            fade_enabled: false,
            ..ColorSettings::default()
        });
        let data = prepare_layers_data(
            &nodes,
            &[flow("A", "B", 3.0)],
            &colors,
            CircleColoring::ByNetFlow,
        );
        let c = colors.location_circles();

        assert_eq!(
            data.circle_attributes.attributes.get_color.value,
            [c.outgoing, c.incoming, c.inner].concat()
        );
    }

    #[test]
    fn empty_inputs_build_empty_buffers() {
        let data = build(&[], &[]);
        assert_eq!(data.circle_attributes.length, 0);
        assert_eq!(data.line_attributes.length, 0);
        assert!(data.is_consistent());
    }

    #[test]
    fn clusters_are_positioned_at_their_centroid() {
        let a = location("A", 0.0, 0.0);
        let b = location("B", 2.0, 4.0);
        let cluster = ClusterNode::from_members("c1", 3, &[&a, &b]);
        let data = prepare_layers_data(
            &[cluster],
            &[flow("c1", "c1", 1.0)],
            &FlowMapColors::default(),
            CircleColoring::Uniform,
        );
        assert_eq!(data.circle_attributes.attributes.get_position.value, vec![1.0, 2.0]);
        assert_eq!(data.line_attributes.length, 1);
    }

    #[test]
    fn position_bytes_are_native_floats() {
        let nodes = vec![location("A", 1.0, 2.0)];
        let data = build(&nodes, &[]);
        let bytes = data.circle_attributes.attributes.get_position.as_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0_f32.to_ne_bytes());
    }
}
