//! Deduplication and summation of raw flow rows.
//!
//! Rows are grouped by origin, then by destination within each origin, then
//! by time bucket within each destination. Every level keeps first-seen
//! order, so the output order is fully determined by the input order.

use chrono::SecondsFormat;
use flowmap_flow_models::{CountValue, Flow, RawFlowRow, Timestamp};
use indexmap::IndexMap;

use crate::time::parse_time;

/// Time bucket for rows whose time is absent or unparsable.
pub const UNKNOWN_TIME_BUCKET: &str = "unknown";

/// Aggregated flows plus diagnostics about what was merged and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowAggregation {
    /// Canonical flows in group order.
    pub flows: Vec<Flow>,
    /// Number of leaf groups that merged more than one raw row.
    pub dupes: usize,
    /// Number of groups dropped for a missing origin or destination.
    pub dropped: usize,
}

struct Group<'a> {
    first: &'a RawFlowRow,
    time: Option<Timestamp>,
    count: f64,
    rows: usize,
}

type ByTime<'a> = IndexMap<String, Group<'a>>;
type ByDest<'a> = IndexMap<Option<&'a str>, ByTime<'a>>;

/// Canonical string form of a time bucket (ISO-8601 instant with
/// millisecond precision).
#[must_use]
pub fn time_bucket(time: Option<&Timestamp>) -> String {
    time.map_or_else(
        || UNKNOWN_TIME_BUCKET.to_owned(),
        |t| t.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Sums raw rows into canonical flows with no duplicate
/// `(origin, dest, time-bucket)` triples.
///
/// Non-numeric and non-finite counts contribute zero. Groups whose origin
/// or destination is missing are dropped. A group summing to zero is kept.
#[must_use]
pub fn aggregate_flows(rows: &[RawFlowRow]) -> Vec<Flow> {
    aggregate_flows_with_report(rows).flows
}

/// Same as [`aggregate_flows`], also reporting duplicate and dropped group
/// counts.
#[must_use]
pub fn aggregate_flows_with_report(rows: &[RawFlowRow]) -> FlowAggregation {
    let mut by_origin: IndexMap<Option<&str>, ByDest<'_>> = IndexMap::new();

    for row in rows {
        let time = parse_time(row.time.as_ref());
        let group = by_origin
            .entry(row.origin.as_deref())
            .or_default()
            .entry(row.dest.as_deref())
            .or_default()
            .entry(time_bucket(time.as_ref()))
            .or_insert_with(|| Group {
                first: row,
                time,
                count: 0.0,
                rows: 0,
            });
        group.rows += 1;
        group.count += row
            .count
            .as_ref()
            .and_then(CountValue::as_finite)
            .unwrap_or(0.0);
    }

    let mut flows = Vec::new();
    let mut dupes = 0;
    let mut dropped = 0;

    for by_dest in by_origin.into_values() {
        for by_time in by_dest.into_values() {
            for group in by_time.into_values() {
                if group.rows > 1 {
                    dupes += 1;
                }
                let (Some(origin), Some(dest)) = (&group.first.origin, &group.first.dest) else {
                    dropped += 1;
                    continue;
                };
                flows.push(Flow {
                    origin: origin.clone(),
                    dest: dest.clone(),
                    count: group.count,
                    time: group.time,
                });
            }
        }
    }

    if dupes > 0 {
        log::debug!("Merged {dupes} duplicate flow groups");
    }
    if dropped > 0 {
        log::warn!("Dropped {dropped} flow groups with a missing origin or destination");
    }

    FlowAggregation {
        flows,
        dupes,
        dropped,
    }
}

/// Sums flows per `(origin, dest)` pair regardless of time, keeping
/// first-seen order. The resulting flows carry no time.
#[must_use]
pub fn aggregate_across_time(flows: &[Flow]) -> Vec<Flow> {
    let mut by_origin: IndexMap<&str, IndexMap<&str, f64>> = IndexMap::new();

    for flow in flows {
        *by_origin
            .entry(flow.origin.as_str())
            .or_default()
            .entry(flow.dest.as_str())
            .or_insert(0.0) += flow.count;
    }

    by_origin
        .into_iter()
        .flat_map(|(origin, by_dest)| {
            by_dest.into_iter().map(move |(dest, count)| Flow {
                origin: origin.to_owned(),
                dest: dest.to_owned(),
                count,
                time: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone as _;
    use chrono::Utc;

    use super::*;

    fn flow(origin: &str, dest: &str, count: f64) -> Flow {
        Flow {
            origin: origin.to_owned(),
            dest: dest.to_owned(),
            count,
            time: None,
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate_flows(&[]).is_empty());
    }

    #[test]
    fn sums_duplicate_rows() {
        let rows = vec![RawFlowRow::new("A", "B", "5"), RawFlowRow::new("A", "B", "3")];
        let agg = aggregate_flows_with_report(&rows);
        assert_eq!(agg.flows, vec![flow("A", "B", 8.0)]);
        assert_eq!(agg.dupes, 1);
        assert_eq!(agg.dropped, 0);
    }

    #[test]
    fn output_order_is_nested_first_seen_order() {
        let rows = vec![
            RawFlowRow::new("A", "B", 1.0),
            RawFlowRow::new("C", "D", 1.0),
            RawFlowRow::new("A", "E", 1.0),
            RawFlowRow::new("C", "A", 1.0),
            RawFlowRow::new("A", "B", 1.0),
        ];
        let pairs: Vec<(String, String)> = aggregate_flows(&rows)
            .into_iter()
            .map(|f| (f.origin, f.dest))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("A".to_owned(), "B".to_owned()),
                ("A".to_owned(), "E".to_owned()),
                ("C".to_owned(), "D".to_owned()),
                ("C".to_owned(), "A".to_owned()),
            ]
        );
    }

    #[test]
    fn time_buckets_follow_first_seen_order_within_dest() {
        let rows = vec![
            RawFlowRow::new("A", "B", 1.0).with_time("2020-02-01"),
            RawFlowRow::new("A", "B", 2.0).with_time("2020-01-01"),
            RawFlowRow::new("A", "B", 4.0).with_time("2020-02-01"),
            RawFlowRow::new("A", "B", 8.0),
        ];
        let flows = aggregate_flows(&rows);
        assert_eq!(flows.len(), 3);
        assert_eq!(flows[0].time, Some(Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap()));
        assert!((flows[0].count - 5.0).abs() < f64::EPSILON);
        assert_eq!(flows[1].time, Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()));
        assert!(flows[2].time.is_none());
        assert!((flows[2].count - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equivalent_time_spellings_share_a_bucket() {
        let rows = vec![
            RawFlowRow::new("A", "B", 1.0).with_time("2020-01-01"),
            RawFlowRow::new("A", "B", 1.0).with_time("2020-01-01 00:00"),
            RawFlowRow::new("A", "B", 1.0).with_time("2020-01"),
        ];
        let flows = aggregate_flows(&rows);
        assert_eq!(flows.len(), 1);
        assert!((flows[0].count - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unparsable_time_lands_in_unknown_bucket() {
        let rows = vec![
            RawFlowRow::new("A", "B", 1.0).with_time("not a time"),
            RawFlowRow::new("A", "B", 1.0),
        ];
        let flows = aggregate_flows(&rows);
        assert_eq!(flows.len(), 1);
        assert!(flows[0].time.is_none());
    }

    #[test]
    fn invalid_counts_contribute_zero() {
        let rows = vec![
            RawFlowRow::new("A", "B", "abc"),
            RawFlowRow::new("A", "B", f64::INFINITY),
            RawFlowRow {
                count: None,
                ..RawFlowRow::new("A", "B", 0.0)
            },
            RawFlowRow::new("A", "B", "2"),
        ];
        assert_eq!(aggregate_flows(&rows), vec![flow("A", "B", 2.0)]);
    }

    #[test]
    fn zero_sum_flow_is_kept() {
        let rows = vec![RawFlowRow::new("A", "B", 3.0), RawFlowRow::new("A", "B", -3.0)];
        assert_eq!(aggregate_flows(&rows), vec![flow("A", "B", 0.0)]);
    }

    #[test]
    fn rows_missing_origin_or_dest_are_dropped() {
        let rows = vec![
            RawFlowRow {
                origin: None,
                ..RawFlowRow::new("A", "B", 1.0)
            },
            RawFlowRow {
                dest: None,
                ..RawFlowRow::new("A", "B", 1.0)
            },
            RawFlowRow::new("A", "B", 1.0),
        ];
        let agg = aggregate_flows_with_report(&rows);
        assert_eq!(agg.flows, vec![flow("A", "B", 1.0)]);
        assert_eq!(agg.dropped, 2);
    }

    #[test]
    fn conserves_total_count() {
        let rows: Vec<RawFlowRow> = (0..50)
            .map(|i| {
                let origin = format!("L{}", i % 4);
                let dest = format!("L{}", i % 7);
                RawFlowRow::new(&origin, &dest, f64::from(i))
                    .with_time(format!("2020-{:02}", i % 3 + 1).as_str())
            })
            .collect();
        let before: f64 = rows
            .iter()
            .filter_map(|r| r.count.as_ref().and_then(CountValue::as_finite))
            .sum();
        let after: f64 = aggregate_flows(&rows).iter().map(|f| f.count).sum();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let rows = vec![
            RawFlowRow::new("A", "B", "5").with_time("2020-01-01"),
            RawFlowRow::new("B", "A", 2.0),
            RawFlowRow::new("A", "B", 3.0).with_time("2020-01-01"),
            RawFlowRow::new("A", "A", 1.0).with_time("2020-05"),
        ];
        let once = aggregate_flows(&rows);
        let again_rows: Vec<RawFlowRow> = once.iter().map(RawFlowRow::from).collect();
        assert_eq!(aggregate_flows(&again_rows), once);
    }

    #[test]
    fn output_has_no_duplicate_triples() {
        let rows: Vec<RawFlowRow> = (0..40)
            .map(|i| {
                RawFlowRow::new(&format!("O{}", i % 3), &format!("D{}", i % 5), 1.0)
                    .with_time(format!("{}", 2000 + i % 2).as_str())
            })
            .collect();
        let flows = aggregate_flows(&rows);
        let keys: BTreeSet<(String, String, String)> = flows
            .iter()
            .map(|f| (f.origin.clone(), f.dest.clone(), time_bucket(f.time.as_ref())))
            .collect();
        assert_eq!(keys.len(), flows.len());
    }

    #[test]
    fn across_time_sums_per_pair() {
        let flows = vec![
            Flow {
                time: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
                ..flow("A", "B", 1.0)
            },
            flow("B", "C", 4.0),
            Flow {
                time: Some(Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap()),
                ..flow("A", "B", 2.0)
            },
        ];
        assert_eq!(
            aggregate_across_time(&flows),
            vec![flow("A", "B", 3.0), flow("B", "C", 4.0)]
        );
    }
}
