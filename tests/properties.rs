use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{Float64Type, Int64Type};
use proptest::prelude::*;

use seriea_stats::model::{PlayerTechnical, Team};
use seriea_stats::query::{teams_best_goal_difference, top_players_by_contributions};
use seriea_stats::transform::{bin, bin_edges, bucket_of, pivot, unpivot};
use seriea_stats::utils::get_column;
use seriea_stats::{summarize, Catalog};

fn ints(batch: &RecordBatch, name: &str) -> Vec<i64> {
    get_column(batch, name).unwrap().as_primitive::<Int64Type>().values().to_vec()
}

proptest! {
    #[test]
    fn goal_difference_rows_pass_the_filter_in_order(
        teams in prop::collection::vec((0i64..100, -40i64..60), 0..40),
        min_points in 0i64..100,
    ) {
        let mut catalog = Catalog::new();
        for (i, (points, goal_difference)) in teams.iter().enumerate() {
            catalog.teams.create(Team {
                team_name: format!("team {i}"),
                points: *points,
                goal_difference: *goal_difference,
                ..Default::default()
            });
        }

        let out = teams_best_goal_difference(&catalog, min_points).unwrap();
        let points = ints(&out, "points");
        let gds = ints(&out, "goal_difference");

        let expected = teams.iter().filter(|(p, gd)| *p >= min_points && *gd > 20).count();
        prop_assert_eq!(out.num_rows(), expected);
        prop_assert!(points.iter().all(|p| *p >= min_points));
        prop_assert!(gds.iter().all(|gd| *gd > 20));
        prop_assert!(gds.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn top_players_are_bounded_and_ranked(
        players in prop::collection::vec((0i64..40, 0i64..20), 0..60),
        limit in 0usize..30,
    ) {
        let mut catalog = Catalog::new();
        for (i, (goals, assists)) in players.iter().enumerate() {
            catalog.player_technical.create(PlayerTechnical {
                player_name: format!("player {i}"),
                goal_scored: *goals,
                assist_scored: *assists,
                ..Default::default()
            });
        }

        let out = top_players_by_contributions(&catalog, limit).unwrap();
        prop_assert_eq!(out.num_rows(), limit.min(players.len()));

        let goals = ints(&out, "goal_scored");
        let assists = ints(&out, "assist_scored");
        let totals = ints(&out, "total_contributions");
        for i in 0..out.num_rows() {
            prop_assert_eq!(totals[i], goals[i] + assists[i]);
        }
        prop_assert!(totals.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn pivot_then_unpivot_recovers_triples(
        cells in prop::collection::btree_map((0i64..6, 0usize..4), 0i64..100, 1..20),
    ) {
        let names = ["a", "b", "c", "d"];
        let index: Int64Array = cells.keys().map(|(i, _)| *i).collect::<Vec<_>>().into();
        let columns = StringArray::from(cells.keys().map(|(_, c)| names[*c]).collect::<Vec<_>>());
        let values: Float64Array = cells.values().map(|v| *v as f64).collect::<Vec<_>>().into();
        let long = RecordBatch::try_from_iter(vec![
            ("year", Arc::new(index) as ArrayRef),
            ("team", Arc::new(columns) as ArrayRef),
            ("wins", Arc::new(values) as ArrayRef),
        ])
        .unwrap();

        let wide = pivot(&long, "year", "team", "wins", 0.0).unwrap();
        let flat = unpivot(&wide, "year", "team", "wins").unwrap();

        let years = ints(&flat, "year");
        let teams = get_column(&flat, "team").unwrap().as_string::<i32>().clone();
        let wins = get_column(&flat, "wins").unwrap().as_primitive::<Float64Type>().clone();

        let mut recovered = BTreeMap::new();
        for row in 0..flat.num_rows() {
            let column = names.iter().position(|n| *n == teams.value(row)).unwrap();
            recovered.insert((years[row], column), wins.value(row));
        }

        for (key, value) in &cells {
            prop_assert_eq!(recovered.get(key).copied(), Some(*value as f64));
        }
        // anything else is a fill cell
        for (key, value) in &recovered {
            if !cells.contains_key(key) {
                prop_assert_eq!(*value, 0.0);
            }
        }
    }

    #[test]
    fn bins_agree_with_their_intervals(
        values in prop::collection::vec(-1000.0f64..1000.0, 2..50),
        buckets in 1usize..6,
    ) {
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assume!(max > min);

        let labels: Vec<String> = (0..buckets).map(|i| format!("bucket {i}")).collect();
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let column = Float64Array::from(values.clone());
        let batch = RecordBatch::try_from_iter(vec![("x", Arc::new(column.clone()) as ArrayRef)]).unwrap();

        let out = bin(&batch, "x", "level", &label_refs).unwrap();
        let assigned = get_column(&out, "level").unwrap().as_string::<i32>().clone();
        let edges = bin_edges(&column, buckets).unwrap();
        let by_label: HashMap<&str, usize> = label_refs.iter().enumerate().map(|(i, l)| (*l, i)).collect();

        for (row, value) in values.iter().enumerate() {
            let k = by_label[assigned.value(row)];
            prop_assert_eq!(Some(k), bucket_of(*value, &edges));
            // (lo, hi] intervals, the first one closed on both sides
            let slack = (max - min) * 1e-9;
            prop_assert!(*value <= edges[k + 1] + slack);
            if k > 0 {
                prop_assert!(*value > edges[k] - slack);
            }
            if *value == max {
                prop_assert_eq!(k, buckets - 1);
            }
            if *value == min {
                prop_assert_eq!(k, 0);
            }
        }
    }

    #[test]
    fn single_row_summary_is_degenerate(value in -1e6f64..1e6) {
        let batch = RecordBatch::try_from_iter(vec![
            ("v", Arc::new(Float64Array::from(vec![value])) as ArrayRef),
        ])
        .unwrap();
        let stats = summarize(&batch)["v"];
        prop_assert_eq!(stats.mean, value);
        prop_assert_eq!(stats.median, value);
        prop_assert_eq!(stats.min, value);
        prop_assert_eq!(stats.max, value);
        prop_assert_eq!(stats.std, 0.0);
    }
}

#[test]
fn empty_table_has_empty_summary() {
    let batch = RecordBatch::try_from_iter(vec![(
        "v",
        Arc::new(Float64Array::from(Vec::<f64>::new())) as ArrayRef,
    )])
    .unwrap();
    assert!(summarize(&batch).is_empty());
    assert_eq!(batch.column(0).len(), 0);
}
