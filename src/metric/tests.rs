//! Tests for metric kinds, wrappers and metric state

use std::cell::Cell;
use std::rc::Rc;

use approx::assert_relative_eq;
use proptest::prelude::*;

use super::*;
use crate::history::IndexingMode;
use crate::plot::{MemorySink, PlotterConfig};

fn counter() -> (Rc<Cell<usize>>, impl FnMut() + 'static) {
    let count = Rc::new(Cell::new(0));
    let inner = Rc::clone(&count);
    (count, move || inner.set(inner.get() + 1))
}

#[test]
fn test_average_of_two_updates() {
    let mut avg = MetricBuilder::new("loss").average();
    avg.update_weighted(1.0, 1.0).unwrap();
    avg.update_weighted(3.0, 1.0).unwrap();
    assert_relative_eq!(avg.value().unwrap(), 2.0);
}

#[test]
fn test_sum_with_weights() {
    let mut sum = MetricBuilder::new("count").sum();
    sum.update_weighted(2.0, 3.0).unwrap();
    sum.update_weighted(1.0, 1.0).unwrap();
    assert_relative_eq!(sum.value().unwrap(), 7.0);
}

#[test]
fn test_maximum_tracks_running_max() {
    let mut max = MetricBuilder::new("acc").maximum();
    max.update(5).unwrap();
    assert_eq!(max.value().unwrap(), 5.0);
    for v in [2, 9, 4] {
        max.update(v).unwrap();
    }
    assert_eq!(max.value().unwrap(), 9.0);
}

#[test]
fn test_minimum_tracks_running_min() {
    let mut min = MetricBuilder::new("loss").minimum();
    for v in [3.0, 1.0, 2.0] {
        min.update(v).unwrap();
    }
    assert_eq!(min.value().unwrap(), 1.0);
}

#[test]
fn test_wrapper_fans_out_shared_weight() {
    let mut obj = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").average())
        .unwrap()
        .with_child("b", MetricBuilder::new("b").sum())
        .unwrap();

    obj.update_weighted([("a", 1.0), ("b", 2.0)], 4.0).unwrap();

    let values = obj.get().unwrap();
    assert_eq!(values.len(), 2);
    assert_relative_eq!(values["a"], 1.0);
    assert_relative_eq!(values["b"], 8.0);
}

#[test]
fn test_simple_replaces_value() {
    let mut m = MetricBuilder::new("lr").simple();
    assert_eq!(m.value().unwrap(), 0.0);
    m.update(0.1).unwrap();
    m.update(0.01).unwrap();
    assert_eq!(m.value().unwrap(), 0.01);
}

#[test]
fn test_update_coerces_one_element_inputs() {
    let mut m = MetricBuilder::new("x").simple();
    m.update(vec![4.5_f32]).unwrap();
    assert_eq!(m.value().unwrap(), 4.5);
    m.update(ndarray::arr1(&[2.0])).unwrap();
    assert_eq!(m.value().unwrap(), 2.0);
}

#[test]
fn test_update_rejects_multi_element_input() {
    let mut m = MetricBuilder::new("x").simple();
    m.update(3.0).unwrap();
    let err = m.update([1.0, 2.0]).unwrap_err();
    assert!(matches!(err, MetricError::ValueConversion { .. }));
    assert_eq!(m.value().unwrap(), 3.0);
}

#[test]
fn test_empty_accumulators_fail() {
    let avg = MetricBuilder::new("avg").average();
    let sum = MetricBuilder::new("sum").sum();
    assert!(matches!(avg.value(), Err(MetricError::EmptyAccumulator { .. })));
    assert!(matches!(sum.value(), Err(MetricError::EmptyAccumulator { .. })));
}

#[test]
fn test_invalid_weights_rejected() {
    let mut avg = MetricBuilder::new("avg").average();
    for weight in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            avg.update_weighted(1.0, weight),
            Err(MetricError::InvalidWeight { .. })
        ));
    }
    assert!(avg.value().is_err());
}

#[test]
fn test_offset_added_and_cleared_by_reset() {
    let mut avg = MetricBuilder::new("avg").average();
    avg.set_offset(10.0).unwrap();
    avg.update(2.0).unwrap();
    assert_relative_eq!(avg.value().unwrap(), 12.0);

    avg.reset();
    avg.update(2.0).unwrap();
    assert_relative_eq!(avg.value().unwrap(), 2.0);

    let mut max = MetricBuilder::new("max").maximum();
    assert!(matches!(max.set_offset(1.0), Err(MetricError::Unsupported { .. })));
}

#[test]
fn test_reset_restores_zero_state_and_keeps_history() {
    let mut max = MetricBuilder::new("max").maximum();
    max.update(3.0).unwrap();
    max.log(None).unwrap();
    max.reset();
    assert_eq!(max.value().unwrap(), f64::NEG_INFINITY);
    assert_eq!(max.history().len(), 1);

    let mut min = MetricBuilder::new("min").minimum();
    min.update(3.0).unwrap();
    min.reset();
    assert_eq!(min.value().unwrap(), f64::INFINITY);

    let mut sum = MetricBuilder::new("sum").sum();
    sum.update(3.0).unwrap();
    sum.reset();
    assert_eq!(
        sum.internal_state(),
        MetricValue::Sum { accumulated: 0.0, weight_total: 0.0, offset: 0.0 }
    );

    let mut simple = MetricBuilder::new("s").simple();
    simple.update(3.0).unwrap();
    simple.reset();
    assert_eq!(simple.value().unwrap(), 0.0);
}

#[test]
fn test_timer_measures_from_reset() {
    let mut timer = MetricBuilder::new("t").time_indexed().timer();
    assert_eq!(timer.indexing_mode(), IndexingMode::Step);
    assert_eq!(timer.value().unwrap(), 0.0);

    let MetricValue::Timer { start, .. } = timer.internal_state() else {
        panic!("expected timer state");
    };
    timer.update(start + 2.5).unwrap();
    assert!((timer.value().unwrap() - 2.5).abs() < 1e-5);

    timer.tick().unwrap();
    assert!(timer.value().unwrap() >= 0.0);

    timer.reset();
    assert_eq!(timer.value().unwrap(), 0.0);
}

#[test]
fn test_dynamic_evaluates_bound_function() {
    let source = Rc::new(Cell::new(1.0));
    let read = Rc::clone(&source);
    let mut dynamic = MetricBuilder::new("lr").dynamic(move || read.get()).unwrap();

    assert!(matches!(dynamic.value(), Err(MetricError::Unevaluated { .. })));
    dynamic.tick().unwrap();
    assert_eq!(dynamic.value().unwrap(), 1.0);

    source.set(0.5);
    assert_eq!(dynamic.value().unwrap(), 1.0);
    dynamic.tick().unwrap();
    assert_eq!(dynamic.value().unwrap(), 0.5);

    assert!(matches!(dynamic.update(1.0), Err(MetricError::Unsupported { .. })));
}

#[test]
fn test_dynamic_without_function() {
    let mut dynamic = MetricBuilder::new("d").build(MetricKind::Dynamic);
    assert!(matches!(dynamic.tick(), Err(MetricError::NoFunctionBound { .. })));
}

#[test]
fn test_tick_needs_timer_or_dynamic() {
    let mut avg = MetricBuilder::new("avg").average();
    assert!(matches!(avg.tick(), Err(MetricError::MissingValue { kind: "average", .. })));
}

#[test]
fn test_hooks_fire() {
    let mut max = MetricBuilder::new("acc").maximum();
    let (updates, on_update) = counter();
    let (logs, on_log) = counter();
    let (improved, on_improved) = counter();
    max.on_update(on_update);
    max.on_log(on_log);
    max.on_improved(on_improved).unwrap();

    for v in [1.0, 3.0, 2.0, 3.0, 4.0] {
        max.update(v).unwrap();
    }
    max.log(None).unwrap();

    assert_eq!(updates.get(), 5);
    assert_eq!(improved.get(), 3);
    assert_eq!(logs.get(), 1);

    let mut avg = MetricBuilder::new("avg").average();
    assert!(avg.on_improved(|| {}).is_err());
}

#[test]
fn test_failed_update_skips_hooks() {
    let mut avg = MetricBuilder::new("avg").average();
    let (updates, on_update) = counter();
    avg.on_update(on_update);
    assert!(avg.update_weighted(1.0, 0.0).is_err());
    assert_eq!(updates.get(), 0);
}

#[test]
fn test_log_step_indexes() {
    let mut m = MetricBuilder::new("loss").simple();
    m.update(1.0).unwrap();
    assert_eq!(m.log(None).unwrap(), 0.0);
    m.update(2.0).unwrap();
    assert_eq!(m.log(None).unwrap(), 1.0);
    assert_eq!(m.log(Some(10.0)).unwrap(), 10.0);
    assert_eq!(m.log(None).unwrap(), 11.0);

    assert!(matches!(m.log(Some(3.0)), Err(MetricError::NonMonotonicIndex { .. })));
    assert_eq!(m.history().values(), &[1.0, 2.0, 2.0, 2.0]);
    assert_eq!(m.last_logged(), Some(2.0));
}

#[test]
fn test_log_of_empty_accumulator_fails_cleanly() {
    let mut avg = MetricBuilder::new("avg").average();
    assert!(avg.log(None).is_err());
    assert!(avg.history().is_empty());
    assert_eq!(avg.last_logged(), None);
}

#[test]
fn test_log_pushes_to_plotter() {
    let sink = MemorySink::new();
    let plotter = Plotter::new(sink.clone(), PlotterConfig::automatic());
    let mut m = MetricBuilder::new("loss").tag("train").plot_on(&plotter, "Loss").average();

    m.update(2.0).unwrap();
    m.log(None).unwrap();
    m.update(4.0).unwrap();
    m.log(None).unwrap();

    assert_eq!(sink.delivered_points("Loss", Some("train")), vec![(0.0, 2.0), (1.0, 3.0)]);
}

#[test]
fn test_default_tag_plots_without_legend() {
    let sink = MemorySink::new();
    let plotter = Plotter::new(sink.clone(), PlotterConfig::automatic());
    let mut m = MetricBuilder::new("lr").plot_on(&plotter, "LR").simple();
    m.update(0.1).unwrap();
    m.log(None).unwrap();
    assert_eq!(sink.delivered_points("LR", None), vec![(0.0, 0.1)]);
}

#[test]
fn test_explicit_legend_overrides_tag() {
    let sink = MemorySink::new();
    let plotter = Plotter::new(sink.clone(), PlotterConfig::automatic());
    let mut m =
        MetricBuilder::new("acc").tag("val").legend("validation").plot_on(&plotter, "Acc").simple();
    m.update(0.9).unwrap();
    m.log(None).unwrap();
    assert_eq!(sink.delivered_points("Acc", Some("validation")), vec![(0.0, 0.9)]);
}

#[test]
fn test_plot_on_replays_history() {
    let mut m = MetricBuilder::new("loss").simple();
    for v in [3.0, 2.0, 1.0] {
        m.update(v).unwrap();
        m.log(None).unwrap();
    }

    let sink = MemorySink::new();
    let plotter = Plotter::new(sink.clone(), PlotterConfig::manual());
    m.plot_on(&plotter, "Loss", Some("train"));
    assert_eq!(plotter.pending("Loss"), 3);

    plotter.flush_all();
    assert_eq!(sink.delivered_points("Loss", Some("train")), vec![(0.0, 3.0), (1.0, 2.0), (2.0, 1.0)]);
}

#[test]
fn test_unplot_stops_pushes() {
    let plotter = Plotter::new(MemorySink::new(), PlotterConfig::manual());
    let mut m = MetricBuilder::new("loss").plot_on(&plotter, "Loss").simple();
    m.unplot();
    m.update(1.0).unwrap();
    m.log(None).unwrap();
    assert_eq!(plotter.pending("Loss"), 0);
    assert_eq!(m.plot_title(), Some("Loss"));
}

#[test]
fn test_time_indexed_sets_default_xlabel() {
    let plotter = Plotter::new(MemorySink::new(), PlotterConfig::manual());
    let _m = MetricBuilder::new("loss").time_indexed().plot_on(&plotter, "Loss").simple();
    assert_eq!(plotter.window_options("Loss").and_then(|o| o.xlabel).as_deref(), Some("Time (s)"));
}

#[test]
fn test_name_id() {
    assert_eq!(name_id("Loss", DEFAULT_TAG), "loss");
    assert_eq!(name_id("Loss", "Train"), "loss_train");
    assert_eq!(MetricBuilder::new("acc").tag("val").simple().name_id(), "acc_val");
}

#[test]
fn test_kind_parse() {
    for kind in MetricKind::ALL {
        assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
    }
    assert!(matches!(
        "histogram".parse::<MetricKind>(),
        Err(MetricError::SerializationTypeMismatch { .. })
    ));
}

#[test]
fn test_wrapper_retags_children() {
    let obj = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").tag("other").average())
        .unwrap()
        .with_tag("train");
    assert_eq!(obj.tag(), "train");
    assert_eq!(obj.child("a").unwrap().tag(), "train");
}

#[test]
fn test_wrapper_rejects_duplicate_child() {
    let err = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").simple())
        .unwrap()
        .with_child("a", MetricBuilder::new("a").sum())
        .unwrap_err();
    assert!(matches!(err, MetricError::DuplicateRegistration { .. }));
}

#[test]
fn test_wrapper_unknown_child_leaves_state_untouched() {
    let mut obj = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").sum())
        .unwrap();

    let err = obj.update([("a", 1.0), ("missing", 2.0)]).unwrap_err();
    assert!(matches!(err, MetricError::UnknownChild { ref name } if name == "missing"));
    assert!(obj.child("a").unwrap().value().is_err());
}

#[test]
fn test_wrapper_log_and_reset() {
    let mut obj = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").simple())
        .unwrap()
        .with_child("b", MetricBuilder::new("b").maximum())
        .unwrap();
    obj.update([("a", 1.0), ("b", 2.0)]).unwrap();
    obj.log(Some(5.0)).unwrap();

    assert_eq!(obj.child("a").unwrap().history().indices(), &[5.0]);
    assert_eq!(obj.child("b").unwrap().last_logged(), Some(2.0));

    obj.reset();
    assert_eq!(obj.get().unwrap()["b"], f64::NEG_INFINITY);
    assert_eq!(obj.child("b").unwrap().history().len(), 1);
}

#[test]
fn test_wrapper_log_is_all_or_nothing() {
    let mut obj = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").simple())
        .unwrap()
        .with_child("b", MetricBuilder::new("b").average())
        .unwrap();
    obj.update([("a", 1.0)]).unwrap();

    assert!(matches!(obj.log(None), Err(MetricError::EmptyAccumulator { .. })));
    assert!(obj.child("a").unwrap().history().is_empty());

    let mut metric: Metric = obj.into();
    assert!(metric.log(None).is_err());
    metric.for_each_leaf_mut(&mut |leaf| {
        if leaf.kind() == MetricKind::Average {
            leaf.update(3.0).unwrap();
        }
    });
    metric.log(None).unwrap();
    assert_eq!(metric.as_wrapper().unwrap().get().unwrap()["b"], 3.0);
}

#[test]
fn test_leaf_check_log_has_no_side_effects() {
    let mut m = MetricBuilder::new("acc").simple();
    m.update(0.5).unwrap();
    m.check_log(Some(2.0)).unwrap();
    assert!(m.history().is_empty());

    m.log(Some(2.0)).unwrap();
    assert!(m.check_log(Some(1.0)).is_err());
    assert!(MetricBuilder::new("n").sum().check_log(None).is_err());
}

#[test]
fn test_visit_leaves_paths() {
    let wrapper: Metric = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").simple())
        .unwrap()
        .with_child("b", MetricBuilder::new("b").simple())
        .unwrap()
        .into();
    let leaf: Metric = MetricBuilder::new("lr").simple().into();

    let mut paths = Vec::new();
    wrapper.visit_leaves("obj", &mut |path, _| paths.push(path));
    leaf.visit_leaves("lr", &mut |path, _| paths.push(path));
    assert_eq!(paths, vec!["obj.a", "obj.b", "lr"]);
}

#[test]
fn test_metric_log_visits_leaves() {
    let mut metric: Metric = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").simple())
        .unwrap()
        .into();
    metric.log(None).unwrap();
    metric.log(None).unwrap();
    let leaf = metric.as_wrapper().unwrap().child("a").unwrap();
    assert_eq!(leaf.history().indices(), &[0.0, 1.0]);
}

#[test]
fn test_leaf_state_roundtrip() {
    let mut avg = MetricBuilder::new("loss").tag("train").average();
    avg.set_offset(0.5).unwrap();
    avg.update_weighted(2.0, 2.0).unwrap();
    avg.log(None).unwrap();
    avg.update(5.0).unwrap();
    avg.log(Some(4.0)).unwrap();

    let state = avg.state_dict().unwrap();
    assert_eq!(state.kind, "average");
    let restored = LeafMetric::from_state(&state).unwrap();

    assert_eq!(restored.name(), "loss");
    assert_eq!(restored.tag(), "train");
    assert_eq!(restored.internal_state(), avg.internal_state());
    assert_eq!(restored.history(), avg.history());
    assert_eq!(restored.state_dict().unwrap(), state);
}

#[test]
fn test_fresh_extremum_roundtrips_through_json() {
    let max = MetricBuilder::new("best").maximum();
    let text = serde_json::to_string(&max.state_dict().unwrap()).unwrap();
    assert!(text.contains("\"-inf\""));

    let state: NodeState = serde_json::from_str(&text).unwrap();
    let restored = LeafMetric::from_state(&state).unwrap();
    assert_eq!(restored.value().unwrap(), f64::NEG_INFINITY);
}

#[test]
fn test_load_state_kind_mismatch() {
    let sum = MetricBuilder::new("x").sum().state_dict().unwrap();
    let mut avg = MetricBuilder::new("x").average();
    assert!(matches!(
        avg.load_state_dict(&sum),
        Err(MetricError::SerializationTypeMismatch { .. })
    ));
}

#[test]
fn test_load_state_missing_fields() {
    let mut state = MetricBuilder::new("x").simple().state_dict().unwrap();
    state.fields.remove("val");
    assert!(matches!(LeafMetric::from_state(&state), Err(MetricError::MalformedState { .. })));
}

#[test]
fn test_wrapper_state_roundtrip() {
    let mut obj = ParentWrapper::new("obj")
        .with_child("a", MetricBuilder::new("a").average())
        .unwrap()
        .with_child("b", MetricBuilder::new("b").sum())
        .unwrap()
        .with_tag("val");
    obj.update([("a", 1.0), ("b", 2.0)]).unwrap();
    obj.log(None).unwrap();

    let state = obj.state_dict().unwrap();
    let restored = ParentWrapper::from_state(&state).unwrap();
    assert_eq!(restored.tag(), "val");
    assert_eq!(restored.get().unwrap(), obj.get().unwrap());
    assert_eq!(restored.children().map(|(n, _)| n).collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(restored.state_dict().unwrap(), state);

    let metric = Metric::from_state(&state).unwrap();
    assert!(metric.as_wrapper().is_some());
}

proptest! {
    #[test]
    fn prop_average_is_weighted_mean(
        updates in prop::collection::vec((-1e3f64..1e3, 0.01f64..100.0), 1..40)
    ) {
        let mut avg = MetricBuilder::new("avg").average();
        for (v, w) in &updates {
            avg.update_weighted(*v, *w).unwrap();
        }
        let num: f64 = updates.iter().map(|(v, w)| v * w).sum();
        let den: f64 = updates.iter().map(|(_, w)| w).sum();
        let value = avg.value().unwrap();
        prop_assert!((value - num / den).abs() <= 1e-9 * (1.0 + (num / den).abs()));
    }

    #[test]
    fn prop_sum_is_weighted_total(
        updates in prop::collection::vec((-1e3f64..1e3, 0.01f64..100.0), 1..40)
    ) {
        let mut sum = MetricBuilder::new("sum").sum();
        for (v, w) in &updates {
            sum.update_weighted(*v, *w).unwrap();
        }
        let total: f64 = updates.iter().map(|(v, w)| v * w).sum();
        prop_assert!((sum.value().unwrap() - total).abs() <= 1e-9 * (1.0 + total.abs()));
    }

    #[test]
    fn prop_extrema_are_monotone(values in prop::collection::vec(-1e6f64..1e6, 1..50)) {
        let mut max = MetricBuilder::new("max").maximum();
        let mut min = MetricBuilder::new("min").minimum();
        let mut prev_max = f64::NEG_INFINITY;
        let mut prev_min = f64::INFINITY;
        for v in &values {
            max.update(*v).unwrap();
            min.update(*v).unwrap();
            let (cur_max, cur_min) = (max.value().unwrap(), min.value().unwrap());
            prop_assert!(cur_max >= prev_max);
            prop_assert!(cur_min <= prev_min);
            prev_max = cur_max;
            prev_min = cur_min;
        }
        let true_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let true_min = values.iter().copied().fold(f64::INFINITY, f64::min);
        prop_assert_eq!(max.value().unwrap(), true_max);
        prop_assert_eq!(min.value().unwrap(), true_min);
    }

    #[test]
    fn prop_state_roundtrip_preserves_history(
        values in prop::collection::vec(-1e6f64..1e6, 0..30)
    ) {
        let mut m = MetricBuilder::new("x").simple();
        for v in &values {
            m.update(*v).unwrap();
            m.log(None).unwrap();
        }
        let text = serde_json::to_string(&m.state_dict().unwrap()).unwrap();
        let state: NodeState = serde_json::from_str(&text).unwrap();
        let restored = LeafMetric::from_state(&state).unwrap();
        prop_assert_eq!(restored.history(), m.history());
        prop_assert_eq!(restored.indexing_mode(), IndexingMode::Step);
    }
}
