//! Integration tests for saving and restoring experiment trees

use mlogger::metric::MetricKind;
use mlogger::persist::{load_container, load_plotter_config, save_to};
use mlogger::plot::{MemorySink, Plotter};
use mlogger::{Config, Container, MetricBuilder, MetricError, ParentWrapper};
use tempfile::TempDir;

fn experiment() -> Container {
    let scratch = Plotter::new(MemorySink::new(), Default::default());
    let mut hyper = Config::new();
    hyper.update([("lr", serde_json::json!(0.01)), ("optimizer", serde_json::json!("sgd"))]);

    let objective = ParentWrapper::new("objective")
        .with_child("loss", MetricBuilder::new("loss").plot_on(&scratch, "Objective").legend("loss").average())
        .expect("operation should succeed")
        .with_child("reg", MetricBuilder::new("reg").plot_on(&scratch, "Objective").legend("reg").sum())
        .expect("operation should succeed")
        .with_tag("train");

    let mut train = Container::new().with("objective", objective);
    train.register(MetricBuilder::new("acc").tag("train").average()).expect("operation should succeed");
    train.register(MetricBuilder::new("timer").tag("train").timer()).expect("operation should succeed");

    let mut val = Container::new();
    val.register(MetricBuilder::new("acc").tag("val").simple()).expect("operation should succeed");
    val.register(MetricBuilder::new("acc").tag("best").maximum()).expect("operation should succeed");

    let mut xp = Container::new().with("hyper", hyper).with("train", train).with("val", val);
    xp.unplot();
    xp
}

#[test]
fn test_experiment_survives_save_and_load() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("xp.json");

    let mut xp = experiment();
    for epoch in 0..3 {
        xp.reset();
        xp.visit_leaves_mut(&mut |_, leaf| match leaf.kind() {
            MetricKind::Timer => leaf.tick(),
            _ => leaf.update_weighted(f64::from(epoch) * 0.1, 2.0),
        })
        .expect("operation should succeed");
        xp.log(None).expect("operation should succeed");
    }
    save_to(&path, &xp).expect("operation should succeed");

    let restored = load_container(&path).expect("operation should succeed");
    assert_eq!(
        restored.state_dict().expect("operation should succeed"),
        xp.state_dict().expect("operation should succeed")
    );

    let names: Vec<String> = restored.named_metrics().into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec![
            "train.objective.loss",
            "train.objective.reg",
            "train.acc_train",
            "train.timer_train",
            "val.acc_val",
            "val.acc_best",
        ]
    );

    let val = restored.get("val").expect("child exists").as_container().expect("container");
    let best = val.metric("acc", "best").expect("registered").as_leaf().expect("leaf");
    assert_eq!(best.history().values().len(), 3);
    assert!((best.value().expect("readable") - 0.2).abs() < 1e-12);

    let hyper = restored.get("hyper").expect("child exists").as_config().expect("config");
    assert_eq!(hyper.get("optimizer"), Some(&serde_json::json!("sgd")));
}

#[test]
fn test_restored_tree_replays_into_new_plotter() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("xp.json");

    let mut xp = experiment();
    xp.visit_leaves_mut(&mut |_, leaf| match leaf.kind() {
        MetricKind::Timer => leaf.tick(),
        _ => leaf.update(1.0),
    })
    .expect("operation should succeed");
    xp.log(Some(0.0)).expect("operation should succeed");
    xp.log(Some(1.0)).expect("operation should succeed");
    save_to(&path, &xp).expect("operation should succeed");

    let sink = MemorySink::new();
    let plotter = Plotter::new(sink.clone(), Default::default());
    let mut restored = load_container(&path).expect("operation should succeed");
    restored.plot_on(&plotter);
    plotter.flush_all();

    assert_eq!(sink.delivered_points("Objective", Some("train")).len(), 0);
    assert_eq!(sink.delivered_points("Objective", Some("loss")).len(), 2);
    assert_eq!(sink.delivered_points("Objective", Some("reg")).len(), 2);
}

#[test]
fn test_corrupted_kind_is_rejected() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("xp.json");
    save_to(&path, &experiment()).expect("operation should succeed");

    let content = std::fs::read_to_string(&path).expect("file should exist");
    std::fs::write(&path, content.replacen("\"maximum\"", "\"median\"", 1)).expect("write");

    let err = load_container(&path).unwrap_err();
    assert!(matches!(err, MetricError::SerializationTypeMismatch { ref kind } if kind == "median"));
}

#[test]
fn test_plotter_config_from_yaml_file() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = dir.path().join("plotter.yaml");
    std::fs::write(
        &path,
        "mode: automatic\nlive: true\nwindows:\n  Objective:\n    xlabel: epoch\n    ylabel: loss\n",
    )
    .expect("write");

    let config = load_plotter_config(&path).expect("operation should succeed");
    assert!(config.live);
    let options = &config.windows["Objective"];
    assert_eq!(options.xlabel.as_deref(), Some("epoch"));
    assert_eq!(options.ylabel.as_deref(), Some("loss"));
}
