use std::fs;

use tempfile::tempdir;

use viewsync::{
    ViewsyncError,
    identifier::Id,
    layout::Diagram,
    model::{Model, View, ViewEdge, ViewNode},
};
use viewsync_cli::{Args, Command, ExportArgs, Format, run};

fn sample_model() -> Model {
    let index = View::new(Id::new("index"), "Landscape")
        .with_node(ViewNode::new(Id::new("web"), "Web App", "container"))
        .with_node(ViewNode::new(Id::new("db"), "Database", "database"))
        .with_edge(ViewEdge::new(Id::new("web-db"), Id::new("web"), Id::new("db")).with_label("reads"));
    let context = View::new(Id::new("context"), "Context")
        .with_node(ViewNode::new(Id::new("user"), "User", "person"));
    Model::new().with_view(index).with_view(context)
}

fn export_args(model: &str, output: &str, format: Format) -> Args {
    Args {
        command: Command::Export(ExportArgs {
            model: model.to_string(),
            output: output.to_string(),
            format,
        }),
        config: None,
        log_level: "off".to_string(),
    }
}

#[test]
fn test_export_writes_one_svg_per_view() {
    let dir = tempdir().expect("Failed to create temp directory");
    let model_path = dir.path().join("model.json");
    fs::write(&model_path, serde_json::to_string(&sample_model()).unwrap()).unwrap();
    let output = dir.path().join("out");

    run(&export_args(
        model_path.to_str().unwrap(),
        output.to_str().unwrap(),
        Format::Svg,
    ))
    .unwrap();

    for id in ["index", "context"] {
        let svg = fs::read_to_string(output.join(format!("{id}.svg"))).unwrap();
        assert!(svg.starts_with("<svg"), "{id}.svg is not an SVG document");
    }
    let index = fs::read_to_string(output.join("index.svg")).unwrap();
    assert!(index.contains("Web App"));
    assert!(index.contains("reads"));
}

#[test]
fn test_export_json_writes_diagrams() {
    let dir = tempdir().expect("Failed to create temp directory");
    let model_path = dir.path().join("model.json");
    fs::write(&model_path, serde_json::to_string(&sample_model()).unwrap()).unwrap();
    let output = dir.path().join("out");

    run(&export_args(
        model_path.to_str().unwrap(),
        output.to_str().unwrap(),
        Format::Json,
    ))
    .unwrap();

    let json = fs::read_to_string(output.join("index.json")).unwrap();
    let diagram: Diagram = serde_json::from_str(&json).unwrap();
    assert_eq!(diagram.id(), Id::new("index"));
    assert_eq!(diagram.nodes().len(), 2);
    assert_eq!(diagram.edges().len(), 1);
}

#[test]
fn test_export_of_missing_model_fails() {
    let dir = tempdir().expect("Failed to create temp directory");
    let model_path = dir.path().join("absent.json");

    let err = run(&export_args(
        model_path.to_str().unwrap(),
        dir.path().join("out").to_str().unwrap(),
        Format::Svg,
    ))
    .unwrap_err();

    assert!(matches!(err, ViewsyncError::Io(_)));
}

#[test]
fn test_export_of_invalid_model_fails() {
    let dir = tempdir().expect("Failed to create temp directory");
    let model_path = dir.path().join("model.json");
    fs::write(&model_path, "[1, 2, 3]").unwrap();

    let err = run(&export_args(
        model_path.to_str().unwrap(),
        dir.path().join("out").to_str().unwrap(),
        Format::Svg,
    ))
    .unwrap_err();

    assert!(matches!(err, ViewsyncError::Model(_)));
}
