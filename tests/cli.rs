use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use ndarray::Array2;
use ndarray_npy::read_npy;
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

const RECORD_FILE: &str = "vectors_object_instances.txt";

/// 生成 n 行记录，两组向量分别围绕 0 和 5
fn records(n: usize) -> String {
    (0..n)
        .map(|j| {
            let center = if j % 2 == 0 { 0.0 } else { 5.0 };
            let v: Vec<String> =
                (0..4).map(|k| format!("{}", center + 0.01 * ((j * 7 + k * 3) % 5) as f64)).collect();
            format!("L{j}:0.9:{}:[{}]\n", j % 4, v.join(", "))
        })
        .collect()
}

fn write_aesthetic(images: &Path, name: &str, content: &str) -> Result<()> {
    fs::create_dir_all(images.join(name))?;
    fs::write(images.join(name).join(RECORD_FILE), content)?;
    Ok(())
}

#[fixture]
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    dir.child("conf").create_dir_all().unwrap();
    dir.child("conf/aesthetics.json")
        .write_str(
            r#"{
                "aesthetics": [
                    {"name": "FA_good", "output": "good_embedding.html",
                     "clusters": [["L0", "L2", "L4"], ["L1", "L3"]], "outliers": ["L2"]},
                    {"name": "FA_small"},
                    {"name": "FA_missing"}
                ]
            }"#,
        )
        .unwrap();
    dir
}

#[rstest]
fn check_reports_skips(workspace: TempDir) -> Result<()> {
    let file = workspace.path().join("records.txt");
    fs::write(&file, format!("{}not a record\n", records(5)))?;

    cargo_run!("embedscape", "check", &file)
        .success()
        .stdout(predicate::str::contains("records=5"))
        .stdout(predicate::str::contains("skipped=1"))
        .stdout(predicate::str::contains("no-colon=1"));
    Ok(())
}

#[rstest]
fn check_scans_directories(workspace: TempDir) -> Result<()> {
    let images = workspace.path().join("images");
    write_aesthetic(&images, "FA_a", &records(3))?;
    write_aesthetic(&images, "FA_b", &records(4))?;

    cargo_run!("embedscape", "check", "--output-format", "json", &images)
        .success()
        .stdout(predicate::str::contains("FA_a"))
        .stdout(predicate::str::contains("FA_b"))
        .stdout(predicate::str::contains("\"records\": 4"));
    Ok(())
}

#[rstest]
fn reduce_writes_npy(workspace: TempDir) -> Result<()> {
    let file = workspace.path().join("records.txt");
    let output = workspace.path().join("out.npy");
    fs::write(&file, records(12))?;

    cargo_run!("embedscape", "reduce", &file, "-o", &output, "--max-iter", "300").success();

    let coords: Array2<f64> = read_npy(&output)?;
    assert_eq!(coords.dim(), (12, 3));
    assert!(coords.iter().all(|v| v.is_finite()));
    Ok(())
}

#[rstest]
#[case(5, 10.0)]
#[case(3, 3.0)]
fn reduce_rejects_large_perplexity(workspace: TempDir, #[case] n: usize, #[case] perplexity: f64) -> Result<()> {
    let file = workspace.path().join("records.txt");
    fs::write(&file, records(n))?;

    cargo_run!("embedscape", "reduce", &file, "--perplexity", perplexity.to_string())
        .failure()
        .stderr(predicate::str::contains("perplexity"));
    Ok(())
}

#[rstest]
fn plot_isolates_failures(workspace: TempDir) -> Result<()> {
    let images = workspace.path().join("images");
    let output = workspace.path().join("dashboard");
    write_aesthetic(&images, "FA_good", &records(15))?;
    write_aesthetic(&images, "FA_small", &records(5))?;

    cargo_run!(
        "embedscape",
        "-c",
        workspace.path().join("conf"),
        "plot",
        "--images-dir",
        &images,
        "--output-dir",
        &output,
        "--max-iter",
        "300"
    )
    .failure()
    .stderr(predicate::str::contains("FA_small"))
    .stderr(predicate::str::contains("FA_missing"));

    let html = fs::read_to_string(output.join("good_embedding.html"))?;
    assert!(html.contains("FA_good"));
    assert!(!output.join("FA_small_embedding.html").exists());
    Ok(())
}

#[rstest]
fn plot_json_scene(workspace: TempDir) -> Result<()> {
    let images = workspace.path().join("images");
    let output = workspace.path().join("dashboard");
    write_aesthetic(&images, "FA_good", &records(15))?;

    cargo_run!(
        "embedscape",
        "-c",
        workspace.path().join("conf"),
        "plot",
        "--images-dir",
        &images,
        "--output-dir",
        &output,
        "--format",
        "json",
        "--only",
        "FA_good",
        "--max-iter",
        "300"
    )
    .success();

    let scene: serde_json::Value = serde_json::from_str(&fs::read_to_string(output.join("good_embedding.json"))?)?;
    assert_eq!(scene["meta"]["records"], 15);
    assert_eq!(scene["points"].as_array().map(|p| p.len()), Some(14));
    // {L0, L4} 一条，{L1, L3} 一条
    assert_eq!(scene["edges"].as_array().map(|e| e.len()), Some(2));
    assert_eq!(scene["edges"][1]["color_index"], 1);
    Ok(())
}

#[rstest]
fn plot_is_deterministic(workspace: TempDir) -> Result<()> {
    let images = workspace.path().join("images");
    write_aesthetic(&images, "FA_good", &records(15))?;

    let mut outputs = vec![];
    for run in ["a", "b"] {
        let output = workspace.path().join(run);
        cargo_run!(
            "embedscape",
            "-c",
            workspace.path().join("conf"),
            "plot",
            "--images-dir",
            &images,
            "--output-dir",
            &output,
            "--format",
            "json",
            "--only",
            "FA_good",
            "--max-iter",
            "300"
        )
        .success();
        outputs.push(fs::read_to_string(output.join("good_embedding.json"))?);
    }
    assert_eq!(outputs[0], outputs[1]);
    Ok(())
}

#[rstest]
fn plot_unknown_aesthetic(workspace: TempDir) -> Result<()> {
    cargo_run!("embedscape", "-c", workspace.path().join("conf"), "plot", "--only", "FA_nope")
        .failure()
        .stderr(predicate::str::contains("FA_nope"));
    Ok(())
}
