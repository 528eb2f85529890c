use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, RECORD_FILE_NAME};
use crate::record::{ParsedRecords, parse_file};

#[derive(Parser, Debug, Clone)]
pub struct CheckCommand {
    /// 记录文件或目录，目录会递归查找记录文件
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

/// 单个记录文件的检查结果
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub records: usize,
    pub skipped: usize,
    /// 各跳过原因的数量
    pub skip_reasons: Vec<(String, usize)>,
    /// 出现过的向量维度，正常情况下只有一个
    pub dims: Vec<usize>,
}

impl FileReport {
    pub fn new(path: PathBuf, parsed: &ParsedRecords) -> Self {
        let dims: BTreeSet<usize> = parsed.records.iter().map(|r| r.dim()).collect();
        Self {
            path,
            records: parsed.len(),
            skipped: parsed.skipped.len(),
            skip_reasons: parsed.skip_counts().into_iter().map(|(r, n)| (r.to_string(), n)).collect(),
            dims: dims.into_iter().collect(),
        }
    }
}

/// 展开路径：文件原样保留，目录递归查找记录文件
pub fn collect_record_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = vec![];
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && entry.file_name() == RECORD_FILE_NAME)
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

impl SubCommandExtend for CheckCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let files = collect_record_files(&self.paths);
        info!("共找到 {} 个记录文件", files.len());

        let mut reports = vec![];
        for file in files {
            let parsed = parse_file(&file)?;
            let report = FileReport::new(file, &parsed);
            if report.dims.len() > 1 {
                warn!("{}：向量维度不一致 {:?}", report.path.display(), report.dims);
            }
            reports.push(report);
        }

        print_result(&reports, self.output_format)
    }
}

fn display_dims(dims: &[usize]) -> String {
    match dims {
        [] => "-".to_string(),
        dims => dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(","),
    }
}

fn print_result(reports: &[FileReport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?)
        }
        OutputFormat::Table => {
            for r in reports {
                let reasons: Vec<String> = r.skip_reasons.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!(
                    "{}\trecords={}\tskipped={}\tdim={}\t{}",
                    r.path.display(),
                    r.records,
                    r.skipped,
                    display_dims(&r.dims),
                    reasons.join(" ")
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::record::parse_str;

    #[test]
    fn test_collect_record_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["FA_a", "FA_b"] {
            fs::create_dir(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join(RECORD_FILE_NAME), "").unwrap();
        }
        fs::write(dir.path().join("FA_a").join("other.txt"), "").unwrap();
        let single = dir.path().join("single.txt");

        let files = collect_record_files(&[dir.path().to_path_buf(), single.clone()]);
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("FA_a/vectors_object_instances.txt"));
        assert!(files[1].ends_with("FA_b/vectors_object_instances.txt"));
        assert_eq!(files[2], single);
    }

    #[test]
    fn test_file_report() {
        let parsed = parse_str("A:1:1:[1,2]\nB:1:1:[1,2,3]\nbad\nC:x:1:[1]\n");
        let report = FileReport::new(PathBuf::from("r.txt"), &parsed);
        assert_eq!(report.records, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.dims, [2, 3]);
        assert_eq!(report.skip_reasons, [("no-colon".to_string(), 1), ("bad-score".to_string(), 1)]);
        assert_eq!(display_dims(&report.dims), "2,3");
        assert_eq!(display_dims(&[]), "-");
    }
}
