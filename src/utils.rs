use std::fs;
use std::path::Path;

use anyhow::Result;
use indicatif::ProgressStyle;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}

/// 读取整个文件并计算 blake3 哈希
pub fn read_with_digest(path: impl AsRef<Path>) -> Result<(Vec<u8>, String)> {
    let bytes = fs::read(path)?;
    let digest = blake3::hash(&bytes).to_hex().to_string();
    Ok((bytes, digest))
}
