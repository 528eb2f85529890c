use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

/// 一条标签向量记录，对应记录文件中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// 标签名，同一风格内作为查找键
    pub label: String,
    /// 识别服务给出的相关度评分
    pub relevance_score: f64,
    /// 该标签在图片中出现的次数
    pub instance_count: u32,
    /// 标签文本的语义向量
    pub vector: Vec<f64>,
}

impl VectorRecord {
    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}

/// 跳过某一行的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    Empty,
    NoColon,
    MissingFields,
    BadScore,
    BadInstanceCount,
    BadVector,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::NoColon => "no-colon",
            Self::MissingFields => "missing-fields",
            Self::BadScore => "bad-score",
            Self::BadInstanceCount => "bad-instance-count",
            Self::BadVector => "bad-vector",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedLine {
    /// 从 1 开始的行号
    pub line: usize,
    pub reason: SkipReason,
}

/// 解析结果：按输入顺序排列的记录，以及被跳过的行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecords {
    pub records: Vec<VectorRecord>,
    pub skipped: Vec<SkippedLine>,
}

impl ParsedRecords {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 各跳过原因的出现次数，按原因排序
    pub fn skip_counts(&self) -> Vec<(SkipReason, usize)> {
        let mut counts: Vec<(SkipReason, usize)> = vec![];
        let mut reasons: Vec<SkipReason> = self.skipped.iter().map(|s| s.reason).collect();
        reasons.sort();
        for reason in reasons {
            match counts.last_mut() {
                Some((r, n)) if *r == reason => *n += 1,
                _ => counts.push((reason, 1)),
            }
        }
        counts
    }
}

/// 解析一行 `label:score:instanceCount:[v1, v2, ...]`
///
/// 只按前三个冒号切分，向量字面量为第三个冒号之后的全部内容
pub fn parse_line(line: &str) -> Result<VectorRecord, SkipReason> {
    let line = line.trim();
    if line.is_empty() {
        return Err(SkipReason::Empty);
    }
    if !line.contains(':') {
        return Err(SkipReason::NoColon);
    }

    let mut fields = line.splitn(4, ':');
    let (Some(label), Some(score), Some(inst), Some(vector)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(SkipReason::MissingFields);
    };

    let relevance_score = score.trim().parse::<f64>().map_err(|_| SkipReason::BadScore)?;
    let instance_count = inst.trim().parse::<u32>().map_err(|_| SkipReason::BadInstanceCount)?;
    let vector = parse_vector_literal(vector).ok_or(SkipReason::BadVector)?;

    Ok(VectorRecord { label: label.to_string(), relevance_score, instance_count, vector })
}

/// 解析形如 `[0.1, -2e-3, 4]` 的向量字面量，允许末尾多一个逗号
///
/// 空向量和非有限值（nan、inf）视为解析失败
pub fn parse_vector_literal(s: &str) -> Option<Vec<f64>> {
    let inner = s.trim().strip_prefix('[')?.strip_suffix(']')?;
    let inner = inner.trim();
    let inner = inner.strip_suffix(',').unwrap_or(inner);

    let mut v = vec![];
    for item in inner.split(',') {
        let x = item.trim().parse::<f64>().ok()?;
        if !x.is_finite() {
            return None;
        }
        v.push(x);
    }
    (!v.is_empty()).then_some(v)
}

/// 逐行解析记录，格式错误的行被跳过
pub fn parse_lines<I, S>(lines: I) -> ParsedRecords
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = ParsedRecords::default();
    let mut seen = HashSet::new();

    for (i, line) in lines.into_iter().enumerate() {
        match parse_line(line.as_ref()) {
            Ok(record) => {
                if !seen.insert(record.label.clone()) {
                    warn!("第 {} 行：重复的标签 {}，按标签查找时以最后一次出现为准", i + 1, record.label);
                }
                parsed.records.push(record);
            }
            Err(reason) => {
                if reason != SkipReason::Empty {
                    debug!("跳过第 {} 行：{}", i + 1, reason);
                }
                parsed.skipped.push(SkippedLine { line: i + 1, reason });
            }
        }
    }

    parsed
}

pub fn parse_str(s: &str) -> ParsedRecords {
    parse_lines(s.lines())
}

/// 一次性读取整个记录文件并解析
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedRecords> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("无法读取记录文件: {}", path.display()))?;
    Ok(parse_str(&text))
}
