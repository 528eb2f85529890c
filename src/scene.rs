use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::cluster::ClusterEdge;
use crate::display::DisplaySubset;
use crate::tsne::TsneParams;

/// 标记大小 = 实例数量 * MARKER_SCALE + MARKER_BASE
pub const MARKER_SCALE: f64 = 2.0;
pub const MARKER_BASE: f64 = 6.0;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub fn marker_size(instance_count: u32) -> f64 {
    instance_count as f64 * MARKER_SCALE + MARKER_BASE
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScenePoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub instance_count: u32,
    pub size: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SceneEdge {
    pub source: String,
    pub target: String,
    pub x1: f64,
    pub y1: f64,
    pub z1: f64,
    pub x2: f64,
    pub y2: f64,
    pub z2: f64,
    pub color_index: usize,
    pub color: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SceneMeta {
    /// 参与降维的记录数量（含离群点）
    pub records: usize,
    /// 展示的点数量
    pub displayed: usize,
    /// 解析时跳过的行数
    pub skipped_lines: usize,
    /// 输入文件的 blake3 哈希
    pub input_digest: Option<String>,
    pub kl_divergence: f64,
    pub n_iter: usize,
    pub tsne: TsneParams,
}

/// 交给展示层的完整场景
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Scene {
    pub aesthetic: String,
    pub points: Vec<ScenePoint>,
    pub edges: Vec<SceneEdge>,
    pub palette: Vec<String>,
    pub meta: SceneMeta,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    Html,
    Json,
}

impl SceneFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
        }
    }
}

impl Scene {
    pub fn assemble(
        aesthetic: impl Into<String>,
        subset: &DisplaySubset,
        edges: &[ClusterEdge],
        palette: &[String],
        meta: SceneMeta,
    ) -> Self {
        let points = subset
            .labels()
            .iter()
            .zip(subset.coords())
            .zip(subset.instance_counts())
            .map(|((label, &[x, y, z]), &instance_count)| ScenePoint {
                label: label.clone(),
                x,
                y,
                z,
                instance_count,
                size: marker_size(instance_count),
            })
            .collect();

        let edges = edges
            .iter()
            .map(|e| {
                let [x1, y1, z1] = subset.coords()[e.source];
                let [x2, y2, z2] = subset.coords()[e.target];
                SceneEdge {
                    source: e.source_label.clone(),
                    target: e.target_label.clone(),
                    x1,
                    y1,
                    z1,
                    x2,
                    y2,
                    z2,
                    color_index: e.color_index,
                    color: palette[e.color_index % palette.len()].clone(),
                }
            })
            .collect();

        Self { aesthetic: aesthetic.into(), points, edges, palette: palette.to_vec(), meta }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 生成独立的 HTML 页面，通过 CDN 加载 plotly.js 绘制
    pub fn to_html(&self) -> Result<String> {
        // 避免标签中的 </script> 提前结束脚本
        let data = serde_json::to_string(self)?.replace("</", "<\\/");
        let name = html_escape(&self.aesthetic);
        Ok(HTML_TEMPLATE
            .replace("__PLOTLY__", PLOTLY_CDN)
            .replace("__NAME__", &name)
            .replace("__SCENE__", &data))
    }

    pub fn render(&self, format: SceneFormat) -> Result<String> {
        match format {
            SceneFormat::Html => self.to_html(),
            SceneFormat::Json => self.to_json(),
        }
    }

    pub fn write(&self, path: impl AsRef<Path>, format: SceneFormat) -> Result<()> {
        fs::write(path, self.render(format)?)?;
        Ok(())
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const HTML_TEMPLATE: &str = r##"<html>
<head>
<meta charset="UTF-8">
<title>__NAME__ 3D t-SNE Embedding</title>
<script src="__PLOTLY__"></script>
<style>
    body {
        margin: 0;
        padding: 0;
        display: flex;
        justify-content: flex-start;
        align-items: center;
        flex-direction: column;
        background-color: #111;
        color: white;
        font-family: Arial, sans-serif;
    }
    .plot-container {
        width: 90vw;
        height: 75vh;
        margin-top: 5px;
    }
    .disclaimer {
        color: #ccc;
        font-size: 16px;
        margin-top: 25px;
        margin-bottom: 20px;
        width: 80%;
        text-align: center;
        line-height: 1.4;
    }
</style>
</head>
<body>
<div id="plot" class="plot-container"></div>
<div class="disclaimer">
    <b>Important:</b> These points represent semantic embeddings of image labels.<br>
    Labels come directly from an image labeling service and are not hand-curated.<br>
    Deterministic t-SNE settings ensure reproducible layouts on every run.
</div>
<script>
const scene = __SCENE__;
const pts = scene.points;
const esc = s => String(s).replace(/&/g, "&amp;").replace(/</g, "&lt;").replace(/>/g, "&gt;");
const traces = [{
    type: "scatter3d",
    mode: "markers",
    x: pts.map(p => p.x),
    y: pts.map(p => p.y),
    z: pts.map(p => p.z),
    marker: {
        size: pts.map(p => p.size),
        color: pts.map(p => p.instance_count),
        colorscale: "Viridis",
        opacity: 0.9
    },
    text: pts.map(p => esc(p.label)),
    customdata: pts.map(p => p.instance_count),
    hovertemplate: "<b>%{text}</b><br>Instances=%{customdata}<extra></extra>",
    name: "Points"
}];
for (const e of scene.edges) {
    const pair = esc(e.source) + " ↔ " + esc(e.target);
    traces.push({
        type: "scatter3d",
        mode: "lines",
        x: [e.x1, e.x2],
        y: [e.y1, e.y2],
        z: [e.z1, e.z2],
        line: { color: e.color, width: 4 },
        text: [pair, pair],
        hovertemplate: "<b>%{text}</b><extra></extra>",
        showlegend: false
    });
}
const layout = {
    title: { text: "3D t-SNE — " + scene.aesthetic + " Object Embeddings<br>"
        + "<span style='font-size:16px;color:#bbb;'>Note: t-SNE preserves some local relationships, "
        + "but dissimilar words may appear close together and similar words may appear far apart "
        + "due to dimensionality reduction.</span>" },
    scene: {
        xaxis: { title: { text: "t-SNE 1" } },
        yaxis: { title: { text: "t-SNE 2" } },
        zaxis: { title: { text: "t-SNE 3" } },
        bgcolor: "#111"
    },
    paper_bgcolor: "#111",
    plot_bgcolor: "#111",
    font: { color: "white" },
    showlegend: false,
    margin: { l: 0, r: 0, t: 60, b: 0 }
};
Plotly.newPlot("plot", traces, layout);
</script>
</body>
</html>
"##;
