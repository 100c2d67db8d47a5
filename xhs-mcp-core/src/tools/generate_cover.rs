//! Render a cover through the cover-editor web page and screenshot it.

use crate::capture::{Capturer, ScreenshotRequest};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use server_common::{ToolDescriptor, ToolError, ToolHandler, ToolResult};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAME: &str = "generate_xiaohongshu_cover";

/// Settle time before the screenshot, long enough for web fonts and images.
const COVER_WAIT_SECS: u64 = 5;

pub const DEFAULT_TEXT: &str = "\n8 月 3 日入园人数: <span style=\"color: #ff0000; font-weight: bold;\">19999</span><br/>天气晴朗适合游玩\n";

/// Which `tools/list` entry to advertise. Behaviour is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    /// Short descriptor of the unified server.
    Unified,
    /// Fully documented descriptor of the cover-only server.
    CoverOnly,
}

pub struct GenerateCoverTool {
    capturer: Arc<dyn Capturer>,
    catalog: Catalog,
}

impl GenerateCoverTool {
    pub fn new(capturer: Arc<dyn Capturer>, catalog: Catalog) -> Self {
        Self { capturer, catalog }
    }
}

/// The argument defaults every call is merged over.
pub fn default_arguments() -> Map<String, Value> {
    let defaults = json!({
        "baseUrl": "http://localhost:3000",
        "selector": "#exportable",
        "image": "/assets/6.jpg",
        "text": DEFAULT_TEXT,
        "output_path": "/tmp/xiaohongshu_cover.png",
        "fontFamily": "Arial",
        "fontSize": 48,
        "fontWeight": "bold",
        "color": "#0e0d0c",
        "backgroundColor": "#f4f750",
        "textShadow": "2px 2px 4px #000000",
        "border": "1px solid #000000",
        "borderRadius": 32,
        "borderWidth": 3,
        "borderStyle": "dashed",
        "padding": 20,
        "scaleX": 1.0,
        "scaleY": 1.0,
        "skewX": 0.0,
        "skewY": 0.0,
        "opacity": 0.8,
        "overlayColor": "#443c3c",
        "x": 50,
        "y": 50
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Integer,
    Number,
}

impl Kind {
    fn of_default(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.is_f64() => Kind::Number,
            Value::Number(_) => Kind::Integer,
            _ => Kind::String,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Kind::String, Value::String(_)) => true,
            (Kind::Number, Value::Number(_)) => true,
            (Kind::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::String => "a string",
            Kind::Integer => "an integer",
            Kind::Number => "a number",
        }
    }
}

/// Integer defaults that callers may still send as any number.
const FRACTIONAL_KEYS: [&str; 1] = ["fontSize"];

/// Merge caller arguments over the defaults.
///
/// A present key always wins, even when empty. Known keys must have the
/// default's kind; unknown keys pass through when scalar.
pub fn merge_arguments(arguments: Map<String, Value>) -> Result<Map<String, Value>, ToolError> {
    let mut merged = default_arguments();

    for (key, value) in arguments {
        match merged.get(&key) {
            Some(default) => {
                let kind = if FRACTIONAL_KEYS.contains(&key.as_str()) {
                    Kind::Number
                } else {
                    Kind::of_default(default)
                };
                if !kind.accepts(&value) {
                    return Err(ToolError::InvalidArguments(format!(
                        "argument '{}' must be {}, got {}",
                        key,
                        kind.name(),
                        value
                    )));
                }
            }
            None => {
                if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                    return Err(ToolError::InvalidArguments(format!(
                        "argument '{}' must be a string, number or boolean",
                        key
                    )));
                }
            }
        }
        merged.insert(key, value);
    }

    Ok(merged)
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => Some(i.to_string()),
            (_, Some(u)) => Some(u.to_string()),
            // f64 Display never uses an exponent and drops a zero fraction.
            _ => n.as_f64().map(|f| f.to_string()),
        },
        _ => None,
    }
}

/// `baseUrl?<sorted form-encoded params>`, excluding `output_path`.
pub fn build_cover_url(merged: &Map<String, Value>) -> String {
    let base = merged
        .get("baseUrl")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let params: BTreeMap<&str, String> = merged
        .iter()
        .filter(|(key, _)| key.as_str() != "output_path")
        .filter_map(|(key, value)| render(value).map(|v| (key.as_str(), v)))
        .collect();

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &params {
        query.append_pair(key, value);
    }

    format!("{}?{}", base, query.finish())
}

#[async_trait]
impl ToolHandler for GenerateCoverTool {
    fn descriptor(&self) -> ToolDescriptor {
        match self.catalog {
            Catalog::Unified => unified_descriptor(),
            Catalog::CoverOnly => cover_only_descriptor(),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
        tracing::info!("Generating Xiaohongshu cover");

        let merged = merge_arguments(arguments)?;
        let url = build_cover_url(&merged);
        tracing::info!(%url, "Generated cover URL");

        let text_arg = |key: &str| {
            merged
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let request = ScreenshotRequest::new(url.clone())
            .selector(text_arg("selector"))
            .output_path(text_arg("output_path"))
            .wait_time(COVER_WAIT_SECS);

        match self.capturer.capture(request).await {
            Ok(result) => Ok(ToolResult::text(format!(
                "Xiaohongshu cover generated successfully: {}\n\nGenerated URL: {}",
                result.output_path, url
            ))),
            Err(e) => Ok(ToolResult::error(format!("Failed to generate cover: {}", e))),
        }
    }
}

fn unified_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.into(),
        description: "Generate Xiaohongshu cover image with customizable parameters".into(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "baseUrl": {"type": "string", "description": "Base URL for the cover generator"},
                "selector": {"type": "string", "description": "CSS selector for screenshot"},
                "image": {"type": "string", "description": "Background image path"},
                "text": {"type": "string", "description": "Text content to display"},
                "output_path": {"type": "string", "description": "Output file path"},
                "fontFamily": {"type": "string", "description": "Font family"},
                "fontSize": {"type": "number", "description": "Font size"},
                "color": {"type": "string", "description": "Text color"},
                "backgroundColor": {"type": "string", "description": "Background color"}
            }
        }),
    }
}

fn cover_only_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.into(),
        description: "Generate a Xiaohongshu cover image with customizable text and styling".into(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "baseUrl": {"type": "string", "description": "The URL to generate cover from (default: http://localhost:3000)"},
                "selector": {"type": "string", "description": "CSS selector of element to screenshot (default: #exportable)"},
                "image": {"type": "string", "description": "Path to the background image (default: /assets/sample1.jpg)"},
                "text": {"type": "string", "description": "Text content to overlay (supports HTML, default: 'Sample Text')"},
                "output_path": {"type": "string", "description": "Output file path for the generated image (default: /tmp/xiaohongshu_cover.png)"},
                "fontFamily": {"type": "string", "description": "Font family name (default: 'Arial')"},
                "fontSize": {"type": "integer", "description": "Font size in pixels (default: 48)"},
                "fontWeight": {"type": "string", "description": "Font weight (default: 'bold')"},
                "color": {"type": "string", "description": "Text color hex code (default: '#ffffff')"},
                "backgroundColor": {"type": "string", "description": "Background color hex code (default: '#000000')"},
                "textShadow": {"type": "string", "description": "CSS text shadow (default: '2px 2px 4px #000000')"},
                "border": {"type": "string", "description": "CSS border (default: '1px solid #000000')"},
                "borderRadius": {"type": "integer", "description": "Border radius in pixels (default: 0)"},
                "borderWidth": {"type": "integer", "description": "Border width in pixels (default: 1)"},
                "borderStyle": {"type": "string", "description": "Border style (default: 'solid')"},
                "padding": {"type": "integer", "description": "Padding in pixels (default: 20)"},
                "scaleX": {"type": "number", "description": "Horizontal scale (default: 1.0)"},
                "scaleY": {"type": "number", "description": "Vertical scale (default: 1.0)"},
                "skewX": {"type": "number", "description": "Horizontal skew in degrees (default: 0)"},
                "skewY": {"type": "number", "description": "Vertical skew in degrees (default: 0)"},
                "opacity": {"type": "number", "description": "Overlay opacity (0.0 to 1.0, default: 0.8)"},
                "overlayColor": {"type": "string", "description": "Overlay color hex code (default: '#000000')"},
                "x": {"type": "integer", "description": "Horizontal position in pixels (default: 50)"},
                "y": {"type": "integer", "description": "Vertical position in pixels (default: 50)"}
            },
            "required": []
        }),
    }
}
