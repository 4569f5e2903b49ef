use crate::error::{LedgerReportError, Result};
use crate::schema::ChartConfig;
use crate::series::LabeledSeries;
use crate::utils::format_decimal;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 96.0;
const Y_TICKS: usize = 5;

/// Opaque image produced by a chart renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl RenderedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URI so the image can live inside a single document.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Turns a labeled series into an image. Implementations must not keep state
/// between calls.
pub trait ChartRenderer {
    fn render(&self, series: &LabeledSeries, config: &ChartConfig) -> Result<RenderedImage>;
}

/// Line chart with point markers, written as SVG. Output depends only on the
/// series and the chart size.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgLineChart;

impl ChartRenderer for SvgLineChart {
    fn render(&self, series: &LabeledSeries, config: &ChartConfig) -> Result<RenderedImage> {
        if series.labels.len() != series.values.len() {
            return Err(LedgerReportError::Render(format!(
                "series '{}' has {} labels but {} values",
                series.name,
                series.labels.len(),
                series.values.len()
            )));
        }
        if let Some(bad) = series.values.iter().find(|v| !v.is_finite()) {
            return Err(LedgerReportError::Render(format!(
                "series '{}' contains a non-finite value ({})",
                series.name, bad
            )));
        }

        let svg = render_svg(series, config.width as f64, config.height as f64)?;
        Ok(RenderedImage::new("image/svg+xml", svg))
    }
}

fn xml_error<E: std::fmt::Display>(err: E) -> LedgerReportError {
    LedgerReportError::Render(format!("Failed to write SVG: {}", err))
}

fn coord(value: f64) -> String {
    format!("{:.2}", value)
}

/// Self-closing element such as `<line .../>`.
fn empty_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    attributes: &[(&str, String)],
) -> Result<()> {
    let element = BytesStart::new(name)
        .with_attributes(attributes.iter().map(|(k, v)| (*k, v.as_str())));
    writer.write_event(Event::Empty(element)).map_err(xml_error)?;
    Ok(())
}

fn text_element(
    writer: &mut Writer<Vec<u8>>,
    attributes: &[(&str, String)],
    text: &str,
) -> Result<()> {
    let element = BytesStart::new("text")
        .with_attributes(attributes.iter().map(|(k, v)| (*k, v.as_str())));
    writer
        .write_event(Event::Start(element))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("text")))
        .map_err(xml_error)?;
    Ok(())
}

fn render_svg(series: &LabeledSeries, width: f64, height: f64) -> Result<Vec<u8>> {
    let plot_w = (width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
    let plot_h = (height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0);
    let plot_bottom = MARGIN_TOP + plot_h;
    let plot_right = MARGIN_LEFT + plot_w;
    let (y_min, y_max) = value_range(&series.values);

    let x_at = |idx: usize| -> f64 {
        if series.values.len() <= 1 {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + plot_w * idx as f64 / (series.values.len() - 1) as f64
        }
    };
    let y_at = |value: f64| -> f64 { MARGIN_TOP + plot_h * (y_max - value) / (y_max - y_min) };

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let viewbox = format!("0 0 {} {}", width, height);
    let root = BytesStart::new("svg").with_attributes([
        ("xmlns", "http://www.w3.org/2000/svg"),
        ("width", width.to_string().as_str()),
        ("height", height.to_string().as_str()),
        ("viewBox", viewbox.as_str()),
        ("font-family", "sans-serif"),
    ]);
    writer.write_event(Event::Start(root)).map_err(xml_error)?;

    empty_element(
        &mut writer,
        "rect",
        &[
            ("width", width.to_string()),
            ("height", height.to_string()),
            ("fill", "#ffffff".to_string()),
        ],
    )?;
    text_element(
        &mut writer,
        &[
            ("x", coord(width / 2.0)),
            ("y", "24".to_string()),
            ("font-size", "16".to_string()),
            ("text-anchor", "middle".to_string()),
        ],
        &series.title,
    )?;

    // Axes
    for (x1, y1, x2, y2) in [
        (MARGIN_LEFT, MARGIN_TOP, MARGIN_LEFT, plot_bottom),
        (MARGIN_LEFT, plot_bottom, plot_right, plot_bottom),
    ] {
        empty_element(
            &mut writer,
            "line",
            &[
                ("x1", coord(x1)),
                ("y1", coord(y1)),
                ("x2", coord(x2)),
                ("y2", coord(y2)),
                ("stroke", "#333333".to_string()),
            ],
        )?;
    }

    for tick in 0..=Y_TICKS {
        let value = y_min + (y_max - y_min) * tick as f64 / Y_TICKS as f64;
        let y = y_at(value);
        empty_element(
            &mut writer,
            "line",
            &[
                ("x1", coord(MARGIN_LEFT)),
                ("y1", coord(y)),
                ("x2", coord(plot_right)),
                ("y2", coord(y)),
                ("stroke", "#dddddd".to_string()),
            ],
        )?;
        text_element(
            &mut writer,
            &[
                ("x", coord(MARGIN_LEFT - 6.0)),
                ("y", coord(y + 3.0)),
                ("font-size", "10".to_string()),
                ("text-anchor", "end".to_string()),
            ],
            &format_decimal(value, 2),
        )?;
    }

    let label_y = plot_bottom + 14.0;
    for (idx, label) in series.labels.iter().enumerate() {
        let x = x_at(idx);
        text_element(
            &mut writer,
            &[
                ("x", coord(x)),
                ("y", coord(label_y)),
                ("font-size", "10".to_string()),
                ("text-anchor", "end".to_string()),
                (
                    "transform",
                    format!("rotate(-45 {} {})", coord(x), coord(label_y)),
                ),
            ],
            label,
        )?;
    }

    text_element(
        &mut writer,
        &[
            ("x", coord(MARGIN_LEFT + plot_w / 2.0)),
            ("y", coord(height - 8.0)),
            ("font-size", "12".to_string()),
            ("text-anchor", "middle".to_string()),
        ],
        &series.x_label,
    )?;
    let y_label_y = MARGIN_TOP + plot_h / 2.0;
    text_element(
        &mut writer,
        &[
            ("x", "16".to_string()),
            ("y", coord(y_label_y)),
            ("font-size", "12".to_string()),
            ("text-anchor", "middle".to_string()),
            ("transform", format!("rotate(-90 16 {})", coord(y_label_y))),
        ],
        &series.y_label,
    )?;

    if !series.values.is_empty() {
        let points: Vec<String> = series
            .values
            .iter()
            .enumerate()
            .map(|(idx, v)| format!("{},{}", coord(x_at(idx)), coord(y_at(*v))))
            .collect();
        empty_element(
            &mut writer,
            "polyline",
            &[
                ("points", points.join(" ")),
                ("fill", "none".to_string()),
                ("stroke", "#1f77b4".to_string()),
                ("stroke-width", "2".to_string()),
            ],
        )?;
        for (idx, value) in series.values.iter().enumerate() {
            empty_element(
                &mut writer,
                "circle",
                &[
                    ("cx", coord(x_at(idx))),
                    ("cy", coord(y_at(*value))),
                    ("r", "3.5".to_string()),
                    ("fill", "#1f77b4".to_string()),
                ],
            )?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("svg")))
        .map_err(xml_error)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Y axis bounds with a little headroom; flat series get a unit band.
fn value_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.1 };
        return (min - pad, max + pad);
    }

    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
