use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::aggregate::SummaryTable;
use crate::palette::{ColorMap, Rgb, Rgba};
use crate::scale::axis_range;
use crate::{OutputFormat, RenderOptions};

const DEFAULT_BAR_COLOR: Rgb = Rgb(0x1f, 0x77, 0xb4);
const BAR_WIDTH: f64 = 0.8;

/// A located, colored point for the map view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
    pub color: Rgba,
    pub size: u32,
}

/// What to draw. The backend only executes it.
#[derive(Debug, Clone)]
enum Scene<'a> {
    Bars {
        title: &'a str,
        y_label: &'a str,
        bars: Vec<(String, f64, Rgb)>,
    },
    Points {
        title: &'a str,
        points: &'a [MapPoint],
    },
}

/// Bar chart of one summary column, one bar per group in row order
pub fn render_summary_bars(
    summary: &SummaryTable,
    column: &str,
    colors: Option<&ColorMap>,
    title: Option<&str>,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let idx = summary.column_index(column)?;
    let bars = summary
        .rows
        .iter()
        .map(|row| {
            let color = colors
                .map(|c| c.lookup(Some(&row.key)))
                .unwrap_or(DEFAULT_BAR_COLOR);
            (row.key.clone(), row.values[idx], color)
        })
        .collect();

    render(
        &Scene::Bars {
            title: title.unwrap_or(column),
            y_label: column,
            bars,
        },
        options,
    )
}

/// Scatter of points in lon/lat space. Transparent points are skipped; an empty list still renders.
pub fn render_point_map(points: &[MapPoint], title: Option<&str>, options: &RenderOptions) -> Result<Vec<u8>> {
    render(
        &Scene::Points {
            title: title.unwrap_or(""),
            points,
        },
        options,
    )
}

fn render(scene: &Scene, options: &RenderOptions) -> Result<Vec<u8>> {
    match options.format {
        OutputFormat::Png => render_png(scene, options.width, options.height),
        OutputFormat::Svg => render_svg(scene, options.width, options.height),
    }
}

/// Bytes in an RGB8 frame, computed in usize
fn rgb_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

fn render_png(scene: &Scene, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; rgb_buffer_len(width, height)];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_scene(&root, scene)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes)
        .write_image(&buffer, width, height, image::ColorType::Rgb8)
        .context("Failed to encode PNG")?;
    Ok(png_bytes)
}

fn render_svg(scene: &Scene, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw_scene(&root, scene)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg.into_bytes())
}

fn draw_scene<DB>(root: &DrawingArea<DB, Shift>, scene: &Scene) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;
    match scene {
        Scene::Bars { title, y_label, bars } => draw_bars(root, title, y_label, bars),
        Scene::Points { title, points } => draw_points(root, title, points),
    }
}

fn draw_bars<DB>(root: &DrawingArea<DB, Shift>, title: &str, y_label: &str, bars: &[(String, f64, Rgb)]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let num_categories = bars.len().max(1);
    let x_range = 0.0..(num_categories as f64);
    // Bars grow from zero, so the axis always includes it
    let y_range = axis_range(bars.iter().map(|(_, v, _)| *v).chain(std::iter::once(0.0)));

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build chart")?;

    let labels: Vec<&str> = bars.iter().map(|(k, _, _)| k.as_str()).collect();
    chart
        .configure_mesh()
        .x_labels(num_categories)
        .x_label_formatter(&|x| {
            let idx = *x as usize;
            labels.get(idx).map(|s| s.to_string()).unwrap_or_default()
        })
        .y_desc(y_label)
        .draw()
        .context("Failed to draw mesh")?;

    for (idx, (_, value, color)) in bars.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        let x_center = idx as f64 + 0.5;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [
                    (x_center - BAR_WIDTH / 2.0, 0.0),
                    (x_center + BAR_WIDTH / 2.0, *value),
                ],
                RGBColor(color.0, color.1, color.2).filled(),
            )))
            .context("Failed to draw bar")?;
    }
    Ok(())
}

fn draw_points<DB>(root: &DrawingArea<DB, Shift>, title: &str, points: &[MapPoint]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_range = axis_range(points.iter().map(|p| p.x));
    let y_range = axis_range(points.iter().map(|p| p.y));

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .x_desc("Longitude")
        .y_desc("Latitude")
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .draw_series(
            points
                .iter()
                .filter(|p| !p.color.is_transparent())
                .map(|p| {
                    let Rgba(r, g, b, a) = p.color;
                    Circle::new((p.x, p.y), p.size as i32, RGBAColor(r, g, b, a as f64 / 255.0).filled())
                }),
        )
        .context("Failed to draw points")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{SummaryRow, SummaryTable};

    const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    fn summary() -> SummaryTable {
        SummaryTable {
            group_field: "land_use".to_string(),
            columns: vec!["lot_area_sum".to_string()],
            rows: vec![
                SummaryRow { key: "Residential".to_string(), values: vec![60.0] },
                SummaryRow { key: "Commercial".to_string(), values: vec![f64::NAN] },
            ],
        }
    }

    #[test]
    fn test_bars_png() {
        let bytes = render_summary_bars(&summary(), "lot_area_sum", None, None, &RenderOptions::default()).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_bars_svg() {
        let options = RenderOptions { format: OutputFormat::Svg, ..RenderOptions::default() };
        let bytes = render_summary_bars(&summary(), "lot_area_sum", None, Some("Lot area"), &options).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_bars_unknown_column() {
        let result = render_summary_bars(&summary(), "floors_sum", None, None, &RenderOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_point_map_empty_renders() {
        let bytes = render_point_map(&[], Some("0 results"), &RenderOptions::default()).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_point_map_with_points() {
        let points = vec![
            MapPoint { x: -122.3, y: 47.6, color: Rgba(255, 0, 0, 255), size: 3 },
            MapPoint { x: -122.2, y: 47.7, color: Rgba::TRANSPARENT, size: 3 },
        ];
        let bytes = render_point_map(&points, None, &RenderOptions { width: 200, height: 150, ..RenderOptions::default() }).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_rgb_buffer_len() {
        assert_eq!(rgb_buffer_len(800, 600), 1_440_000);
        assert_eq!(rgb_buffer_len(0, 600), 0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rgb_buffer_len_past_u32() {
        assert_eq!(rgb_buffer_len(70_000, 70_000), 14_700_000_000);
    }
}
