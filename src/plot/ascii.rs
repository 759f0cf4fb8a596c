//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! The x axis is log10(concentration). Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line

use crate::domain::{CurveFile, CurveParams, Observation};
use crate::models::model::predict;

/// Render observations with their fitted curve.
pub fn render_ascii_plot(
    observations: &[Observation],
    params: &CurveParams,
    width: usize,
    height: usize,
) -> String {
    let (c_min, c_max) = concentration_range(observations.iter().map(|o| o.concentration)).unwrap_or((1e-3, 1e1));
    let curve = sample_curve(params, c_min, c_max, width.max(2));
    render_plot(observations, Some(&curve), c_min, c_max, width, height)
}

/// Render a plot from a saved curve JSON file (curve only, no overlay points).
pub fn render_ascii_plot_from_curve_file(curve: &CurveFile, width: usize, height: usize) -> String {
    let (c_min, c_max) =
        concentration_range(curve.grid.concentration.iter().copied()).unwrap_or((1e-3, 1e1));
    let curve_points: Vec<(f64, f64)> = curve
        .grid
        .concentration
        .iter()
        .zip(curve.grid.response.iter())
        .map(|(&c, &y)| (c, y))
        .collect();

    render_plot(&[], Some(&curve_points), c_min, c_max, width, height)
}

fn render_plot(
    observations: &[Observation],
    curve_points: Option<&[(f64, f64)]>,
    c_min: f64,
    c_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let (x_min, x_max) = (c_min.log10(), c_max.log10());

    // Determine y-range from observed points and curve points.
    let (y_min, y_max) = y_range(observations, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    if let Some(curve) = curve_points {
        draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);
    }

    for o in observations {
        let x = map_x(o.concentration.log10(), x_min, x_max, width);
        let y = map_y(o.response, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    // Build final string. We include a small header with ranges.
    let mut out = String::new();
    out.push_str(&format!(
        "Plot: concentration=[{c_min:.3e}, {c_max:.3e}] (log) | response=[{y_min:.2}, {y_max:.2}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn concentration_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_c = f64::INFINITY;
    let mut max_c = f64::NEG_INFINITY;
    for c in values.filter(|c| *c > 0.0) {
        min_c = min_c.min(c);
        max_c = max_c.max(c);
    }
    if min_c.is_finite() && max_c.is_finite() && max_c > min_c {
        Some((min_c, max_c))
    } else {
        None
    }
}

fn sample_curve(params: &CurveParams, c_min: f64, c_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let (l0, l1) = (c_min.log10(), c_max.log10());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let c = 10f64.powf(l0 + u * (l1 - l0));
        out.push((c, predict(c, params)));
    }
    out
}

fn y_range(observations: &[Observation], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for o in observations {
        min_y = min_y.min(o.response);
        max_y = max_y.max(o.response);
    }
    if let Some(curve) = curve {
        for &(_, y) in curve {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(c, y) in curve {
        if !(c > 0.0 && y.is_finite()) {
            continue;
        }
        let x = map_x(c.log10(), x_min, x_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
