//! PNG plots of identification results
use crate::identification::regression::RegressionResult;
use crate::identification::tangent_method::TangentMethodResult;
use log::info;
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

/// One line of a plot
pub struct Curve<'a> {
    pub label: &'a str,
    pub x: &'a [f64],
    pub y: &'a [f64],
}

/// smallest box holding all points, widened by 5 % on each side
pub fn plot_range(series: &[(&[f64], &[f64])]) -> Option<((f64, f64), (f64, f64))> {
    let mut x_range = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y_range = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in series {
        for (&xi, &yi) in x.iter().zip(y.iter()) {
            if !xi.is_finite() || !yi.is_finite() {
                continue;
            }
            x_range = (x_range.0.min(xi), x_range.1.max(xi));
            y_range = (y_range.0.min(yi), y_range.1.max(yi));
        }
    }
    if x_range.0 > x_range.1 {
        return None;
    }
    let widen = |(lo, hi): (f64, f64)| {
        let pad = if hi > lo { 0.05 * (hi - lo) } else { 0.5 };
        (lo - pad, hi + pad)
    };
    Some((widen(x_range), widen(y_range)))
}

/// Measured samples as points, curves as lines.
pub fn plot_curves(
    filename: &Path,
    caption: &str,
    data: (&[f64], &[f64]),
    curves: &[Curve],
) -> Result<(), Box<dyn Error>> {
    let mut series = vec![data];
    series.extend(curves.iter().map(|c| (c.x, c.y)));
    let ((x_min, x_max), (y_min, y_max)) =
        plot_range(&series).ok_or("nothing to plot")?;

    let root_area = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root_area.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root_area)
        .caption(caption, ("sans-serif", 40))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart.configure_mesh().x_desc("x").y_desc("y").draw()?;

    chart
        .draw_series(
            data.0
                .iter()
                .zip(data.1.iter())
                .map(|(&x, &y)| Circle::new((x, y), 2, BLACK.filled())),
        )?
        .label("data")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, BLACK.filled()));

    for (i, curve) in curves.iter().enumerate() {
        let color = Palette99::pick(i + 1);
        let points: Vec<(f64, f64)> = curve
            .x
            .iter()
            .zip(curve.y.iter())
            .map(|(&x, &y)| (x, y))
            .collect();
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(curve.label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(i + 1))
            });
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root_area.present()?;
    info!("plot saved to {}", filename.display());
    Ok(())
}

/// data and the fitted model
pub fn plot_regression(
    filename: &Path,
    x: &[f64],
    y: &[f64],
    result: &RegressionResult,
) -> Result<(), Box<dyn Error>> {
    // the fit lives on shifted x
    let fitted_x: Vec<f64> = result.x.iter().map(|x| x + result.shift.max(0.0)).collect();
    let curves = [Curve {
        label: "fitted",
        x: &fitted_x,
        y: &result.curve,
    }];
    plot_curves(
        filename,
        &format!("Regression: {}", result.model_name),
        (x, y),
        &curves,
    )
}

/// data, tangent and asymptote height
pub fn plot_tangent_method(
    filename: &Path,
    x: &[f64],
    y: &[f64],
    result: &TangentMethodResult,
) -> Result<(), Box<dyn Error>> {
    let shift = result.shift.max(0.0);
    let (tx, ty) = result.tangent_curve(0.1);
    let tx: Vec<f64> = tx.iter().map(|x| x + shift).collect();
    let (first, last) = match (x.first(), x.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err("nothing to plot".into()),
    };
    let limit_x = [first, last];
    let limit_y = [result.height, result.height];
    let curves = [
        Curve {
            label: "tangent",
            x: &tx,
            y: &ty,
        },
        Curve {
            label: "limit",
            x: &limit_x,
            y: &limit_y,
        },
    ];
    plot_curves(filename, "Inflectional tangent method", (x, y), &curves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_range() {
        let x: &[f64] = &[0.0, 10.0];
        let y: &[f64] = &[1.0, 3.0];
        let extra_x: &[f64] = &[5.0];
        let extra_y: &[f64] = &[f64::NAN];
        let ((x0, x1), (y0, y1)) = plot_range(&[(x, y), (extra_x, extra_y)]).unwrap();
        assert_eq!((x0, x1), (-0.5, 10.5));
        assert_eq!((y0, y1), (0.9, 3.1));
        let empty: &[f64] = &[];
        assert!(plot_range(&[(empty, empty)]).is_none());
        // a single point still spans a box
        let point: &[f64] = &[2.0];
        let ((x0, x1), _) = plot_range(&[(point, point)]).unwrap();
        assert_eq!((x0, x1), (1.5, 2.5));
    }
}
