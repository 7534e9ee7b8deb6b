//! 結果のグラフ描画。どれも目視確認用のPNGです。

use crate::data::SolutionTable;
use crate::training::LossHistory;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

/// 1行に並べるパネルの最大数。
const MAX_COLUMNS: usize = 3;
/// 解のパネルの縦軸範囲。
const U_RANGE: std::ops::Range<f64> = -1.1..1.1;

/// 代表時刻ごとのパネルに分けた描画領域を返します。
fn panels<'a>(
    root: &DrawingArea<BitMapBackend<'a>, Shift>,
    count: usize,
) -> Vec<DrawingArea<BitMapBackend<'a>, Shift>> {
    let columns = count.clamp(1, MAX_COLUMNS);
    let rows = count.div_ceil(columns).max(1);
    root.split_evenly((rows, columns))
}

fn canvas_size(count: usize) -> (u32, u32) {
    let columns = count.clamp(1, MAX_COLUMNS) as u32;
    let rows = count.div_ceil(MAX_COLUMNS).max(1) as u32;
    (400 * columns, 320 * rows)
}

/// 順問題の解 u(x, t) を代表時刻ごとのパネルに描きます。
pub fn plot_solution_panels(
    path: &Path,
    table: &SolutionTable,
    x_range: (f64, f64),
) -> Result<(), Box<dyn Error>> {
    let slices = table.time_slices();
    let root = BitMapBackend::new(path, canvas_size(slices.len())).into_drawing_area();
    root.fill(&WHITE)?;

    for (area, (t, points)) in panels(&root, slices.len()).iter().zip(&slices) {
        let mut chart = ChartBuilder::on(area)
            .caption(format!("t = {:.2}", t), ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_range.0..x_range.1, U_RANGE)?;
        chart.configure_mesh().x_desc("x").y_desc("u").draw()?;
        chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    }
    root.present()?;
    Ok(())
}

/// 観測データ（点）と逆問題の予測（線）を代表時刻ごとに重ねて描きます。
pub fn plot_comparison(
    path: &Path,
    observed: &SolutionTable,
    predicted: &SolutionTable,
    x_range: (f64, f64),
) -> Result<(), Box<dyn Error>> {
    let observed = observed.time_slices();
    let predicted = predicted.time_slices();
    let root = BitMapBackend::new(path, canvas_size(observed.len())).into_drawing_area();
    root.fill(&WHITE)?;

    for (area, (t, samples)) in panels(&root, observed.len()).iter().zip(&observed) {
        let mut chart = ChartBuilder::on(area)
            .caption(format!("t = {:.2}", t), ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_range.0..x_range.1, U_RANGE)?;
        chart.configure_mesh().x_desc("x").y_desc("u").draw()?;
        chart
            .draw_series(
                samples
                    .iter()
                    .map(|&(x, u)| Circle::new((x, u), 2, RED.filled())),
            )?
            .label("Observed")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, RED.filled()));

        let mut curve = predicted
            .iter()
            .find(|(tp, _)| (tp - t).abs() < 1e-9)
            .map(|(_, points)| points.clone())
            .unwrap_or_default();
        curve.sort_by(|a, b| a.0.total_cmp(&b.0));
        chart
            .draw_series(LineSeries::new(curve, &BLUE))?
            .label("Predicted")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }
    root.present()?;
    Ok(())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
///
/// 全体の損失に加え、PDE残差の項が記録されていればそれも描きます。
pub fn plot_loss_history(path: &Path, history: &LossHistory) -> Result<(), Box<dyn Error>> {
    let records = history.records();
    let total: Vec<(usize, f64)> = records
        .iter()
        .filter(|r| r.total > 0.0)
        .map(|r| (r.step, r.total.log10()))
        .collect();
    let residual: Vec<(usize, f64)> = records
        .iter()
        .filter_map(|r| r.term("pde").map(|v| (r.step, v)))
        .filter(|&(_, v)| v > 0.0)
        .map(|(step, v)| (step, v.log10()))
        .collect();

    let values = || total.iter().chain(&residual).map(|&(_, v)| v);
    let max_log_loss = values().fold(f64::NEG_INFINITY, f64::max).max(-12.0) + 0.5;
    let min_log_loss = values().fold(f64::INFINITY, f64::min).min(max_log_loss - 1.0) - 0.5;
    let max_step = records.iter().map(|r| r.step).max().unwrap_or(0).max(1);

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..max_step, min_log_loss..max_log_loss)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Iterations")
        .draw()?;
    chart
        .draw_series(LineSeries::new(total, &RED))?
        .label("Total Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .draw_series(LineSeries::new(residual, &BLUE))?
        .label("PDE Residual")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
