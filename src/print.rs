use stanza::style::HAlign::Left;
use stanza::style::{HAlign, Header, MinWidth, Separator, Styles};
use stanza::table::{Col, Row, Table};

use crate::data::Metric;
use crate::model::FittedModel;
use crate::sample::ModelCurve;
use crate::series::{CoalescedSeries, IncidenceSeries};

/// One row per day: the cumulative counts and the new confirmed cases, optionally followed by
/// the smoothed new cases and the infected count.
pub fn tabulate_series(
    coalesced: &CoalescedSeries,
    incidence: &IncidenceSeries,
    smoothed: Option<&[f64]>,
    show_infected: bool,
) -> Table {
    let mut cols = vec![
        Col::new(Styles::default().with(MinWidth(10)).with(Left)),
        Col::new(Styles::default().with(MinWidth(5)).with(HAlign::Right)),
    ];
    let mut header_cells = vec!["Date".into(), "Day".into()];
    for metric in [Metric::Confirmed, Metric::Deaths, Metric::Recovered] {
        cols.push(Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)));
        header_cells.push(metric.to_string().into());
    }
    cols.push(Col::new(
        Styles::default().with(Separator(true)).with(MinWidth(10)).with(HAlign::Right),
    ));
    header_cells.push("New cases".into());
    if smoothed.is_some() {
        cols.push(Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)));
        header_cells.push("Smoothed".into());
    }
    if show_infected {
        cols.push(Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)));
        header_cells.push("Infected".into());
    }

    let mut table = Table::default()
        .with_cols(cols)
        .with_row(Row::new(Styles::default().with(Header(true)), header_cells));
    let mut smoothed = smoothed.map(|smoothed| smoothed.iter());
    for (daily, new) in coalesced.rows.iter().zip(&incidence.rows) {
        let mut row_cells = vec![daily.date.to_string().into(), format!("{}", daily.day).into()];
        for metric in [Metric::Confirmed, Metric::Deaths, Metric::Recovered] {
            row_cells.push(format!("{}", daily.counts.get(metric)).into());
        }
        row_cells.push(format!("{}", new.confirmed).into());
        if let Some(smoothed) = &mut smoothed {
            let cell = match smoothed.next() {
                Some(value) => format!("{value:.1}"),
                None => String::new(),
            };
            row_cells.push(cell.into());
        }
        if show_infected {
            row_cells.push(format!("{}", daily.counts.infected()).into());
        }
        table.push_row(Row::new(Styles::default(), row_cells));
    }
    table
}

pub fn tabulate_parameters(model: &FittedModel) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(20)).with(Left)),
            Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec![format!("{} parameter", model.kind()).into(), "Value".into(), "Std error".into()],
        ));
    let names = model.kind().parameter_names();
    let std_errors = model.std_errors();
    for (param, name) in names.iter().enumerate() {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                name.to_string().into(),
                format!("{:.3}", model.params()[param]).into(),
                format!("{:.3}", std_errors[param]).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_curve(curve: &ModelCurve) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(19)).with(Left)),
            Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec!["Day".into(), "Timestamp".into(), "New cases".into()],
        ));
    for point in curve.points() {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{:.2}", point.day).into(),
                point.timestamp.to_string().into(),
                format!("{:.1}", point.value).into(),
            ],
        ));
    }
    table
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use stanza::renderer::console::Console;
    use stanza::renderer::Renderer;

    use crate::data::Counts;
    use crate::model::{FitStats, ModelKind};
    use crate::opt::Termination;
    use crate::sample::sample;
    use crate::series::DailyCounts;

    use super::*;

    fn coalesced() -> CoalescedSeries {
        let first = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        CoalescedSeries {
            country: "CountryX".into(),
            rows: vec![
                DailyCounts {
                    day: 0,
                    date: first,
                    counts: Counts::new(8, 0, 0),
                },
                DailyCounts {
                    day: 1,
                    date: first.succ_opt().unwrap(),
                    counts: Counts::new(17, 2, 1),
                },
            ],
        }
    }

    fn model() -> FittedModel {
        FittedModel::new(
            ModelKind::Logistic,
            [20_000.0, 50.0, 0.2],
            [[4.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0001]],
            FitStats {
                evaluations: 12,
                iterations: 9,
                ssr: 3.0,
                termination: Termination::Residual,
            },
        )
    }

    #[test]
    fn series_columns() {
        let coalesced = coalesced();
        let incidence = IncidenceSeries::difference(&coalesced);
        let table = tabulate_series(&coalesced, &incidence, None, false);
        assert_eq!(6, table.num_cols());
        assert_eq!(3, table.num_rows());

        let smoothed = [8.5, 9.5];
        let table = tabulate_series(&coalesced, &incidence, Some(&smoothed), true);
        assert_eq!(8, table.num_cols());
        let rendered = Console::default().render(&table).to_string();
        assert!(rendered.contains("Infected"), "{rendered}");
        assert!(rendered.contains("2020-03-02"), "{rendered}");
        assert!(rendered.contains("9.5"), "{rendered}");
    }

    #[test]
    fn short_smoothed_slice_leaves_blank_cells() {
        let coalesced = coalesced();
        let incidence = IncidenceSeries::difference(&coalesced);
        let table = tabulate_series(&coalesced, &incidence, Some(&[8.5]), false);
        assert_eq!(3, table.num_rows());
        let rendered = Console::default().render(&table).to_string();
        assert!(rendered.contains("8.5"), "{rendered}");
    }

    #[test]
    fn parameter_rows() {
        let table = tabulate_parameters(&model());
        assert_eq!(4, table.num_rows());
        let rendered = Console::default().render(&table).to_string();
        assert!(rendered.contains("Growth rate []"), "{rendered}");
        assert!(rendered.contains("20000.000"), "{rendered}");
        assert!(rendered.contains("2.000"), "{rendered}");
    }

    #[test]
    fn curve_rows() {
        let anchor = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let curve = sample(&model(), 0.0..=100.0, 11, anchor).unwrap();
        let table = tabulate_curve(&curve);
        assert_eq!(12, table.num_rows());
        let rendered = Console::default().render(&table).to_string();
        assert!(rendered.contains("2020-04-20 00:00:00"), "{rendered}");
    }
}
