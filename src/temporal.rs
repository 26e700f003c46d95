use polars::prelude::*;
use tracing::warn;

use crate::error::InsightError;
use crate::metrics::DerivedTable;
use crate::table::{require_columns, trimmed};

const WEIGHT: &str = "_weight";

/// Accepted layouts, tried in order. Day before month whenever the year is
/// not first. Two-digit years come first, `%Y` would read `24` as year 24.
const DAY_FIRST_FORMATS: [&str; 11] = [
    "%d/%m/%y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse text as a day-first datetime (µs): `03/04/2024` is 3 April. Each
/// layout is tried in turn and the first match wins; cells matching none
/// become null.
pub fn parse_day_first(column: &str) -> Expr {
    let attempts: Vec<Expr> = DAY_FIRST_FORMATS
        .iter()
        .map(|format| {
            trimmed(column).str().to_datetime(
                Some(TimeUnit::Microseconds),
                None,
                StrptimeOptions {
                    format: Some((*format).into()),
                    strict: false,
                    exact: true,
                    ..Default::default()
                },
                lit("raise"),
            )
        })
        .collect();
    coalesce(&attempts)
}

/// Midnight on the first day of the month.
pub fn month_start(datetime: Expr) -> Expr {
    datetime.dt().truncate(lit("1mo"))
}

/// Count rows per calendar month of `date_column`.
///
/// Output columns: `date_name` (Datetime µs, first day of the month,
/// ascending) and `count_name`. When `weight_column` is given each row
/// contributes its weight instead of 1, so feeding the output back in with
/// `weight_column = Some(count_name)` reproduces the same counts.
///
/// Rows whose date (or weight) cannot be parsed are dropped and counted in
/// [`DerivedTable::dropped`]; the aggregation itself never fails on cell
/// content.
pub fn aggregate_monthly(
    df: &DataFrame,
    table: &str,
    date_column: &str,
    weight_column: Option<&str>,
    date_name: &str,
    count_name: &str,
) -> Result<DerivedTable, InsightError> {
    require_columns(df, table, &[date_column])?;
    let date = match df.column(date_column)?.dtype() {
        DataType::Datetime(_, _) => {
            col(date_column).cast(DataType::Datetime(TimeUnit::Microseconds, None))
        }
        _ => parse_day_first(date_column),
    };

    let mut columns = vec![month_start(date).alias(date_name)];
    let mut usable = col(date_name).is_not_null();
    let count = match weight_column {
        Some(weight) => {
            require_columns(df, table, &[weight])?;
            columns.push(trimmed(weight).cast(DataType::UInt32).alias(WEIGHT));
            usable = usable.and(col(WEIGHT).is_not_null());
            col(WEIGHT).sum()
        }
        None => len(),
    };

    let parsed = df.clone().lazy().select(columns).filter(usable).collect()?;
    let dropped = df.height() - parsed.height();
    if dropped > 0 {
        warn!(table, column = date_column, dropped, "rows without a usable date");
    }

    let table = parsed
        .lazy()
        .group_by([col(date_name)])
        .agg([count.cast(DataType::UInt32).alias(count_name)])
        .sort_by_exprs([col(date_name)], SortMultipleOptions::default())
        .collect()?;
    Ok(DerivedTable { table, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn dates_frame(values: &[Option<&str>]) -> DataFrame {
        DataFrame::new(vec![Column::new("date".into(), values)]).unwrap()
    }

    fn counts(df: &DataFrame) -> Vec<u32> {
        df.column("n").unwrap().u32().unwrap().into_no_null_iter().collect()
    }

    fn micros(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
        df.column(column)
            .unwrap()
            .as_materialized_series()
            .to_physical_repr()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn at(y: i32, m: u32, d: u32) -> Option<i64> {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_micros())
    }

    #[test]
    fn day_first_interpretation() {
        let df = dates_frame(&[
            Some("03/04/2024"),
            Some("13/01/2024"),
            Some("2024-04-03"),
            Some(" 2024-04-03 00:00:00 "),
            Some("03/04/24"),
            Some("01/13/2024"),
            Some("hier"),
            None,
        ]);
        let out = df
            .lazy()
            .select([parse_day_first("date").alias("parsed")])
            .collect()
            .unwrap();
        assert_eq!(
            micros(&out, "parsed"),
            vec![
                at(2024, 4, 3),
                at(2024, 1, 13),
                at(2024, 4, 3),
                at(2024, 4, 3),
                at(2024, 4, 3),
                None,
                None,
                None,
            ]
        );
    }

    #[test]
    fn time_of_day_is_truncated_with_the_month() {
        let df = dates_frame(&[Some("03/04/2024 14:30"), Some("31/12/2023 23:59:59")]);
        let out = df
            .lazy()
            .select([month_start(parse_day_first("date")).alias("month")])
            .collect()
            .unwrap();
        assert_eq!(micros(&out, "month"), vec![at(2024, 4, 1), at(2023, 12, 1)]);
    }

    #[test]
    fn months_are_counted_and_sorted_chronologically() {
        let df = dates_frame(&[
            Some("15/03/2024"),
            Some("02/01/2024"),
            Some("31/03/2024"),
            Some("20/12/2023"),
        ]);
        let out = aggregate_monthly(&df, "accident", "date", None, "Date", "n").unwrap();
        assert_eq!(out.dropped, 0);
        assert_eq!(counts(&out.table), vec![1, 1, 2]);
        assert_eq!(
            micros(&out.table, "Date"),
            vec![at(2023, 12, 1), at(2024, 1, 1), at(2024, 3, 1)]
        );
        assert!(matches!(
            out.table.column("Date").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Microseconds, None)
        ));
    }

    #[test]
    fn unparseable_dates_are_dropped_and_counted() {
        let df = dates_frame(&[Some("15/03/2024"), Some("n/a"), None, Some("16/03/2024")]);
        let out = aggregate_monthly(&df, "accident", "date", None, "Date", "n").unwrap();
        assert_eq!(out.dropped, 2);
        assert_eq!(counts(&out.table), vec![2]);
    }

    #[test]
    fn reaggregating_the_output_is_idempotent() {
        let df = dates_frame(&[
            Some("15/03/2024"),
            Some("01/01/2024"),
            Some("31/03/2024"),
            Some("05/05/2024"),
        ]);
        let first = aggregate_monthly(&df, "accident", "date", None, "Date", "n").unwrap();
        let second =
            aggregate_monthly(&first.table, "accident", "Date", Some("n"), "Date", "n").unwrap();
        assert_eq!(second.dropped, 0);
        assert_eq!(counts(&first.table), counts(&second.table));
        assert_eq!(micros(&first.table, "Date"), micros(&second.table, "Date"));
    }

    #[test]
    fn empty_input_gives_an_empty_series() {
        let df = dates_frame(&[]);
        let out = aggregate_monthly(&df, "inscription", "date", None, "Date", "n").unwrap();
        assert_eq!(out.dropped, 0);
        assert_eq!(out.table.height(), 0);
    }

    #[test]
    fn missing_date_column_is_a_schema_error() {
        let df = dates_frame(&[Some("15/03/2024")]);
        let err = aggregate_monthly(&df, "accident", "absent", None, "Date", "n").unwrap_err();
        assert!(matches!(err, InsightError::MissingColumn { .. }));
    }
}
