use polars::prelude::*;

use crate::error::InsightError;
use crate::table::{require_columns, trimmed};

const LABEL: &str = "_label";
const BUCKET: &str = "_bucket";
const COUNT: &str = "_count";
const ROW: &str = "_row";

/// One row of a bucketized frequency table.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub count: u32,
}

fn present(column: &str) -> Expr {
    col(column).is_not_null().and(col(column).neq(lit("")))
}

/// Per-category counts of `column`, each with the bucket it lands in:
/// `_label`, `_count`, `_bucket`.
fn category_counts(
    df: &DataFrame,
    table: &str,
    column: &str,
    ratio: f64,
    other_label: &str,
) -> Result<LazyFrame, InsightError> {
    require_columns(df, table, &[column])?;
    let threshold = col(COUNT).max().cast(DataType::Float64) * lit(ratio);
    Ok(df
        .clone()
        .lazy()
        .select([trimmed(column).alias(LABEL)])
        .filter(present(LABEL))
        .group_by([col(LABEL)])
        .agg([len().alias(COUNT)])
        .with_column(
            when(col(COUNT).cast(DataType::Float64).lt(threshold))
                .then(lit(other_label))
                .otherwise(col(LABEL))
                .alias(BUCKET),
        ))
}

/// Count distinct values, then fold every category whose count is strictly
/// below `ratio * max_count` into `other_label`.
///
/// Categories exactly at the threshold keep their label. The result is
/// sorted by count descending, ties by label. Nulls and blank cells are not
/// categories and are ignored.
pub fn bucketize<'a, I>(values: I, ratio: f64, other_label: &str) -> Result<Vec<Bucket>, InsightError>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let values: Vec<Option<&str>> = values.into_iter().collect();
    let df = DataFrame::new(vec![Column::new("value".into(), &values)])?;
    let out = bucketize_column(&df, "values", "value", ratio, other_label, LABEL, COUNT)?;

    let labels = out.column(LABEL)?.str()?;
    let counts = out.column(COUNT)?.u32()?;
    Ok(labels
        .into_iter()
        .zip(counts.into_iter())
        .filter_map(|(label, count)| {
            Some(Bucket {
                label: label?.to_string(),
                count: count?,
            })
        })
        .collect())
}

/// Bucketize one column of `df` into a two-column frequency table named
/// `(label_name, count_name)`.
pub fn bucketize_column(
    df: &DataFrame,
    table: &str,
    column: &str,
    ratio: f64,
    other_label: &str,
    label_name: &str,
    count_name: &str,
) -> Result<DataFrame, InsightError> {
    let out = category_counts(df, table, column, ratio, other_label)?
        .group_by([col(BUCKET)])
        .agg([col(COUNT).sum().cast(DataType::UInt32).alias(COUNT)])
        .sort_by_exprs(
            [col(COUNT), col(BUCKET)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .select([col(BUCKET).alias(label_name), col(COUNT).alias(count_name)])
        .collect()?;
    Ok(out)
}

/// Replace a column by its bucketized value, so that joined cross-tables use
/// the same categories as the standalone chart. Row order is kept.
pub fn relabel_column(
    df: &DataFrame,
    table: &str,
    column: &str,
    ratio: f64,
    other_label: &str,
) -> Result<DataFrame, InsightError> {
    let mapping = category_counts(df, table, column, ratio, other_label)?
        .select([col(LABEL), col(BUCKET)]);
    let projection: Vec<Expr> = df
        .get_column_names_str()
        .into_iter()
        .map(|name| {
            if name == column {
                col(BUCKET).alias(column)
            } else {
                col(name)
            }
        })
        .collect();

    let out = df
        .clone()
        .lazy()
        .with_row_index(ROW, None)
        .with_column(trimmed(column).alias(LABEL))
        .join(
            mapping,
            [col(LABEL)],
            [col(LABEL)],
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs([col(ROW)], SortMultipleOptions::default())
        .select(projection)
        .collect()?;
    Ok(out)
}

/// Count rows per `(row_column, col_column)` pair, skipping rows where
/// either value is missing. Sorted by count descending, then by labels.
pub fn cross_tabulate(
    df: &DataFrame,
    table: &str,
    row_column: &str,
    col_column: &str,
    names: [&str; 3],
) -> Result<DataFrame, InsightError> {
    require_columns(df, table, &[row_column, col_column])?;
    let [row_name, col_name, count_name] = names;

    let out = df
        .clone()
        .lazy()
        .select([
            trimmed(row_column).alias(row_name),
            trimmed(col_column).alias(col_name),
        ])
        .filter(present(row_name).and(present(col_name)))
        .group_by([col(row_name), col(col_name)])
        .agg([len().cast(DataType::UInt32).alias(count_name)])
        .sort_by_exprs(
            [col(count_name), col(row_name), col(col_name)],
            SortMultipleOptions::default().with_order_descending_multi([true, false, false]),
        )
        .collect()?;
    Ok(out)
}

/// Rows per value of `column` over a fixed label set, in label order.
/// Labels that never occur get a zero count; values outside the set are
/// not counted.
pub(crate) fn count_over_labels(
    df: &DataFrame,
    table: &str,
    column: &str,
    labels: &[&str],
    label_name: &str,
    count_name: &str,
) -> Result<DataFrame, InsightError> {
    require_columns(df, table, &[column])?;
    let counts = df
        .clone()
        .lazy()
        .select([col(column).cast(DataType::String).alias(LABEL)])
        .filter(col(LABEL).is_not_null())
        .group_by([col(LABEL)])
        .agg([len().alias(COUNT)]);

    let out = DataFrame::new(vec![Column::new(LABEL.into(), labels)])?
        .lazy()
        .with_row_index(ROW, None)
        .join(
            counts,
            [col(LABEL)],
            [col(LABEL)],
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs([col(ROW)], SortMultipleOptions::default())
        .select([
            col(LABEL).alias(label_name),
            col(COUNT)
                .fill_null(lit(0))
                .cast(DataType::UInt32)
                .alias(count_name),
        ])
        .collect()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repeat(label: &'static str, n: usize) -> impl Iterator<Item = Option<&'static str>> + Clone {
        std::iter::repeat(Some(label)).take(n)
    }

    #[test]
    fn rare_categories_fold_into_other() {
        let values = repeat("Fall", 50).chain(repeat("Burn", 3)).chain(repeat("Cut", 1));
        // 1% of 50 is 0.5, every category clears it.
        let buckets = bucketize(values.clone(), 0.01, "Autres").unwrap();
        assert_eq!(buckets.len(), 3);

        // 10% of 50 is 5, Burn and Cut are folded.
        let buckets = bucketize(values, 0.1, "Autres").unwrap();
        assert_eq!(
            buckets,
            vec![
                Bucket { label: "Fall".into(), count: 50 },
                Bucket { label: "Autres".into(), count: 4 },
            ]
        );
    }

    #[test]
    fn one_percent_of_a_large_mode() {
        let values = repeat("Fall", 500).chain(repeat("Burn", 3)).chain(repeat("Cut", 1));
        let buckets = bucketize(values, 0.01, "Autres").unwrap();
        assert_eq!(
            buckets,
            vec![
                Bucket { label: "Fall".into(), count: 500 },
                Bucket { label: "Autres".into(), count: 4 },
            ]
        );
    }

    #[test]
    fn count_at_threshold_keeps_its_label() {
        let values = repeat("A", 100).chain(repeat("B", 1));
        let buckets = bucketize(values, 0.01, "Autres").unwrap();
        assert!(buckets.iter().any(|b| b.label == "B"));
        assert!(buckets.iter().all(|b| b.label != "Autres"));
    }

    #[test]
    fn counts_are_conserved() {
        let values = repeat("b", 200)
            .chain(repeat("a", 30))
            .chain(repeat("c", 5))
            .chain(repeat("d", 2));
        let buckets = bucketize(values, 0.05, "Autres").unwrap();

        let total: u32 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, 237);
        for b in buckets.iter().filter(|b| b.label != "Autres") {
            assert!(f64::from(b.count) >= 10.0);
        }
        let other = buckets.iter().find(|b| b.label == "Autres").unwrap();
        assert_eq!(other.count, 7);
    }

    #[test]
    fn ties_are_ordered_by_label() {
        let values = repeat("b", 2).chain(repeat("a", 2)).chain(repeat("c", 3));
        let labels: Vec<String> = bucketize(values, 0.01, "Autres")
            .unwrap()
            .into_iter()
            .map(|b| b.label)
            .collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
    }

    #[test]
    fn nulls_and_blanks_are_ignored() {
        let buckets = bucketize(vec![None, Some("  "), Some(" x ")], 0.01, "Autres").unwrap();
        assert_eq!(buckets, vec![Bucket { label: "x".into(), count: 1 }]);
        assert!(bucketize(Vec::<Option<&str>>::new(), 0.01, "Autres")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn column_is_bucketized_into_a_frame() {
        let df = DataFrame::new(vec![Column::new(
            "kind".into(),
            &["Chute", "Chute", "Chute", "Brûlure"],
        )])
        .unwrap();
        let out = bucketize_column(&df, "accident", "kind", 0.5, "Autres", "Type", "Nombre")
            .unwrap();
        assert_eq!(out.get_column_names_str(), vec!["Type", "Nombre"]);
        let labels: Vec<&str> = out.column("Type").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(labels, vec!["Chute", "Autres"]);
    }

    #[test]
    fn missing_column_names_the_table() {
        let df = DataFrame::new(vec![Column::new("kind".into(), &["Chute"])]).unwrap();
        let err = bucketize_column(&df, "accident", "lieu", 0.5, "Autres", "Lieu", "Nombre")
            .unwrap_err();
        assert!(matches!(err, InsightError::MissingColumn { .. }));
    }

    #[test]
    fn cross_table_counts_pairs() {
        let df = DataFrame::new(vec![
            Column::new("housing".into(), &[Some("Maison"), Some("Maison"), Some("Appartement"), None]),
            Column::new("kind".into(), &[Some("Chute"), Some("Chute"), Some("Chute"), Some("Chute")]),
        ])
        .unwrap();
        let out = cross_tabulate(&df, "join", "housing", "kind", ["Logement", "Type", "Nombre"])
            .unwrap();
        assert_eq!(out.shape(), (2, 3));
        let counts: Vec<u32> = out.column("Nombre").unwrap().u32().unwrap().into_no_null_iter().collect();
        assert_eq!(counts, vec![2, 1]);
        let housing: Vec<&str> = out.column("Logement").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(housing, vec!["Maison", "Appartement"]);
    }

    #[test]
    fn relabel_matches_frequency_table() {
        let df = DataFrame::new(vec![
            Column::new("id".into(), &["1", "2", "3", "4", "5"]),
            Column::new(
                "kind".into(),
                &[Some("Chute"), Some("Brûlure"), Some(" Chute "), Some("Chute"), None],
            ),
        ])
        .unwrap();
        let out = relabel_column(&df, "accident", "kind", 0.5, "Autres").unwrap();
        assert_eq!(out.get_column_names_str(), vec!["id", "kind"]);
        let ids: Vec<&str> = out.column("id").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        let labels: Vec<Option<&str>> = out.column("kind").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            labels,
            vec![Some("Chute"), Some("Autres"), Some("Chute"), Some("Chute"), None]
        );
    }

    #[test]
    fn fixed_labels_keep_their_order_and_zeros() {
        let df = DataFrame::new(vec![Column::new(
            "band".into(),
            &[Some("31-45"), None, Some("0-18"), Some("31-45"), Some("??")],
        )])
        .unwrap();
        let out = count_over_labels(
            &df,
            "individu",
            "band",
            &["0-18", "19-30", "31-45"],
            "Tranche",
            "Nombre",
        )
        .unwrap();
        let counts: Vec<u32> = out.column("Nombre").unwrap().u32().unwrap().into_no_null_iter().collect();
        assert_eq!(counts, vec![1, 0, 2]);
        let bands: Vec<&str> = out.column("Tranche").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(bands, vec!["0-18", "19-30", "31-45"]);
    }
}
