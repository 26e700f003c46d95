use polars::prelude::*;
use tracing::debug;

use crate::error::InsightError;
use crate::schema::common;
use crate::table::{require_columns, trimmed};

/// Inner join of two survey tables on the volunteer id.
///
/// Plain relational semantics: a key matching `n` rows on the left and `m`
/// on the right yields `n * m` rows. Rows with a null or blank id never
/// match anything. Overlapping non-key columns from `right` get a `_right`
/// suffix.
pub fn join_on_volunteer(
    left: &DataFrame,
    left_table: &str,
    right: &DataFrame,
    right_table: &str,
) -> Result<DataFrame, InsightError> {
    require_columns(left, left_table, &[common::VOLUNTEER_ID])?;
    require_columns(right, right_table, &[common::VOLUNTEER_ID])?;

    let joined = keyed(left)?
        .join(
            keyed(right)?,
            [col(common::VOLUNTEER_ID)],
            [col(common::VOLUNTEER_ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;

    debug!(
        left = left_table,
        right = right_table,
        rows = joined.height(),
        "joined on volunteer id"
    );
    Ok(joined)
}

/// Ids compared as trimmed text so that a numeric id in one file matches
/// the same id typed as text in another.
fn keyed(df: &DataFrame) -> Result<LazyFrame, InsightError> {
    Ok(df
        .clone()
        .lazy()
        .with_columns([trimmed(common::VOLUNTEER_ID)])
        .filter(
            col(common::VOLUNTEER_ID)
                .is_not_null()
                .and(col(common::VOLUNTEER_ID).neq(lit(""))),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ids: &[Option<&str>], payload: &str, values: &[&str]) -> DataFrame {
        DataFrame::new(vec![
            Column::new(common::VOLUNTEER_ID.into(), ids),
            Column::new(payload.into(), values),
        ])
        .unwrap()
    }

    #[test]
    fn cardinality_is_product_of_group_sizes() {
        let left = frame(&[Some("A"), Some("A"), Some("B")], "logement", &["maison", "maison", "appartement"]);
        let right = frame(&[Some("A"), Some("C")], "type", &["chute", "brûlure"]);

        let joined = join_on_volunteer(&left, "foyer", &right, "accident").unwrap();
        assert_eq!(joined.height(), 2);
        assert_eq!(joined.width(), 3);
    }

    #[test]
    fn many_to_many_is_not_deduplicated() {
        let left = frame(&[Some("A"), Some("A")], "x", &["1", "2"]);
        let right = frame(&[Some("A"), Some("A"), Some("A")], "y", &["a", "b", "c"]);
        let joined = join_on_volunteer(&left, "l", &right, "r").unwrap();
        assert_eq!(joined.height(), 6);
    }

    #[test]
    fn null_and_blank_ids_never_match() {
        let left = frame(&[None, Some(" "), Some("A")], "x", &["1", "2", "3"]);
        let right = frame(&[None, Some(""), Some(" A ")], "y", &["a", "b", "c"]);
        let joined = join_on_volunteer(&left, "l", &right, "r").unwrap();
        assert_eq!(joined.height(), 1);
    }

    #[test]
    fn missing_key_is_a_schema_error() {
        let left = DataFrame::new(vec![Column::new("other".into(), &["1"])]).unwrap();
        let right = frame(&[Some("A")], "y", &["a"]);
        let err = join_on_volunteer(&left, "foyer", &right, "accident").unwrap_err();
        assert!(matches!(err, InsightError::MissingColumn { .. }));
    }
}
