use arrow::datatypes::{DataType, Field, Schema};
use lakeshard::LakeError;
use lakeshard::schema::{ColumnType, TypeMap, TypeRankTable, unify, unify_many, unify_with};

fn schema(columns: &[(&str, DataType)]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|(name, ty)| Field::new(*name, ty.clone(), true))
            .collect::<Vec<_>>(),
    )
}

#[test]
fn unifying_a_schema_with_itself_is_identity() -> anyhow::Result<()> {
    let s = schema(&[("id", DataType::Int32), ("name", DataType::Utf8), ("ok", DataType::Boolean)]);
    let (unified, equal) = unify(&s, &s)?;
    assert_eq!(unified, s);
    assert!(equal);

    let m: TypeMap = [("id", ColumnType::Int64), ("at", ColumnType::Datetime)]
        .into_iter()
        .collect();
    assert_eq!(unify(&m, &m)?, (m.clone(), true));
    Ok(())
}

#[test]
fn higher_rank_wins_regardless_of_side() -> anyhow::Result<()> {
    let ranked = [
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float16,
        DataType::Float32,
        DataType::Float64,
        DataType::Utf8,
    ];
    for (i, low) in ranked.iter().enumerate() {
        for high in &ranked[i + 1..] {
            let a = schema(&[("v", low.clone())]);
            let b = schema(&[("v", high.clone())]);
            let (forward, eq_forward) = unify(&a, &b)?;
            let (backward, eq_backward) = unify(&b, &a)?;
            assert_eq!(forward.field(0).data_type(), high, "{low} vs {high}");
            assert_eq!(backward.field(0).data_type(), high, "{high} vs {low}");
            assert!(!eq_forward && !eq_backward);
        }
    }
    Ok(())
}

#[test]
fn unranked_ties_take_the_second_type() -> anyhow::Result<()> {
    let a = schema(&[("v", DataType::Boolean)]);
    let b = schema(&[("v", DataType::Date32)]);
    assert_eq!(unify(&a, &b)?.0.field(0).data_type(), &DataType::Date32);
    assert_eq!(unify(&b, &a)?.0.field(0).data_type(), &DataType::Boolean);

    let a: TypeMap = [("v", ColumnType::Boolean)].into_iter().collect();
    let b: TypeMap = [("v", ColumnType::Date)].into_iter().collect();
    assert_eq!(unify(&a, &b)?.0.get("v"), Some(ColumnType::Date));
    Ok(())
}

#[test]
fn lowest_ranked_type_ties_with_unranked() -> anyhow::Result<()> {
    // Int8 sits at position 0, so it ranks the same as a type missing from the table.
    let a = schema(&[("v", DataType::Int8)]);
    let b = schema(&[("v", DataType::Boolean)]);
    assert_eq!(unify(&a, &b)?.0.field(0).data_type(), &DataType::Boolean);
    Ok(())
}

#[test]
fn equality_flag_folds_with_and() -> anyhow::Result<()> {
    let s = schema(&[("id", DataType::Int32)]);
    let t = schema(&[("id", DataType::Int64)]);

    let (unified, equal) =
        unify_many(&[s.clone(), s.clone(), s.clone()])?.expect("non-empty input");
    assert_eq!(unified, s);
    assert!(equal);

    let (unified, equal) =
        unify_many(&[s.clone(), t.clone(), t.clone()])?.expect("non-empty input");
    assert_eq!(unified.field(0).data_type(), &DataType::Int64);
    assert!(!equal);

    assert!(unify_many::<Schema>(&[])?.is_none());
    Ok(())
}

#[test]
fn different_column_names_are_rejected() {
    let a = schema(&[("id", DataType::Int32), ("name", DataType::Utf8)]);
    let b = schema(&[("id", DataType::Int32), ("label", DataType::Utf8)]);
    let err = unify(&a, &b).unwrap_err();
    assert!(matches!(err, LakeError::SchemaMismatch { ref column, .. } if column == "label"));

    let narrower = schema(&[("id", DataType::Int32)]);
    let err = unify(&a, &narrower).unwrap_err();
    assert!(matches!(err, LakeError::SchemaMismatch { ref column, .. } if column == "name"));
}

#[test]
fn column_order_follows_the_first_schema() -> anyhow::Result<()> {
    let a = schema(&[("a", DataType::Int32), ("b", DataType::Utf8)]);
    let b = schema(&[("b", DataType::Utf8), ("a", DataType::Int64)]);
    let (unified, _) = unify(&a, &b)?;
    let names: Vec<&str> = unified.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(unified.field(0).data_type(), &DataType::Int64);
    Ok(())
}

#[test]
fn custom_rank_tables_override_defaults() -> anyhow::Result<()> {
    let ranks = TypeRankTable::new(vec![DataType::Utf8, DataType::Int32]);
    let a = schema(&[("v", DataType::Int32)]);
    let b = schema(&[("v", DataType::Utf8)]);
    assert_eq!(unify_with(&ranks, &a, &b)?.0.field(0).data_type(), &DataType::Int32);
    Ok(())
}
