use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use survey_pipeline::algorithm::{mirror_counts, pyramid_magnitude};
use survey_pipeline::models::categorical_array;
use survey_pipeline::{
    AgeGroup, Aggregation, Expr, HouseholdSizeCategory, LiteralValue, Metric, Sex, SurveyError,
    WastingStatus, aggregate, population_pyramid,
};

fn table(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns.into_iter().map(|(_, a)| a).collect(),
    )
    .unwrap()
}

fn households() -> RecordBatch {
    use HouseholdSizeCategory::{FiveToSix, TenOrMore, UpToFour};
    table(vec![
        (
            "hh_size_cat",
            categorical_array(&[
                Some(TenOrMore),
                Some(UpToFour),
                Some(UpToFour),
                None,
                Some(FiveToSix),
                Some(UpToFour),
            ])
            .unwrap(),
        ),
        ("hh_size", Arc::new(Int64Array::from(vec![12, 3, 4, 0, 6, 1])) as ArrayRef),
        ("region", Arc::new(StringArray::from(vec!["north", "south", "north", "south", "east", "north"])) as ArrayRef),
    ])
}

#[test]
fn test_groups_follow_category_order_and_skip_absent_levels() {
    let summary = aggregate(
        &households(),
        &Aggregation::new("household_size")
            .group_by("hh_size_cat")
            .metric(Metric::count("households"))
            .metric(Metric::share("share", "households"))
            .metric(Metric::percent("percent", "share", 1))
            .with_totals(),
    )
    .unwrap();

    let labels: Vec<Option<String>> = summary.labels("hh_size_cat").unwrap();
    let labels: Vec<&str> = labels.iter().map(|l| l.as_deref().unwrap()).collect();
    // "7-9" has no households and gets no row
    assert_eq!(labels, vec!["1-4", "5-6", ">=10", "Total"]);
    assert_eq!(summary.excluded_rows, 1);
    assert_eq!(summary.levels_of("hh_size_cat").unwrap().len(), 4);

    assert_eq!(
        summary.int_values("households").unwrap(),
        vec![Some(3), Some(1), Some(1), Some(5)]
    );
    let shares = summary.float_values("share").unwrap();
    assert_eq!(shares[0], Some(0.6));
    assert_eq!(shares[3], Some(1.0));
    let share_sum: f64 = shares[..3].iter().map(|s| s.unwrap()).sum();
    assert!((share_sum - 1.0).abs() < 1e-12);

    assert_eq!(
        summary.labels("percent").unwrap(),
        vec![
            Some("60.0%".to_string()),
            Some("20.0%".to_string()),
            Some("20.0%".to_string()),
            Some("100.0%".to_string()),
        ]
    );
}

#[test]
fn test_integer_and_text_keys_sort_by_value() {
    let batch = table(vec![
        ("size", Arc::new(Int64Array::from(vec![10, 9, 2, 10])) as ArrayRef),
        ("region", Arc::new(StringArray::from(vec!["b", "a", "b", "c"])) as ArrayRef),
    ]);

    let by_size = aggregate(
        &batch,
        &Aggregation::new("by_size").group_by("size").metric(Metric::count("n")),
    )
    .unwrap();
    assert_eq!(
        by_size.labels("size").unwrap(),
        vec![Some("2".to_string()), Some("9".to_string()), Some("10".to_string())]
    );
    assert_eq!(by_size.int_values("n").unwrap(), vec![Some(1), Some(1), Some(2)]);

    let by_both = aggregate(
        &batch,
        &Aggregation::new("by_both")
            .group_by("region")
            .group_by("size")
            .metric(Metric::count("n")),
    )
    .unwrap();
    assert_eq!(by_both.num_rows(), 4);
    assert_eq!(by_both.find_row(&["a", "9"]), Some(0));
    assert_eq!(by_both.find_row(&["b", "2"]), Some(1));
    assert_eq!(by_both.find_row(&["b", "10"]), Some(2));
    assert_eq!(by_both.find_row(&["d", "1"]), None);
}

#[test]
fn test_sums_ratios_and_undefined_values() {
    let batch = table(vec![
        ("region", Arc::new(StringArray::from(vec!["north", "north", "south"])) as ArrayRef),
        ("members", Arc::new(Float64Array::from(vec![Some(4.0), None, Some(0.0)])) as ArrayRef),
        ("children", Arc::new(Float64Array::from(vec![Some(2.0), Some(1.0), Some(0.0)])) as ArrayRef),
    ]);

    let summary = aggregate(
        &batch,
        &Aggregation::new("ratios")
            .group_by("region")
            .metric(Metric::sum("members", "members"))
            .metric(Metric::sum("children", "children"))
            .metric(Metric::ratio("children_per_member", "children", "members"))
            .metric(Metric::percent("percent", "children_per_member", 0)),
    )
    .unwrap();

    assert_eq!(summary.float_values("members").unwrap(), vec![Some(4.0), Some(0.0)]);
    assert_eq!(
        summary.float_values("children_per_member").unwrap(),
        vec![Some(0.75), None]
    );
    assert_eq!(
        summary.labels("percent").unwrap(),
        vec![Some("75%".to_string()), Some("NA".to_string())]
    );
}

#[test]
fn test_no_grouping_gives_one_row_even_without_data() {
    let empty = households().slice(0, 0);
    let summary = aggregate(
        &empty,
        &Aggregation::new("overall")
            .metric(Metric::count("households"))
            .metric(Metric::sum("members", "hh_size"))
            .metric(Metric::ratio("mean_size", "members", "households")),
    )
    .unwrap();

    assert_eq!(summary.num_rows(), 1);
    assert_eq!(summary.int_values("households").unwrap(), vec![Some(0)]);
    assert_eq!(summary.float_values("mean_size").unwrap(), vec![None]);
}

#[test]
fn test_null_wasting_status_is_excluded_from_the_denominator() {
    use WastingStatus::{Moderate, NoWasting, Severe};
    let batch = table(vec![(
        "wasting",
        categorical_array(&[Some(NoWasting), Some(NoWasting), Some(Moderate), None, Some(Severe), None])
            .unwrap(),
    )]);

    let summary = aggregate(
        &batch,
        &Aggregation::new("wasting")
            .group_by("wasting")
            .metric(Metric::count("children"))
            .metric(Metric::share("share", "children"))
            .metric(Metric::percent("percent", "share", 1))
            .with_totals(),
    )
    .unwrap();

    assert_eq!(summary.excluded_rows, 2);
    assert_eq!(
        summary.int_values("children").unwrap(),
        vec![Some(2), Some(1), Some(1), Some(4)]
    );
    assert_eq!(
        summary.labels("percent").unwrap(),
        vec![
            Some("50.0%".to_string()),
            Some("25.0%".to_string()),
            Some("25.0%".to_string()),
            Some("100.0%".to_string()),
        ]
    );
}

#[test]
fn test_filters_and_counting_predicates() {
    let summary = aggregate(
        &households(),
        &Aggregation::new("north")
            .filter(Expr::Eq("region".to_string(), LiteralValue::String("north".to_string())))
            .metric(Metric::count("households"))
            .metric(Metric::count_where(
                "large",
                Expr::GtEq("hh_size".to_string(), LiteralValue::Int(5)),
            ))
            .metric(Metric::count_present("categorised", "hh_size_cat")),
    )
    .unwrap();

    assert_eq!(summary.int_values("households").unwrap(), vec![Some(3)]);
    assert_eq!(summary.int_values("large").unwrap(), vec![Some(1)]);
    assert_eq!(summary.int_values("categorised").unwrap(), vec![Some(3)]);
}

#[test]
fn test_configuration_errors_surface_before_aggregating() {
    let missing = aggregate(
        &households(),
        &Aggregation::new("bad").group_by("district").metric(Metric::count("n")),
    )
    .unwrap_err();
    assert!(matches!(missing, SurveyError::MissingColumn { ref column, .. } if column == "district"));

    let batch = table(vec![("z", Arc::new(Float64Array::from(vec![0.5, -1.0])) as ArrayRef)]);
    let float_key = aggregate(
        &batch,
        &Aggregation::new("bad").group_by("z").metric(Metric::count("n")),
    )
    .unwrap_err();
    assert!(matches!(float_key, SurveyError::ColumnType { .. }));

    let unknown = aggregate(
        &households(),
        &Aggregation::new("bad").metric(Metric::percent("p", "rate", 1)),
    )
    .unwrap_err();
    assert!(matches!(unknown, SurveyError::Config(_)));
}

#[test]
fn test_random_pyramids_mirror_back_to_counts() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let rows = rng.random_range(0..200);
        let sexes: Vec<Option<Sex>> = (0..rows)
            .map(|_| match rng.random_range(0..5) {
                0 => None,
                1 | 2 => Some(Sex::Male),
                _ => Some(Sex::Female),
            })
            .collect();
        let ages: Vec<Option<AgeGroup>> = (0..rows)
            .map(|_| Some(AgeGroup::from_years(rng.random_range(0..110))))
            .collect();
        let batch = table(vec![
            ("sex_label", categorical_array(&sexes).unwrap()),
            ("age_group", categorical_array(&ages).unwrap()),
        ]);

        let pyramid = population_pyramid(&batch, "sex_label", "age_group", Sex::Female).unwrap();
        let plain = aggregate(
            &batch,
            &Aggregation::new("plain")
                .group_by("sex_label")
                .group_by("age_group")
                .metric(Metric::count("people")),
        )
        .unwrap();

        let magnitude = pyramid_magnitude(&pyramid, "people").unwrap();
        assert_eq!(
            magnitude.int_values("people").unwrap(),
            plain.int_values("people").unwrap()
        );

        let present = sexes.iter().filter(|s| s.is_some()).count() as i64;
        let total: i64 = pyramid
            .int_values("people")
            .unwrap()
            .iter()
            .map(|c| c.unwrap().abs())
            .sum();
        assert_eq!(total, present);

        let twice = mirror_counts(
            &mirror_counts(&pyramid, "sex_label", "people", Sex::Female).unwrap(),
            "sex_label",
            "people",
            Sex::Female,
        )
        .unwrap();
        assert_eq!(
            twice.int_values("people").unwrap(),
            pyramid.int_values("people").unwrap()
        );
    }
}

#[test]
fn test_percent_of_counts_rounds_exact_ties_away_from_zero() {
    let regions: Vec<&str> = (0..200)
        .map(|i| match i {
            0..29 => "north",
            29..86 => "south",
            _ => "west",
        })
        .collect();
    let batch = table(vec![("region", Arc::new(StringArray::from(regions)) as ArrayRef)]);

    let summary = aggregate(
        &batch,
        &Aggregation::new("regions")
            .group_by("region")
            .metric(Metric::count("households"))
            .metric(Metric::share("share", "households"))
            .metric(Metric::percent("percent", "share", 0))
            .with_totals(),
    )
    .unwrap();

    // 29/200 = 14.5%, 57/200 = 28.5%, 114/200 = 57%
    assert_eq!(
        summary.int_values("households").unwrap(),
        vec![Some(29), Some(57), Some(114), Some(200)]
    );
    assert_eq!(
        summary.labels("percent").unwrap(),
        vec![
            Some("15%".to_string()),
            Some("29%".to_string()),
            Some("57%".to_string()),
            Some("100%".to_string()),
        ]
    );

    let overall = aggregate(
        &batch,
        &Aggregation::new("overall")
            .metric(Metric::count("households"))
            .metric(Metric::count_where(
                "northern",
                Expr::Eq("region".to_string(), LiteralValue::String("north".to_string())),
            ))
            .metric(Metric::ratio("rate", "northern", "households"))
            .metric(Metric::percent("percent", "rate", 0)),
    )
    .unwrap();
    assert_eq!(overall.float_values("rate").unwrap(), vec![Some(0.145)]);
    assert_eq!(overall.labels("percent").unwrap(), vec![Some("15%".to_string())]);
}
