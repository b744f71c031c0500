#![allow(missing_docs)]

mod common;

use penumbra::query::{AggregationItem, QueryCompiler, QueryValue, SimilarToTextParameters};
use penumbra::search::{
    visibility_hash, Aggregation, DataType, Filter, MemorySearchIndex, Query, TermsExecution,
    ELEMENT_TYPE_FIELD,
};
use penumbra::{
    Authorizations, Compare, Contains, ElementKind, GeoCircle, GeoCompare, GeoPoint, GraphError,
    HasContainer, Predicate, PropertyValue, QueryParameters, Result,
};

use common::{auths, open_search_graph, vis};

fn seeded_index() -> Result<std::sync::Arc<MemorySearchIndex>> {
    let (graph, index) = open_search_graph();
    let writer = auths(&["secret"]);
    graph
        .define_property("area")
        .data_type(DataType::GeoShape)
        .define()?;
    graph
        .prepare_vertex(Some("1"), None, vis(""))
        .set_property("name", "Paris", vis(""))
        .set_property("name", "Lutetia", vis("secret"))
        .set_property("population", 2_100_000i64, vis(""))
        .set_property("location", GeoPoint::new(48.85, 2.35), vis(""))
        .set_property("area", GeoCircle::new(48.85, 2.35, 10.0), vis(""))
        .save(&writer)?;
    Ok(index)
}

fn params(tokens: &[&str], containers: Vec<HasContainer>) -> QueryParameters {
    let mut parameters = QueryParameters::query_string(None, 10, auths(tokens));
    for container in containers {
        parameters.push_has_container(container);
    }
    parameters
}

fn has(property: &str, predicate: impl Into<Predicate>, value: impl Into<QueryValue>) -> HasContainer {
    HasContainer::Value {
        property: property.into(),
        predicate: predicate.into(),
        value: value.into(),
    }
}

fn secret_field(name: &str) -> String {
    format!("{name}_{}", visibility_hash(&vis("secret")))
}

#[test]
fn clauses_expand_to_the_union_of_readable_variants() -> Result<()> {
    let index = seeded_index()?;
    let clause = has("name", Compare::Equal, PropertyValue::from("Paris"));

    let public = params(&[], vec![clause.clone()]);
    let filters = QueryCompiler::new(index.as_ref(), &public).compile_filters(None)?;
    assert_eq!(
        filters,
        vec![Filter::Term {
            field: "name_e".into(),
            value: "Paris".into(),
        }]
    );

    let cleared = params(&["secret"], vec![clause]);
    let filters = QueryCompiler::new(index.as_ref(), &cleared).compile_filters(None)?;
    assert_eq!(
        filters,
        vec![Filter::Or(vec![
            Filter::Term {
                field: "name_e".into(),
                value: "Paris".into(),
            },
            Filter::Term {
                field: format!("{}_e", secret_field("name")),
                value: "Paris".into(),
            },
        ])]
    );
    Ok(())
}

#[test]
fn element_kind_becomes_a_type_filter() -> Result<()> {
    let index = seeded_index()?;
    let parameters = params(&[], vec![]);
    let filters = QueryCompiler::new(index.as_ref(), &parameters).compile_filters(Some(ElementKind::Edge))?;
    assert_eq!(
        filters,
        vec![Filter::Term {
            field: ELEMENT_TYPE_FIELD.into(),
            value: "edge".into(),
        }]
    );
    Ok(())
}

#[test]
fn containment_uses_exact_fields_only_for_strings() -> Result<()> {
    let index = seeded_index()?;
    let parameters = params(
        &[],
        vec![
            has(
                "name",
                Contains::In,
                vec![PropertyValue::from("Paris"), PropertyValue::from("Lyon")],
            ),
            has("population", Contains::NotIn, vec![PropertyValue::Int(1), PropertyValue::Int(2)]),
        ],
    );
    let filters = QueryCompiler::new(index.as_ref(), &parameters).compile_filters(None)?;
    assert_eq!(
        filters,
        vec![
            Filter::Terms {
                field: "name_e".into(),
                values: vec!["Paris".into(), "Lyon".into()],
                execution: TermsExecution::Or,
            },
            Filter::not(Filter::Terms {
                field: "population".into(),
                values: vec![PropertyValue::Int(1), PropertyValue::Int(2)],
                execution: TermsExecution::Or,
            }),
        ]
    );
    Ok(())
}

#[test]
fn not_equal_negates_a_terms_filter() -> Result<()> {
    let index = seeded_index()?;
    let parameters = params(&[], vec![has("population", Compare::NotEqual, PropertyValue::Int(5))]);
    let filters = QueryCompiler::new(index.as_ref(), &parameters).compile_filters(None)?;
    assert_eq!(
        filters,
        vec![Filter::not(Filter::Terms {
            field: "population".into(),
            values: vec![PropertyValue::Int(5)],
            execution: TermsExecution::Or,
        })]
    );
    Ok(())
}

#[test]
fn comparisons_reject_list_operands() -> Result<()> {
    let index = seeded_index()?;
    let parameters = params(
        &[],
        vec![has("population", Compare::GreaterThan, vec![PropertyValue::Int(1)])],
    );
    let err = QueryCompiler::new(index.as_ref(), &parameters)
        .compile_filters(None)
        .unwrap_err();
    assert!(matches!(err, GraphError::UnsupportedPredicate(_)));
    Ok(())
}

#[test]
fn geo_within_follows_the_declared_shape_type() -> Result<()> {
    let index = seeded_index()?;
    let circle = GeoCircle::new(48.0, 2.0, 50.0);
    let parameters = params(
        &[],
        vec![
            has("location", GeoCompare::Within, PropertyValue::from(circle)),
            has("area", GeoCompare::Within, PropertyValue::from(circle)),
        ],
    );
    let filters = QueryCompiler::new(index.as_ref(), &parameters).compile_filters(None)?;
    assert!(matches!(&filters[0], Filter::GeoDistance { field, .. } if field == "location_g"));
    assert!(matches!(&filters[1], Filter::GeoShape { field, shape } if field == "area_g" && *shape == circle));
    Ok(())
}

#[test]
fn property_existence_clauses() -> Result<()> {
    let index = seeded_index()?;
    let parameters = params(
        &[],
        vec![HasContainer::NotProperty {
            property: "unknown".into(),
        }],
    );
    assert!(QueryCompiler::new(index.as_ref(), &parameters)
        .compile_filters(None)?
        .is_empty());

    let parameters = params(
        &[],
        vec![HasContainer::Property {
            property: "unknown".into(),
        }],
    );
    let err = QueryCompiler::new(index.as_ref(), &parameters)
        .compile_filters(None)
        .unwrap_err();
    assert!(matches!(err, GraphError::NoMatchingProperties { ref property } if property == "unknown"));

    let parameters = params(
        &["secret"],
        vec![HasContainer::NotProperty {
            property: "name".into(),
        }],
    );
    let filters = QueryCompiler::new(index.as_ref(), &parameters).compile_filters(None)?;
    assert_eq!(
        filters,
        vec![Filter::not(Filter::Or(vec![
            Filter::Exists { field: "name".into() },
            Filter::Exists {
                field: secret_field("name"),
            },
        ]))]
    );
    Ok(())
}

#[test]
fn similar_to_expands_fields_or_fails() -> Result<()> {
    let index = seeded_index()?;
    let similar = SimilarToTextParameters::new(["name"], "paris").boost(2.0);
    let parameters = QueryParameters::similar_to_text(similar, 10, auths(&["secret"]));
    let Query::MoreLikeThis(options) = QueryCompiler::new(index.as_ref(), &parameters).compile_query()? else {
        panic!("expected a more-like-this query");
    };
    assert_eq!(options.fields, vec!["name".to_owned(), secret_field("name")]);
    assert_eq!(options.like_text, "paris");
    assert_eq!(options.boost, Some(2.0));

    let missing = SimilarToTextParameters::new(["a", "b"], "x");
    let parameters = QueryParameters::similar_to_text(missing, 10, Authorizations::none());
    let err = QueryCompiler::new(index.as_ref(), &parameters)
        .compile_query()
        .unwrap_err();
    assert!(matches!(err, GraphError::NoMatchingProperties { ref property } if property == "a,b"));
    Ok(())
}

#[test]
fn query_strings_pass_through_trimmed() -> Result<()> {
    let index = seeded_index()?;
    let parameters = QueryParameters::query_string(Some("  paris ".into()), 10, Authorizations::none());
    assert_eq!(
        QueryCompiler::new(index.as_ref(), &parameters).compile_query()?,
        Query::QueryString {
            query: "paris".into()
        }
    );
    let parameters = QueryParameters::query_string(Some(String::new()), 10, Authorizations::none());
    assert_eq!(
        QueryCompiler::new(index.as_ref(), &parameters).compile_query()?,
        Query::MatchAll
    );
    Ok(())
}

#[test]
fn aggregations_are_named_per_visibility_variant() -> Result<()> {
    let index = seeded_index()?;
    let parameters = params(&["secret"], vec![]);
    let compiler = QueryCompiler::new(index.as_ref(), &parameters);
    let aggregations = compiler.compile_aggregations(&[
        AggregationItem::terms("names", "name"),
        AggregationItem::geohash("cells", "location"),
        AggregationItem::histogram("sizes", "population", "1000000"),
    ])?;

    let hash = visibility_hash(&vis("secret"));
    let named: Vec<(&str, &str)> = aggregations.iter().map(|a| (a.name(), a.field())).collect();
    let secret_name = format!("names_{hash}");
    let secret_exact = format!("{}_e", secret_field("name"));
    assert_eq!(
        named,
        vec![
            ("names", "name_e"),
            (secret_name.as_str(), secret_exact.as_str()),
            ("cells", "location_g"),
            ("sizes", "population"),
        ]
    );
    assert!(matches!(
        aggregations[3],
        Aggregation::Histogram { interval, .. } if interval == 1_000_000.0
    ));

    let err = compiler
        .compile_aggregations(&[AggregationItem::histogram("bad", "population", "-5")])
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument(_)));
    Ok(())
}
