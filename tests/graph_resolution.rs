use tempora::graph::{AnnotationGraph, Entity, KnownIntervals, KnownKey, Span};
use tempora::interval::Interval;
use tempora::resolve::{MAX_DEPTH, Resolver, Value, resolve_graph};
use tempora::TemporaError;

fn day(y: i32, m: u32, d: u32) -> Interval {
    Interval::day(y, m, d).unwrap()
}

fn between_days(from: (i32, u32, u32), to: (i32, u32, u32)) -> Interval {
    Interval::new(day(from.0, from.1, from.2).start(), day(to.0, to.1, to.2).start()).unwrap()
}

fn doc_time() -> KnownIntervals {
    KnownIntervals::new().with_doc_time(day(2024, 11, 19))
}

fn last_two_weeks() -> AnnotationGraph {
    AnnotationGraph::new(vec![
        Entity::new("1", "Last").literal("Interval-Type", "DocTime").reference("Period", "2"),
        Entity::new("2", "Period").literal("Type", "Weeks").reference("Number", "3"),
        Entity::new("3", "Number").literal("Value", 2),
    ])
    .unwrap()
}

#[test]
fn last_two_weeks_ends_at_doc_time() {
    let graph = last_two_weeks();
    let known = doc_time();
    let mut resolver = Resolver::new(&graph, &known);
    let value = resolver.resolve("1").expect("resolves");
    assert_eq!(value, Value::Interval(between_days((2024, 11, 5), (2024, 11, 19))));
}

#[test]
fn resolving_twice_yields_the_same_value() {
    let graph = last_two_weeks();
    let known = doc_time();
    let mut resolver = Resolver::new(&graph, &known);
    let first = resolver.resolve("1").unwrap();
    let second = resolver.resolve("1").unwrap();
    assert_eq!(first, second);
    // a fresh resolver agrees with the memoized one
    assert_eq!(Resolver::new(&graph, &known).resolve("1").unwrap(), first);
}

#[test]
fn top_level_of_scenario_is_the_operator() {
    let graph = last_two_weeks();
    let values = resolve_graph(&graph, &doc_time()).unwrap();
    assert_eq!(values, vec![Value::Interval(between_days((2024, 11, 5), (2024, 11, 19)))]);
}

#[test]
fn json_graph_resolves() {
    let json = r#"[
        {"id": "1", "type": "Last", "span": [10, 22],
         "properties": {"Interval-Type": "DocTime", "Period": {"ref": "2"}}},
        {"id": "2", "type": "Period", "properties": {"Type": "Weeks", "Number": {"ref": "3"}}},
        {"id": "3", "type": "Number", "properties": {"Value": 2}}
    ]"#;
    let graph = AnnotationGraph::from_json(json).expect("valid graph");
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.get("1").unwrap().span, Some(Span(10, 22)));
    let values = resolve_graph(&graph, &doc_time()).unwrap();
    assert_eq!(values[0].as_interval(), Some(between_days((2024, 11, 5), (2024, 11, 19))));

    let again = AnnotationGraph::from_json(&graph.to_json().unwrap()).unwrap();
    assert_eq!(again.entities(), graph.entities());
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = AnnotationGraph::from_json(r#"[{"id": "1"}]"#).unwrap_err();
    assert!(matches!(err, TemporaError::Parse(_)));
}

#[test]
fn duplicate_ids_are_rejected() {
    let err = AnnotationGraph::new(vec![
        Entity::new("a", "Number").literal("Value", 1),
        Entity::new("a", "Number").literal("Value", 2),
    ])
    .unwrap_err();
    assert_eq!(err, TemporaError::DuplicateEntity("a".into()));
}

#[test]
fn self_reference_is_a_cycle() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("a", "Last").reference("Interval", "a").reference("Period", "p"),
        Entity::new("p", "Period").literal("Type", "Day"),
    ])
    .unwrap();
    let err = resolve_graph(&graph, &doc_time()).unwrap_err();
    assert_eq!(err.entity(), Some("a"));
    assert_eq!(err.kind(), &TemporaError::CyclicReference { id: "a".into() });
}

#[test]
fn mutual_references_are_a_cycle() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("a", "Next").reference("Interval", "b").reference("Period", "p"),
        Entity::new("b", "Next").reference("Interval", "a").reference("Period", "p"),
        Entity::new("p", "Period").literal("Type", "Day"),
    ])
    .unwrap();
    let known = doc_time();
    let mut resolver = Resolver::new(&graph, &known);
    let err = resolver.resolve("a").unwrap_err();
    assert!(matches!(err.kind(), TemporaError::CyclicReference { .. }));
    // the failed attempt leaves nothing half-resolved behind
    let err = resolver.resolve("a").unwrap_err();
    assert!(matches!(err.kind(), TemporaError::CyclicReference { .. }));
}

#[test]
fn unknown_type_is_rejected() {
    let graph = AnnotationGraph::new(vec![Entity::new("x", "Fortnight").with_span(0, 9)]).unwrap();
    let err = resolve_graph(&graph, &doc_time()).unwrap_err();
    assert_eq!(
        err.kind(),
        &TemporaError::UnknownEntityType { id: "x".into(), type_name: "Fortnight".into() }
    );
    assert!(err.to_string().contains("at 0,9"));
}

#[test]
fn missing_property_names_the_property() {
    let graph = AnnotationGraph::new(vec![Entity::new("p", "Period").literal("Number", 3)]).unwrap();
    let err = resolve_graph(&graph, &doc_time()).unwrap_err();
    assert_eq!(
        err.kind(),
        &TemporaError::MissingProperty { id: "p".into(), type_name: "Period".into(), property: "Type".into() }
    );
}

#[test]
fn dangling_reference_is_unresolved() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("a", "Last").reference("Interval", "missing").reference("Period", "p"),
        Entity::new("p", "Period").literal("Type", "Day"),
    ])
    .unwrap();
    let err = resolve_graph(&graph, &doc_time()).unwrap_err();
    assert_eq!(err.entity(), Some("a"));
    assert_eq!(err.kind(), &TemporaError::UnresolvedReference { reference: "missing".into() });
}

#[test]
fn doc_time_falls_back_to_unkeyed_entry() {
    let mut known = KnownIntervals::new();
    known.insert(KnownKey::new(None, None), day(2024, 11, 19));
    let values = resolve_graph(&last_two_weeks(), &known).unwrap();
    assert_eq!(values[0].as_interval(), Some(between_days((2024, 11, 5), (2024, 11, 19))));
}

#[test]
fn missing_doc_time_is_unresolved() {
    let err = resolve_graph(&last_two_weeks(), &KnownIntervals::new()).unwrap_err();
    assert!(matches!(err.kind(), TemporaError::UnresolvedReference { .. }));
}

#[test]
fn next_weekday_after_doc_time() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("n", "Next").literal("Interval-Type", "DocTime").reference("Repeating-Interval", "f"),
        Entity::new("f", "Day-Of-Week").literal("Type", "Friday"),
    ])
    .unwrap();
    let values = resolve_graph(&graph, &doc_time()).unwrap();
    assert_eq!(values, vec![Value::Interval(day(2024, 11, 22))]);
}

#[test]
fn between_years_honours_inclusion() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("b", "Between")
            .reference("Start-Interval", "y1")
            .literal("Start-Included", "Included")
            .reference("End-Interval", "y2"),
        Entity::new("y1", "Year").literal("Value", 2020),
        Entity::new("y2", "Year").literal("Value", 2022),
    ])
    .unwrap();
    let values = resolve_graph(&graph, &KnownIntervals::new()).unwrap();
    assert_eq!(values, vec![Value::Interval(between_days((2020, 1, 1), (2022, 1, 1)))]);
}

#[test]
fn year_with_sub_interval_narrows_to_the_month() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("y", "Year").literal("Value", 2025).reference("Sub-Interval", "m"),
        Entity::new("m", "Month-Of-Year").literal("Type", "March"),
    ])
    .unwrap();
    let values = resolve_graph(&graph, &KnownIntervals::new()).unwrap();
    assert_eq!(values, vec![Value::Interval(Interval::month(2025, 3).unwrap())]);
}

#[test]
fn events_come_from_known_intervals() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("a", "After").reference("Interval", "e").reference("Period", "p"),
        Entity::new("e", "Event").with_span(12, 20),
        Entity::new("p", "Period").literal("Type", "Day").literal("Number", 3),
    ])
    .unwrap();
    let mut known = KnownIntervals::new();
    known.insert(KnownKey::event(Span(12, 20)), day(2024, 11, 2));
    let values = resolve_graph(&graph, &known).unwrap();
    assert_eq!(values, vec![Value::Interval(day(2024, 11, 5))]);
}

#[test]
fn top_level_is_ordered_by_span() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("late", "Interval").with_span(30, 35).literal("Value", "2023"),
        Entity::new("none", "Interval").literal("Value", "2021"),
        Entity::new("early", "Interval").with_span(0, 5).literal("Value", "2022-06"),
    ])
    .unwrap();
    let ids: Vec<&str> = graph.top_level().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["early", "late", "none"]);

    let known = KnownIntervals::new();
    let mut resolver = Resolver::new(&graph, &known);
    let grouped = resolver.resolve_spans(&[Span(0, 10), Span(20, 40), Span(50, 60)]).unwrap();
    assert_eq!(grouped[0], vec![Value::Interval(Interval::month(2022, 6).unwrap())]);
    assert_eq!(grouped[1], vec![Value::Interval(Interval::year(2023).unwrap())]);
    assert!(grouped[2].is_empty());
}

#[test]
fn resolve_each_isolates_failures() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("good", "Interval").literal("Value", "2024-11-19"),
        Entity::new("bad", "Interval").literal("Value", "2024-13"),
        Entity::new("range", "Interval").literal("Start", "2024-01").literal("End", "2024-03"),
    ])
    .unwrap();
    let known = KnownIntervals::new();
    let mut resolver = Resolver::new(&graph, &known);
    let results = resolver.resolve_each(["good", "bad", "range"]);
    assert_eq!(results[0], Ok(Value::Interval(day(2024, 11, 19))));
    assert!(matches!(results[1].as_ref().unwrap_err().kind(), TemporaError::InvalidDate(_)));
    assert_eq!(results[2], Ok(Value::Interval(between_days((2024, 1, 1), (2024, 3, 1)))));
    assert!(resolver.resolve_ids(["good", "bad"]).is_err());
}

#[test]
fn literal_where_reference_expected_is_invalid() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("l", "Last").literal("Interval-Type", "DocTime").literal("Period", "2 weeks"),
    ])
    .unwrap();
    let err = resolve_graph(&graph, &doc_time()).unwrap_err();
    assert!(matches!(err.kind(), TemporaError::InvalidOperator { .. }));
}

#[test]
fn year_sub_interval_must_fall_inside_the_year() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("y", "Year").literal("Value", 2023).reference("Sub-Interval", "d"),
        Entity::new("d", "Repeating").literal("Unit", "Day").literal("Range", "Year").literal("Value", 366),
    ])
    .unwrap();
    let err = resolve_graph(&graph, &KnownIntervals::new()).unwrap_err();
    assert_eq!(err.entity(), Some("y"));
    assert!(matches!(err.kind(), TemporaError::InvalidDate(_)));

    let leap = AnnotationGraph::new(vec![
        Entity::new("y", "Year").literal("Value", 2024).reference("Sub-Interval", "d"),
        Entity::new("d", "Repeating").literal("Unit", "Day").literal("Range", "Year").literal("Value", 366),
    ])
    .unwrap();
    let values = resolve_graph(&leap, &KnownIntervals::new()).unwrap();
    assert_eq!(values, vec![Value::Interval(day(2024, 12, 31))]);
}

#[test]
fn extreme_nth_index_is_an_error() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("n", "Nth").literal("Interval-Type", "DocTime").literal("Value", i64::MIN).reference("Period", "p"),
        Entity::new("p", "Period").literal("Type", "Day"),
    ])
    .unwrap();
    let err = resolve_graph(&graph, &doc_time()).unwrap_err();
    assert!(matches!(err.kind(), TemporaError::InvalidOperator { .. }));
}

#[test]
fn month_shift_through_the_graph_keeps_the_day() {
    let graph = AnnotationGraph::new(vec![
        Entity::new("b", "Before").reference("Interval", "i").reference("Period", "p"),
        Entity::new("i", "Interval").literal("Value", "2024-03-30"),
        Entity::new("p", "Period").literal("Type", "Month"),
    ])
    .unwrap();
    let values = resolve_graph(&graph, &KnownIntervals::new()).unwrap();
    assert_eq!(values, vec![Value::Interval(day(2024, 2, 29))]);
}

fn chain(depth: usize) -> AnnotationGraph {
    let mut entities = vec![Entity::new("p", "Period").literal("Type", "Day")];
    for i in 0..depth {
        let link = Entity::new(format!("l{i}"), "Last").reference("Period", "p");
        entities.push(if i == 0 {
            link.literal("Interval-Type", "DocTime")
        } else {
            link.reference("Interval", format!("l{}", i - 1))
        });
    }
    AnnotationGraph::new(entities).unwrap()
}

#[test]
fn reference_chains_are_bounded() {
    let known = doc_time();
    let shallow = chain(MAX_DEPTH - 1);
    let values = resolve_graph(&shallow, &known).unwrap();
    assert_eq!(values.len(), 1);

    let deep = chain(MAX_DEPTH * 4);
    let err = resolve_graph(&deep, &known).unwrap_err();
    assert!(matches!(err.kind(), TemporaError::TooDeep { limit, .. } if *limit == MAX_DEPTH));
}
