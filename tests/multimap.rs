use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::RandomState;
use std::collections::BTreeMap;
use std::sync::Arc;
use sync_multimap::{equal, SyncMultimap};

type Map = SyncMultimap<String, i32>;

fn int_map() -> Map {
    SyncMultimap::new(|a: &i32, b: &i32| a == b)
}

#[fixture]
fn populated() -> Map {
    let map = int_map();
    map.add("a".to_owned(), 1);
    map.add("a".to_owned(), 2);
    map.add("b".to_owned(), 3);
    map
}

fn collect(map: &Map) -> BTreeMap<String, Vec<i32>> {
    let mut seen: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    map.for_each(|key, value| seen.entry(key.clone()).or_default().push(*value));
    seen
}

#[rstest]
fn add_skips_duplicates_and_keeps_order() {
    let map = int_map();
    assert!(map.add("a".to_owned(), 1));
    assert!(map.add("a".to_owned(), 2));
    assert!(!map.add("a".to_owned(), 1));

    assert_eq!(map.get("a"), [1, 2]);
    assert_eq!(map.len(), 1);
    assert_eq!(map.count(), 2);
}

#[rstest]
fn removing_last_value_drops_the_key() {
    let map = int_map();
    map.add("a".to_owned(), 1);
    map.add("a".to_owned(), 2);

    assert!(map.remove_value("a", &1));
    assert_eq!(map.get("a"), [2]);

    assert!(map.remove_value("a", &2));
    assert!(!map.contains_key("a"));
    assert!(map.get("a").is_empty());
    assert!(map.is_empty());
}

#[rstest]
fn remove_drops_key_and_values(populated: Map) {
    assert_eq!(populated.remove("a"), Some(vec![1, 2]));
    assert!(!populated.contains_key("a"));
    assert!(populated.contains_key("b"));
    assert_eq!(populated.remove("a"), None);
}

#[rstest]
#[case("a", 1, true)]
#[case("a", 2, true)]
#[case("a", 3, false)]
#[case("b", 3, true)]
#[case("b", 1, false)]
#[case("missing", 1, false)]
fn contains_uses_the_predicate(
    populated: Map,
    #[case] key: &str,
    #[case] value: i32,
    #[case] expected: bool,
) {
    assert_eq!(populated.contains(key, &value), expected);
}

#[rstest]
fn absent_keys_are_harmless() {
    let map = int_map();
    assert_eq!(map.remove("nope"), None);
    assert!(!map.remove_value("nope", &1));
    assert!(map.get("nope").is_empty());
    assert!(!map.contains("nope", &1));
    assert!(!map.contains_key("nope"));
}

#[rstest]
fn remove_value_of_missing_value_keeps_key(populated: Map) {
    assert!(!populated.remove_value("a", &9));
    assert_eq!(populated.get("a"), [1, 2]);
}

#[rstest]
fn keys_lists_every_key(populated: Map) {
    let mut keys = populated.keys();
    keys.sort_unstable();
    assert_eq!(keys, ["a", "b"]);
}

#[rstest]
fn len_and_count(populated: Map) {
    assert_eq!(populated.len(), 2);
    assert_eq!(populated.count(), 3);

    let empty = int_map();
    assert_eq!(empty.len(), 0);
    assert_eq!(empty.count(), 0);
}

#[rstest]
fn clear_empties_the_map(populated: Map) {
    populated.clear();
    assert_eq!(populated.len(), 0);
    assert_eq!(populated.count(), 0);
    assert!(populated.keys().is_empty());
}

#[rstest]
fn for_each_visits_every_pair_in_insertion_order(populated: Map) {
    let seen = collect(&populated);
    assert_eq!(seen["a"], [1, 2]);
    assert_eq!(seen["b"], [3]);
    assert_eq!(seen.len(), 2);
}

#[rstest]
fn get_returns_an_independent_copy(populated: Map) {
    let mut values = populated.get("a");
    values.push(7);
    assert_eq!(populated.get("a"), [1, 2]);
}

#[rstest]
fn clone_is_independent(populated: Map) {
    let clone = populated.clone();
    assert!(populated.equal(&clone));

    clone.add("a".to_owned(), 3);
    assert!(!populated.equal(&clone));
    assert_eq!(populated.get("a"), [1, 2]);
    assert_eq!(clone.get("a"), [1, 2, 3]);

    populated.remove("b");
    assert!(clone.contains_key("b"));
}

#[rstest]
fn equal_compares_value_sets() {
    let a = int_map();
    let b = int_map();
    assert!(a.equal(&b));

    a.add("k".to_owned(), 1);
    b.add("k".to_owned(), 1);
    assert!(a.equal(&b));

    b.add("k".to_owned(), 2);
    assert!(!a.equal(&b));
    assert!(!b.equal(&a));

    a.add("k".to_owned(), 2);
    assert!(equal(&a, &b));
    assert_eq!(a, b);
}

#[rstest]
fn equal_ignores_insertion_order() {
    let a = int_map();
    a.add("k".to_owned(), 1);
    a.add("k".to_owned(), 2);

    let b = int_map();
    b.add("k".to_owned(), 2);
    b.add("k".to_owned(), 1);

    assert!(a.equal(&b));
    assert!(b.equal(&a));
}

#[rstest]
fn equal_is_symmetric_for_decoded_duplicates() {
    let repeated: Map = SyncMultimap::from_json(br#"{"k":[1,1]}"#, |a, b| a == b).unwrap();
    let distinct: Map = SyncMultimap::from_json(br#"{"k":[1,2]}"#, |a, b| a == b).unwrap();

    assert!(!repeated.equal(&distinct));
    assert!(!distinct.equal(&repeated));
    assert_ne!(repeated, distinct);
}

#[rstest]
fn equal_checks_keys(populated: Map) {
    let other = int_map();
    other.add("a".to_owned(), 1);
    other.add("a".to_owned(), 2);
    other.add("c".to_owned(), 3);

    assert!(!populated.equal(&other));
    assert!(populated.equal(&populated));
}

#[rstest]
fn encode_then_decode_round_trips(populated: Map) {
    let bytes = populated.encode().unwrap();

    let fresh: Map =
        SyncMultimap::with_shared_equals(Arc::clone(populated.equals()), RandomState::new());
    fresh.decode(&bytes).unwrap();
    assert!(fresh.equal(&populated));
    assert_eq!(fresh.get("a"), [1, 2]);
}

#[rstest]
fn from_json_builds_the_map() {
    let map: Map = SyncMultimap::from_json(br#"{"a":[1,2],"b":[3]}"#, |a, b| a == b).unwrap();

    assert_eq!(map.len(), 2);
    assert_eq!(map.count(), 3);
    assert!(map.contains("a", &2));
    assert!(!map.contains("b", &1));
    assert!(map.equal(&populated()));
}

#[rstest]
#[case::not_json(&b"not json"[..])]
#[case::scalar_values(&br#"{"a":1}"#[..])]
#[case::wrong_value_type(&br#"{"a":[true]}"#[..])]
#[case::array(&b"[[1]]"[..])]
fn malformed_input_is_a_decode_error(#[case] input: &[u8]) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();

    let err = SyncMultimap::<String, i32>::from_json(input, |a, b| a == b).unwrap_err();
    assert!(err.is_decode());
    assert!(err.to_string().starts_with("failed to decode multimap"));
}

#[rstest]
fn decode_replaces_previous_content(populated: Map) {
    populated.decode(br#"{"z":[9]}"#).unwrap();
    assert_eq!(populated.keys(), ["z"]);
    assert_eq!(populated.count(), 1);
}

#[rstest]
fn integer_keys_encode_as_field_names() {
    let map = SyncMultimap::with_partial_eq();
    map.add(7_u32, "x".to_owned());

    assert_eq!(map.encode().unwrap(), br#"{"7":["x"]}"#);

    let back: SyncMultimap<u32, String> =
        SyncMultimap::from_json(br#"{"7":["x"]}"#, |a, b| a == b).unwrap();
    assert!(back.equal(&map));
}

struct Point {
    x: f64,
    y: f64,
}

fn close(a: &Point, b: &Point) -> bool {
    (a.x - b.x).abs() < 0.01 && (a.y - b.y).abs() < 0.01
}

#[rstest]
fn predicate_replaces_partial_eq() {
    let map = SyncMultimap::new(close);
    map.add("p", Point { x: 1.0, y: 1.0 });
    assert!(!map.add("p", Point { x: 1.001, y: 1.0 }));
    assert!(map.add("p", Point { x: 2.0, y: 1.0 }));

    assert_eq!(map.count(), 2);
    assert!(map.contains("p", &Point { x: 2.004, y: 0.999 }));
    assert!(map.remove_value("p", &Point { x: 1.002, y: 1.0 }));
    assert_eq!(map.count(), 1);
}

#[derive(Deserialize, Serialize)]
struct Index {
    name: String,
    tags: SyncMultimap<String, String>,
}

#[rstest]
fn nests_inside_serde_types() {
    let tags = SyncMultimap::with_partial_eq();
    tags.add("lang".to_owned(), "rust".to_owned());
    tags.add("lang".to_owned(), "json".to_owned());
    let index = Index {
        name: "docs".to_owned(),
        tags,
    };

    let text = serde_json::to_string(&index).unwrap();
    assert_eq!(text, r#"{"name":"docs","tags":{"lang":["rust","json"]}}"#);

    let back: Index = serde_json::from_str(&text).unwrap();
    assert_eq!(back.name, "docs");
    assert!(back.tags.equal(&index.tags));
}

#[rstest]
fn collects_from_pairs() {
    let map: SyncMultimap<&str, i32> = [("a", 1), ("a", 1), ("b", 2)].into_iter().collect();
    assert_eq!(map.count(), 2);

    let mut map = map;
    map.extend([("a", 3), ("b", 2)]);
    assert_eq!(map.get("a"), [1, 3]);
    assert_eq!(map.get("b"), [2]);
}

#[rstest]
fn debug_renders_as_a_map() {
    let map = SyncMultimap::from([("a", 1), ("a", 2)]);
    assert_eq!(format!("{map:?}"), r#"{"a": [1, 2]}"#);
}
