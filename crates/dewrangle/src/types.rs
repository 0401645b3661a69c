use serde::{
    Deserialize, Serialize,
    de::{self, Deserializer, IgnoredAny, MapAccess, Visitor},
    ser::Serializer,
};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

pub type JsonMap = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Id {
        Id(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Id {
        Id(value.to_owned())
    }
}

impl From<Id> for serde_json::Value {
    fn from(value: Id) -> serde_json::Value {
        value.0.into()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl From<&str> for Cursor {
    fn from(value: &str) -> Cursor {
        Cursor(value.to_owned())
    }
}

impl From<Cursor> for serde_json::Value {
    fn from(value: Cursor) -> serde_json::Value {
        value.0.into()
    }
}

/// One page of a Relay-style connection
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(from = "Connection<T>")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub end_cursor: Option<Cursor>,
    pub has_next_page: bool,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn map_items<F, U>(self, func: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(func).collect(),
            end_cursor: self.end_cursor,
            has_next_page: self.has_next_page,
            total_count: self.total_count,
        }
    }
}

impl<T> From<Connection<T>> for Page<T> {
    fn from(value: Connection<T>) -> Page<T> {
        Page {
            items: value.edges.into_iter().map(|e| e.node).collect(),
            end_cursor: value.page_info.end_cursor,
            has_next_page: value.page_info.has_next_page,
            total_count: value.total_count,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    total_count: u64,
    page_info: PageInfo,
    edges: Vec<Edge<T>>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct Edge<T> {
    node: T,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<Cursor>,
    has_next_page: bool,
}

/// A small, unpaginated `{edges: [{node: ...}]}` list, such as the errors
/// attached to a job
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgeList<T>(pub Vec<T>);

impl<T> Default for EdgeList<T> {
    fn default() -> EdgeList<T> {
        EdgeList(Vec::new())
    }
}

impl<T> EdgeList<T> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<'a, T> IntoIterator for &'a EdgeList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for EdgeList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<T> {
            #[serde(default = "Vec::new")]
            edges: Vec<Node<T>>,
        }

        #[derive(Deserialize)]
        struct Node<T> {
            node: T,
        }

        let raw = Option::<Raw<T>>::deserialize(deserializer)?;
        Ok(EdgeList(
            raw.map(|r| r.edges.into_iter().map(|e| e.node).collect())
                .unwrap_or_default(),
        ))
    }
}

impl<T: Serialize> Serialize for EdgeList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Raw<'a, T> {
            edges: Vec<Node<'a, T>>,
        }

        #[derive(Serialize)]
        struct Node<'a, T> {
            node: &'a T,
        }

        Raw {
            edges: self.0.iter().map(|node| Node { node }).collect(),
        }
        .serialize(serializer)
    }
}

/// Composite natural key of a volume: the bucket name and path prefix
/// joined by `::`, with a missing prefix treated as empty.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct VolumeKey(String);

impl VolumeKey {
    pub const DELIMITER: &'static str = "::";

    pub fn new(bucket: &str, path_prefix: Option<&str>) -> VolumeKey {
        let prefix = path_prefix.unwrap_or_default();
        VolumeKey(format!("{bucket}{}{prefix}", VolumeKey::DELIMITER))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A two-level map from a natural key to a parent scope to a record.
///
/// The same natural key may occur once per scope; inserting under an
/// existing `(key, scope)` pair overwrites only that leaf.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NestedMap<K: Ord, S: Ord, V>(BTreeMap<K, BTreeMap<S, V>>);

impl<K: Ord, S: Ord, V> NestedMap<K, S, V> {
    pub fn new() -> Self {
        NestedMap(BTreeMap::new())
    }

    /// Returns the record previously stored at `(key, scope)`, if any
    pub fn insert(&mut self, key: K, scope: S, value: V) -> Option<V> {
        self.0.entry(key).or_default().insert(scope, value)
    }

    pub fn get(&self, key: &K, scope: &S) -> Option<&V> {
        self.0.get(key)?.get(scope)
    }

    pub fn scopes(&self, key: &K) -> Option<&BTreeMap<S, V>> {
        self.0.get(key)
    }

    /// Total number of leaf records
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &S, &V)> {
        self.0
            .iter()
            .flat_map(|(k, inner)| inner.iter().map(move |(s, v)| (k, s, v)))
    }

    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.0.into_values().flat_map(BTreeMap::into_values)
    }
}

impl<K: Ord, S: Ord, V> Default for NestedMap<K, S, V> {
    fn default() -> Self {
        NestedMap::new()
    }
}

// Utility type for use in deserializing just `foo` from a map of the form
// `{"anything": foo}`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Singleton<T>(pub T);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Singleton<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SingletonVisitor::new())
    }
}

struct SingletonVisitor<T>(PhantomData<T>);

impl<T> SingletonVisitor<T> {
    fn new() -> Self {
        SingletonVisitor(PhantomData)
    }
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for SingletonVisitor<T> {
    type Value = Singleton<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string-keyed map containing a single field")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        if let Some((_, value)) = map.next_entry::<String, T>()? {
            if map.next_entry::<String, IgnoredAny>()?.is_some() {
                Err(de::Error::invalid_length(
                    map.size_hint().unwrap_or(0).saturating_add(2),
                    &self,
                ))
            } else {
                Ok(Singleton(value))
            }
        } else {
            Err(de::Error::invalid_length(0, &self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn page_from_connection() {
        let page = serde_json::from_value::<Page<JsonMap>>(json!({
            "totalCount": 3,
            "pageInfo": {"hasNextPage": true, "endCursor": "c2"},
            "edges": [
                {"cursor": "c1", "node": {"id": "a"}},
                {"cursor": "c2", "node": {"id": "b"}},
            ]
        }))
        .unwrap();
        assert_eq!(page.total_count, 3);
        assert!(page.has_next_page);
        assert_eq!(page.end_cursor, Some(Cursor::from("c2")));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1]["id"], "b");
    }

    #[test]
    fn edge_list_accepts_null() {
        let errors = serde_json::from_value::<EdgeList<JsonMap>>(json!(null)).unwrap();
        assert!(errors.is_empty());
        let errors = serde_json::from_value::<EdgeList<JsonMap>>(json!({
            "edges": [{"node": {"message": "boom"}}]
        }))
        .unwrap();
        assert_eq!(errors.0.len(), 1);
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"edges": [{"node": {"message": "boom"}}]})
        );
    }

    #[test]
    fn volume_key_normalizes_missing_prefix() {
        assert_eq!(VolumeKey::new("b", None), VolumeKey::new("b", Some("")));
        assert_eq!(VolumeKey::new("b", None).as_str(), "b::");
        assert_eq!(VolumeKey::new("bucket", Some("a/b")).as_str(), "bucket::a/b");
        assert_ne!(VolumeKey::new("b", Some("x")), VolumeKey::new("b", None));
    }

    #[test]
    fn nested_map_keeps_scopes_apart() {
        let mut creds = NestedMap::new();
        assert_eq!(creds.insert("k", "study-a", 1), None);
        assert_eq!(creds.insert("k", "study-b", 2), None);
        assert_eq!(creds.get(&"k", &"study-a"), Some(&1));
        assert_eq!(creds.get(&"k", &"study-b"), Some(&2));
        assert_eq!(creds.len(), 2);
        assert_eq!(creds.insert("k", "study-a", 3), Some(1));
        assert_eq!(creds.get(&"k", &"study-a"), Some(&3));
        assert_eq!(creds.len(), 2);
        assert_eq!(
            serde_json::to_value(&creds).unwrap(),
            json!({"k": {"study-a": 3, "study-b": 2}})
        );
    }

    #[test]
    fn singleton_takes_only_field() {
        let Singleton(value) =
            serde_json::from_value::<Singleton<u32>>(json!({"anything": 42})).unwrap();
        assert_eq!(value, 42);
        assert!(serde_json::from_value::<Singleton<u32>>(json!({"a": 1, "b": 2})).is_err());
    }
}
