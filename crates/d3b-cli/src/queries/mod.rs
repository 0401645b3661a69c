mod billing_group;
mod credential;
mod global_descriptor;
mod organization;
mod study;
mod volume;
pub(crate) use self::billing_group::*;
pub(crate) use self::credential::*;
pub(crate) use self::global_descriptor::*;
pub(crate) use self::organization::*;
pub(crate) use self::study::*;
pub(crate) use self::volume::*;
use dewrangle::{Cursor, Id, JsonMap, Page, Paginator, Query};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::num::NonZeroUsize;

/// Fetch a single node by ID.  The document must select the node as `node`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct NodeQuery<T> {
    document: &'static str,
    id: Id,
    output: PhantomData<fn() -> T>,
}

impl<T> NodeQuery<T> {
    pub(crate) fn new(document: &'static str, id: Id) -> NodeQuery<T> {
        NodeQuery {
            document,
            id,
            output: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Query for NodeQuery<T> {
    type Output = Option<T>;

    fn document(&self) -> &'static str {
        self.document
    }

    fn variables(&self) -> JsonMap {
        JsonMap::from_iter([("id".to_owned(), self.id.clone().into())])
    }

    fn parse_response(&self, mut data: JsonMap) -> Result<Option<T>, serde_json::Error> {
        serde_json::from_value(data.remove("node").unwrap_or_default())
    }
}

/// Page through a connection `field` hanging off the node `parent`.  The
/// document takes `$id`, `$first`, and `$after`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct NodeConnection<T> {
    document: &'static str,
    parent: Id,
    field: &'static str,
    noun: &'static str,
    page_size: NonZeroUsize,
    output: PhantomData<fn() -> T>,
}

impl<T> NodeConnection<T> {
    pub(crate) fn new(
        document: &'static str,
        parent: Id,
        field: &'static str,
        noun: &'static str,
        page_size: NonZeroUsize,
    ) -> NodeConnection<T> {
        NodeConnection {
            document,
            parent,
            field,
            noun,
            page_size,
            output: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Paginator for NodeConnection<T> {
    type Query = NodeConnectionQuery<T>;
    type Item = T;

    fn noun(&self) -> &'static str {
        self.noun
    }

    fn for_cursor(&self, cursor: Option<&Cursor>) -> NodeConnectionQuery<T> {
        NodeConnectionQuery {
            document: self.document,
            parent: self.parent.clone(),
            field: self.field,
            page_size: self.page_size,
            cursor: cursor.cloned(),
            output: PhantomData,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct NodeConnectionQuery<T> {
    document: &'static str,
    parent: Id,
    field: &'static str,
    page_size: NonZeroUsize,
    cursor: Option<Cursor>,
    output: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Query for NodeConnectionQuery<T> {
    type Output = Page<T>;

    fn document(&self) -> &'static str {
        self.document
    }

    fn variables(&self) -> JsonMap {
        page_variables(Some(&self.parent), self.page_size, self.cursor.as_ref())
    }

    fn parse_response(&self, mut data: JsonMap) -> Result<Page<T>, serde_json::Error> {
        let mut node = serde_json::from_value::<JsonMap>(data.remove("node").unwrap_or_default())?;
        serde_json::from_value(node.remove(self.field).unwrap_or_default())
    }
}

/// Variables for a paged query.  `after` is only sent once there is a cursor
/// to resume from.
pub(crate) fn page_variables(
    id: Option<&Id>,
    page_size: NonZeroUsize,
    cursor: Option<&Cursor>,
) -> JsonMap {
    let mut vars = JsonMap::new();
    if let Some(id) = id {
        vars.insert("id".to_owned(), id.clone().into());
    }
    vars.insert("first".to_owned(), page_size.get().into());
    if let Some(c) = cursor {
        vars.insert("after".to_owned(), c.clone().into());
    }
    vars
}

/// Mutation variables of the form `{"input": {...}}`, optionally with the
/// ID of the node being changed
pub(crate) fn input_variables(id: Option<&Id>, input: JsonMap) -> JsonMap {
    let mut vars = JsonMap::new();
    if let Some(id) = id {
        vars.insert("id".to_owned(), id.clone().into());
    }
    vars.insert("input".to_owned(), input.into());
    vars
}

pub(crate) fn id_variables(id: &Id) -> JsonMap {
    JsonMap::from_iter([("id".to_owned(), id.clone().into())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
    struct Named {
        name: String,
    }

    #[test]
    fn first_page_has_no_after() {
        let conn = NodeConnection::<Named>::new(
            "query",
            Id::from("org-1"),
            "studies",
            "studies",
            dewrangle::DEFAULT_PAGE_SIZE,
        );
        let vars = conn.for_cursor(None).variables();
        assert_eq!(
            serde_json::Value::Object(vars),
            json!({"id": "org-1", "first": 10})
        );
        let vars = conn.for_cursor(Some(&Cursor::from("abc"))).variables();
        assert_eq!(
            serde_json::Value::Object(vars),
            json!({"id": "org-1", "first": 10, "after": "abc"})
        );
    }

    #[test]
    fn parse_connection_under_node() {
        let conn = NodeConnection::<Named>::new(
            "query",
            Id::from("org-1"),
            "studies",
            "studies",
            dewrangle::DEFAULT_PAGE_SIZE,
        );
        let page = conn
            .for_cursor(None)
            .parse_response(
                json!({
                    "node": {
                        "id": "org-1",
                        "studies": {
                            "totalCount": 1,
                            "pageInfo": {"hasNextPage": false, "endCursor": "c"},
                            "edges": [{"cursor": "c", "node": {"name": "Study A"}}]
                        }
                    }
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(
            page.items,
            vec![Named {
                name: "Study A".into()
            }]
        );
        assert!(!page.has_next_page);
    }

    #[test]
    fn parse_missing_node() {
        let q = NodeQuery::<Named>::new("query", Id::from("gone"));
        let r = q
            .parse_response(JsonMap::from_iter([("node".into(), json!(null))]))
            .unwrap();
        assert_eq!(r, None);
    }
}
