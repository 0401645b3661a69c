use crate::types::{Cursor, JsonMap, Page};
use crate::{DeleteSafety, Executor, QueryError, QueryPayload};

pub trait Query {
    type Output;

    fn document(&self) -> &'static str;
    fn variables(&self) -> JsonMap;
    fn parse_response(&self, data: JsonMap) -> Result<Self::Output, serde_json::Error>;

    /// Whether running this operation removes data on the server
    fn is_destructive(&self) -> bool {
        false
    }

    fn payload(&self) -> QueryPayload {
        QueryPayload {
            query: self.document().to_owned(),
            variables: self.variables(),
        }
    }
}

pub trait Paginator {
    type Query: Query<Output = Page<Self::Item>>;
    type Item;

    /// Plural noun used in progress messages
    fn noun(&self) -> &'static str {
        "records"
    }

    fn for_cursor(&self, cursor: Option<&Cursor>) -> Self::Query;
}

/// Fetch every page of `paginator` in order, passing each page's items to
/// `fold`.
///
/// A page reporting a `totalCount` of zero ends the drain without calling
/// `fold`.  Otherwise the next page is requested only while the server
/// reports `hasNextPage` together with a non-null `endCursor`.  Returns the
/// number of items folded.
pub fn drain<E, P, F>(executor: &E, paginator: &P, mut fold: F) -> Result<usize, QueryError>
where
    E: Executor,
    P: Paginator,
    F: FnMut(Vec<P::Item>),
{
    let mut cursor = None;
    let mut collected = 0;
    loop {
        let query = paginator.for_cursor(cursor.as_ref());
        let page = executor.execute(&query, DeleteSafety::Enforce)?;
        if page.total_count == 0 {
            break;
        }
        collected += page.items.len();
        tracing::info!(
            "Collecting {collected}/{total} {noun}",
            total = page.total_count,
            noun = paginator.noun()
        );
        fold(page.items);
        match page.end_cursor {
            Some(next) if page.has_next_page => cursor = Some(next),
            None if page.has_next_page => {
                tracing::warn!(
                    "Server reported more {} but no end cursor; stopping",
                    paginator.noun()
                );
                break;
            }
            _ => break,
        }
    }
    Ok(collected)
}

/// Drain `paginator` into a `Vec`
pub fn collect_all<E, P>(executor: &E, paginator: &P) -> Result<Vec<P::Item>, QueryError>
where
    E: Executor,
    P: Paginator,
{
    let mut items = Vec::new();
    drain(executor, paginator, |page| items.extend(page))?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use crate::types::NestedMap;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    #[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
    struct Thing {
        key: String,
        study: String,
    }

    struct ThingsPaginator {
        study: String,
    }

    struct ThingsQuery {
        study: String,
        cursor: Option<Cursor>,
    }

    impl Query for ThingsQuery {
        type Output = Page<Thing>;

        fn document(&self) -> &'static str {
            "query ($id: ID!, $after: ID) { node(id: $id) { things(after: $after) { totalCount } } }"
        }

        fn variables(&self) -> JsonMap {
            let mut vars = JsonMap::new();
            vars.insert("id".into(), self.study.clone().into());
            if let Some(c) = self.cursor.clone() {
                vars.insert("after".into(), c.into());
            }
            vars
        }

        fn parse_response(&self, mut data: JsonMap) -> Result<Page<Thing>, serde_json::Error> {
            serde_json::from_value(data.remove("things").unwrap_or_default())
        }
    }

    impl Paginator for ThingsPaginator {
        type Query = ThingsQuery;
        type Item = Thing;

        fn for_cursor(&self, cursor: Option<&Cursor>) -> ThingsQuery {
            ThingsQuery {
                study: self.study.clone(),
                cursor: cursor.cloned(),
            }
        }
    }

    fn page(total: u64, next: bool, end: Option<&str>, things: &[(&str, &str)]) -> Value {
        let edges = things
            .iter()
            .map(|(key, study)| json!({"cursor": key, "node": {"key": key, "study": study}}))
            .collect::<Vec<_>>();
        json!({
            "things": {
                "totalCount": total,
                "pageInfo": {"hasNextPage": next, "endCursor": end},
                "edges": edges,
            }
        })
    }

    #[test]
    fn drain_follows_cursors_to_last_page() {
        let executor = ScriptedExecutor::new("https://dewrangle.com");
        executor.push(page(5, true, Some("b"), &[("a", "s"), ("b", "s")]));
        executor.push(page(5, true, Some("d"), &[("c", "s"), ("d", "s")]));
        executor.push(page(5, false, Some("e"), &[("e", "s")]));
        let paginator = ThingsPaginator { study: "s".into() };
        let mut found = BTreeMap::new();
        let n = drain(&executor, &paginator, |items| {
            for t in items {
                found.insert(t.key.clone(), t);
            }
        })
        .unwrap();
        assert_eq!(n, 5);
        assert_eq!(
            found.keys().map(String::as_str).collect::<Vec<_>>(),
            ["a", "b", "c", "d", "e"]
        );
        let sent = executor.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].variables.get("after"), None);
        assert_eq!(sent[1].variables["after"], "b");
        assert_eq!(sent[2].variables["after"], "d");
        assert_eq!(executor.remaining(), 0);
    }

    #[test]
    fn zero_total_stops_after_one_fetch() {
        let executor = ScriptedExecutor::new("https://dewrangle.com");
        executor.push(page(0, true, Some("x"), &[]));
        executor.push(page(1, false, None, &[("never", "s")]));
        let paginator = ThingsPaginator { study: "s".into() };
        let mut folds = 0;
        let n = drain(&executor, &paginator, |_| folds += 1).unwrap();
        assert_eq!(n, 0);
        assert_eq!(folds, 0);
        assert_eq!(executor.sent().len(), 1);
    }

    #[test]
    fn missing_cursor_ends_drain() {
        let executor = ScriptedExecutor::new("https://dewrangle.com");
        executor.push(page(4, true, None, &[("a", "s")]));
        executor.push(page(4, false, None, &[("never", "s")]));
        let paginator = ThingsPaginator { study: "s".into() };
        let items = collect_all(&executor, &paginator).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(executor.sent().len(), 1);
    }

    #[test]
    fn nested_fold_keeps_each_scope() {
        let executor = ScriptedExecutor::new("https://dewrangle.com");
        executor.push(page(1, false, Some("k"), &[("k", "A")]));
        executor.push(page(1, false, Some("k"), &[("k", "B")]));
        let mut creds = NestedMap::new();
        for study in ["A", "B"] {
            let paginator = ThingsPaginator {
                study: study.into(),
            };
            drain(&executor, &paginator, |items| {
                for t in items {
                    creds.insert(t.key.clone(), t.study.clone(), t);
                }
            })
            .unwrap();
        }
        assert_eq!(creds.len(), 2);
        assert_eq!(
            creds.get(&"k".to_owned(), &"A".to_owned()).map(|t| &t.study),
            Some(&"A".to_owned())
        );
        assert_eq!(
            creds.get(&"k".to_owned(), &"B".to_owned()).map(|t| &t.study),
            Some(&"B".to_owned())
        );
    }

    #[test]
    fn fetch_error_propagates() {
        let executor = ScriptedExecutor::new("https://dewrangle.com");
        executor.push(page(3, true, Some("a"), &[("a", "s")]));
        executor.push(json!({"things": {"totalCount": "many"}}));
        let paginator = ThingsPaginator { study: "s".into() };
        let mut seen = Vec::new();
        let r = drain(&executor, &paginator, |items| seen.extend(items));
        assert_matches!(r, Err(QueryError::Json(_)));
        assert_eq!(seen.len(), 1);
    }
}
