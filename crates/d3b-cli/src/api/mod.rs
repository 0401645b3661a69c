//! Operations on Dewrangle entities, built from the queries in
//! [`crate::queries`]
mod billing_group;
mod credential;
mod global_descriptor;
mod job;
mod organization;
mod study;
#[cfg(test)]
mod tests;
mod volume;
pub(crate) use self::credential::*;
pub(crate) use self::global_descriptor::*;
pub(crate) use self::organization::*;
pub(crate) use self::study::*;
pub(crate) use self::volume::*;
use anyhow::Context;
use dewrangle::{
    DEFAULT_PAGE_SIZE, DeleteSafety, Executor, Mutation, MutationOutcome, Query,
};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::num::NonZeroUsize;

/// A Dewrangle executor together with the settings shared by every entity
/// operation
#[derive(Clone, Debug)]
pub(crate) struct Dewrangle<E> {
    executor: E,
    page_size: NonZeroUsize,
}

impl<E: Executor> Dewrangle<E> {
    pub(crate) fn new(executor: E) -> Dewrangle<E> {
        Dewrangle {
            executor,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub(crate) fn with_page_size(mut self, page_size: NonZeroUsize) -> Dewrangle<E> {
        self.page_size = page_size;
        self
    }

    pub(crate) fn executor(&self) -> &E {
        &self.executor
    }

    fn query<Q: Query>(&self, query: &Q) -> anyhow::Result<Q::Output> {
        self.executor
            .execute(query, DeleteSafety::Enforce)
            .map_err(Into::into)
    }

    /// Run a mutation, logging whether Dewrangle accepted it.  Rejections are
    /// returned as [`MutationOutcome::Failed`], not as errors.
    fn mutate<T>(
        &self,
        action: Action,
        entity: &str,
        mutation: Mutation<T>,
        safety: DeleteSafety,
    ) -> anyhow::Result<MutationOutcome<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        let outcome = self
            .executor
            .execute(&mutation, safety)
            .with_context(|| format!("failed to {action} {entity}"))?;
        match outcome {
            MutationOutcome::Succeeded(ref value) => tracing::info!(
                "{action} {entity} succeeded: {}",
                serde_json::to_string(value).unwrap_or_default()
            ),
            MutationOutcome::Failed(ref errors) => {
                tracing::error!("{action} {entity} failed:\n{errors}");
            }
        }
        Ok(outcome)
    }

    /// Absolute URL of a REST endpoint on the Dewrangle host
    fn rest_url(&self, path: &str) -> String {
        format!("{}{path}", self.executor.base_url())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Action {
    Create,
    Update,
    Delete,
    Upsert,
    ListAndHash,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Upsert => "upsert",
            Action::ListAndHash => "list and hash",
        })
    }
}
