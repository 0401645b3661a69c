use crate::queries::Query;
use crate::types::{JsonMap, Singleton};
use indenter::indented;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use std::fmt::{self, Write};
use std::marker::PhantomData;

/// A GraphQL mutation whose payload has the shape
/// `{"<mutationName>": {"errors": [...], "<entity>": {...}}}`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mutation<T> {
    document: &'static str,
    entity: &'static str,
    variables: JsonMap,
    destructive: bool,
    output: PhantomData<fn() -> T>,
}

impl<T> Mutation<T> {
    pub fn new(document: &'static str, entity: &'static str, variables: JsonMap) -> Self {
        Mutation {
            document,
            entity,
            variables,
            destructive: false,
            output: PhantomData,
        }
    }

    /// Mark the mutation as removing data, subjecting it to the delete
    /// safety gate
    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }
}

impl<T: DeserializeOwned> Query for Mutation<T> {
    type Output = MutationOutcome<T>;

    fn document(&self) -> &'static str {
        self.document
    }

    fn variables(&self) -> JsonMap {
        self.variables.clone()
    }

    fn parse_response(&self, data: JsonMap) -> Result<MutationOutcome<T>, serde_json::Error> {
        let Singleton(mut payload) =
            serde_json::from_value::<Singleton<JsonMap>>(serde_json::Value::Object(data))?;
        let errors = serde_json::from_value::<MutationErrors>(
            payload.remove("errors").unwrap_or_default(),
        )?;
        if !errors.is_empty() {
            return Ok(MutationOutcome::Failed(errors));
        }
        let entity = serde_json::from_value(payload.remove(self.entity).unwrap_or_default())?;
        Ok(MutationOutcome::Succeeded(entity))
    }

    fn is_destructive(&self) -> bool {
        self.destructive
    }
}

/// Result of a mutation that the server processed.  Errors reported in the
/// payload are data, not failures of the request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MutationOutcome<T> {
    Succeeded(T),
    Failed(MutationErrors),
}

impl<T> MutationOutcome<T> {
    pub fn succeeded(self) -> Option<T> {
        match self {
            MutationOutcome::Succeeded(value) => Some(value),
            MutationOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MutationOutcome::Failed(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, func: F) -> MutationOutcome<U> {
        match self {
            MutationOutcome::Succeeded(value) => MutationOutcome::Succeeded(func(value)),
            MutationOutcome::Failed(errors) => MutationOutcome::Failed(errors),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MutationError {
    #[serde(default, rename = "__typename")]
    pub typename: Option<String>,
    pub message: String,
    #[serde(default)]
    pub field: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MutationErrors(pub Vec<MutationError>);

impl MutationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for MutationErrors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Vec<MutationError>>::deserialize(deserializer)
            .map(|errors| MutationErrors(errors.unwrap_or_default()))
    }
}

impl fmt::Display for MutationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in &self.0 {
            writeln!(
                f,
                "{}: {}",
                e.typename.as_deref().unwrap_or("MutationError"),
                e.message
            )?;
            if let Some(field) = e.field.as_ref().filter(|v| !v.is_null()) {
                writeln!(indented(f).with_str("    "), "field: {field}")?;
            }
        }
        Ok(())
    }
}
