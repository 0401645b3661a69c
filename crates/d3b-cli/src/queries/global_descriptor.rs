use indoc::indoc;

pub(crate) static UPSERT_GLOBAL_DESCRIPTORS: &str = indoc! {"
    mutation globalDescriptorUpsertMutation($input: GlobalDescriptorUpsertInput!) {
      globalDescriptorUpsert(input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        job {
          id
          operation
          completedAt
          errors {
            edges {
              node {
                id
                name
                message
              }
            }
          }
        }
      }
    }
"};
