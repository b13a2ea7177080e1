// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported to tooling requests.

use thiserror::Error;
use understory_resource::ResourceError;

use crate::style::StyleId;

/// Result code of a tooling request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ToolingStatus {
    /// The request completed.
    Success,
    /// A handle or key named by the request does not exist.
    NotFound,
    /// The request was rejected without changing anything.
    InvalidArgument,
}

/// Errors returned by [`ResourceEngine`](crate::ResourceEngine) requests.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolingError {
    /// The request referenced a stale or unknown handle.
    #[error("stale or unknown handle")]
    HandleNotFound,
    /// The request named a key that is not present.
    #[error("resource not found")]
    NotFound,
    /// The dictionary rejected the mutation.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[source] ResourceError),
    /// Setting the `BasedOn` would make the style its own base.
    #[error("style {0:?} would become based on itself")]
    StyleCycle(StyleId),
}

impl ToolingError {
    /// Maps the error onto a tooling result code.
    #[must_use]
    pub fn status(&self) -> ToolingStatus {
        match self {
            Self::HandleNotFound | Self::NotFound => ToolingStatus::NotFound,
            Self::InvalidArgument(_) | Self::StyleCycle(_) => ToolingStatus::InvalidArgument,
        }
    }
}

impl From<ResourceError> for ToolingError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::HandleNotFound => Self::HandleNotFound,
            ResourceError::KeyNotFound(_) => Self::NotFound,
            other => Self::InvalidArgument(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_resource::ResourceKey;

    #[test]
    fn resource_errors_map_to_status() {
        let not_found = ToolingError::from(ResourceError::KeyNotFound(ResourceKey::named("K")));
        assert_eq!(not_found, ToolingError::NotFound);
        assert_eq!(not_found.status(), ToolingStatus::NotFound);

        let stale = ToolingError::from(ResourceError::HandleNotFound);
        assert_eq!(stale.status(), ToolingStatus::NotFound);

        let rejected = ToolingError::from(ResourceError::NotADictionary { type_name: "u8" });
        assert_eq!(rejected.status(), ToolingStatus::InvalidArgument);
    }
}
