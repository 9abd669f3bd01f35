use serde::Serialize;

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Namespace of one independent push channel.
///
/// Store keys are declared as constants by the application:
///
/// ```
/// use common::wire::StoreKey;
///
/// const SESSION: StoreKey = StoreKey::new("session");
/// assert_eq!(SESSION.as_str(), "session");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StoreKey(&'static str);

impl StoreKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Display for StoreKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.0)
    }
}
