//! Shared User-Agent string for E-utilities requests.
//!
//! NCBI asks tools to identify themselves; the `tool` and `email` query
//! parameters carry the caller identity, the User-Agent names the program.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/nicksrandall/pubmed-export";

/// Name reported in the `tool` E-utilities parameter.
pub const TOOL_NAME: &str = "pubmed-export";

/// Default User-Agent for E-utilities requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{TOOL_NAME}/{version} (literature-export-tool; +{PROJECT_UA_URL})")
}
