//! Errors produced while racing upstream nameservers.

/// Struct to represent the "no nameserver returned a usable answer" case.
#[derive(Debug)]
pub struct ResolveFailedStruct {
    qname: String,
    nameservers: Vec<String>,
}

/// Errors surfaced by the resolver.
#[derive(Debug)]
pub enum ResolveError {
    /// None of the attempted nameservers produced a valid answer.
    Failed(ResolveFailedStruct),
    /// The nameserver list to consult for this query was empty.
    NoNameservers(String),
}

impl ResolveError {
    pub fn failed(qname: impl Into<String>, nameservers: Vec<String>) -> Self {
        ResolveError::Failed(ResolveFailedStruct {
            qname: qname.into(),
            nameservers,
        })
    }

    pub fn no_nameservers(qname: impl Into<String>) -> Self {
        ResolveError::NoNameservers(qname.into())
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Failed(e) => write!(
                f,
                "resolv-failed for {}: tried [{}]",
                e.qname,
                e.nameservers.join(", ")
            ),
            ResolveError::NoNameservers(qname) => {
                write!(f, "no nameservers configured for {}", qname)
            }
        }
    }
}

impl std::error::Error for ResolveError {}
