use staybook_auth::Principal;

/// Correlation id for a request, taken from the inbound header or generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    id: String,
}

impl CorrelationContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Principal context for a request (verified identity + roles).
///
/// Produced by the bearer middleware; handlers never re-derive roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
