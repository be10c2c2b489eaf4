use std::collections::HashSet;

/// Namespace admission policy: an allow-set of exact namespaces, an
/// allow-list of prefixes, or (if neither is configured) accept-all.
#[derive(Debug, Clone)]
pub struct NamespaceRules {
    allowed: HashSet<String>,
    prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceConfigError {
    #[error("namespaces-allowed and namespace-prefixes are mutually exclusive")]
    BothPoliciesConfigured,
    #[error(
        "prefix {redundant:?} is itself a prefix of {covers:?} ({additional_count} additional redundant prefix(es) found)"
    )]
    RedundantPrefix {
        redundant: String,
        covers: String,
        additional_count: usize,
    },
}

impl NamespaceRules {
    /// Accept-all policy: neither an allow-set nor a prefix list.
    pub fn accept_all() -> Self {
        NamespaceRules {
            allowed: HashSet::new(),
            prefixes: Vec::new(),
        }
    }

    /// Exact-match allow-set policy.
    pub fn with_allow_set(namespaces: impl IntoIterator<Item = String>) -> Self {
        NamespaceRules {
            allowed: namespaces.into_iter().collect(),
            prefixes: Vec::new(),
        }
    }

    /// Prefix-match allow policy. Rejects configuration if any listed prefix
    /// is itself a prefix of another (a redundancy that can never change
    /// `is_valid`'s answer and likely indicates a typo).
    pub fn with_prefixes(prefixes: Vec<String>) -> Result<Self, NamespaceConfigError> {
        let rules = NamespaceRules {
            allowed: HashSet::new(),
            prefixes,
        };
        rules.check_prefixes()?;
        Ok(rules)
    }

    /// Build from the CLI's mutually-exclusive `--namespaces-allowed` /
    /// `--namespace-prefixes` flags. At most one may be non-empty.
    pub fn configure(
        allowed: Vec<String>,
        prefixes: Vec<String>,
    ) -> Result<Self, NamespaceConfigError> {
        if !allowed.is_empty() && !prefixes.is_empty() {
            return Err(NamespaceConfigError::BothPoliciesConfigured);
        }
        if !allowed.is_empty() {
            return Ok(Self::with_allow_set(allowed));
        }
        if !prefixes.is_empty() {
            return Self::with_prefixes(prefixes);
        }
        Ok(Self::accept_all())
    }

    pub fn is_valid(&self, namespace: &str) -> bool {
        if !self.allowed.is_empty() {
            return self.allowed.contains(namespace);
        }
        if !self.prefixes.is_empty() {
            return self.prefixes.iter().any(|p| namespace.starts_with(p.as_str()));
        }
        true
    }

    /// Fails on the first redundant pair found (one listed prefix is itself a
    /// prefix of another, including an exact duplicate), naming both and
    /// counting how many *additional* redundant pairs exist beyond that first
    /// one.
    fn check_prefixes(&self) -> Result<(), NamespaceConfigError> {
        let mut redundant_pairs = Vec::new();
        for (i, a) in self.prefixes.iter().enumerate() {
            for (j, b) in self.prefixes.iter().enumerate() {
                if i != j && b.starts_with(a.as_str()) {
                    redundant_pairs.push((a.clone(), b.clone()));
                }
            }
        }
        if let Some((redundant, covers)) = redundant_pairs.first().cloned() {
            return Err(NamespaceConfigError::RedundantPrefix {
                redundant,
                covers,
                additional_count: redundant_pairs.len() - 1,
            });
        }
        Ok(())
    }
}
