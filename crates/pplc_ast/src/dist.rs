//! The distribution family table.
//!
//! The compiler relies only on this metadata; numerical semantics belong to
//! the runtime library that consumes the generated graph.

use rustc_hash::FxHashMap;

use crate::types::TypeInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Continuous,
    Discrete,
}

/// One distribution constructor known to the compiler.
#[derive(Debug, Clone, Copy)]
pub struct Family {
    pub name: &'static str,
    pub params: &'static [&'static str],
    /// Whether the parameters are inherently vectors (`categorical` probs,
    /// `dirichlet` concentrations). Vector-parameter families are never
    /// unrolled element-wise.
    pub vector_params: bool,
    pub support: Support,
    /// Bijection to an unconstrained space and its inverse, for transformed
    /// log-density generation downstream.
    pub transform: Option<(&'static str, &'static str)>,
}

impl Family {
    pub fn is_continuous(&self) -> bool {
        self.support == Support::Continuous
    }

    pub fn is_discrete(&self) -> bool {
        self.support == Support::Discrete
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Type of one draw from the distribution.
    pub fn result_type(&self) -> TypeInfo {
        match self.name {
            "dirichlet" => TypeInfo::sequence(TypeInfo::Float, None),
            _ if self.is_continuous() => TypeInfo::Float,
            _ => TypeInfo::Integer,
        }
    }
}

pub const FAMILIES: &[Family] = &[
    Family {
        name: "normal",
        params: &["loc", "scale"],
        vector_params: false,
        support: Support::Continuous,
        transform: None,
    },
    Family {
        name: "cauchy",
        params: &["loc", "scale"],
        vector_params: false,
        support: Support::Continuous,
        transform: None,
    },
    Family {
        name: "uniform",
        params: &["low", "high"],
        vector_params: false,
        support: Support::Continuous,
        transform: Some(("logit", "sigmoid")),
    },
    Family {
        name: "beta",
        params: &["alpha", "beta"],
        vector_params: false,
        support: Support::Continuous,
        transform: Some(("logit", "sigmoid")),
    },
    Family {
        name: "gamma",
        params: &["concentration", "rate"],
        vector_params: false,
        support: Support::Continuous,
        transform: Some(("log", "exp")),
    },
    Family {
        name: "exponential",
        params: &["rate"],
        vector_params: false,
        support: Support::Continuous,
        transform: Some(("log", "exp")),
    },
    Family {
        name: "dirichlet",
        params: &["concentration"],
        vector_params: true,
        support: Support::Continuous,
        transform: None,
    },
    Family {
        name: "bernoulli",
        params: &["probs"],
        vector_params: false,
        support: Support::Discrete,
        transform: None,
    },
    Family {
        name: "binomial",
        params: &["total_count", "probs"],
        vector_params: false,
        support: Support::Discrete,
        transform: None,
    },
    Family {
        name: "categorical",
        params: &["probs"],
        vector_params: true,
        support: Support::Discrete,
        transform: None,
    },
    Family {
        name: "poisson",
        params: &["rate"],
        vector_params: false,
        support: Support::Discrete,
        transform: None,
    },
];

pub fn lookup(name: &str) -> Option<&'static Family> {
    FAMILIES.iter().find(|family| family.name == name)
}

/// The default namespace: every family maps to itself, with a capitalised
/// alias for callers writing `Normal(...)`-style constructors.
pub fn default_namespace() -> FxHashMap<String, String> {
    let mut namespace = FxHashMap::default();
    for family in FAMILIES {
        namespace.insert(family.name.to_owned(), family.name.to_owned());
        let mut alias = family.name.to_owned();
        alias[..1].make_ascii_uppercase();
        namespace.insert(alias, family.name.to_owned());
    }
    namespace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_partition() {
        for family in FAMILIES {
            assert_ne!(family.is_continuous(), family.is_discrete());
        }
    }

    #[test]
    fn lookup_finds_families() {
        assert!(lookup("normal").unwrap().is_continuous());
        assert!(lookup("categorical").unwrap().vector_params);
        assert!(lookup("nonesuch").is_none());
    }

    #[test]
    fn default_namespace_carries_aliases() {
        let ns = default_namespace();
        assert_eq!(ns.get("Normal"), Some(&"normal".to_owned()));
        assert_eq!(ns.get("poisson"), Some(&"poisson".to_owned()));
    }
}
