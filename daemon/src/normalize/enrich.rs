/// Result of a best-effort enrichment: the value, or a fallback plus why.
#[derive(Debug, Clone, PartialEq)]
pub enum Enriched<T> {
    Ok(T),
    Degraded(T, String),
}

impl<T> Enriched<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Enriched::Degraded(value, reason.into())
    }

    pub fn value(&self) -> &T {
        match self {
            Enriched::Ok(v) | Enriched::Degraded(v, _) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Enriched::Ok(v) | Enriched::Degraded(v, _) => v,
        }
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Enriched::Ok(_) => None,
            Enriched::Degraded(_, reason) => Some(reason),
        }
    }
}
