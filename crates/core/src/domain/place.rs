use serde::{Deserialize, Serialize};

/// A point of interest handed in by the places provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub tip: String,
    pub category: String,
    #[serde(default)]
    pub affiliate_id: Option<String>,
}

impl Place {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        tip: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            tip: tip.into(),
            category: category.into(),
            affiliate_id: None,
        }
    }

    pub fn with_affiliate(mut self, affiliate_id: impl Into<String>) -> Self {
        self.affiliate_id = Some(affiliate_id.into());
        self
    }

    /// Lowercased type, name and tip, the fields keyword matching runs against.
    pub fn descriptive_text(&self) -> String {
        format!("{} {} {}", self.kind, self.name, self.tip).to_lowercase()
    }
}
