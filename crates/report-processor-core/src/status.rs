use serde::{Deserialize, Serialize};

/// Substrings that mark a bracket as rejected. Checked before [`APPROVED_SIGNALS`].
const REJECTED_SIGNALS: &[&str] = &["rejected", "0", "15,000"];

/// Substrings that mark a bracket as approved.
const APPROVED_SIGNALS: &[&str] = &["approved", "100,000", "50,000"];

/// Review outcome written back onto an application record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Approved,
    Rejected,
    #[default]
    ReviewNeeded,
}

impl ApplicationStatus {
    /// Classify a risk bracket label with a case-insensitive substring match.
    ///
    /// Rejection signals win over approval signals, so `"$100,000"` is
    /// rejected through its `"0"`. A missing bracket is treated as empty and
    /// falls through to [`ApplicationStatus::ReviewNeeded`].
    pub fn from_risk_bracket(bracket: Option<&str>) -> Self {
        let bracket = bracket.unwrap_or_default().to_lowercase();
        let contains_any = |signals: &[&str]| signals.iter().any(|s| bracket.contains(s));

        if contains_any(REJECTED_SIGNALS) {
            Self::Rejected
        } else if contains_any(APPROVED_SIGNALS) {
            Self::Approved
        } else {
            Self::ReviewNeeded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ReviewNeeded => "review_needed",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
