//! Professional (lawyer) profile model.

use serde::{Deserialize, Deserializer, Serialize};

/// Approval state set by administrators on registration review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

/// Subscription plan. Selecting a plan only flips the subscription flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Basic,
    Premium,
    Enterprise,
    None,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Premium => "premium",
            PlanTier::Enterprise => "enterprise",
            PlanTier::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "free" => Some(PlanTier::Free),
            "basic" => Some(PlanTier::Basic),
            "premium" => Some(PlanTier::Premium),
            "enterprise" => Some(PlanTier::Enterprise),
            "none" => Some(PlanTier::None),
            _ => None,
        }
    }

    /// Whether holding this plan keeps the subscription active.
    pub fn activates_subscription(&self) -> bool {
        !matches!(self, PlanTier::None)
    }
}

/// Explicit role attribute stored on the profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfessionalRole {
    #[default]
    Professional,
    Admin,
}

impl ProfessionalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfessionalRole::Professional => "professional",
            ProfessionalRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "professional" => Some(ProfessionalRole::Professional),
            "admin" => Some(ProfessionalRole::Admin),
            _ => None,
        }
    }
}

/// A registered professional who can receive leads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Professional {
    pub id: String,
    pub email: String,
    pub name: String,
    pub oab_number: String,
    pub specialty: String,
    /// Specialty tags, merged in from the tags table on profile fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialties: Option<Vec<String>>,
    pub status: ApprovalStatus,
    pub subscription_active: bool,
    pub plan: PlanTier,
    pub role: ProfessionalRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// What an end user sees about the professional matched to their lead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedProfessional {
    pub id: String,
    pub name: String,
    pub specialty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<&Professional> for MatchedProfessional {
    fn from(p: &Professional) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            specialty: p.specialty.clone(),
            phone: p.phone.clone(),
        }
    }
}

/// Registration fields collected on sign-up.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationProfile {
    pub name: String,
    pub oab_number: String,
    pub specialty: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Request body for a professional editing their own profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub oab_number: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    /// Replaces the whole tag set when present
    #[serde(default)]
    pub specialties: Option<Vec<String>>,
    /// `None` keeps the stored value, `Some(None)` clears it
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub bio: Option<Option<String>>,
}

/// Present fields become `Some`, so an explicit `null` reads as `Some(None)`.
fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectPlanRequest {
    pub plan: PlanTier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetApprovalRequest {
    pub status: ApprovalStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfessionalListQuery {
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
}
