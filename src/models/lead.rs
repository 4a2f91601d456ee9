//! Lead (contact request) model.

use serde::{Deserialize, Serialize};

/// Owner id for leads nobody could be matched to. The row it points at is
/// seeded by the schema bootstrap and is never eligible for matching.
pub const SENTINEL_PROFESSIONAL_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Workflow status of a lead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Contacted,
    Converted,
    NotConverted,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Converted => "converted",
            LeadStatus::NotConverted => "not_converted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LeadStatus::Pending),
            "contacted" => Some(LeadStatus::Contacted),
            "converted" => Some(LeadStatus::Converted),
            "not_converted" => Some(LeadStatus::NotConverted),
            _ => None,
        }
    }

    /// Transitions the owning professional may apply. Administrators bypass this.
    pub fn owner_can_move_to(&self, next: LeadStatus) -> bool {
        use LeadStatus::*;
        matches!(
            (self, next),
            (Pending, Contacted)
                | (Pending, Converted)
                | (Pending, NotConverted)
                | (Contacted, Converted)
                | (Contacted, NotConverted)
        )
    }
}

/// Feedback a professional leaves on a lead after working it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeadFeedback {
    pub is_relevant: bool,
    pub quality_rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A recorded contact request owned by one professional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub professional_id: String,
    pub client_name: String,
    /// Not collected by the questionnaire; stays empty rather than invented
    pub client_email: Option<String>,
    pub client_phone: String,
    pub category: String,
    pub description: String,
    pub status: LeadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<LeadFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Lead {
    pub fn is_unassigned(&self) -> bool {
        self.professional_id == SENTINEL_PROFESSIONAL_ID
    }
}

/// Row to insert for a brand new lead.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub professional_id: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: String,
    pub category: String,
    pub description: String,
    pub submission_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLeadStatusRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignLeadRequest {
    pub professional_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListQuery {
    #[serde(default)]
    pub unassigned: bool,
}

/// Lead totals shown on the professional dashboard.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeadCounts {
    pub total: i64,
    pub pending: i64,
    pub contacted: i64,
    pub converted: i64,
    pub not_converted: i64,
}

impl LeadCounts {
    pub fn add(&mut self, status: LeadStatus, n: i64) {
        match status {
            LeadStatus::Pending => self.pending += n,
            LeadStatus::Contacted => self.contacted += n,
            LeadStatus::Converted => self.converted += n,
            LeadStatus::NotConverted => self.not_converted += n,
        }
        self.total += n;
    }
}
