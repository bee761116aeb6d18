use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TransitionError;

// ── Stage vocabularies ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LeadStage {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStage {
    pub const ALL: [LeadStage; 5] = [
        Self::New,
        Self::Contacted,
        Self::Qualified,
        Self::Converted,
        Self::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::Qualified => "Qualified",
            Self::Converted => "Converted",
            Self::Lost => "Lost",
        }
    }
}

impl std::fmt::Display for LeadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Contacted" => Ok(Self::Contacted),
            "Qualified" => Ok(Self::Qualified),
            "Converted" => Ok(Self::Converted),
            "Lost" => Ok(Self::Lost),
            _ => Err(format!("Invalid lead stage: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DealStage {
    Qualification,
    Proposal,
    Negotiation,
    #[serde(rename = "Closed Won")]
    ClosedWon,
    #[serde(rename = "Closed Lost")]
    ClosedLost,
}

impl DealStage {
    pub const ALL: [DealStage; 5] = [
        Self::Qualification,
        Self::Proposal,
        Self::Negotiation,
        Self::ClosedWon,
        Self::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qualification => "Qualification",
            Self::Proposal => "Proposal",
            Self::Negotiation => "Negotiation",
            Self::ClosedWon => "Closed Won",
            Self::ClosedLost => "Closed Lost",
        }
    }
}

impl std::fmt::Display for DealStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Qualification" => Ok(Self::Qualification),
            "Proposal" => Ok(Self::Proposal),
            "Negotiation" => Ok(Self::Negotiation),
            "Closed Won" => Ok(Self::ClosedWon),
            "Closed Lost" => Ok(Self::ClosedLost),
            _ => Err(format!("Invalid deal stage: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

// ── Board kinds ───────────────────────────────────────────────────────

/// Which domain collection a board displays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    Leads,
    Deals,
    Tasks,
}

impl BoardKind {
    pub const ALL: [BoardKind; 3] = [Self::Leads, Self::Deals, Self::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leads => "leads",
            Self::Deals => "deals",
            Self::Tasks => "tasks",
        }
    }

    /// Record field the board groups by.
    pub fn group_by_field(&self) -> &'static str {
        match self {
            Self::Leads | Self::Deals => "stage",
            Self::Tasks => "status",
        }
    }

    /// Container titles in display order. Titles equal backend stage strings.
    pub fn stage_titles(&self) -> Vec<&'static str> {
        match self {
            Self::Leads => LeadStage::ALL.iter().map(LeadStage::as_str).collect(),
            Self::Deals => DealStage::ALL.iter().map(DealStage::as_str).collect(),
            Self::Tasks => TaskStatus::ALL.iter().map(TaskStatus::as_str).collect(),
        }
    }

    /// Reject stage strings outside this kind's vocabulary.
    pub fn validate_stage(&self, stage: &str) -> Result<(), TransitionError> {
        let valid = match self {
            Self::Leads => LeadStage::from_str(stage).is_ok(),
            Self::Deals => DealStage::from_str(stage).is_ok(),
            Self::Tasks => TaskStatus::from_str(stage).is_ok(),
        };
        if valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidStage {
                kind: self.as_str().to_string(),
                stage: stage.to_string(),
            })
        }
    }
}

impl std::fmt::Display for BoardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leads" => Ok(Self::Leads),
            "deals" => Ok(Self::Deals),
            "tasks" => Ok(Self::Tasks),
            _ => Err(format!("Invalid board kind: {}", s)),
        }
    }
}

// ── Domain records ────────────────────────────────────────────────────

/// Field access used by the board to group and project records.
pub trait Record {
    fn record_id(&self) -> i64;
    fn field(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    /// Remaining backend columns, forwarded untouched as `leadData` on conversion.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record for Lead {
    fn record_id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "organization" => self.organization.as_deref(),
            "email" => self.email.as_deref(),
            "phone" => self.phone.as_deref(),
            "stage" => self.stage.as_deref(),
            _ => self.extra.get(name).and_then(|v| v.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub id: i64,
    pub title: String,
    /// DECIMAL columns arrive as strings (`"1000.00"`); plain numbers are accepted too.
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub value: Option<f64>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default, alias = "leadId")]
    pub lead_id: Option<i64>,
}

fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Amount>::deserialize(deserializer)? {
        Some(Amount::Number(n)) => Some(n),
        Some(Amount::Text(raw)) => match raw.trim() {
            "" => None,
            text => match text.parse::<f64>() {
                Ok(n) if n.is_finite() => Some(n),
                _ => {
                    tracing::warn!(value = %raw, "unparsable deal value; showing none");
                    None
                }
            },
        },
        None => None,
    })
}

impl Record for Deal {
    fn record_id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "organization" => self.organization.as_deref(),
            "stage" => self.stage.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Record for Task {
    fn record_id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "category" => self.category.as_deref(),
            "priority" => self.priority.as_deref(),
            "status" => self.status.as_deref(),
            _ => None,
        }
    }
}

/// A fetched record of any board kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum CrmRecord {
    Lead(Lead),
    Deal(Deal),
    Task(Task),
}

impl CrmRecord {
    pub fn kind(&self) -> BoardKind {
        match self {
            Self::Lead(_) => BoardKind::Leads,
            Self::Deal(_) => BoardKind::Deals,
            Self::Task(_) => BoardKind::Tasks,
        }
    }

    /// Small set of display fields for a card.
    pub fn card_fields(&self) -> CardFields {
        match self {
            Self::Lead(l) => CardFields::Lead {
                name: l.name.clone(),
                organization: l.organization.clone(),
                email: l.email.clone(),
                phone: l.phone.clone(),
            },
            Self::Deal(d) => CardFields::Deal {
                title: d.title.clone(),
                value: d.value,
                organization: d.organization.clone(),
            },
            Self::Task(t) => CardFields::Task {
                title: t.title.clone(),
                category: t.category.clone(),
                priority: t.priority.clone(),
            },
        }
    }
}

impl Record for CrmRecord {
    fn record_id(&self) -> i64 {
        match self {
            Self::Lead(l) => l.record_id(),
            Self::Deal(d) => d.record_id(),
            Self::Task(t) => t.record_id(),
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Lead(l) => l.field(name),
            Self::Deal(d) => d.field(name),
            Self::Task(t) => t.field(name),
        }
    }
}

/// Display fields carried by a card. Refreshed only by a full refetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardFields {
    Lead {
        name: String,
        organization: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    },
    Deal {
        title: String,
        value: Option<f64>,
        organization: Option<String>,
    },
    Task {
        title: String,
        category: Option<String>,
        priority: Option<String>,
    },
}

impl CardFields {
    /// Primary line shown on the card.
    pub fn headline(&self) -> &str {
        match self {
            Self::Lead { name, .. } => name,
            Self::Deal { title, .. } | Self::Task { title, .. } => title,
        }
    }
}
