use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use models::{InviteStatus, Role};

/// A node of the referral forest (business view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub referral_code: String,
    /// `None` for roots
    pub parent_id: Option<Uuid>,
    pub role: Role,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_root(&self) -> bool { self.parent_id.is_none() }

    /// Shareable signup link, `{base}/join/{code}`.
    pub fn referral_link(&self, base_url: &str) -> String {
        format!("{}/join/{}", base_url.trim_end_matches('/'), self.referral_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub invite_email: String,
    pub status: InviteStatus,
    pub recruit_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn is_pending(&self) -> bool { self.status == InviteStatus::Pending }
}

/// Ledger entry (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub related_invite_id: Option<Uuid>,
    pub level: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: Option<String>,
    pub referral_code: String,
    pub parent_id: Option<Uuid>,
    pub role: Role,
}

/// Signup input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterUserInput {
    #[serde(default)]
    pub display_name: Option<String>,
    /// Referral code of the inviting user, if any
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// One award of the distribution chain, tagged for idempotent replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsAward {
    pub user_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub invite_id: Uuid,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardOutcome {
    Applied,
    /// `(invite_id, level)` was already in the ledger; nothing written
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AwardStatus {
    Applied,
    AlreadyApplied,
    Failed { error: String },
}

/// Result of a single chain level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelAward {
    pub level: u32,
    /// Unknown when the ancestor lookup itself failed
    pub user_id: Option<Uuid>,
    pub amount: i64,
    #[serde(flatten)]
    pub status: AwardStatus,
}

/// Per-level outcome of `distribute_points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub invite_id: Uuid,
    pub levels: Vec<LevelAward>,
}

impl DistributionReport {
    pub fn new(invite_id: Uuid) -> Self { Self { invite_id, levels: Vec::new() } }

    pub fn succeeded_levels(&self) -> Vec<u32> {
        self.levels.iter().filter(|l| !matches!(l.status, AwardStatus::Failed { .. })).map(|l| l.level).collect()
    }

    pub fn failed_levels(&self) -> Vec<u32> {
        self.levels.iter().filter(|l| matches!(l.status, AwardStatus::Failed { .. })).map(|l| l.level).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.levels.iter().all(|l| !matches!(l.status, AwardStatus::Failed { .. }))
    }

    /// Points newly credited by this run (replayed levels excluded).
    pub fn total_awarded(&self) -> i64 {
        self.levels.iter().filter(|l| l.status == AwardStatus::Applied).map(|l| l.amount).sum()
    }
}

/// Successful acceptance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptOutcome {
    pub invite: Invite,
    pub distribution: DistributionReport,
}

/// Flat downline entry; `level` 1 is a direct recruit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownlineEntry {
    pub user: User,
    pub level: u32,
}

/// Nested downline view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownlineNode {
    pub user: User,
    pub level: u32,
    pub child_count: usize,
    pub children: Vec<DownlineNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMember {
    pub user: User,
    pub child_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub level: u32,
    pub members: Vec<LayerMember>,
}

/// Display name of the depth bucket at `level` (1-based).
pub fn layer_name(level: u32) -> String {
    match level {
        1 => "Inner Circle".to_string(),
        2 => "Outer Circle".to_string(),
        3 => "Extended Network".to_string(),
        4 => "Community Reach".to_string(),
        5 | 6 => format!("Network Layer {level}"),
        n => format!("Level {n}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruitCounts {
    pub direct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    /// 1-based position
    pub rank: usize,
    pub user: User,
    pub points: i64,
    pub direct_recruit_count: usize,
    pub total_recruit_count: usize,
}
