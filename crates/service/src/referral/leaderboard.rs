use super::domain::{RankedUser, User};
use super::errors::ReferralError;
use super::repository::ReferralRepository;
use super::tree::TreeQueryEngine;

/// Points descending, earliest signup first on ties.
pub fn rank_order(a: &User, b: &User) -> std::cmp::Ordering {
    b.points.cmp(&a.points).then(a.created_at.cmp(&b.created_at)).then(a.id.cmp(&b.id))
}

/// Ranked snapshot recomputed on every call.
pub struct LeaderboardAggregator<'a> {
    repo: &'a dyn ReferralRepository,
    tree: TreeQueryEngine<'a>,
}

impl<'a> LeaderboardAggregator<'a> {
    pub fn new(repo: &'a dyn ReferralRepository, max_depth: u32) -> Self {
        Self { repo, tree: TreeQueryEngine::new(repo, max_depth) }
    }

    pub async fn top(&self, limit: u64) -> Result<Vec<RankedUser>, ReferralError> {
        let mut users = self.repo.top_users_by_points(limit).await?;
        users.sort_by(rank_order);

        let mut ranked = Vec::with_capacity(users.len());
        for (i, user) in users.into_iter().enumerate() {
            let arena = self.tree.downline_of(&user).await?;
            ranked.push(RankedUser {
                rank: i + 1,
                points: user.points,
                direct_recruit_count: arena.direct_count(),
                total_recruit_count: arena.len(),
                user,
            });
        }
        Ok(ranked)
    }
}
