//! Workflow tests over the in-memory repository.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::domain::*;
use super::errors::ReferralError;
use super::repository::memory::MemoryReferralRepository;
use super::repository::ReferralRepository;
use super::service::ReferralService;
use crate::pagination::Pagination;

fn service(repo: Arc<MemoryReferralRepository>) -> ReferralService {
    ReferralService::new(repo, configs::ReferralConfig::default())
}

async fn root(svc: &ReferralService, name: &str) -> User {
    svc.register_user(RegisterUserInput { display_name: Some(name.into()), referral_code: None }).await.unwrap()
}

async fn admin(repo: &MemoryReferralRepository) -> User {
    repo.insert_user(NewUser { display_name: Some("ops".into()), referral_code: "ADMIN0001".into(), parent_id: None, role: Role::Admin })
        .await
        .unwrap()
}

/// Sign up under `parent` and accept an invite from them.
async fn recruit(svc: &ReferralService, parent: &User, name: &str) -> User {
    let user = svc
        .register_user(RegisterUserInput { display_name: Some(name.into()), referral_code: Some(parent.referral_code.clone()) })
        .await
        .unwrap();
    let inv = svc.create_invite(parent.id, &format!("{name}@example.com")).await.unwrap();
    svc.accept_invite(inv.id, user.id).await.unwrap();
    user
}

async fn points(svc: &ReferralService, id: Uuid) -> i64 {
    svc.get_user(id).await.unwrap().points
}

#[tokio::test]
async fn chain_of_four_awards_decaying_points() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let b = recruit(&svc, &a, "b").await;
    let c = recruit(&svc, &b, "c").await;

    let before = (points(&svc, a.id).await, points(&svc, b.id).await, points(&svc, c.id).await);
    let d = svc
        .register_user(RegisterUserInput { display_name: None, referral_code: Some(c.referral_code.clone()) })
        .await
        .unwrap();
    let inv = svc.create_invite(c.id, "d@example.com").await.unwrap();
    let outcome = svc.accept_invite(inv.id, d.id).await.unwrap();

    assert_eq!(outcome.invite.status, InviteStatus::Accepted);
    assert_eq!(outcome.invite.recruit_id, Some(d.id));
    assert_eq!(outcome.distribution.total_awarded(), 1750);
    assert_eq!(points(&svc, c.id).await - before.2, 1000);
    assert_eq!(points(&svc, b.id).await - before.1, 500);
    assert_eq!(points(&svc, a.id).await - before.0, 250);

    let upline: Vec<Uuid> = svc.get_upline(d.id).await.unwrap().iter().map(|u| u.id).collect();
    assert_eq!(upline, vec![a.id, b.id, c.id]);

    // newest first
    let txs = svc.list_points_transactions(a.id, Pagination::default()).await.unwrap();
    assert_eq!(txs.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![250, 500, 1000]);
    assert_eq!(txs[0].reason, "Recruit accepted - Level 3 reward");
    assert_eq!(txs[0].related_invite_id, Some(inv.id));
}

#[tokio::test]
async fn direct_root_invite_awards_only_the_root() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let r = root(&svc, "r").await;
    let e = recruit(&svc, &r, "e").await;

    assert_eq!(points(&svc, r.id).await, 1000);
    assert_eq!(points(&svc, e.id).await, 0);
    assert_eq!(repo.ledger().unwrap().len(), 1);
}

#[tokio::test]
async fn second_accept_is_rejected_without_new_awards() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let r = root(&svc, "r").await;
    let e = svc
        .register_user(RegisterUserInput { display_name: None, referral_code: Some(r.referral_code.clone()) })
        .await
        .unwrap();
    let inv = svc.create_invite(r.id, "e@example.com").await.unwrap();
    svc.accept_invite(inv.id, e.id).await.unwrap();

    let err = svc.accept_invite(inv.id, e.id).await.unwrap_err();
    assert!(matches!(err, ReferralError::InvalidState(_)));
    assert_eq!(points(&svc, r.id).await, 1000);
    assert_eq!(repo.ledger().unwrap().len(), 1);
}

#[tokio::test]
async fn decay_is_truncated_to_chain_length() {
    for chain_len in [1usize, 3, 10, 12] {
        let repo = Arc::new(MemoryReferralRepository::new());
        let svc = service(repo.clone());
        let mut chain = vec![root(&svc, "n0").await];
        for i in 1..chain_len {
            let parent = chain[i - 1].clone();
            chain.push(recruit(&svc, &parent, &format!("n{i}")).await);
        }
        let before: Vec<i64> = {
            let mut v = Vec::new();
            for u in &chain {
                v.push(points(&svc, u.id).await);
            }
            v
        };

        let last = chain.last().unwrap().clone();
        let acceptor = svc
            .register_user(RegisterUserInput { display_name: None, referral_code: Some(last.referral_code.clone()) })
            .await
            .unwrap();
        let inv = svc.create_invite(last.id, "tail@example.com").await.unwrap();
        let outcome = svc.accept_invite(inv.id, acceptor.id).await.unwrap();

        let amounts: Vec<i64> = outcome.distribution.levels.iter().map(|l| l.amount).collect();
        let expected: Vec<i64> = [1000, 500, 250, 125, 62, 31, 15, 7, 3, 1].into_iter().take(chain_len).collect();
        assert_eq!(amounts, expected, "chain of {chain_len}");

        // nearest ancestor gets level 1
        for (lvl, user) in chain.iter().rev().enumerate() {
            let idx = chain.iter().position(|u| u.id == user.id).unwrap();
            let delta = points(&svc, user.id).await - before[idx];
            assert_eq!(delta, expected.get(lvl).copied().unwrap_or(0));
        }
    }
}

#[tokio::test]
async fn leaderboard_orders_by_points_then_signup() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let early = root(&svc, "early").await;
    let top = root(&svc, "top").await;
    let late = root(&svc, "late").await;
    let t0 = Utc::now() - Duration::days(3);
    repo.set_created_at(early.id, t0).unwrap();
    repo.set_created_at(top.id, t0 + Duration::days(1)).unwrap();
    repo.set_created_at(late.id, t0 + Duration::days(2)).unwrap();
    repo.set_points(early.id, 500).unwrap();
    repo.set_points(top.id, 1500).unwrap();
    repo.set_points(late.id, 500).unwrap();

    let board = svc.get_leaderboard(Some(10)).await.unwrap();
    let ids: Vec<Uuid> = board.iter().map(|r| r.user.id).collect();
    assert_eq!(ids, vec![top.id, early.id, late.id]);
    assert_eq!(board.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(board.windows(2).all(|w| w[0].points >= w[1].points));

    assert_eq!(svc.get_leaderboard(Some(0)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn leaderboard_counts_direct_and_total_recruits() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let b = recruit(&svc, &a, "b").await;
    let _c = recruit(&svc, &a, "c").await;
    let _d = recruit(&svc, &b, "d").await;

    let board = svc.get_leaderboard(None).await.unwrap();
    let entry = board.iter().find(|r| r.user.id == a.id).unwrap();
    assert_eq!(entry.rank, 1);
    assert_eq!(entry.direct_recruit_count, 2);
    assert_eq!(entry.total_recruit_count, 3);
    assert_eq!(svc.get_recruit_counts(b.id).await.unwrap(), RecruitCounts { direct: 1, total: 1 });
}

#[tokio::test]
async fn promotion_detaches_upline_but_keeps_downline() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let ops = admin(&repo).await;
    let p = root(&svc, "p").await;
    let u = recruit(&svc, &p, "u").await;
    let k1 = recruit(&svc, &u, "k1").await;
    let k2 = recruit(&svc, &u, "k2").await;

    let before: HashSet<Uuid> = svc.get_downline(u.id).await.unwrap().into_iter().map(|e| e.user.id).collect();
    let promoted = svc.promote_to_recruiter(ops.id, u.id).await.unwrap();
    assert_eq!(promoted.parent_id, None);
    assert_eq!(promoted.role, Role::Recruiter);
    assert!(svc.get_upline(u.id).await.unwrap().is_empty());

    let after: HashSet<Uuid> = svc.get_downline(u.id).await.unwrap().into_iter().map(|e| e.user.id).collect();
    assert_eq!(before, after);
    assert!(after.contains(&k1.id) && after.contains(&k2.id));
    assert_eq!(svc.get_upline(k1.id).await.unwrap().iter().map(|x| x.id).collect::<Vec<_>>(), vec![u.id]);
    assert!(!svc.get_downline(p.id).await.unwrap().iter().any(|e| e.user.id == u.id));

    // already a root recruiter: unchanged
    let again = svc.promote_to_recruiter(ops.id, u.id).await.unwrap();
    assert_eq!(again, promoted);
}

#[tokio::test]
async fn promotion_requires_an_admin_caller() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let ops = admin(&repo).await;
    let p = root(&svc, "p").await;
    let u = recruit(&svc, &p, "u").await;

    assert!(matches!(svc.promote_to_recruiter(p.id, u.id).await, Err(ReferralError::Forbidden(_))));
    assert!(matches!(svc.promote_to_recruiter(Uuid::new_v4(), u.id).await, Err(ReferralError::Forbidden(_))));
    assert!(matches!(svc.promote_to_recruiter(ops.id, Uuid::new_v4()).await, Err(ReferralError::NotFound(_))));
    assert!(matches!(svc.promote_to_recruiter(ops.id, ops.id).await, Err(ReferralError::InvalidState(_))));
    assert_eq!(svc.get_user(u.id).await.unwrap().parent_id, Some(p.id));
}

#[tokio::test]
async fn upline_and_downline_are_dual() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let z = root(&svc, "z").await;
    let b = recruit(&svc, &a, "b").await;
    let c = recruit(&svc, &a, "c").await;
    let d = recruit(&svc, &b, "d").await;
    let y = recruit(&svc, &z, "y").await;
    let all = [a, z, b, c, d, y];

    for x in &all {
        let up: HashSet<Uuid> = svc.get_upline(x.id).await.unwrap().into_iter().map(|u| u.id).collect();
        for other in &all {
            let down: HashSet<Uuid> = svc.get_downline(other.id).await.unwrap().into_iter().map(|e| e.user.id).collect();
            assert_eq!(up.contains(&other.id), down.contains(&x.id));
        }
    }
}

#[tokio::test]
async fn every_node_reaches_a_root_within_the_cap() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let mut last = a.clone();
    for i in 0..6 {
        last = recruit(&svc, &last, &format!("x{i}")).await;
    }
    let upline = svc.get_upline(last.id).await.unwrap();
    assert_eq!(upline.first().map(|u| u.id), Some(a.id));
    assert!(upline[0].is_root());
    assert!(upline.len() <= svc.config().max_depth as usize);
}

#[tokio::test]
async fn accept_rejects_self_and_ancestor_acceptors() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let b = recruit(&svc, &a, "b").await;

    let own = svc.create_invite(b.id, "own@example.com").await.unwrap();
    assert!(matches!(svc.accept_invite(own.id, b.id).await, Err(ReferralError::InvalidInput(_))));
    assert!(matches!(svc.accept_invite(own.id, a.id).await, Err(ReferralError::InvalidInput(_))));
    // b already joined through a's invite
    let other = root(&svc, "other").await;
    let second = svc.create_invite(other.id, "b2@example.com").await.unwrap();
    assert!(matches!(svc.accept_invite(second.id, b.id).await, Err(ReferralError::InvalidState(_))));

    assert!(matches!(svc.accept_invite(Uuid::new_v4(), b.id).await, Err(ReferralError::NotFound(_))));
    assert!(matches!(svc.accept_invite(own.id, Uuid::new_v4()).await, Err(ReferralError::NotFound(_))));
    assert!(repo.get_invite(own.id).await.unwrap().unwrap().is_pending());
}

#[tokio::test]
async fn accept_rejects_an_invite_from_outside_the_users_tree() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let b = root(&svc, "b").await;
    let d = svc
        .register_user(RegisterUserInput { display_name: None, referral_code: Some(a.referral_code.clone()) })
        .await
        .unwrap();

    let inv = svc.create_invite(b.id, "d@example.com").await.unwrap();
    assert!(matches!(svc.accept_invite(inv.id, d.id).await, Err(ReferralError::InvalidState(_))));
    assert!(repo.get_invite(inv.id).await.unwrap().unwrap().is_pending());
    assert_eq!(points(&svc, b.id).await, 0);
    assert_eq!(svc.get_upline(d.id).await.unwrap().iter().map(|u| u.id).collect::<Vec<_>>(), vec![a.id]);

    // the invite from the user d signed up under still works
    let own = svc.create_invite(a.id, "d@example.com").await.unwrap();
    svc.accept_invite(own.id, d.id).await.unwrap();
    assert_eq!(points(&svc, a.id).await, 1000);
}

#[tokio::test]
async fn root_acceptor_joins_the_recruiters_tree() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let e = root(&svc, "e").await;
    let f = recruit(&svc, &e, "f").await;

    let inv = svc.create_invite(a.id, "e@example.com").await.unwrap();
    svc.accept_invite(inv.id, e.id).await.unwrap();

    let joined = svc.get_user(e.id).await.unwrap();
    assert_eq!(joined.parent_id, Some(a.id));
    assert_eq!(joined.role, Role::Recruited);
    assert_eq!(points(&svc, a.id).await, 1000);

    // e brings its own recruits along
    let down: Vec<Uuid> = svc.get_downline(a.id).await.unwrap().into_iter().map(|x| x.user.id).collect();
    assert_eq!(down, vec![e.id, f.id]);
    assert_eq!(svc.get_upline(f.id).await.unwrap().iter().map(|u| u.id).collect::<Vec<_>>(), vec![a.id, e.id]);
    assert_eq!(svc.get_recruit_counts(a.id).await.unwrap(), RecruitCounts { direct: 1, total: 2 });
    let board = svc.get_leaderboard(None).await.unwrap();
    let entry = board.iter().find(|r| r.user.id == a.id).unwrap();
    assert_eq!((entry.direct_recruit_count, entry.total_recruit_count), (1, 2));

    // admins stay outside the forest
    let ops = admin(&repo).await;
    let second = svc.create_invite(a.id, "ops@example.com").await.unwrap();
    assert!(matches!(svc.accept_invite(second.id, ops.id).await, Err(ReferralError::InvalidInput(_))));
    assert_eq!(svc.get_user(ops.id).await.unwrap().parent_id, None);
}

#[tokio::test]
async fn registration_and_invite_validation() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let r = root(&svc, "r").await;
    assert_eq!(r.referral_code.len(), 8);
    assert_eq!(r.role, Role::Recruiter);

    let unknown = RegisterUserInput { display_name: None, referral_code: Some("ZZZZZZZZ".into()) };
    assert!(matches!(svc.register_user(unknown).await, Err(ReferralError::NotFound(_))));
    let malformed = RegisterUserInput { display_name: None, referral_code: Some("AB-12".into()) };
    assert!(matches!(svc.register_user(malformed).await, Err(ReferralError::InvalidInput(_))));
    let too_long = RegisterUserInput { display_name: Some("x".repeat(200)), referral_code: None };
    assert!(matches!(svc.register_user(too_long).await, Err(ReferralError::InvalidInput(_))));

    assert_eq!(svc.resolve_referral_code(&format!(" {} ", r.referral_code.to_lowercase())).await.unwrap().id, r.id);
    assert_eq!(
        svc.referral_link(r.id, "https://ref.example/").await.unwrap(),
        format!("https://ref.example/join/{}", r.referral_code)
    );

    assert!(matches!(svc.create_invite(r.id, "not-an-email").await, Err(ReferralError::InvalidInput(_))));
    assert!(matches!(svc.create_invite(Uuid::new_v4(), "a@b.io").await, Err(ReferralError::NotFound(_))));
    let inv = svc.create_invite(r.id, " New@Example.com ").await.unwrap();
    assert_eq!(inv.invite_email, "new@example.com");
    assert_eq!(inv.status, InviteStatus::Pending);
    assert_eq!(svc.list_invites(r.id).await.unwrap().len(), 1);
    assert!(matches!(svc.distribute_points(inv.id).await, Err(ReferralError::InvalidState(_))));
}

#[tokio::test]
async fn listings_for_admin_views() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = service(repo.clone());
    let a = root(&svc, "a").await;
    let b = recruit(&svc, &a, "b").await;
    let _c = recruit(&svc, &b, "c").await;
    let _z = root(&svc, "z").await;

    assert_eq!(svc.list_recruiters().await.unwrap().len(), 2);
    let direct = svc.list_direct_recruits(a.id).await.unwrap();
    assert_eq!(direct.iter().map(|u| u.id).collect::<Vec<_>>(), vec![b.id]);
    let layers = svc.get_layers(a.id).await.unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0].members[0].child_count, 1);
    let nested = svc.get_downline_tree(a.id).await.unwrap();
    assert_eq!(nested[0].children.len(), 1);
}

#[tokio::test]
async fn concurrent_accepts_succeed_exactly_once() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = Arc::new(service(repo.clone()));
    let r = root(&svc, "r").await;
    let inv = svc.create_invite(r.id, "race@example.com").await.unwrap();
    let mut contenders = Vec::new();
    for i in 0..8 {
        contenders.push(root(&svc, &format!("c{i}")).await);
    }

    let invite_id = inv.id;
    let mut handles = Vec::new();
    for c in contenders {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move { svc.accept_invite(invite_id, c.id).await }));
    }
    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert!(matches!(e, ReferralError::InvalidState(_)), "unexpected {e:?}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(points(&svc, r.id).await, 1000);
    assert_eq!(repo.ledger().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_chains_into_one_root_lose_no_points() {
    let repo = Arc::new(MemoryReferralRepository::new());
    let svc = Arc::new(service(repo.clone()));
    let r = root(&svc, "r").await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let svc = svc.clone();
        let r = r.clone();
        handles.push(tokio::spawn(async move { recruit(&svc, &r, &format!("k{i}")).await }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(points(&svc, r.id).await, 20 * 1000);
}

/// Delegates to the memory store but fails awards for selected users.
struct FlakyRepository {
    inner: MemoryReferralRepository,
    failing: Mutex<HashSet<Uuid>>,
}

impl FlakyRepository {
    fn fail_awards_for(&self, user_id: Uuid, fail: bool) {
        let mut f = self.failing.lock().unwrap();
        if fail {
            f.insert(user_id);
        } else {
            f.remove(&user_id);
        }
    }
}

#[async_trait]
impl ReferralRepository for FlakyRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ReferralError> { self.inner.get_user(id).await }
    async fn find_user_by_code(&self, code: &str) -> Result<Option<User>, ReferralError> { self.inner.find_user_by_code(code).await }
    async fn insert_user(&self, new_user: NewUser) -> Result<User, ReferralError> { self.inner.insert_user(new_user).await }
    async fn list_children(&self, parent_ids: &[Uuid]) -> Result<Vec<User>, ReferralError> { self.inner.list_children(parent_ids).await }
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, ReferralError> { self.inner.list_users_by_role(role).await }
    async fn top_users_by_points(&self, limit: u64) -> Result<Vec<User>, ReferralError> { self.inner.top_users_by_points(limit).await }
    async fn detach_as_root(&self, user_id: Uuid) -> Result<Option<User>, ReferralError> { self.inner.detach_as_root(user_id).await }
    async fn insert_invite(&self, recruiter_id: Uuid, email: &str) -> Result<Invite, ReferralError> { self.inner.insert_invite(recruiter_id, email).await }
    async fn get_invite(&self, id: Uuid) -> Result<Option<Invite>, ReferralError> { self.inner.get_invite(id).await }
    async fn list_invites_by_recruiter(&self, recruiter_id: Uuid) -> Result<Vec<Invite>, ReferralError> { self.inner.list_invites_by_recruiter(recruiter_id).await }
    async fn accept_invite_if_pending(&self, invite_id: Uuid, recruit_id: Uuid, attach_to: Option<Uuid>) -> Result<Option<Invite>, ReferralError> {
        self.inner.accept_invite_if_pending(invite_id, recruit_id, attach_to).await
    }
    async fn find_accepted_invite_for_recruit(&self, recruit_id: Uuid) -> Result<Option<Invite>, ReferralError> {
        self.inner.find_accepted_invite_for_recruit(recruit_id).await
    }
    async fn award_points(&self, award: &PointsAward) -> Result<AwardOutcome, ReferralError> {
        if self.failing.lock().unwrap().contains(&award.user_id) {
            return Err(ReferralError::Repository("connection reset".into()));
        }
        self.inner.award_points(award).await
    }
    async fn list_points_transactions(&self, user_id: Uuid, page: Pagination) -> Result<Vec<PointsTransaction>, ReferralError> {
        self.inner.list_points_transactions(user_id, page).await
    }
}

#[tokio::test]
async fn failed_level_is_reported_and_replayed_idempotently() {
    let repo = Arc::new(FlakyRepository { inner: MemoryReferralRepository::new(), failing: Mutex::new(HashSet::new()) });
    let svc = ReferralService::new(repo.clone(), configs::ReferralConfig::default());
    let ops = repo
        .insert_user(NewUser { display_name: None, referral_code: "ADMIN0001".into(), parent_id: None, role: Role::Admin })
        .await
        .unwrap();
    let a = root(&svc, "a").await;
    let b = recruit(&svc, &a, "b").await;
    let c = recruit(&svc, &b, "c").await;
    let pts = |id| {
        let repo = repo.clone();
        async move { repo.get_user(id).await.unwrap().unwrap().points }
    };
    let (a0, b0, c0) = (pts(a.id).await, pts(b.id).await, pts(c.id).await);

    repo.fail_awards_for(b.id, true);
    let d = svc
        .register_user(RegisterUserInput { display_name: None, referral_code: Some(c.referral_code.clone()) })
        .await
        .unwrap();
    let inv = svc.create_invite(c.id, "d@example.com").await.unwrap();
    let err = svc.accept_invite(inv.id, d.id).await.unwrap_err();
    let ReferralError::PartialDistributionFailure(report) = err else { panic!("expected partial failure") };
    assert_eq!(report.succeeded_levels(), vec![1, 3]);
    assert_eq!(report.failed_levels(), vec![2]);
    assert_eq!(pts(c.id).await - c0, 1000);
    assert_eq!(pts(b.id).await - b0, 0);
    assert_eq!(pts(a.id).await - a0, 250);

    // accepted despite the failure; a retry of accept must not re-award
    assert!(matches!(svc.accept_invite(inv.id, d.id).await, Err(ReferralError::InvalidState(_))));

    // still failing: reconcile surfaces the same gap
    assert!(matches!(svc.reconcile_invite(ops.id, inv.id).await, Err(ReferralError::PartialDistributionFailure(_))));
    assert!(matches!(svc.reconcile_invite(a.id, inv.id).await, Err(ReferralError::Forbidden(_))));

    repo.fail_awards_for(b.id, false);
    let replay = svc.reconcile_invite(ops.id, inv.id).await.unwrap();
    assert!(replay.is_complete());
    assert_eq!(replay.total_awarded(), 500);
    assert_eq!(replay.levels[0].status, AwardStatus::AlreadyApplied);
    assert_eq!(replay.levels[1].status, AwardStatus::Applied);
    assert_eq!(pts(b.id).await - b0, 500);
    assert_eq!(pts(c.id).await - c0, 1000);

    // a further replay changes nothing
    assert_eq!(svc.reconcile_invite(ops.id, inv.id).await.unwrap().total_awarded(), 0);
}
