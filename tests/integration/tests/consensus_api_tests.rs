//! Delete-request consensus and history endpoints, driven through the HTTP clients

use chrono::Duration;
use club_consensus::handlers::health::HealthResponse;
use club_consensus::LiveEvent;
use club_core::{
    AccountId, ChannelType, DeleteRequestApi, DomainError, HistoryApi, MessageType, SystemEvent,
    SystemEventKind, VoteOutcome, VoteStatus,
};
use integration_tests::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.unwrap();

    let response = server.get("/health").await.unwrap();
    let health: HealthResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn test_group_deleted_after_all_admins_approve() {
    let server = TestServer::start().await.unwrap();
    let channel = group_channel(3, 2);
    let channel_id = channel.id;
    server
        .seed_channel(channel, vec![chat_at(channel_id, 4, 0)])
        .unwrap();
    let api = server.delete_request_api();

    let request = api
        .create(channel_id, AccountId::new(1), ChannelType::Group)
        .await
        .unwrap();
    assert_eq!(request.voters.len(), 3);
    assert_eq!(request.status_of(AccountId::new(1)), Some(VoteStatus::Approved));
    assert_eq!(request.pending_count(), 2);

    let first = api
        .vote(request.delete_request_id, channel_id, AccountId::new(2), VoteStatus::Approved)
        .await
        .unwrap();
    assert_eq!(first, VoteOutcome::VoteRecorded);

    let active = api.find_active(channel_id).await.unwrap().unwrap();
    assert_eq!(active.status_of(AccountId::new(2)), Some(VoteStatus::Approved));

    let second = api
        .vote(request.delete_request_id, channel_id, AccountId::new(3), VoteStatus::Approved)
        .await
        .unwrap();
    assert_eq!(second, VoteOutcome::ChannelDeleted);

    let history = server.history_api();
    let gone = history.fetch_messages(channel_id, None, 20).await;
    assert_eq!(gone, Err(DomainError::ChannelNotFound(channel_id)));
    assert!(!server.store().contains(channel_id));
}

#[tokio::test]
async fn test_denial_resolves_and_later_votes_are_stale() {
    let server = TestServer::start().await.unwrap();
    let channel = group_channel(3, 0);
    let channel_id = channel.id;
    server.seed_channel(channel, vec![]).unwrap();
    let api = server.delete_request_api();
    let mut narrations = server.state.publisher().subscribe();

    let request = api
        .create(channel_id, AccountId::new(1), ChannelType::Group)
        .await
        .unwrap();
    let denied = api
        .vote(request.delete_request_id, channel_id, AccountId::new(2), VoteStatus::Denied)
        .await
        .unwrap();
    assert_eq!(denied, VoteOutcome::RequestDenied { by_creator: false });
    assert_eq!(api.find_active(channel_id).await.unwrap(), None);

    let late = api
        .vote(request.delete_request_id, channel_id, AccountId::new(3), VoteStatus::Approved)
        .await;
    assert_eq!(late, Err(DomainError::StaleVote(request.delete_request_id)));

    // Requested, then denied
    let kinds: Vec<SystemEventKind> = (0..2)
        .map(|_| narrations.try_recv().unwrap())
        .map(|event| match event {
            LiveEvent::Message(m) => {
                assert_eq!(m.message_type, MessageType::Delete);
                SystemEvent::from_message(&m).unwrap().kind()
            }
            other => panic!("expected a narration, got {other:?}"),
        })
        .collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.iter().all(|k| *k == SystemEventKind::Delete));
    // A denial never tells live streams the channel is gone
    assert!(narrations.try_recv().is_err());
    assert!(server.store().contains(channel_id));
}

#[tokio::test]
async fn test_simple_creator_cancels() {
    let server = TestServer::start().await.unwrap();
    let channel = simple_channel();
    let channel_id = channel.id;
    server.seed_channel(channel, vec![]).unwrap();
    let api = server.delete_request_api();

    let request = api
        .create(channel_id, AccountId::new(ANA), ChannelType::Simple)
        .await
        .unwrap();
    assert_eq!(request.voters.len(), 2);

    let cancelled = api
        .vote(request.delete_request_id, channel_id, AccountId::new(ANA), VoteStatus::Denied)
        .await
        .unwrap();
    assert_eq!(cancelled, VoteOutcome::RequestDenied { by_creator: true });

    let late = api
        .vote(request.delete_request_id, channel_id, AccountId::new(BEN), VoteStatus::Approved)
        .await;
    assert_eq!(late, Err(DomainError::StaleVote(request.delete_request_id)));
}

#[tokio::test]
async fn test_second_request_while_pending_is_rejected() {
    let server = TestServer::start().await.unwrap();
    let channel = simple_channel();
    let channel_id = channel.id;
    server.seed_channel(channel, vec![]).unwrap();
    let api = server.delete_request_api();

    api.create(channel_id, AccountId::new(ANA), ChannelType::Simple)
        .await
        .unwrap();
    let again = api
        .create(channel_id, AccountId::new(BEN), ChannelType::Simple)
        .await;
    assert_eq!(again, Err(DomainError::DeleteRequestExists(channel_id)));
}

#[tokio::test]
async fn test_group_member_cannot_open_request() {
    let server = TestServer::start().await.unwrap();
    let channel = group_channel(2, 2);
    let channel_id = channel.id;
    server.seed_channel(channel, vec![]).unwrap();
    let api = server.delete_request_api();

    let result = api
        .create(channel_id, AccountId::new(4), ChannelType::Group)
        .await;
    assert_eq!(
        result,
        Err(DomainError::NotEligibleVoter {
            account_id: AccountId::new(4)
        })
    );
    assert_eq!(api.find_active(channel_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_lone_admin_has_no_one_to_ask() {
    let server = TestServer::start().await.unwrap();
    let channel = group_channel(1, 3);
    let channel_id = channel.id;
    server.seed_channel(channel, vec![]).unwrap();

    let result = server
        .delete_request_api()
        .create(channel_id, AccountId::new(1), ChannelType::Group)
        .await;
    assert_eq!(result, Err(DomainError::NoEligibleVoters(channel_id)));
}

#[tokio::test]
async fn test_history_pages_walk_backwards() {
    let server = TestServer::start().await.unwrap();
    let channel = simple_channel();
    let channel_id = channel.id;
    let history: Vec<_> = (0..25)
        .map(|minute| chat_at(channel_id, if minute % 2 == 0 { ANA } else { BEN }, minute))
        .collect();
    server.seed_channel(channel, history).unwrap();
    let api = server.history_api();

    let newest = api.fetch_messages(channel_id, None, 10).await.unwrap();
    assert_eq!(newest.len(), 10);
    assert_eq!(newest[0].sent_at, epoch() + Duration::minutes(24));
    assert!(newest.windows(2).all(|w| w[0].sent_at > w[1].sent_at));

    let cursor = newest.last().unwrap().sent_at;
    let older = api.fetch_messages(channel_id, Some(cursor), 10).await.unwrap();
    assert_eq!(older[0].sent_at, epoch() + Duration::minutes(14));

    let oldest = api
        .fetch_messages(channel_id, Some(older.last().unwrap().sent_at), 10)
        .await
        .unwrap();
    assert_eq!(oldest.len(), 5);
    assert_eq!(oldest.last().unwrap().sent_at, epoch());
}

#[tokio::test]
async fn test_history_rejects_oversized_page() {
    let server = TestServer::start().await.unwrap();
    let channel = simple_channel();
    let channel_id = channel.id;
    server.seed_channel(channel, vec![]).unwrap();

    let response = server
        .get(&format!("/channel/{channel_id}/messages?limit=500"))
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

#[tokio::test]
async fn test_mark_read() {
    let server = TestServer::start().await.unwrap();
    let mut channel = simple_channel();
    channel.read = false;
    let channel_id = channel.id;
    server.seed_channel(channel, vec![]).unwrap();

    server
        .history_api()
        .mark_read(channel_id, AccountId::new(BEN))
        .await
        .unwrap();
    assert!(server.store().is_read(channel_id, AccountId::new(BEN)).unwrap());
    assert!(!server.store().is_read(channel_id, AccountId::new(ANA)).unwrap());
}
