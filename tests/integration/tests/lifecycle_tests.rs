//! Channel sessions talking to a live server over WebSocket and HTTP

use club_core::{AccountId, DeleteRequestApi, DomainError, MessageType, VoteOutcome, VoteStatus};
use club_messaging::{ChannelEvent, ChannelSummary, LifecyclePhase};
use integration_tests::*;

#[tokio::test]
async fn test_two_members_exchange_chat() {
    let server = TestServer::start().await.unwrap();
    let channel = simple_channel();
    let channel_id = channel.id;
    server
        .seed_channel(channel.clone(), vec![chat_at(channel_id, BEN, 0)])
        .unwrap();

    let ana = server
        .messenger(viewer(ANA, "Ana"))
        .open(ChannelSummary::new(channel.clone()))
        .await
        .unwrap();
    let ben = server
        .messenger(viewer(BEN, "Ben"))
        .open(ChannelSummary::new(channel))
        .await
        .unwrap();
    assert_eq!(ana.phase(), LifecyclePhase::Ready);
    assert_eq!(ana.view().messages.len(), 1);
    settle().await;

    let mut ben_events = ben.subscribe();
    ana.send_chat("see you at practice", vec![]).unwrap();

    let received = next_event(&mut ben_events, |e| {
        matches!(e, ChannelEvent::MessageReceived(m) if m.message_type == MessageType::Chat)
    })
    .await
    .unwrap();
    let ChannelEvent::MessageReceived(message) = received else {
        unreachable!()
    };
    assert_eq!(message.sender_id, AccountId::new(ANA));
    assert_eq!(message.message_content, "see you at practice");

    eventually(|| ana.view().messages.len() == 2).await.unwrap();
    let view = ana.view();
    assert!(view.messages[1].is_own);
    assert_eq!(stored(&server, channel_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_block_applies_to_both_members() {
    let server = TestServer::start().await.unwrap();
    let channel = simple_channel();
    let channel_id = channel.id;
    server.seed_channel(channel.clone(), vec![]).unwrap();

    let ana = server
        .messenger(viewer(ANA, "Ana"))
        .open(ChannelSummary::new(channel.clone()))
        .await
        .unwrap();
    let ben = server
        .messenger(viewer(BEN, "Ben"))
        .open(ChannelSummary::new(channel))
        .await
        .unwrap();
    settle().await;

    ana.block().unwrap();
    eventually(|| ana.view().blocked && ben.view().blocked)
        .await
        .unwrap();

    let ana_view = ana.view();
    assert!(ana_view.can_unblock);
    assert_eq!(ana_view.messages[0].text, "You blocked Ben");
    let ben_view = ben.view();
    assert!(!ben_view.can_unblock);
    assert!(!ben_view.composer_enabled);
    assert_eq!(ben_view.messages[0].text, "Ana blocked you");

    assert_eq!(
        ben.send_chat("hello?", vec![]),
        Err(DomainError::ChannelBlocked(channel_id))
    );
    assert_eq!(ben.unblock(), Err(DomainError::NotBlocker));

    ana.unblock().unwrap();
    eventually(|| !ana.view().blocked && !ben.view().blocked)
        .await
        .unwrap();
    ben.send_chat("hello again", vec![]).unwrap();
    eventually(|| ana.view().messages.len() == 3).await.unwrap();
}

#[tokio::test]
async fn test_delete_proposal_reaches_peer_and_deletes_on_approval() {
    let server = TestServer::start().await.unwrap();
    let channel = simple_channel();
    let channel_id = channel.id;
    server
        .seed_channel(channel.clone(), vec![chat_at(channel_id, ANA, 0)])
        .unwrap();

    let ana = server
        .messenger(viewer(ANA, "Ana"))
        .open(ChannelSummary::new(channel.clone()))
        .await
        .unwrap();
    let ben = server
        .messenger(viewer(BEN, "Ben"))
        .open(ChannelSummary::new(channel))
        .await
        .unwrap();
    settle().await;
    assert!(ana.view().can_request_delete);

    let request = ana.request_delete().await.unwrap();
    assert!(ana.view().can_cancel_delete);

    // The DELETE narration makes Ben's session pick up the pending ballot
    eventually(|| ben.view().delete_request.is_some())
        .await
        .unwrap();
    let ben_view = ben.view();
    assert!(ben_view.can_vote);
    assert_eq!(
        ben_view.delete_request.map(|r| r.delete_request_id),
        Some(request.delete_request_id)
    );

    let mut ana_events = ana.subscribe();
    let mut ben_events = ben.subscribe();
    let outcome = ben.vote(VoteStatus::Approved).await.unwrap();
    assert_eq!(outcome, Some(VoteOutcome::ChannelDeleted));
    next_event(&mut ben_events, |e| matches!(e, ChannelEvent::Redirect))
        .await
        .unwrap();
    assert!(ben.is_closed());
    assert!(!server.store().contains(channel_id));

    // The creator's open view is told over its live stream
    next_event(&mut ana_events, |e| matches!(e, ChannelEvent::Redirect))
        .await
        .unwrap();
    eventually(|| ana.is_closed()).await.unwrap();
    assert!(!ana.connection_status().failed);
    assert!(ana.view().delete_request.is_none());

    // A resolved ballot no longer accepts votes
    let late = server
        .delete_request_api()
        .vote(request.delete_request_id, channel_id, AccountId::new(ANA), VoteStatus::Denied)
        .await;
    assert_eq!(late, Err(DomainError::StaleVote(request.delete_request_id)));
}

#[tokio::test]
async fn test_creator_cancel_clears_peer_ballot() {
    let server = TestServer::start().await.unwrap();
    let channel = group_channel(2, 1);
    let channel_id = channel.id;
    server.seed_channel(channel.clone(), vec![]).unwrap();

    let admin = server
        .messenger(viewer(1, "User1"))
        .open(ChannelSummary::new(channel.clone()))
        .await
        .unwrap();
    let other_admin = server
        .messenger(viewer(2, "User2"))
        .open(ChannelSummary::new(channel.clone()))
        .await
        .unwrap();
    let member = server
        .messenger(viewer(3, "User3"))
        .open(ChannelSummary::new(channel))
        .await
        .unwrap();
    settle().await;

    assert!(!member.view().can_request_delete);
    assert_eq!(member.block(), Err(DomainError::BlockingUnsupported(channel_id)));

    admin.request_delete().await.unwrap();
    eventually(|| other_admin.view().can_vote).await.unwrap();

    let outcome = admin.cancel_delete().await.unwrap();
    assert_eq!(
        outcome,
        Some(VoteOutcome::RequestDenied { by_creator: true })
    );
    eventually(|| other_admin.view().delete_request.is_none())
        .await
        .unwrap();
    assert!(server
        .delete_request_api()
        .find_active(channel_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_open_unknown_channel_reports_connection_and_fetch_failure() {
    let server = TestServer::start().await.unwrap();
    // Never registered with the server
    let channel = simple_channel();

    let session = server
        .messenger(viewer(ANA, "Ana"))
        .open(ChannelSummary::new(channel))
        .await
        .unwrap();
    let view = session.view();
    assert!(view.connection_failed);
    assert!(view.fetch_error.is_some());
    assert!(!view.has_more);
    assert!(view.messages.is_empty());
}
