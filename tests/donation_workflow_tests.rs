//! Donation handshake, review decisions, and ledger window behavior.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use guildhall::config::InfluenceConfig;
use guildhall::gateway::mock::RecordingChat;
use guildhall::gateway::{
    Caller, ChannelId, InteractionEvent, MessageEvent, MessageId, UserId,
};
use guildhall::influence::{InfluenceLedger, InfluenceWorkflow, PendingDonation, ReviewEntry};
use guildhall::scheduler::ResetWindow;
use guildhall::store::EntityStore;

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn workflow(chat: Arc<RecordingChat>) -> InfluenceWorkflow {
    workflow_with_config(
        chat,
        InfluenceConfig {
            review_channel_id: "review".to_string(),
            admin_role_id: None,
            eligible_role_id: None,
        },
    )
}

fn workflow_with_config(chat: Arc<RecordingChat>, config: InfluenceConfig) -> InfluenceWorkflow {
    InfluenceWorkflow::new(
        chat,
        Arc::new(InfluenceLedger::new()),
        Arc::new(EntityStore::<PendingDonation>::new()),
        Arc::new(EntityStore::<ReviewEntry>::new()),
        config,
    )
}

fn panel_press(user: &str, action: &str) -> InteractionEvent {
    InteractionEvent {
        custom_id: format!("influence_{action}"),
        user: UserId::from(user),
        caller: Caller::default(),
        channel: ChannelId::from("lounge"),
        message: None,
        message_description: None,
        values: vec![],
    }
}

fn donate_press(user: &str) -> InteractionEvent {
    panel_press(user, "donate")
}

fn proof_message(user: &str, content: &str, attachments: usize) -> MessageEvent {
    MessageEvent {
        message_id: MessageId::from("proof-1"),
        channel: ChannelId::from("lounge"),
        author: UserId::from(user),
        author_is_bot: false,
        caller: Caller::default(),
        content: content.to_string(),
        attachment_count: attachments,
        first_attachment_url: (attachments > 0).then(|| "https://cdn.example/proof.png".to_string()),
    }
}

fn decision_press(action: &str, review_message: &MessageId, admin: bool) -> InteractionEvent {
    InteractionEvent {
        custom_id: format!("influence_{action}"),
        user: UserId::from("mod"),
        caller: if admin { Caller::admin() } else { Caller::default() },
        channel: ChannelId::from("review"),
        message: Some(review_message.clone()),
        message_description: None,
        values: vec![],
    }
}

/// Runs the full donate-press / proof-message handshake and returns the
/// review message ID.
async fn submit_donation(
    workflow: &InfluenceWorkflow,
    chat: &RecordingChat,
    user: &str,
    content: &str,
    now: DateTime<Utc>,
) -> MessageId {
    workflow
        .handle_interaction(&donate_press(user), "donate", now)
        .await
        .unwrap();
    workflow
        .handle_plain_message(&proof_message(user, content, 1), now)
        .await
        .unwrap();
    chat.last_sent_in(&ChannelId::from("review"))
        .unwrap()
        .message_id
}

#[tokio::test(start_paused = true)]
async fn submission_credits_all_four_windows_before_approval() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");

    submit_donation(&workflow, &chat, "donor", "donating 500", now).await;

    let donor = UserId::from("donor");
    assert_eq!(workflow.ledger().all_time(&donor), 500);
    for window in [ResetWindow::Daily, ResetWindow::Weekly, ResetWindow::Monthly] {
        assert_eq!(workflow.ledger().window_amount(window, &donor), 500);
    }

    // The proof message is swept away after a short delay.
    assert!(chat.deleted_messages.lock().unwrap().is_empty());
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    assert_eq!(chat.deleted_messages.lock().unwrap().len(), 1);

    let (dm_user, receipt) = chat.last_dm().unwrap();
    assert_eq!(dm_user, donor);
    assert!(receipt.content.as_deref().unwrap().contains("500"));
}

#[tokio::test]
async fn amount_is_the_first_digit_run_in_the_message() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");

    submit_donation(&workflow, &chat, "donor", "room 204, paid 50", now).await;

    assert_eq!(workflow.ledger().all_time(&UserId::from("donor")), 204);
}

#[tokio::test]
async fn messages_without_proof_or_digits_are_ignored() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");

    workflow
        .handle_interaction(&donate_press("donor"), "donate", now)
        .await
        .unwrap();

    // Digits but no attachment.
    workflow
        .handle_plain_message(&proof_message("donor", "500", 0), now)
        .await
        .unwrap();
    // Attachment but no digits.
    workflow
        .handle_plain_message(&proof_message("donor", "here it is", 1), now)
        .await
        .unwrap();

    assert_eq!(workflow.ledger().all_time(&UserId::from("donor")), 0);
    assert!(chat.last_sent_in(&ChannelId::from("review")).is_none());
}

#[tokio::test]
async fn pending_record_lapses_after_thirty_minutes() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let pressed = at("2025-06-01T12:00:00Z");

    workflow
        .handle_interaction(&donate_press("donor"), "donate", pressed)
        .await
        .unwrap();

    let late = pressed + Duration::minutes(30) + Duration::seconds(1);
    workflow
        .handle_plain_message(&proof_message("donor", "donating 500", 1), late)
        .await
        .unwrap();

    assert_eq!(workflow.ledger().all_time(&UserId::from("donor")), 0);

    // The lapsed record is gone, so a repeat message is equally ignored.
    workflow
        .handle_plain_message(&proof_message("donor", "donating 500", 1), late)
        .await
        .unwrap();
    assert!(chat.last_sent_in(&ChannelId::from("review")).is_none());
}

#[tokio::test]
async fn approval_settles_the_review_without_touching_the_ledger() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");
    let review = submit_donation(&workflow, &chat, "donor", "300", now).await;

    workflow
        .handle_interaction(&decision_press("approve", &review, true), "approve", now)
        .await
        .unwrap();

    assert_eq!(workflow.ledger().all_time(&UserId::from("donor")), 300);

    let edit = chat.last_edit().unwrap();
    assert_eq!(edit.message_id, review);
    assert_eq!(
        edit.payload.embeds[0].title.as_deref(),
        Some("✅ Donation approved")
    );
    for row in &edit.payload.components {
        for component in &row.components {
            assert!(component.is_disabled());
        }
    }
}

#[tokio::test]
async fn rejection_floors_periodic_windows_but_not_all_time() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");
    let donor = UserId::from("donor");

    // An older approved donation survives only in the all-time window.
    workflow.ledger().credit(&donor, 1000);
    workflow.reset_window(ResetWindow::Daily);

    let review = submit_donation(&workflow, &chat, "donor", "300", now).await;
    assert_eq!(workflow.ledger().all_time(&donor), 1300);
    assert_eq!(
        workflow.ledger().window_amount(ResetWindow::Daily, &donor),
        300
    );

    workflow
        .handle_interaction(&decision_press("reject", &review, true), "reject", now)
        .await
        .unwrap();

    assert_eq!(workflow.ledger().all_time(&donor), 1000);
    assert_eq!(
        workflow.ledger().window_amount(ResetWindow::Daily, &donor),
        0
    );

    let (dm_user, notice) = chat.last_dm().unwrap();
    assert_eq!(dm_user, donor);
    assert!(notice.content.as_deref().unwrap().contains("rejected"));
}

#[tokio::test]
async fn second_decision_on_a_settled_review_is_a_silent_no_op() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");
    let review = submit_donation(&workflow, &chat, "donor", "300", now).await;

    workflow
        .handle_interaction(&decision_press("approve", &review, true), "approve", now)
        .await
        .unwrap();
    let sends_after_first = chat.sent_messages().len();

    // A reject press on the already-approved review must not rescind.
    workflow
        .handle_interaction(&decision_press("reject", &review, true), "reject", now)
        .await
        .unwrap();

    assert_eq!(workflow.ledger().all_time(&UserId::from("donor")), 300);
    assert_eq!(chat.sent_messages().len(), sends_after_first);
}

#[tokio::test]
async fn legacy_reviews_resolve_from_the_rendered_description() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");
    let donor = UserId::from("31415");
    workflow.ledger().credit(&donor, 400);

    // A review message with no side-table entry, as after a restart.
    let mut press = decision_press("reject", &MessageId::from("old-review"), true);
    press.message_description = Some("<@31415> donated **400** influence!".to_string());

    workflow
        .handle_interaction(&press, "reject", now)
        .await
        .unwrap();

    assert_eq!(workflow.ledger().all_time(&donor), 0);
}

#[tokio::test]
async fn non_admin_decisions_are_refused() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let now = at("2025-06-01T12:00:00Z");
    let review = submit_donation(&workflow, &chat, "donor", "300", now).await;

    workflow
        .handle_interaction(&decision_press("reject", &review, false), "reject", now)
        .await
        .unwrap();

    assert_eq!(workflow.ledger().all_time(&UserId::from("donor")), 300);
    let refusal = chat.last_sent().unwrap();
    assert!(refusal.payload.ephemeral);
    assert!(refusal
        .payload
        .content
        .as_deref()
        .unwrap()
        .contains("Administrator"));
}

#[tokio::test]
async fn rescinding_more_than_the_all_time_total_is_refused() {
    let ledger = InfluenceLedger::new();
    let donor = UserId::from("donor");
    ledger.credit(&donor, 100);

    assert!(!ledger.rescind(&donor, 250));
    assert_eq!(ledger.all_time(&donor), 100);
}

fn eligible_config() -> InfluenceConfig {
    InfluenceConfig {
        review_channel_id: "review".to_string(),
        admin_role_id: None,
        eligible_role_id: Some("clan".to_string()),
    }
}

fn clan_member(id: &str, name: &str) -> guildhall::gateway::Member {
    guildhall::gateway::Member {
        id: UserId::from(id),
        display_name: name.to_string(),
    }
}

#[tokio::test]
async fn details_counts_expected_donors_against_the_ledger() {
    let chat = Arc::new(RecordingChat::new());
    chat.set_role_members(
        guildhall::gateway::RoleId::from("clan"),
        vec![
            clan_member("a1", "Alice"),
            clan_member("b2", "Bob"),
            clan_member("c3", "Cara"),
        ],
    );
    let workflow = workflow_with_config(Arc::clone(&chat), eligible_config());
    workflow.ledger().credit(&UserId::from("a1"), 100);

    workflow
        .handle_interaction(&panel_press("viewer", "details"), "details", at("2025-06-01T12:00:00Z"))
        .await
        .unwrap();

    let details = chat.last_sent().unwrap();
    let embed = &details.payload.embeds[0];
    let field = |name: &str| {
        embed
            .fields
            .iter()
            .find(|f| f.name.contains(name))
            .map(|f| f.value.clone())
    };
    assert_eq!(field("Expected donors"), Some("3".to_string()));
    assert!(field("Not yet donated").unwrap().contains("2 member(s)"));

    let ids: Vec<&str> = details
        .payload
        .components
        .iter()
        .flat_map(|row| row.components.iter().map(|c| c.custom_id()))
        .collect();
    assert_eq!(ids, vec!["influence_download"]);
}

#[tokio::test]
async fn details_without_a_configured_role_omits_coverage() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));

    workflow
        .handle_interaction(&panel_press("viewer", "details"), "details", at("2025-06-01T12:00:00Z"))
        .await
        .unwrap();

    let details = chat.last_sent().unwrap();
    let embed = &details.payload.embeds[0];
    assert!(!embed.fields.iter().any(|f| f.name.contains("Expected donors")));
    assert!(details.payload.components.is_empty());
}

#[tokio::test]
async fn download_lists_only_members_who_have_not_donated() {
    let chat = Arc::new(RecordingChat::new());
    chat.set_role_members(
        guildhall::gateway::RoleId::from("clan"),
        vec![
            clan_member("a1", "Alice"),
            clan_member("b2", "Bob"),
            clan_member("c3", "Cara"),
        ],
    );
    let workflow = workflow_with_config(Arc::clone(&chat), eligible_config());
    workflow.ledger().credit(&UserId::from("a1"), 100);

    workflow
        .handle_interaction(&panel_press("viewer", "download"), "download", at("2025-06-01T12:00:00Z"))
        .await
        .unwrap();

    let listing = chat.last_sent().unwrap();
    assert!(listing.payload.ephemeral);
    let content = listing.payload.content.as_deref().unwrap();
    assert!(content.contains("Bob (ID: b2)"));
    assert!(content.contains("Cara (ID: c3)"));
    assert!(!content.contains("Alice"));

    // Once the last holdouts donate, the listing turns into an all-clear.
    workflow.ledger().credit(&UserId::from("b2"), 1);
    workflow.ledger().credit(&UserId::from("c3"), 1);
    workflow
        .handle_interaction(&panel_press("viewer", "download"), "download", at("2025-06-01T12:05:00Z"))
        .await
        .unwrap();
    let all_clear = chat.last_sent().unwrap();
    assert!(all_clear
        .payload
        .content
        .as_deref()
        .unwrap()
        .contains("Every expected donor"));
}

#[tokio::test]
async fn calendar_reset_clears_one_window_only() {
    let chat = Arc::new(RecordingChat::new());
    let workflow = workflow(Arc::clone(&chat));
    let donor = UserId::from("donor");
    workflow.ledger().credit(&donor, 700);

    workflow.reset_window(ResetWindow::Weekly);

    assert_eq!(workflow.ledger().all_time(&donor), 700);
    assert_eq!(
        workflow.ledger().window_amount(ResetWindow::Daily, &donor),
        700
    );
    assert_eq!(
        workflow.ledger().window_amount(ResetWindow::Weekly, &donor),
        0
    );
}
