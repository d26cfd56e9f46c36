//! Bot wiring: recurring timers and end-to-end event routing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use guildhall::bot::Bot;
use guildhall::config::GuildhallConfig;
use guildhall::gateway::mock::RecordingChat;
use guildhall::gateway::{
    Caller, ChannelId, GatewayEvent, InteractionEvent, MessageEvent, MessageId, UserId,
    VoiceStateEvent,
};
use guildhall::scheduler::ResetWindow;

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn test_config() -> GuildhallConfig {
    let mut config = GuildhallConfig::default();
    config.influence.review_channel_id = "review".to_string();
    config.voice.lobby_channel_id = "lobby".to_string();
    config.voice.category_id = "voice-cat".to_string();
    config
}

fn message(author: &str, caller: Caller, content: &str) -> GatewayEvent {
    GatewayEvent::Message(MessageEvent {
        message_id: MessageId::from("m1"),
        channel: ChannelId::from("general"),
        author: UserId::from(author),
        author_is_bot: false,
        caller,
        content: content.to_string(),
        attachment_count: 0,
        first_attachment_url: None,
    })
}

#[tokio::test]
async fn construction_schedules_the_recurring_timers() {
    let chat = Arc::new(RecordingChat::new());
    let now = at("2025-06-15T17:00:00Z");
    let bot = Bot::new(chat, test_config(), now);

    // One refresh sweep plus the three calendar resets.
    assert_eq!(bot.timers().pending(), 4);
    // The refresh tick (5 minutes out) is the earliest deadline.
    assert_eq!(bot.timers().next_deadline(), Some(now + Duration::seconds(300)));
}

#[tokio::test]
async fn fired_recurring_timers_reschedule_themselves() {
    let chat = Arc::new(RecordingChat::new());
    let now = at("2025-06-15T17:00:00Z");
    let bot = Bot::new(chat.clone(), test_config(), now);

    let donor = UserId::from("donor");
    bot.influence().ledger().credit(&donor, 500);

    // Next midnight fires the daily reset and every elapsed refresh tick.
    let midnight = at("2025-06-16T00:00:00Z");
    bot.fire_due_timers(midnight).await;

    assert_eq!(
        bot.influence()
            .ledger()
            .window_amount(ResetWindow::Daily, &donor),
        0
    );
    assert_eq!(bot.influence().ledger().all_time(&donor), 500);

    // Both recurring tasks are queued again.
    assert_eq!(bot.timers().pending(), 4);
    assert_eq!(
        bot.timers().next_deadline(),
        Some(midnight + Duration::seconds(300))
    );
}

#[tokio::test]
async fn vote_command_round_trips_through_dispatch() {
    let chat = Arc::new(RecordingChat::new());
    let now = at("2025-06-01T12:00:00Z");
    let bot = Bot::new(chat.clone(), test_config(), now);

    bot.handle_event(
        &message(
            "admin",
            Caller::admin(),
            "!vote \"Meetup day\" 1d Saturday, Sunday",
        ),
        now,
    )
    .await;

    assert_eq!(bot.votes().store().len(), 1);
    let vote_id = bot.votes().store().ids().into_iter().next().unwrap();
    // The vote deadline joins the recurring timers.
    assert_eq!(bot.timers().pending(), 5);

    // A ballot arrives as a select-menu interaction.
    bot.handle_event(
        &GatewayEvent::Interaction(InteractionEvent {
            custom_id: format!("vote_pick_{vote_id}"),
            user: UserId::from("u1"),
            caller: Caller::default(),
            channel: ChannelId::from("general"),
            message: None,
            message_description: None,
            values: vec!["0".to_string()],
        }),
        now,
    )
    .await;

    let vote = bot.votes().store().get(&vote_id).unwrap();
    assert_eq!(vote.votes, vec![1, 0]);

    // The deadline closes it through the same queue.
    bot.fire_due_timers(now + Duration::days(1)).await;
    assert!(bot.votes().store().is_empty());
}

#[tokio::test]
async fn donation_handshake_round_trips_through_dispatch() {
    let chat = Arc::new(RecordingChat::new());
    let now = at("2025-06-01T12:00:00Z");
    let bot = Bot::new(chat.clone(), test_config(), now);

    bot.handle_event(
        &GatewayEvent::Interaction(InteractionEvent {
            custom_id: "influence_donate".to_string(),
            user: UserId::from("donor"),
            caller: Caller::default(),
            channel: ChannelId::from("lounge"),
            message: None,
            message_description: None,
            values: vec![],
        }),
        now,
    )
    .await;

    // The proof arrives as an ordinary unprefixed message.
    bot.handle_event(
        &GatewayEvent::Message(MessageEvent {
            message_id: MessageId::from("proof-1"),
            channel: ChannelId::from("lounge"),
            author: UserId::from("donor"),
            author_is_bot: false,
            caller: Caller::default(),
            content: "donating 500".to_string(),
            attachment_count: 1,
            first_attachment_url: Some("https://cdn.example/proof.png".to_string()),
        }),
        now + Duration::minutes(5),
    )
    .await;

    assert_eq!(bot.influence().ledger().all_time(&UserId::from("donor")), 500);
    assert!(chat.last_sent_in(&ChannelId::from("review")).is_some());
}

#[tokio::test]
async fn voice_state_events_reach_the_room_workflow() {
    let chat = Arc::new(RecordingChat::new());
    let now = at("2025-06-01T12:00:00Z");
    let bot = Bot::new(chat.clone(), test_config(), now);

    bot.handle_event(
        &GatewayEvent::VoiceState(VoiceStateEvent {
            user: UserId::from("alice"),
            old_channel: None,
            new_channel: Some(ChannelId::from("lobby")),
        }),
        now,
    )
    .await;

    assert_eq!(bot.voice().store().len(), 1);
    assert_eq!(chat.created_channels.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn bot_authored_messages_and_unknown_ids_are_ignored() {
    let chat = Arc::new(RecordingChat::new());
    let now = at("2025-06-01T12:00:00Z");
    let bot = Bot::new(chat.clone(), test_config(), now);

    let mut own_message = match message("bot", Caller::admin(), "!votestatus") {
        GatewayEvent::Message(m) => m,
        _ => unreachable!(),
    };
    own_message.author_is_bot = true;
    bot.handle_event(&GatewayEvent::Message(own_message), now).await;

    bot.handle_event(
        &GatewayEvent::Interaction(InteractionEvent {
            custom_id: "mystery_button".to_string(),
            user: UserId::from("u1"),
            caller: Caller::default(),
            channel: ChannelId::from("general"),
            message: None,
            message_description: None,
            values: vec![],
        }),
        now,
    )
    .await;

    assert!(chat.sent_messages().is_empty());
}

#[tokio::test]
async fn handler_failures_answer_with_an_apology() {
    let chat = Arc::new(RecordingChat::new());
    let now = at("2025-06-01T12:00:00Z");
    let bot = Bot::new(chat.clone(), test_config(), now);

    // The panel command propagates its send failure up to dispatch.
    chat.set_fail_sends(true);
    bot.handle_event(&message("admin", Caller::admin(), "!influence"), now)
        .await;
    chat.set_fail_sends(false);

    // The apology itself also failed while sends were down, so nothing
    // was recorded; the loop must simply have survived.
    assert!(chat.sent_messages().is_empty());
    bot.handle_event(&message("admin", Caller::admin(), "!votestatus"), now)
        .await;
    assert_eq!(chat.sent_messages().len(), 1);
}
