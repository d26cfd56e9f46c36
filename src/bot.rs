//! Event dispatch and timer firing.
//!
//! `Bot` owns the three workflows and the shared timer queue. Inbound
//! gateway events and due timers both funnel through here; a handler
//! error is caught at this level and answered with a generic apology so
//! one bad event never takes the loop down.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::GuildhallConfig;
use crate::gateway::{ChatOps, GatewayEvent, MessageEvent, OutboundMessage};
use crate::influence::{InfluenceLedger, InfluenceWorkflow, PendingDonation, ReviewEntry};
use crate::router::{parse_command, parse_interaction, Command, Feature};
use crate::scheduler::{next_boundary, ResetWindow, Timers, TimerTask};
use crate::store::EntityStore;
use crate::telemetry::{create_dispatch_span, generate_correlation_id};
use crate::voice::{VoiceRoom, VoiceWorkflow};
use crate::votes::{Vote, VoteWorkflow};

/// Fallback poll interval when the timer queue is empty.
const IDLE_TICK: StdDuration = StdDuration::from_secs(60);

pub struct Bot {
    chat: Arc<dyn ChatOps>,
    timers: Timers,
    config: GuildhallConfig,
    votes: VoteWorkflow,
    influence: InfluenceWorkflow,
    voice: VoiceWorkflow,
}

impl Bot {
    /// Wire the workflows and schedule the recurring timers. `now` seeds
    /// the first refresh tick and the three calendar reset boundaries.
    pub fn new(chat: Arc<dyn ChatOps>, config: GuildhallConfig, now: DateTime<Utc>) -> Self {
        let timers = Timers::new();

        let votes = VoteWorkflow::new(
            Arc::clone(&chat),
            Arc::new(EntityStore::<Vote>::new()),
            timers.clone(),
            config.votes.clone(),
        );
        let influence = InfluenceWorkflow::new(
            Arc::clone(&chat),
            Arc::new(InfluenceLedger::new()),
            Arc::new(EntityStore::<PendingDonation>::new()),
            Arc::new(EntityStore::<ReviewEntry>::new()),
            config.influence.clone(),
        );
        let voice = VoiceWorkflow::new(
            Arc::clone(&chat),
            Arc::new(EntityStore::<VoiceRoom>::new()),
            config.voice.clone(),
        );

        timers.schedule(
            now + Duration::seconds(config.votes.refresh_interval_secs as i64),
            TimerTask::RefreshVotes,
        );
        for window in [ResetWindow::Daily, ResetWindow::Weekly, ResetWindow::Monthly] {
            timers.schedule(
                next_boundary(window, now),
                TimerTask::ResetLedger { window },
            );
        }

        Self {
            chat,
            timers,
            config,
            votes,
            influence,
            voice,
        }
    }

    pub fn votes(&self) -> &VoteWorkflow {
        &self.votes
    }

    pub fn influence(&self) -> &InfluenceWorkflow {
        &self.influence
    }

    pub fn voice(&self) -> &VoiceWorkflow {
        &self.voice
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Dispatch one inbound event. Handler failures are logged and
    /// answered with a generic apology instead of propagating.
    pub async fn handle_event(&self, ev: &GatewayEvent, now: DateTime<Utc>) {
        let correlation_id = generate_correlation_id();
        let span = create_dispatch_span(
            event_kind(ev),
            ev.reply_user().map(|u| u.as_str()),
            None,
            Some(correlation_id.as_str()),
        );
        let _guard = span.enter();

        if let Err(e) = self.dispatch(ev, now).await {
            error!(error = %e, "event handler failed");
            if let Some(channel) = ev.reply_channel() {
                let apology =
                    OutboundMessage::text("⚠️ Something went wrong handling that. Please try again.");
                if let Err(e) = self.chat.send_message(channel, apology).await {
                    warn!(error = %e, "failed to send apology");
                }
            }
        }
    }

    async fn dispatch(&self, ev: &GatewayEvent, now: DateTime<Utc>) -> Result<()> {
        match ev {
            GatewayEvent::Message(msg) => self.dispatch_message(msg, now).await,
            GatewayEvent::Interaction(interaction) => {
                let Some(route) = parse_interaction(&interaction.custom_id) else {
                    return Ok(());
                };
                match route.feature {
                    Feature::Vote => {
                        let Some(vote_id) = route.entity_id else {
                            return Ok(());
                        };
                        self.votes
                            .handle_interaction(interaction, &route.action, &vote_id, now)
                            .await
                    }
                    Feature::Influence => {
                        self.influence
                            .handle_interaction(interaction, &route.action, now)
                            .await
                    }
                    Feature::VoiceRoom => {
                        let Some(channel_id) = route.entity_id else {
                            return Ok(());
                        };
                        self.voice
                            .handle_interaction(interaction, &route.action, &channel_id)
                            .await
                    }
                }
            }
            GatewayEvent::VoiceState(state) => self.voice.on_voice_state(state, now).await,
        }
    }

    async fn dispatch_message(&self, msg: &MessageEvent, now: DateTime<Utc>) -> Result<()> {
        if msg.author_is_bot {
            return Ok(());
        }

        let Some(command) = parse_command(&self.config.chat.command_prefix, &msg.content) else {
            // Unprefixed messages only matter to an in-flight donation.
            return self.influence.handle_plain_message(msg, now).await;
        };

        match command {
            Command::VoteCreate {
                title,
                duration_token,
                options,
            } => {
                self.votes
                    .create(msg, title, duration_token, options, now)
                    .await
            }
            Command::VoteClose { vote_id } => self.votes.handle_close_command(msg, vote_id).await,
            Command::VoteStatus => self.votes.status(msg).await,
            Command::VoteHelp => self.votes.help(msg).await,
            Command::InfluencePanel => self.influence.panel(msg).await,
            Command::VoiceStatus => self.voice.status(msg).await,
            Command::VoiceReset { user_id } => self.voice.reset_user(msg, &user_id).await,
            Command::Help => self.send_help(msg).await,
        }
    }

    async fn send_help(&self, msg: &MessageEvent) -> Result<()> {
        let prefix = &self.config.chat.command_prefix;
        let help = OutboundMessage::text(format!(
            "**Commands**\n\
             `{prefix}vote \"Title\" [3d|12h|30m] option, option, ...` create a vote\n\
             `{prefix}voteclose [ID]` close a vote\n\
             `{prefix}votestatus` list active votes\n\
             `{prefix}influence` open the influence panel\n\
             `{prefix}voicerooms` list active voice rooms\n\
             `{prefix}voicereset @user` delete a member's voice rooms"
        ));
        self.chat.send_message(&msg.channel, help).await?;
        Ok(())
    }

    /// Fire every timer due at `now`. Recurring tasks reschedule
    /// themselves from `now`, so missed ticks collapse into one.
    pub async fn fire_due_timers(&self, now: DateTime<Utc>) {
        for task in self.timers.pop_due(now) {
            match task {
                TimerTask::CloseVote { vote_id } => {
                    if let Err(e) = self.votes.close(&vote_id).await {
                        error!(vote_id = %vote_id, error = %e, "scheduled vote close failed");
                    }
                }
                TimerTask::RefreshVotes => {
                    self.votes.refresh_all(now).await;
                    self.timers.schedule(
                        now + Duration::seconds(self.config.votes.refresh_interval_secs as i64),
                        TimerTask::RefreshVotes,
                    );
                }
                TimerTask::ResetLedger { window } => {
                    self.influence.reset_window(window);
                    self.timers
                        .schedule(next_boundary(window, now), TimerTask::ResetLedger { window });
                }
            }
        }
    }

    /// Main loop: wake for inbound events, the earliest timer deadline,
    /// or shutdown, whichever comes first.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<GatewayEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("event loop started");
        loop {
            let wait = match self.timers.next_deadline() {
                Some(deadline) => (deadline - Utc::now()).to_std().unwrap_or_default(),
                None => IDLE_TICK,
            };

            tokio::select! {
                maybe = events.recv() => match maybe {
                    Some(ev) => self.handle_event(&ev, Utc::now()).await,
                    None => {
                        info!("gateway stream closed, stopping");
                        break;
                    }
                },
                _ = tokio::time::sleep(wait) => {
                    self.fire_due_timers(Utc::now()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("shutdown requested, stopping event loop");
                        break;
                    }
                }
            }
        }
    }
}

fn event_kind(ev: &GatewayEvent) -> &'static str {
    match ev {
        GatewayEvent::Message(_) => "message",
        GatewayEvent::Interaction(_) => "interaction",
        GatewayEvent::VoiceState(_) => "voice_state",
    }
}
