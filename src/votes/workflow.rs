//! Vote lifecycle: create, cast, close, refresh.
//!
//! A vote lives in the store only while active. Closing removes it first
//! and renders the terminal result from the removed value, so close is
//! idempotent between the deadline timer and the manual command.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::config::VoteConfig;
use crate::gateway::events::{InteractionEvent, MessageEvent};
use crate::gateway::{ChannelId, ChatOps, MessageId, OutboundMessage, UserId};
use crate::router::is_authorized;
use crate::scheduler::{TimerTask, Timers};
use crate::store::EntityStore;

use super::render;

const VOTE_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_OPTIONS: usize = 25;

#[derive(Debug, Clone)]
pub struct Vote {
    pub id: String,
    pub title: String,
    pub options: Vec<String>,
    /// Per-option counts, index-aligned with `options`.
    pub votes: Vec<u64>,
    pub voters: HashSet<UserId>,
    pub voter_choices: HashMap<UserId, usize>,
    pub voter_names: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub channel: ChannelId,
    pub message_id: Option<MessageId>,
}

impl Vote {
    pub fn total_ballots(&self) -> u64 {
        self.votes.iter().sum()
    }
}

pub struct VoteWorkflow {
    chat: Arc<dyn ChatOps>,
    store: Arc<EntityStore<Vote>>,
    timers: Timers,
    config: VoteConfig,
}

impl VoteWorkflow {
    pub fn new(
        chat: Arc<dyn ChatOps>,
        store: Arc<EntityStore<Vote>>,
        timers: Timers,
        config: VoteConfig,
    ) -> Self {
        Self {
            chat,
            store,
            timers,
            config,
        }
    }

    pub fn store(&self) -> &EntityStore<Vote> {
        &self.store
    }

    /// Create a vote from the parsed command and post its live summary.
    pub async fn create(
        &self,
        ev: &MessageEvent,
        title: String,
        duration_token: Option<String>,
        options: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !is_authorized(&ev.caller, self.config.admin_role_id.as_deref()) {
            self.reply(
                &ev.channel,
                "⚠️ You do not have permission to create votes. Administrator or the configured role is required.",
            )
            .await;
            return Ok(());
        }
        if options.is_empty() {
            self.reply(
                &ev.channel,
                "Please list the options separated by commas, e.g. `option1, option2, option3`.",
            )
            .await;
            return Ok(());
        }
        if options.len() > MAX_OPTIONS {
            self.reply(
                &ev.channel,
                &format!("⚠️ At most {MAX_OPTIONS} options are supported."),
            )
            .await;
            return Ok(());
        }

        let duration = duration_token
            .as_deref()
            .and_then(parse_duration_token)
            .unwrap_or_else(|| Duration::hours(self.config.default_duration_hours as i64));

        // Uniform draw over the 36-symbol alphabet. Collisions among active
        // votes are possible and deliberately unchecked.
        let vote_id = generate_vote_id();

        let vote = Vote {
            id: vote_id.clone(),
            title,
            votes: vec![0; options.len()],
            options,
            voters: HashSet::new(),
            voter_choices: HashMap::new(),
            voter_names: Vec::new(),
            start_time: now,
            end_time: now + duration,
            channel: ev.channel.clone(),
            message_id: None,
        };

        self.store.insert(vote_id.clone(), vote.clone());

        let summary = OutboundMessage::embed(render::live_embed(&vote, now))
            .with_components(render::vote_buttons(&vote_id));
        match self.chat.send_message(&ev.channel, summary).await {
            Ok(message_id) => {
                self.store.with_entry(&vote_id, |v| {
                    v.message_id = Some(message_id);
                });
            }
            Err(e) => warn!(vote_id = %vote_id, error = %e, "failed to post vote summary"),
        }

        self.timers.schedule(
            vote.end_time,
            TimerTask::CloseVote {
                vote_id: vote_id.clone(),
            },
        );

        info!(vote_id = %vote_id, "vote created");
        self.reply(
            &ev.channel,
            &format!(
                "✅ Vote created. Vote ID: {vote_id} (closes automatically in {})",
                render::format_duration(duration)
            ),
        )
        .await;
        Ok(())
    }

    /// Manual close command. Without an ID, lists the active votes.
    pub async fn handle_close_command(
        &self,
        ev: &MessageEvent,
        vote_id: Option<String>,
    ) -> Result<()> {
        if !is_authorized(&ev.caller, self.config.admin_role_id.as_deref()) {
            self.reply(
                &ev.channel,
                "⚠️ You do not have permission to close votes. Administrator or the configured role is required.",
            )
            .await;
            return Ok(());
        }

        let Some(vote_id) = vote_id else {
            let listing = self.active_listing(false);
            match listing {
                Some(listing) => {
                    self.reply(
                        &ev.channel,
                        &format!("{listing}\nClose one with `voteclose <vote ID>`."),
                    )
                    .await
                }
                None => self.reply(&ev.channel, "⚠️ No votes are currently active.").await,
            }
            return Ok(());
        };

        if !self.store.contains(&vote_id) {
            self.reply(
                &ev.channel,
                &format!("⚠️ No active vote with ID `{vote_id}`."),
            )
            .await;
            return Ok(());
        }

        self.close(&vote_id).await?;
        self.reply(
            &ev.channel,
            &format!("✅ Vote closed manually. (Vote ID: {vote_id})"),
        )
        .await;
        Ok(())
    }

    /// Shared close path for the deadline timer and the manual command.
    /// Closing an absent vote is a no-op.
    pub async fn close(&self, vote_id: &str) -> Result<()> {
        let Some(vote) = self.store.remove(vote_id) else {
            return Ok(());
        };

        let result = OutboundMessage::embed(render::result_embed(&vote));
        match &vote.message_id {
            Some(message_id) => {
                // Strip the buttons by editing with an empty component list.
                if let Err(e) = self
                    .chat
                    .edit_message(&vote.channel, message_id, result.clone())
                    .await
                {
                    warn!(vote_id, error = %e, "summary edit failed, posting fresh result");
                    let mut fresh = result;
                    fresh.content = Some(format!("🏁 Vote `{vote_id}` has closed."));
                    if let Err(e) = self.chat.send_message(&vote.channel, fresh).await {
                        warn!(vote_id, error = %e, "failed to post vote result");
                    }
                }
            }
            None => {
                if let Err(e) = self.chat.send_message(&vote.channel, result).await {
                    warn!(vote_id, error = %e, "failed to post vote result");
                }
            }
        }

        info!(vote_id, "vote closed");
        Ok(())
    }

    pub async fn status(&self, ev: &MessageEvent) -> Result<()> {
        match self.active_listing(true) {
            Some(listing) => self.reply(&ev.channel, &listing).await,
            None => self.reply(&ev.channel, "No votes are currently active.").await,
        }
        Ok(())
    }

    pub async fn help(&self, ev: &MessageEvent) -> Result<()> {
        let help = [
            "**📋 Vote commands**",
            "",
            "`vote \"Title\" [duration] option1, option2, ...` - create a vote",
            "`voteclose <vote ID>` - close a vote early",
            "`votestatus` - list active votes",
            "`votehelp` - this message",
            "",
            "**Durations:** `3d` (default), `12h`, `30m`",
            "",
            "**Example:** `vote \"Meetup day\" 1d Saturday, Sunday`",
        ]
        .join("\n");
        self.reply(&ev.channel, &help).await;
        Ok(())
    }

    /// Button and select-menu interactions on a vote summary.
    pub async fn handle_interaction(
        &self,
        ev: &InteractionEvent,
        action: &str,
        vote_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(vote) = self.store.get(vote_id) else {
            self.ephemeral(ev, "⚠️ This vote is no longer active.").await;
            return Ok(());
        };

        match action {
            "cast" => {
                if vote.voters.contains(&ev.user) {
                    let choice = vote
                        .voter_choices
                        .get(&ev.user)
                        .and_then(|i| vote.options.get(*i))
                        .map(String::as_str)
                        .unwrap_or("an unknown option");
                    self.ephemeral(
                        ev,
                        &format!("⚠️ You already voted for **{choice}**. Only one ballot per member."),
                    )
                    .await;
                    return Ok(());
                }
                let menu = OutboundMessage::ephemeral("🗳️ Choose the option to vote for:")
                    .with_components(vec![render::option_menu(&vote)]);
                if let Err(e) = self.chat.send_message(&ev.channel, menu).await {
                    warn!(vote_id, error = %e, "failed to send option menu");
                }
            }
            "pick" => self.cast_ballot(ev, vote_id, now).await?,
            "info" => {
                let ballot_line = match vote
                    .voter_choices
                    .get(&ev.user)
                    .and_then(|i| vote.options.get(*i))
                {
                    Some(choice) => format!("✅ You voted for **{choice}**."),
                    None => "❌ You have not voted yet.".to_string(),
                };
                let mut message = format!(
                    "📝 **Ballot info**\n\nBallots are **named**; voters are listed in the final result.\nVoting ends <t:{}:F>.\n**{}** ballots cast so far.\n\n{ballot_line}",
                    vote.end_time.timestamp(),
                    vote.total_ballots(),
                );
                if !vote.voter_names.is_empty() {
                    message.push_str("\n\n**Voters so far:**\n");
                    for name in &vote.voter_names {
                        message.push_str(&format!("- {name}\n"));
                    }
                }
                self.ephemeral(ev, &message).await;
            }
            "refresh" => {
                self.update_summary(vote_id, now).await;
                self.ephemeral(ev, "✅ Standings refreshed!").await;
            }
            _ => {}
        }
        Ok(())
    }

    async fn cast_ballot(
        &self,
        ev: &InteractionEvent,
        vote_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(index) = ev.values.first().and_then(|v| v.parse::<usize>().ok()) else {
            return Ok(());
        };

        let voter_name = self
            .chat
            .member_display_name(&ev.user)
            .await
            .unwrap_or_else(|_| ev.user.to_string());

        // All four structures move together under the store lock; a second
        // ballot from the same user is rejected inside the same section.
        #[derive(PartialEq)]
        enum Outcome {
            Recorded { option: String, total: u64 },
            Duplicate,
            BadIndex,
        }
        let outcome = self.store.with_entry(vote_id, |vote| {
            if vote.voters.contains(&ev.user) {
                return Outcome::Duplicate;
            }
            if index >= vote.options.len() {
                return Outcome::BadIndex;
            }
            vote.votes[index] += 1;
            vote.voters.insert(ev.user.clone());
            vote.voter_choices.insert(ev.user.clone(), index);
            vote.voter_names.push(voter_name.clone());
            Outcome::Recorded {
                option: vote.options[index].clone(),
                total: vote.total_ballots(),
            }
        });

        match outcome {
            Some(Outcome::Recorded { option, total }) => {
                self.update_summary(vote_id, now).await;
                self.ephemeral(
                    ev,
                    &format!(
                        "✅ Your ballot for **{option}** is recorded!\n**{total}** ballots cast so far.\nThanks for voting! 🙏"
                    ),
                )
                .await;
            }
            Some(Outcome::Duplicate) => {
                self.ephemeral(ev, "⚠️ You already voted. Only one ballot per member.")
                    .await;
            }
            Some(Outcome::BadIndex) | None => {
                self.ephemeral(ev, "⚠️ This vote is no longer active.").await;
            }
        }
        Ok(())
    }

    /// Re-render every still-active vote's live summary. Votes past their
    /// end time are left for the deadline timer.
    pub async fn refresh_all(&self, now: DateTime<Utc>) {
        for (vote_id, vote) in self.store.snapshot() {
            if now >= vote.end_time {
                continue;
            }
            self.update_summary(&vote_id, now).await;
        }
    }

    async fn update_summary(&self, vote_id: &str, now: DateTime<Utc>) {
        let Some(vote) = self.store.get(vote_id) else {
            return;
        };
        let Some(message_id) = &vote.message_id else {
            return;
        };
        let payload = OutboundMessage::embed(render::live_embed(&vote, now))
            .with_components(render::vote_buttons(vote_id));
        if let Err(e) = self.chat.edit_message(&vote.channel, message_id, payload).await {
            warn!(vote_id, error = %e, "failed to refresh vote summary");
        }
    }

    fn active_listing(&self, with_totals: bool) -> Option<String> {
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return None;
        }
        let mut listing = String::from("**Active votes:**\n");
        for (id, vote) in snapshot {
            if with_totals {
                listing.push_str(&format!(
                    "- ID: `{id}` | {} | ballots: {} | ends <t:{}:R>\n",
                    vote.title,
                    vote.total_ballots(),
                    vote.end_time.timestamp(),
                ));
            } else {
                listing.push_str(&format!(
                    "- ID: `{id}` | {} | ends <t:{}:R>\n",
                    vote.title,
                    vote.end_time.timestamp(),
                ));
            }
        }
        Some(listing)
    }

    async fn reply(&self, channel: &ChannelId, content: &str) {
        if let Err(e) = self
            .chat
            .send_message(channel, OutboundMessage::text(content))
            .await
        {
            warn!(error = %e, "failed to send reply");
        }
    }

    async fn ephemeral(&self, ev: &InteractionEvent, content: &str) {
        if let Err(e) = self
            .chat
            .send_message(&ev.channel, OutboundMessage::ephemeral(content))
            .await
        {
            warn!(error = %e, "failed to send ephemeral reply");
        }
    }
}

fn generate_vote_id() -> String {
    let mut rng = rand::rng();
    (0..6)
        .map(|_| VOTE_ID_ALPHABET[rng.random_range(0..VOTE_ID_ALPHABET.len())] as char)
        .collect()
}

fn parse_duration_token(token: &str) -> Option<Duration> {
    let (value, unit) = token.split_at(token.len().checked_sub(1)?);
    let value: i64 = value.parse().ok()?;
    match unit {
        "d" => Some(Duration::days(value)),
        "h" => Some(Duration::hours(value)),
        "m" => Some(Duration::minutes(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_ids_are_six_symbols_from_the_alphabet() {
        for _ in 0..50 {
            let id = generate_vote_id();
            assert_eq!(id.len(), 6);
            assert!(id.bytes().all(|b| VOTE_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn duration_tokens_parse_by_unit() {
        assert_eq!(parse_duration_token("3d"), Some(Duration::days(3)));
        assert_eq!(parse_duration_token("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_duration_token("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration_token("10x"), None);
        assert_eq!(parse_duration_token(""), None);
    }
}
