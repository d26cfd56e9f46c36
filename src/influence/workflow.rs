//! Donation workflow: pending handshake, optimistic ledger credit,
//! manual review, periodic resets.
//!
//! Review decisions resolve through a side table keyed by the review
//! message ID. A regex fallback over the rendered description exists
//! only for review messages posted before the side table was in memory
//! (a process restart loses it); an unresolvable review is a silent
//! no-op.

use std::sync::Arc;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::InfluenceConfig;
use crate::gateway::events::{InteractionEvent, MessageEvent};
use crate::gateway::{ChannelId, ChatOps, Member, OutboundMessage, RoleId, UserId};
use crate::router::is_authorized;
use crate::scheduler::ResetWindow;
use crate::store::EntityStore;

use super::ledger::InfluenceLedger;
use super::render::{self, ReviewState};

/// A pending record is treated as absent once this much time has passed,
/// checked lazily on access rather than by timer.
pub const PENDING_WINDOW_MINUTES: i64 = 30;

/// How long a submitted proof message stays visible before deletion.
const SOURCE_DELETE_DELAY: std::time::Duration = std::time::Duration::from_secs(3);

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));
static DESCRIPTION_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@(\d+)>").expect("valid regex"));
static DESCRIPTION_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(\d+)\*\*").expect("valid regex"));

/// One user's open claim that donation proof is coming.
#[derive(Debug, Clone)]
pub struct PendingDonation {
    pub channel: ChannelId,
    pub created_at: DateTime<Utc>,
}

impl PendingDonation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::minutes(PENDING_WINDOW_MINUTES)
    }
}

/// Side-table record behind a posted review message.
#[derive(Debug, Clone)]
pub struct ReviewEntry {
    pub donor: UserId,
    pub amount: u64,
    pub decided: bool,
}

pub struct InfluenceWorkflow {
    chat: Arc<dyn ChatOps>,
    ledger: Arc<InfluenceLedger>,
    pending: Arc<EntityStore<PendingDonation>>,
    reviews: Arc<EntityStore<ReviewEntry>>,
    config: InfluenceConfig,
}

impl InfluenceWorkflow {
    pub fn new(
        chat: Arc<dyn ChatOps>,
        ledger: Arc<InfluenceLedger>,
        pending: Arc<EntityStore<PendingDonation>>,
        reviews: Arc<EntityStore<ReviewEntry>>,
        config: InfluenceConfig,
    ) -> Self {
        Self {
            chat,
            ledger,
            pending,
            reviews,
            config,
        }
    }

    pub fn ledger(&self) -> &InfluenceLedger {
        &self.ledger
    }

    /// Post the influence panel and remove the invoking command message.
    pub async fn panel(&self, ev: &MessageEvent) -> Result<()> {
        if self.config.admin_role_id.is_some()
            && !is_authorized(&ev.caller, self.config.admin_role_id.as_deref())
        {
            let reply = OutboundMessage::text(
                "⚠️ You do not have permission to open the influence panel.",
            );
            if let Err(e) = self.chat.send_message(&ev.channel, reply).await {
                warn!(error = %e, "failed to send panel rejection");
            }
            return Ok(());
        }

        let panel = OutboundMessage::embed(render::panel_embed())
            .with_components(render::panel_buttons());
        self.chat.send_message(&ev.channel, panel).await?;

        if let Err(e) = self.chat.delete_message(&ev.channel, &ev.message_id).await {
            warn!(error = %e, "failed to delete panel command message");
        }
        Ok(())
    }

    pub async fn handle_interaction(
        &self,
        ev: &InteractionEvent,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match action {
            "donate" => self.start_donation(ev, now).await,
            "ranking" => self.show_ranking(ev).await,
            "details" => self.show_details(ev).await,
            "download" => self.download_non_contributors(ev).await,
            "approve" => self.approve(ev, now).await,
            "reject" => self.reject(ev, now).await,
            _ => Ok(()),
        }
    }

    /// Donate intent: register (or overwrite) the pending record and send
    /// private instructions.
    async fn start_donation(&self, ev: &InteractionEvent, now: DateTime<Utc>) -> Result<()> {
        self.pending.insert(
            ev.user.as_str(),
            PendingDonation {
                channel: ev.channel.clone(),
                created_at: now,
            },
        );
        let instructions =
            OutboundMessage::embed(render::donate_instructions_embed()).as_ephemeral();
        self.chat.send_message(&ev.channel, instructions).await?;
        Ok(())
    }

    /// Unprefixed messages: check whether they complete a pending
    /// donation. Anything that does not match is ignored without reply.
    pub async fn handle_plain_message(&self, ev: &MessageEvent, now: DateTime<Utc>) -> Result<()> {
        let Some(pending) = self.pending.get(ev.author.as_str()) else {
            return Ok(());
        };
        if pending.channel != ev.channel {
            return Ok(());
        }
        if pending.is_expired(now) {
            self.pending.remove(ev.author.as_str());
            return Ok(());
        }
        if ev.attachment_count == 0 {
            return Ok(());
        }
        // First digit run only. "room 204, paid 50" reads as 204.
        let Some(amount) = extract_amount(&ev.content) else {
            return Ok(());
        };

        self.submit(ev, amount, now).await
    }

    /// The ledger is credited before approval; rejection is the undo.
    async fn submit(&self, ev: &MessageEvent, amount: u64, now: DateTime<Utc>) -> Result<()> {
        let cumulative = self.ledger.credit(&ev.author, amount);

        let donor_name = self
            .chat
            .member_display_name(&ev.author)
            .await
            .unwrap_or_else(|_| ev.author.to_string());

        let review = OutboundMessage::embed(render::review_embed(
            &ev.author,
            &donor_name,
            amount,
            cumulative,
            ev.first_attachment_url.as_deref(),
            now,
            ReviewState::Pending,
        ))
        .with_components(render::review_buttons(ReviewState::Pending));

        let review_channel = ChannelId::new(self.config.review_channel_id.clone());
        match self.chat.send_message(&review_channel, review).await {
            Ok(review_message) => {
                self.reviews.insert(
                    review_message.as_str(),
                    ReviewEntry {
                        donor: ev.author.clone(),
                        amount,
                        decided: false,
                    },
                );
            }
            Err(e) => {
                // Ledger already moved; log the divergence and continue.
                warn!(donor = %ev.author, amount, error = %e, "failed to post review message");
            }
        }

        // The proof stays visible for a beat before it is swept away.
        let chat = Arc::clone(&self.chat);
        let source_channel = ev.channel.clone();
        let source_message = ev.message_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SOURCE_DELETE_DELAY).await;
            if let Err(e) = chat.delete_message(&source_channel, &source_message).await {
                if e.is_not_found() {
                    debug!(error = %e, "donation proof message already gone");
                } else {
                    warn!(error = %e, "failed to delete donation proof message");
                }
            }
        });

        let receipt = OutboundMessage::text(format!(
            "✅ Your donation of **{amount}** influence was submitted!\nIt will be finalized once an administrator approves it."
        ));
        if let Err(e) = self.chat.send_direct_message(&ev.author, receipt).await {
            warn!(donor = %ev.author, error = %e, "failed to DM donation receipt");
        }

        self.pending.remove(ev.author.as_str());
        info!(donor = %ev.author, amount, "donation submitted for review");
        Ok(())
    }

    async fn show_ranking(&self, ev: &InteractionEvent) -> Result<()> {
        let rows = self.ledger.ranking(15);
        if rows.is_empty() {
            self.ephemeral(ev, "⚠️ No influence has been donated yet.").await;
            return Ok(());
        }
        let payload = OutboundMessage::embed(render::ranking_embed(&rows)).as_ephemeral();
        self.chat.send_message(&ev.channel, payload).await?;
        Ok(())
    }

    async fn show_details(&self, ev: &InteractionEvent) -> Result<()> {
        let totals = self.ledger.totals();
        let ranking = self.ledger.ranking(1);

        let coverage = self.eligible_members().await.map(|members| render::Coverage {
            eligible: members.len(),
            non_contributors: members
                .iter()
                .filter(|m| !self.ledger.is_contributor(&m.id))
                .count(),
        });

        let mut payload =
            OutboundMessage::embed(render::details_embed(&totals, ranking.first(), coverage))
                .as_ephemeral();
        if coverage.is_some() {
            payload = payload.with_components(render::details_buttons());
        }
        self.chat.send_message(&ev.channel, payload).await?;
        Ok(())
    }

    /// Holders of the configured eligible role. None when no role is
    /// configured or the member list cannot be fetched.
    async fn eligible_members(&self) -> Option<Vec<Member>> {
        let role = self.config.eligible_role_id.as_deref()?;
        match self.chat.role_members(&RoleId::from(role)).await {
            Ok(members) => Some(members),
            Err(e) => {
                warn!(error = %e, "failed to fetch eligible members");
                None
            }
        }
    }

    /// Numbered listing of expected donors who have not contributed yet.
    async fn download_non_contributors(&self, ev: &InteractionEvent) -> Result<()> {
        let Some(members) = self.eligible_members().await else {
            self.ephemeral(ev, "⚠️ No eligible donor role is configured.").await;
            return Ok(());
        };
        let non_contributors: Vec<&Member> = members
            .iter()
            .filter(|m| !self.ledger.is_contributor(&m.id))
            .collect();

        if non_contributors.is_empty() {
            self.ephemeral(ev, "✅ Every expected donor has contributed!").await;
            return Ok(());
        }

        let mut listing = String::from("📥 **Members who have not donated yet:**\n");
        for (position, member) in non_contributors.iter().enumerate() {
            listing.push_str(&format!(
                "{}. {} (ID: {})\n",
                position + 1,
                member.display_name,
                member.id
            ));
        }
        self.ephemeral(ev, &listing).await;
        Ok(())
    }

    async fn approve(&self, ev: &InteractionEvent, now: DateTime<Utc>) -> Result<()> {
        if !ev.caller.is_admin {
            self.ephemeral(ev, "⚠️ Administrator permission is required to approve donations.")
                .await;
            return Ok(());
        }
        let Some((donor, amount)) = self.resolve_review(ev) else {
            return Ok(());
        };

        // Already credited on submission; approval only settles the review.
        self.rerender_review(ev, &donor, amount, now, ReviewState::Approved)
            .await;
        self.ephemeral(ev, &format!("✅ <@{donor}>'s donation was approved."))
            .await;
        info!(donor = %donor, amount, "donation approved");
        Ok(())
    }

    async fn reject(&self, ev: &InteractionEvent, now: DateTime<Utc>) -> Result<()> {
        if !ev.caller.is_admin {
            self.ephemeral(ev, "⚠️ Administrator permission is required to reject donations.")
                .await;
            return Ok(());
        }
        let Some((donor, amount)) = self.resolve_review(ev) else {
            return Ok(());
        };

        self.ledger.rescind(&donor, amount);

        self.rerender_review(ev, &donor, amount, now, ReviewState::Rejected)
            .await;
        self.ephemeral(ev, &format!("❌ <@{donor}>'s donation was rejected."))
            .await;

        let notice = OutboundMessage::text(format!(
            "❌ Your donation of **{amount}** influence was rejected by an administrator."
        ));
        if let Err(e) = self.chat.send_direct_message(&donor, notice).await {
            warn!(donor = %donor, error = %e, "failed to DM rejection notice");
        }
        info!(donor = %donor, amount, "donation rejected");
        Ok(())
    }

    /// Side table first; description regex for legacy messages; both
    /// absent means silent no-op. A decided entry also resolves to None
    /// so the second press of a decided review does nothing.
    fn resolve_review(&self, ev: &InteractionEvent) -> Option<(UserId, u64)> {
        if let Some(message) = &ev.message {
            match self.reviews.get(message.as_str()) {
                Some(entry) if entry.decided => return None,
                Some(entry) => {
                    self.reviews.with_entry(message.as_str(), |e| {
                        e.decided = true;
                    });
                    return Some((entry.donor, entry.amount));
                }
                None => {}
            }
        }

        let description = ev.message_description.as_deref()?;
        let donor = DESCRIPTION_MENTION
            .captures(description)
            .map(|c| UserId::new(c[1].to_string()))?;
        let amount = DESCRIPTION_AMOUNT
            .captures(description)
            .and_then(|c| c[1].parse::<u64>().ok())?;
        Some((donor, amount))
    }

    async fn rerender_review(
        &self,
        ev: &InteractionEvent,
        donor: &UserId,
        amount: u64,
        now: DateTime<Utc>,
        state: ReviewState,
    ) {
        let Some(message) = &ev.message else {
            return;
        };
        let donor_name = self
            .chat
            .member_display_name(donor)
            .await
            .unwrap_or_else(|_| donor.to_string());
        let payload = OutboundMessage::embed(render::review_embed(
            donor,
            &donor_name,
            amount,
            self.ledger.all_time(donor),
            None,
            now,
            state,
        ))
        .with_components(render::review_buttons(state));
        if let Err(e) = self.chat.edit_message(&ev.channel, message, payload).await {
            warn!(error = %e, "failed to re-render review message");
        }
    }

    /// Calendar reset: clear one periodic window in full.
    pub fn reset_window(&self, window: ResetWindow) {
        self.ledger.clear(window);
        info!(window = window.label(), "periodic influence window cleared");
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

fn extract_amount(content: &str) -> Option<u64> {
    AMOUNT.find(content)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_the_first_digit_run() {
        assert_eq!(extract_amount("donating 500"), Some(500));
        assert_eq!(extract_amount("room 204, paid 50"), Some(204));
        assert_eq!(extract_amount("no digits here"), None);
    }

    #[test]
    fn pending_expiry_is_a_strict_window() {
        let created = "2025-06-01T12:00:00Z".parse().unwrap();
        let pending = PendingDonation {
            channel: ChannelId::from("c1"),
            created_at: created,
        };
        let at_window = created + Duration::minutes(PENDING_WINDOW_MINUTES);
        assert!(!pending.is_expired(at_window));
        assert!(pending.is_expired(at_window + Duration::seconds(1)));
    }
}
