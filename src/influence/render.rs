//! Rendering for the influence panel, rankings, and review payloads.

use chrono::{DateTime, Utc};

use crate::gateway::{ActionRow, ButtonStyle, Component, Embed, UserId};

use super::ledger::LedgerTotals;

const PANEL_COLOR: u32 = 0xFFD700;
const DONATE_COLOR: u32 = 0x4169E1;
const DETAILS_COLOR: u32 = 0x32CD32;
const PENDING_COLOR: u32 = 0xFFA500;
const APPROVED_COLOR: u32 = 0x00FF00;
const REJECTED_COLOR: u32 = 0xFF0000;

/// Decision state driving the review payload's color, title and buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Pending,
    Approved,
    Rejected,
}

pub fn panel_embed() -> Embed {
    Embed::builder()
        .color(PANEL_COLOR)
        .title("🌟 Influence system")
        .description("Donate influence, check the rankings, or view details with the buttons below.")
        .field(
            "✨ What is influence?",
            "A measure of contribution to the community's growth and activity.",
            false,
        )
        .field(
            "💰 Donating",
            "Press the Donate button to start a donation.",
            false,
        )
        .field(
            "📊 Rankings",
            "Press the Rankings button to see the donation leaderboard.",
            false,
        )
        .build()
}

pub fn panel_buttons() -> Vec<ActionRow> {
    vec![ActionRow::new(vec![
        Component::button("influence_donate", "Donate", ButtonStyle::Primary, Some("💰")),
        Component::button(
            "influence_ranking",
            "Rankings",
            ButtonStyle::Secondary,
            Some("📊"),
        ),
        Component::button(
            "influence_details",
            "Details",
            ButtonStyle::Success,
            Some("📝"),
        ),
    ])]
}

pub fn donate_instructions_embed() -> Embed {
    Embed::builder()
        .color(DONATE_COLOR)
        .title("💰 Donate influence")
        .description("Follow these steps to donate:")
        .field(
            "1️⃣ Enter the amount",
            "Post the amount you are donating, digits only.",
            false,
        )
        .field(
            "2️⃣ Attach a screenshot",
            "Attach a screenshot as proof of the donation.",
            false,
        )
        .field(
            "⚠️ Notes",
            "- Send the amount and the screenshot in a single message.\n- Your message is removed automatically after processing.\n- The request lapses after 30 minutes.",
            false,
        )
        .build()
}

/// Top-15 leaderboard. Bars are scaled against the leader's total.
pub fn ranking_embed(rows: &[(UserId, u64)]) -> Embed {
    let max = rows.first().map(|(_, amount)| *amount).unwrap_or(0).max(1);
    let mut listing = String::new();
    for (position, (user, amount)) in rows.iter().enumerate() {
        let medal = match position {
            0 => "🥇 ".to_string(),
            1 => "🥈 ".to_string(),
            2 => "🥉 ".to_string(),
            n => format!("{}. ", n + 1),
        };
        let percent = (*amount as f64 / max as f64 * 100.0).round() as u64;
        listing.push_str(&format!(
            "{medal}<@{user}> - {} **{amount}**\n",
            influence_bar(percent)
        ));
    }

    Embed::builder()
        .color(PANEL_COLOR)
        .title("🏆 Donation rankings")
        .description(format!("### 📊 Top {} donors\n{listing}", rows.len()))
        .build()
}

/// Donation coverage against the configured eligible role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub eligible: usize,
    pub non_contributors: usize,
}

pub fn details_embed(
    totals: &LedgerTotals,
    top_donor: Option<&(UserId, u64)>,
    coverage: Option<Coverage>,
) -> Embed {
    let top_line = match top_donor {
        Some((user, amount)) => format!("<@{user}> - {amount}"),
        None => "None yet".to_string(),
    };
    let mut builder = Embed::builder()
        .color(DETAILS_COLOR)
        .title("📝 Influence details")
        .field("💰 Total donated", totals.all_time.to_string(), true)
        .field("📊 Today", totals.daily.to_string(), true)
        .field("📈 This week", totals.weekly.to_string(), true)
        .field("📉 This month", totals.monthly.to_string(), true)
        .field("👥 Contributors", totals.contributors.to_string(), true);
    if let Some(coverage) = coverage {
        builder = builder.field(
            "🧑‍🤝‍🧑 Expected donors",
            coverage.eligible.to_string(),
            true,
        );
    }
    builder = builder.field("🏆 Top donor", top_line, false);
    if let Some(coverage) = coverage {
        builder = builder.field(
            "❌ Not yet donated",
            format!(
                "{} member(s) (press the button below for the list)",
                coverage.non_contributors
            ),
            false,
        );
    }
    builder.build()
}

/// Download button offered under the details payload when coverage is
/// computable.
pub fn details_buttons() -> Vec<ActionRow> {
    vec![ActionRow::new(vec![Component::button(
        "influence_download",
        "List members who have not donated",
        ButtonStyle::Danger,
        Some("📥"),
    )])]
}

/// Review payload posted to the review channel. The `<@id>` mention and
/// the bold amount in the description double as the legacy recovery
/// format older review messages are parsed back out of.
pub fn review_embed(
    donor: &UserId,
    donor_name: &str,
    amount: u64,
    cumulative: u64,
    proof_url: Option<&str>,
    submitted_at: DateTime<Utc>,
    state: ReviewState,
) -> Embed {
    let (color, title) = match state {
        ReviewState::Pending => (PENDING_COLOR, "⌛ Donation awaiting review"),
        ReviewState::Approved => (APPROVED_COLOR, "✅ Donation approved"),
        ReviewState::Rejected => (REJECTED_COLOR, "❌ Donation rejected"),
    };
    let mut builder = Embed::builder()
        .color(color)
        .title(title)
        .description(format!("<@{donor}> donated **{amount}** influence!"))
        .field("🧑 Donor", donor_name, true)
        .field("💰 Amount", amount.to_string(), true)
        .field("💎 Cumulative", cumulative.to_string(), true)
        .field(
            "📅 Submitted",
            format!("<t:{}:F>", submitted_at.timestamp()),
            false,
        );
    if state == ReviewState::Pending {
        builder = builder.field(
            "⚠️ Approval required",
            "This donation needs administrator approval.",
            false,
        );
    }
    if let Some(url) = proof_url {
        builder = builder.image(url);
    }
    builder.build()
}

pub fn review_buttons(state: ReviewState) -> Vec<ActionRow> {
    let row = match state {
        ReviewState::Pending => ActionRow::new(vec![
            Component::button("influence_approve", "Approve", ButtonStyle::Success, Some("✅")),
            Component::button("influence_reject", "Reject", ButtonStyle::Danger, Some("❌")),
        ]),
        ReviewState::Approved => ActionRow::new(vec![
            Component::disabled_button(
                "influence_approve",
                "Approved",
                ButtonStyle::Success,
                Some("✅"),
            ),
            Component::disabled_button("influence_reject", "Reject", ButtonStyle::Danger, Some("❌")),
        ]),
        ReviewState::Rejected => ActionRow::new(vec![
            Component::disabled_button(
                "influence_approve",
                "Approve",
                ButtonStyle::Success,
                Some("✅"),
            ),
            Component::disabled_button(
                "influence_reject",
                "Rejected",
                ButtonStyle::Danger,
                Some("❌"),
            ),
        ]),
    };
    vec![row]
}

/// Leaderboard gauge, capped at 10 visible cells.
pub fn influence_bar(percent: u64) -> String {
    let filled = ((percent / 5) as usize).min(10);
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_description_carries_mention_and_bold_amount() {
        let embed = review_embed(
            &UserId::from("42"),
            "Donor",
            500,
            1500,
            None,
            Utc::now(),
            ReviewState::Pending,
        );
        let description = embed.description.unwrap();
        assert!(description.contains("<@42>"));
        assert!(description.contains("**500**"));
    }

    #[test]
    fn decided_reviews_disable_both_buttons() {
        for state in [ReviewState::Approved, ReviewState::Rejected] {
            let rows = review_buttons(state);
            assert!(rows[0].components.iter().all(|c| c.is_disabled()));
        }
        let pending = review_buttons(ReviewState::Pending);
        assert!(pending[0].components.iter().all(|c| !c.is_disabled()));
    }

    #[test]
    fn ranking_scales_bars_against_the_leader() {
        let rows = vec![
            (UserId::from("a"), 100),
            (UserId::from("b"), 50),
        ];
        let embed = ranking_embed(&rows);
        let description = embed.description.unwrap();
        assert!(description.contains("🥇 <@a>"));
        assert!(description.contains("🥈 <@b>"));
    }
}
