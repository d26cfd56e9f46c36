//! Vote summary rendering. Purely derived from a vote's current state,
//! no side effects.

use chrono::{DateTime, Duration, Utc};

use crate::gateway::{ActionRow, ButtonStyle, Component, Embed, SelectOption};

use super::workflow::Vote;

const LIVE_COLOR: u32 = 0x3498DB;
const RESULT_COLOR: u32 = 0x2ECC71;

/// Options paired with their counts, highest first.
fn standings(vote: &Vote) -> Vec<(&str, u64)> {
    let mut rows: Vec<(&str, u64)> = vote
        .options
        .iter()
        .enumerate()
        .map(|(i, opt)| (opt.as_str(), vote.votes[i]))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows
}

fn rank_emoji(position: usize, count: u64) -> &'static str {
    if count == 0 {
        return "🔹";
    }
    match position {
        0 => "🥇",
        1 => "🥈",
        2 => "🥉",
        _ => "🔹",
    }
}

fn standings_field(vote: &Vote, total: u64) -> String {
    let mut field = String::new();
    for (position, (name, count)) in standings(vote).iter().enumerate() {
        let percent = if total > 0 {
            (*count as f64 / total as f64 * 100.0).round() as u64
        } else {
            0
        };
        field.push_str(&format!(
            "{} **{name}**: {count} votes ({percent}%)\n{}\n",
            rank_emoji(position, *count),
            vote_bar(percent),
        ));
    }
    field
}

/// Live summary: standings, time progress, and how-to-vote help.
pub fn live_embed(vote: &Vote, now: DateTime<Utc>) -> Embed {
    let total: u64 = vote.votes.iter().sum();
    let rows = standings(vote);

    let top_count = rows.first().map(|(_, c)| *c).unwrap_or(0);
    let leaders: Vec<&str> = rows
        .iter()
        .filter(|(_, c)| *c == top_count)
        .map(|(name, _)| *name)
        .collect();
    let leader_line = if top_count == 0 {
        "No ballots yet".to_string()
    } else if leaders.len() > 1 {
        format!(
            "👑 Tied lead: **{}** ({top_count} votes each)",
            leaders.join(", ")
        )
    } else {
        format!("👑 Current leader: **{}** ({top_count} votes)", leaders[0])
    };

    let elapsed = (now - vote.start_time).num_milliseconds().max(0);
    let span = (vote.end_time - vote.start_time).num_milliseconds().max(1);
    let percent = ((elapsed as f64 / span as f64) * 100.0).round().min(100.0) as u64;

    Embed::builder()
        .color(LIVE_COLOR)
        .title(format!("🗳️ {}", vote.title))
        .description(format!(
            "📊 Total ballots: **{total}**\n🆔 Vote ID: `{}`\n{leader_line}\n⏳ Progress: {} **{percent}%**\n⏰ Ends: <t:{end}:F> (<t:{end}:R>)",
            vote.id,
            progress_bar(percent),
            end = vote.end_time.timestamp(),
        ))
        .field("📊 Standings", standings_field(vote, total), false)
        .field(
            "📝 How to vote",
            "Press **Cast ballot** below to vote.\nBallots are **named** and listed in the final result.\nEach member may vote **once**; ballots cannot be changed.\nPress **Refresh** for the latest standings.",
            false,
        )
        .build()
}

/// Terminal result rendering produced once at close.
pub fn result_embed(vote: &Vote) -> Embed {
    let total: u64 = vote.votes.iter().sum();
    let rows = standings(vote);
    let top_count = rows.first().map(|(_, c)| *c).unwrap_or(0);
    let winners: Vec<&str> = rows
        .iter()
        .filter(|(_, c)| *c == top_count)
        .map(|(name, _)| *name)
        .collect();

    let winner_block = if top_count == 0 {
        "🚫 **No winner** (no ballots were cast)".to_string()
    } else if winners.len() == 1 {
        let percent = (top_count as f64 / total as f64 * 100.0).round() as u64;
        format!(
            "🏆 **{}**\nShare of ballots: **{percent}%** ({top_count} votes)",
            winners[0]
        )
    } else {
        let percent = (top_count as f64 / total as f64 * 100.0).round() as u64;
        let mut block = format!("👥 **{}-way tie!**\n", winners.len());
        for (i, winner) in winners.iter().enumerate() {
            block.push_str(&format!("{}. **{winner}** ({top_count} votes)\n", i + 1));
        }
        block.push_str(&format!("Each winner's share: **{percent}%**"));
        block
    };

    let mut builder = Embed::builder()
        .color(RESULT_COLOR)
        .title(format!("🎉 {} - Final results 🎉", vote.title))
        .description(format!(
            "🗳️ **Total ballots**: {total}\n🆔 **Vote ID**: `{}`\n📆 **Ran**: <t:{}:F> to <t:{}:F>\n\n### 🏆 Outcome\n{winner_block}",
            vote.id,
            vote.start_time.timestamp(),
            vote.end_time.timestamp(),
        ))
        .field("📊 Full standings", standings_field(vote, total), false);

    if !vote.voter_names.is_empty() {
        let voters = vote
            .voter_names
            .iter()
            .map(|name| format!("- {name}"))
            .collect::<Vec<_>>()
            .join("\n");
        builder = builder.field("👥 Voters", voters, false);
    }

    builder
        .footer("This vote has closed")
        .build()
}

/// Buttons attached to the live summary message.
pub fn vote_buttons(vote_id: &str) -> Vec<ActionRow> {
    vec![ActionRow::new(vec![
        Component::button(
            format!("vote_cast_{vote_id}"),
            "Cast ballot",
            ButtonStyle::Primary,
            Some("🗳️"),
        ),
        Component::button(
            format!("vote_info_{vote_id}"),
            "My ballot",
            ButtonStyle::Secondary,
            Some("ℹ️"),
        ),
        Component::button(
            format!("vote_refresh_{vote_id}"),
            "Refresh",
            ButtonStyle::Success,
            Some("🔄"),
        ),
    ])]
}

/// Option select menu sent privately when a member presses Cast ballot.
pub fn option_menu(vote: &Vote) -> ActionRow {
    let options = vote
        .options
        .iter()
        .enumerate()
        .take(25)
        .map(|(index, option)| {
            SelectOption::new(option.clone(), index.to_string())
                .describe(format!("Vote for {option}"))
        })
        .collect();
    ActionRow::new(vec![Component::select_menu(
        format!("vote_pick_{}", vote.id),
        "Choose an option",
        options,
    )])
}

/// 10-block coarse time-progress bar.
pub fn progress_bar(percent: u64) -> String {
    let filled = (percent / 10).min(10) as usize;
    format!("{}{}", "🟦".repeat(filled), "⬜".repeat(10 - filled))
}

/// Per-option share bar, capped at 10 visible cells.
pub fn vote_bar(percent: u64) -> String {
    let filled = ((percent / 5) as usize).min(10);
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds();
    if seconds >= 86_400 {
        format!("{}d", seconds / 86_400)
    } else if seconds >= 3_600 {
        format!("{}h", seconds / 3_600)
    } else if seconds >= 60 {
        format!("{}m", seconds / 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChannelId;
    use std::collections::{HashMap, HashSet};

    fn vote_with(votes: Vec<u64>, options: Vec<&str>) -> Vote {
        Vote {
            id: "ABC123".into(),
            title: "Test".into(),
            options: options.into_iter().map(str::to_string).collect(),
            votes,
            voters: HashSet::new(),
            voter_choices: HashMap::new(),
            voter_names: Vec::new(),
            start_time: "2025-06-01T00:00:00Z".parse().unwrap(),
            end_time: "2025-06-04T00:00:00Z".parse().unwrap(),
            channel: ChannelId::from("c1"),
            message_id: None,
        }
    }

    #[test]
    fn result_names_all_tied_winners() {
        let vote = vote_with(vec![3, 3, 1], vec!["A", "B", "C"]);
        let embed = result_embed(&vote);
        let description = embed.description.unwrap();
        assert!(description.contains("2-way tie"));
        assert!(description.contains("**A**"));
        assert!(description.contains("**B**"));
        assert!(!description.contains("**C**"));
    }

    #[test]
    fn zero_ballots_means_no_winner() {
        let vote = vote_with(vec![0, 0], vec!["A", "B"]);
        let embed = result_embed(&vote);
        assert!(embed.description.unwrap().contains("No winner"));
    }

    #[test]
    fn bars_stay_within_their_lengths() {
        assert_eq!(progress_bar(0), "⬜".repeat(10));
        assert_eq!(progress_bar(100).chars().count(), 10);
        assert_eq!(vote_bar(100).chars().count(), 10);
        assert_eq!(vote_bar(50).chars().filter(|c| *c == '█').count(), 10);
    }

    #[test]
    fn durations_render_in_largest_unit() {
        assert_eq!(format_duration(Duration::days(3)), "3d");
        assert_eq!(format_duration(Duration::hours(12)), "12h");
        assert_eq!(format_duration(Duration::minutes(30)), "30m");
        assert_eq!(format_duration(Duration::seconds(45)), "45s");
    }
}
