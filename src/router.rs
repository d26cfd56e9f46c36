//! Text-command and interaction routing.
//!
//! Text commands arrive as plain messages carrying the configured prefix;
//! interactions arrive with structured custom IDs of the form
//! `{feature}_{action}` or `{feature}_{action}_{entity}`. Both are parsed
//! here into typed values so the feature workflows never touch raw strings.

use regex::Regex;
use std::sync::LazyLock;

use crate::gateway::{Caller, RoleId};

/// A parsed text command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    VoteCreate {
        title: String,
        duration_token: Option<String>,
        options: Vec<String>,
    },
    VoteClose {
        vote_id: Option<String>,
    },
    VoteStatus,
    VoteHelp,
    InfluencePanel,
    VoiceStatus,
    VoiceReset {
        user_id: String,
    },
    Help,
}

/// Which feature an interaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Vote,
    Influence,
    VoiceRoom,
}

/// A parsed interaction custom ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRoute {
    pub feature: Feature,
    pub action: String,
    pub entity_id: Option<String>,
}

static QUOTED_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));
static DURATION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[dhm]$").expect("valid regex"));
static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("valid regex"));

/// Parse a message body into a command, if it carries the prefix.
///
/// Vote creation accepts
/// `{prefix}vote "Title" [Nd|Nh|Nm] option, option, ...`
/// where the bracketed duration token is optional.
pub fn parse_command(prefix: &str, content: &str) -> Option<Command> {
    let body = content.strip_prefix(prefix)?.trim();
    let (word, rest) = match body.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (body, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "vote" => parse_vote_command(rest),
        "voteclose" => {
            let id = rest.split_whitespace().next().map(str::to_string);
            Some(Command::VoteClose { vote_id: id })
        }
        "votestatus" => Some(Command::VoteStatus),
        "votehelp" => Some(Command::VoteHelp),
        "influence" => Some(Command::InfluencePanel),
        "voicerooms" => Some(Command::VoiceStatus),
        "voicereset" => {
            let user_id = USER_MENTION
                .captures(rest)
                .map(|c| c[1].to_string())
                .or_else(|| rest.split_whitespace().next().map(str::to_string))?;
            Some(Command::VoiceReset { user_id })
        }
        "help" => Some(Command::Help),
        _ => None,
    }
}

fn parse_vote_command(rest: &str) -> Option<Command> {
    if rest.is_empty() {
        return Some(Command::VoteHelp);
    }

    let caps = QUOTED_TITLE.captures(rest)?;
    let title = caps[1].to_string();
    let after_title = rest[caps.get(0).expect("whole match").end()..].trim();

    // The first whitespace-delimited token after the title may be a
    // duration like 3d, 12h or 45m. Everything else is the option list.
    let (duration_token, options_text) = match after_title.split_once(char::is_whitespace) {
        Some((first, remainder)) if DURATION_TOKEN.is_match(first) => {
            (Some(first.to_string()), remainder.trim())
        }
        _ if DURATION_TOKEN.is_match(after_title) => (Some(after_title.to_string()), ""),
        _ => (None, after_title),
    };

    let options: Vec<String> = options_text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Some(Command::VoteCreate {
        title,
        duration_token,
        options,
    })
}

/// Parse an interaction custom ID into its feature, action and entity.
pub fn parse_interaction(custom_id: &str) -> Option<InteractionRoute> {
    let mut parts = custom_id.splitn(3, '_');
    let feature = match parts.next()? {
        "vote" => Feature::Vote,
        "influence" => Feature::Influence,
        "voiceroom" => Feature::VoiceRoom,
        _ => return None,
    };
    let action = parts.next()?.to_string();
    let entity_id = parts.next().map(str::to_string);
    Some(InteractionRoute {
        feature,
        action,
        entity_id,
    })
}

/// Admins always pass; otherwise the caller must hold the configured role.
pub fn is_authorized(caller: &Caller, role_id: Option<&str>) -> bool {
    if caller.is_admin {
        return true;
    }
    match role_id {
        Some(role) => caller.has_role(&RoleId::from(role)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_create_with_duration_and_options() {
        let cmd = parse_command("!", "!vote \"Movie night\" 3d Alien, Dune, Heat").unwrap();
        assert_eq!(
            cmd,
            Command::VoteCreate {
                title: "Movie night".to_string(),
                duration_token: Some("3d".to_string()),
                options: vec!["Alien".to_string(), "Dune".to_string(), "Heat".to_string()],
            }
        );
    }

    #[test]
    fn vote_create_without_duration() {
        let cmd = parse_command("!", "!vote \"Snacks\" chips, dip").unwrap();
        match cmd {
            Command::VoteCreate {
                duration_token,
                options,
                ..
            } => {
                assert!(duration_token.is_none());
                assert_eq!(options.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bare_vote_shows_help() {
        assert_eq!(parse_command("!", "!vote"), Some(Command::VoteHelp));
    }

    #[test]
    fn unprefixed_messages_are_ignored() {
        assert_eq!(parse_command("!", "vote \"x\" a, b"), None);
        assert_eq!(parse_command("!", "hello there"), None);
    }

    #[test]
    fn voicereset_accepts_mention_or_raw_id() {
        assert_eq!(
            parse_command("!", "!voicereset <@12345>"),
            Some(Command::VoiceReset {
                user_id: "12345".to_string()
            })
        );
        assert_eq!(
            parse_command("!", "!voicereset 67890"),
            Some(Command::VoiceReset {
                user_id: "67890".to_string()
            })
        );
    }

    #[test]
    fn interaction_ids_split_into_feature_action_entity() {
        let route = parse_interaction("vote_cast_a1b2c3").unwrap();
        assert_eq!(route.feature, Feature::Vote);
        assert_eq!(route.action, "cast");
        assert_eq!(route.entity_id.as_deref(), Some("a1b2c3"));

        let route = parse_interaction("influence_ranking").unwrap();
        assert_eq!(route.feature, Feature::Influence);
        assert!(route.entity_id.is_none());

        assert!(parse_interaction("mystery_button").is_none());
    }

    #[test]
    fn authorization_requires_admin_or_role() {
        let admin = Caller::admin();
        let holder = Caller::with_roles(vec![RoleId::from("mod")]);
        let nobody = Caller::with_roles(vec![]);

        assert!(is_authorized(&admin, None));
        assert!(is_authorized(&holder, Some("mod")));
        assert!(!is_authorized(&holder, Some("other")));
        assert!(!is_authorized(&nobody, None));
    }
}
