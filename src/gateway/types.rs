//! Typed boundary values for the chat gateway.
//!
//! IDs are opaque strings on the wire; newtypes keep the three ID spaces
//! (users, channels, messages) from being mixed up in handler signatures.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_type!(UserId);
id_type!(ChannelId);
id_type!(MessageId);
id_type!(RoleId);

/// A member as seen through the gateway: ID plus resolved display name
/// (server nickname if set, account name otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
}

/// Capabilities of the user behind an inbound event, resolved once at the
/// boundary so handlers never touch the platform's permission model.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub is_admin: bool,
    pub roles: Vec<RoleId>,
}

impl Caller {
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(roles: Vec<RoleId>) -> Self {
        Self {
            is_admin: false,
            roles,
        }
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }
}

/// An outbound message payload: plain content, at most one embed, and
/// interactive component rows. `ephemeral` marks private, non-persistent
/// replies to the initiating user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutboundMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    /// Always serialized, even when empty: an edit carrying `[]` is how
    /// a terminal rendering strips the previous components, while an
    /// omitted key leaves them in place.
    pub components: Vec<ActionRow>,
    #[serde(skip)]
    pub ephemeral: bool,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A private reply visible only to the initiating user. Validation
    /// rejections and acknowledgements use this shape.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ephemeral: true,
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    pub fn with_components(mut self, rows: Vec<ActionRow>) -> Self {
        self.components = rows;
        self
    }

    pub fn as_ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "image_url")]
    pub image: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "image_url",
        rename = "thumbnail"
    )]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

fn image_url<S: serde::Serializer>(url: &Option<String>, ser: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = ser.serialize_map(Some(1))?;
    map.serialize_entry("url", url.as_deref().unwrap_or_default())?;
    map.end()
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl Embed {
    pub fn builder() -> EmbedBuilder {
        EmbedBuilder(Embed::default())
    }
}

/// Thin builder so render code reads like a payload description.
pub struct EmbedBuilder(Embed);

impl EmbedBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.0.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.0.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.0.fields.push(EmbedField::new(name, value, inline));
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.0.image = Some(url.into());
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.0.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn build(self) -> Embed {
        self.0
    }
}

/// One row of interactive components.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Component>,
}

impl ActionRow {
    pub fn new(components: Vec<Component>) -> Self {
        Self { kind: 1, components }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Component {
    Button {
        #[serde(rename = "type")]
        kind: u8,
        custom_id: String,
        label: String,
        style: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        emoji: Option<String>,
        disabled: bool,
    },
    SelectMenu {
        #[serde(rename = "type")]
        kind: u8,
        custom_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

impl ButtonStyle {
    fn code(self) -> u8 {
        match self {
            ButtonStyle::Primary => 1,
            ButtonStyle::Secondary => 2,
            ButtonStyle::Success => 3,
            ButtonStyle::Danger => 4,
        }
    }
}

impl Component {
    pub fn button(
        custom_id: impl Into<String>,
        label: impl Into<String>,
        style: ButtonStyle,
        emoji: Option<&str>,
    ) -> Self {
        Component::Button {
            kind: 2,
            custom_id: custom_id.into(),
            label: label.into(),
            style: style.code(),
            emoji: emoji.map(str::to_string),
            disabled: false,
        }
    }

    pub fn disabled_button(
        custom_id: impl Into<String>,
        label: impl Into<String>,
        style: ButtonStyle,
        emoji: Option<&str>,
    ) -> Self {
        match Self::button(custom_id, label, style, emoji) {
            Component::Button {
                kind,
                custom_id,
                label,
                style,
                emoji,
                ..
            } => Component::Button {
                kind,
                custom_id,
                label,
                style,
                emoji,
                disabled: true,
            },
            other => other,
        }
    }

    pub fn select_menu(
        custom_id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Component::SelectMenu {
            kind: 3,
            custom_id: custom_id.into(),
            placeholder: placeholder.into(),
            options,
        }
    }

    pub fn custom_id(&self) -> &str {
        match self {
            Component::Button { custom_id, .. } => custom_id,
            Component::SelectMenu { custom_id, .. } => custom_id,
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            Component::Button { disabled, .. } => *disabled,
            Component::SelectMenu { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
            emoji: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_types_do_not_compare_across_spaces() {
        let user = UserId::new("42");
        assert_eq!(user, UserId::from("42"));
        assert_eq!(user.to_string(), "42");
    }

    #[test]
    fn ephemeral_flag_survives_builder_chain() {
        let msg = OutboundMessage::embed(Embed::builder().title("hi").build())
            .with_components(vec![])
            .as_ephemeral();
        assert!(msg.ephemeral);
    }

    #[test]
    fn component_free_payload_serializes_an_explicit_empty_list() {
        let msg = OutboundMessage::embed(Embed::builder().title("result").build());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["components"], serde_json::json!([]));
    }

    #[test]
    fn button_serializes_with_style_code() {
        let button = Component::button("vote_cast_ABC123", "Vote", ButtonStyle::Primary, Some("🗳️"));
        let json = serde_json::to_value(&button).unwrap();
        assert_eq!(json["style"], 1);
        assert_eq!(json["custom_id"], "vote_cast_ABC123");
        assert_eq!(json["disabled"], false);
    }
}
