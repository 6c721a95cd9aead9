use std::str::FromStr;
use std::time::Duration;

/// Who may delete a group room. Direct rooms can always be deleted by either party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupDeletePolicy {
    /// Only the recorded creator. Groups without a creator fall back to any member.
    #[default]
    CreatorOnly,
    AnyMember,
}

impl FromStr for GroupDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creator-only" | "creator" => Ok(Self::CreatorOnly),
            "any-member" | "any" => Ok(Self::AnyMember),
            other => Err(format!("unknown group delete policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub group_delete_policy: GroupDeletePolicy,
    /// Messages returned with a direct room from get-or-create
    pub history_preview_limit: u32,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
    pub typing_ttl: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            group_delete_policy: GroupDeletePolicy::default(),
            history_preview_limit: 50,
            default_page_limit: 50,
            max_page_limit: 200,
            typing_ttl: Duration::from_secs(8),
        }
    }
}
