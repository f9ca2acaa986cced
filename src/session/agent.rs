use crate::media::Participant;

/// Marker that identifies the automated counterpart in a room
const AGENT_MARKER: &str = "agent";

/// Whether `participant` looks like the remote agent (identity or name
/// contains "agent", ignoring case)
pub fn is_agent(participant: &Participant) -> bool {
    [&participant.identity, &participant.name]
        .iter()
        .any(|field| field.to_lowercase().contains(AGENT_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_identity_or_name_case_insensitively() {
        assert!(is_agent(&Participant::new("PA_1", "voice-agent-7", "Bot")));
        assert!(is_agent(&Participant::new("PA_2", "bot-7", "Support Agent")));
        assert!(is_agent(&Participant::new("PA_3", "AGENT", "")));
        assert!(!is_agent(&Participant::new("PA_4", "user-1700000000", "Alice")));
    }
}
