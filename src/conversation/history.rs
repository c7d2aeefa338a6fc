//! Text views over a conversation log
//!
//! Plan dialogs keep their full history; proposal refinement keeps every
//! user request but only the most recent agent answer, which bounds prompt
//! growth across revisions.

use super::models::{ConversationTurn, Role, TurnKind};

/// Every turn of `kind` in order, one `"User: ..."` or `"Agent: ..."` line each
pub fn full_history_text(turns: &[ConversationTurn], kind: TurnKind) -> String {
    let mut text = String::new();
    for turn in turns.iter().filter(|t| t.kind == kind) {
        match turn.role {
            Role::User => text.push_str("User: "),
            Role::Agent => text.push_str("Agent: "),
        }
        text.push_str(&turn.content);
        text.push('\n');
    }
    text
}

/// Every user turn of `kind` in order, then the latest agent turn of `kind`
pub fn latest_turn_text(turns: &[ConversationTurn], kind: TurnKind) -> String {
    let mut text = String::new();
    let mut last_agent = None;

    for turn in turns.iter().filter(|t| t.kind == kind) {
        match turn.role {
            Role::User => {
                text.push_str("User: ");
                text.push_str(&turn.content);
                text.push('\n');
            }
            Role::Agent => last_agent = Some(turn.content.as_str()),
        }
    }

    if let Some(content) = last_agent {
        text.push_str("\nAgent: ");
        text.push_str(content);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user(TurnKind::Plan, "plan q1"),
            ConversationTurn::agent(TurnKind::Plan, "plan a1"),
            ConversationTurn::user(TurnKind::Proposal, "draft srs"),
            ConversationTurn::agent(TurnKind::Proposal, "srs v1"),
            ConversationTurn::user(TurnKind::Plan, "plan q2"),
            ConversationTurn::agent(TurnKind::Plan, "plan a2"),
            ConversationTurn::user(TurnKind::Proposal, "add security section"),
            ConversationTurn::agent(TurnKind::Proposal, "srs v2"),
        ]
    }

    #[test]
    fn test_full_history_keeps_every_turn_of_kind() {
        assert_eq!(
            full_history_text(&log(), TurnKind::Plan),
            "User: plan q1\nAgent: plan a1\nUser: plan q2\nAgent: plan a2\n"
        );
    }

    #[test]
    fn test_latest_turn_keeps_users_and_last_agent() {
        assert_eq!(
            latest_turn_text(&log(), TurnKind::Proposal),
            "User: draft srs\nUser: add security section\n\nAgent: srs v2"
        );
    }

    #[test]
    fn test_latest_turn_without_agent_answer() {
        let turns = vec![ConversationTurn::user(TurnKind::Proposal, "only a question")];
        assert_eq!(latest_turn_text(&turns, TurnKind::Proposal), "User: only a question\n");
    }

    #[test]
    fn test_empty_views() {
        assert_eq!(full_history_text(&[], TurnKind::Plan), "");
        assert_eq!(latest_turn_text(&[], TurnKind::Proposal), "");
        // kinds never mix
        let plan_only = vec![ConversationTurn::agent(TurnKind::Plan, "a")];
        assert_eq!(latest_turn_text(&plan_only, TurnKind::Proposal), "");
    }
}
