//! Prompt assembly.
//!
//! A pure function of persona, gathered context, history and the new
//! message. Identical inputs always produce an identical prompt.

use hydra_core::message::Message;
use hydra_core::persona::{ContextFragment, ConversationTurn, FragmentOrigin, Persona};

/// The system instruction plus the ordered message sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub system: String,
    pub messages: Vec<Message>,
}

/// The persona's self-description, shared by the chat and synthesis prompts.
pub fn persona_profile(persona: &Persona) -> String {
    format!(
        "You are {name}, a core persona of the Hydra Engine. Your role is: \"{role}\".\n\
         Your core attributes are: {attributes}.\n\
         Your operational summary is: \"{summary}\".",
        name = persona.name,
        role = persona.role,
        attributes = persona.key_attributes,
        summary = persona.dossier_summary,
    )
}

/// Build the prompt for the provider fan-out.
pub fn assemble(
    persona: &Persona,
    fragments: &[ContextFragment],
    history: &[ConversationTurn],
    user_message: &str,
) -> AssembledPrompt {
    let mut system = persona_profile(persona);
    system.push_str(
        "\nYou must respond as this persona. Be direct, intelligent, and stay in character. \
         Do not break character or mention you are an AI.",
    );

    let context = render_context(fragments);
    if !context.is_empty() {
        system.push_str("\n\n");
        system.push_str(&context);
    }

    let mut messages: Vec<Message> = history.iter().map(Message::from).collect();
    messages.push(Message::user(user_message));

    AssembledPrompt { system, messages }
}

/// Web context first, then knowledge-base context, each fragment verbatim.
fn render_context(fragments: &[ContextFragment]) -> String {
    let section = |origin: FragmentOrigin, header: &str| -> Option<String> {
        let body: Vec<String> = fragments
            .iter()
            .filter(|f| f.origin == origin)
            .map(|f| match &f.source {
                Some(source) => format!("[Source: {source}]\n{}", f.content),
                None => f.content.clone(),
            })
            .collect();
        (!body.is_empty()).then(|| format!("--- {header} ---\n{}", body.join("\n\n")))
    };

    let sections: Vec<String> = [
        section(FragmentOrigin::Web, "WEB CONTEXT"),
        section(FragmentOrigin::KnowledgeBase, "KNOWLEDGE BASE CONTEXT"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sections.is_empty() {
        return String::new();
    }

    format!(
        "Use the following context to inform your answer if relevant.\n\n{}\n--- END CONTEXT ---",
        sections.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_core::message::Role;

    fn janus() -> Persona {
        Persona::new("Janus", "Chief Strategist")
            .with_attributes("Measured, two-sided")
            .with_summary("Sees what was and what will be.")
    }

    #[test]
    fn system_embeds_persona_profile() {
        let prompt = assemble(&janus(), &[], &[], "hello");
        assert!(prompt.system.starts_with("You are Janus, a core persona of the Hydra Engine."));
        assert!(prompt.system.contains("\"Chief Strategist\""));
        assert!(prompt.system.contains("Measured, two-sided"));
        assert!(prompt.system.contains("Sees what was and what will be."));
        assert!(prompt.system.contains("Do not break character or mention you are an AI."));
        assert!(!prompt.system.contains("CONTEXT"));
    }

    #[test]
    fn web_context_precedes_knowledge() {
        let fragments = vec![
            ContextFragment::knowledge(Some("plan.md".into()), "Q3 launch"),
            ContextFragment::web("https://example.com", "Example Domain"),
        ];
        let prompt = assemble(&janus(), &fragments, &[], "next steps?");
        let web = prompt.system.find("WEB CONTEXT").unwrap();
        let kb = prompt.system.find("KNOWLEDGE BASE CONTEXT").unwrap();
        assert!(web < kb);
        assert!(prompt.system.contains("[Source: plan.md]\nQ3 launch"));
        assert!(prompt.system.contains("[Source: https://example.com]\nExample Domain"));
        assert!(prompt.system.contains("if relevant"));
    }

    #[test]
    fn history_then_user_message() {
        let history = vec![
            ConversationTurn::user("u1", "p1", "first"),
            ConversationTurn::ai("u1", "p1", "reply"),
        ];
        let prompt = assemble(&janus(), &[], &history, "second");
        let roles: Vec<Role> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(prompt.messages.last().unwrap().content, "second");
    }

    #[test]
    fn assembly_is_deterministic() {
        let fragments = vec![ContextFragment::knowledge(None, "Knowledge base unavailable.")];
        let a = assemble(&janus(), &fragments, &[], "same");
        let b = assemble(&janus(), &fragments, &[], "same");
        assert_eq!(a, b);
    }
}
