//! Prompt templates, embedded at compile time.

const CLARIFICATION_SYSTEM: &str = include_str!("../prompts/clarification_system.md");
const CLARIFICATION_INITIAL_REQUEST: &str =
    include_str!("../prompts/clarification_user_initial_request.md");
const CLARIFICATION_ANSWER: &str = include_str!("../prompts/clarification_user_answer.md");
const SPEC_SYSTEM: &str = include_str!("../prompts/spec_system.md");
const SPEC_DRAFT: &str = include_str!("../prompts/spec_user_draft.md");
const SPEC_REVISE: &str = include_str!("../prompts/spec_user_revise.md");

const INITIAL_REQUEST_PLACEHOLDER: &str = "{{INITIAL_USER_REQUEST_TEXT}}";
const ANSWER_PLACEHOLDER: &str = "{{USER_ANSWER_TEXT}}";
const FEEDBACK_PLACEHOLDER: &str = "{{USER_FEEDBACK_TEXT}}";

pub fn clarification_system_prompt() -> &'static str {
    CLARIFICATION_SYSTEM
}

pub fn clarification_user_prompt_for_initial_request(initial_request: &str) -> String {
    CLARIFICATION_INITIAL_REQUEST.replace(INITIAL_REQUEST_PLACEHOLDER, initial_request)
}

pub fn clarification_user_prompt_for_answer(answer: &str) -> String {
    CLARIFICATION_ANSWER.replace(ANSWER_PLACEHOLDER, answer)
}

/// System prompt shared by drafting and revision turns.
pub fn spec_system_prompt() -> &'static str {
    SPEC_SYSTEM
}

pub fn spec_user_prompt_for_draft() -> &'static str {
    SPEC_DRAFT
}

pub fn spec_user_prompt_for_revision(feedback: &str) -> String {
    SPEC_REVISE.replace(FEEDBACK_PLACEHOLDER, feedback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_not_empty() {
        for prompt in [
            clarification_system_prompt(),
            spec_system_prompt(),
            spec_user_prompt_for_draft(),
        ] {
            assert!(!prompt.trim().is_empty());
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let p = clarification_user_prompt_for_initial_request("add a --json flag");
        assert!(p.contains("add a --json flag"));
        assert!(!p.contains("{{"));

        let p = clarification_user_prompt_for_answer("use sqlite");
        assert!(p.contains("use sqlite"));
        assert!(!p.contains("{{"));

        let p = spec_user_prompt_for_revision("drop section 3");
        assert!(p.contains("drop section 3"));
        assert!(!p.contains("{{"));
    }

    #[test]
    fn user_text_is_inserted_verbatim() {
        let tricky = "literal {{USER_ANSWER_TEXT}} and $1";
        let p = clarification_user_prompt_for_initial_request(tricky);
        assert!(p.contains(tricky));
    }
}
