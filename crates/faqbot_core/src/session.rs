use crate::model::{Role, Turn};

/// The presentation side of a conversation. The resolver only appends.
pub trait Transcript {
    fn append_turn(&mut self, role: Role, content: &str);
    fn render_history(&self) -> String;
}

/// Append-only conversation history for one chat session. Dropping the
/// session ends it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Transcript for Session {
    fn append_turn(&mut self, role: Role, content: &str) {
        self.turns.push(Turn {
            role,
            content: content.to_string(),
        });
    }

    fn render_history(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}> {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_are_kept_in_order() {
        let mut session = Session::new();
        assert!(session.is_empty());

        session.append_turn(Role::User, "What is SVECW?");
        session.append_turn(Role::Assistant, "svecw is a college.");

        assert_eq!(session.len(), 2);
        assert_eq!(session.turns()[0].role, Role::User);
        assert_eq!(
            session.render_history(),
            "user> What is SVECW?\nassistant> svecw is a college."
        );
    }
}
